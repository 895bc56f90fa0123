pub mod actor;
pub mod config;
pub mod context;
pub mod event;
pub mod net;
pub mod replication;

pub use actor::{ActorAdapter, ActorHandle, ActorSnapshot, SimWorld};
pub use config::{HpSyncException, SafeZone, SyncConfig, DEFAULT_BROADCAST_RADIUS};
pub use context::ReplicationContext;
pub use event::{Distribution, NetworkQueues, PacketQueue, SessionEvent};
pub use net::{
    decode, encode, spawn_follower_worker, spawn_host_worker, DecodeMode, EncodeError,
    NetworkPacket, PacketRouter, ProtocolError, Role, StateUpdate, Transport, TransportError,
    UdpTransport, UpdateType, WorkerError, WorkerHandle, DEFAULT_MAX_PEERS, DEFAULT_PORT,
};
pub use replication::{Appearance, LocalActorShadow, MirrorState, RemoteActorMirror};
