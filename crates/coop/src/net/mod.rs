mod codec;
mod connection;
mod identity;
mod protocol;
mod router;
mod transport;
mod udp;
mod worker;

pub use codec::{decode, encode, DecodeMode, EncodeError, ProtocolError};
pub use connection::{PeerRecord, PeerRegistry};
pub use identity::IdentityAllocator;
pub use protocol::{is_coop_player, item_name, item_ref, peer_name};
pub use protocol::{
    Attack, DropItem, InitState, NetworkPacket, PacketBody, PacketKind, SpellCast, StateUpdate,
    TakeItem, UpdateType, DEFAULT_PORT, HOST_ID, MAX_ATTACKS, MAX_INSTANCE_NAME_LEN,
    MAX_NAME_LEN, MAX_NICKNAME_LEN, MAX_OVERLAYS, MAX_PACKET_SIZE, MAX_SPELL_CASTS,
    MAX_UNIQUE_NAME_LEN, MOTION_CHANNEL, NO_ITEM, PEER_ID_PREFIX, PROTOCOL_VERSION,
    RELIABLE_CHANNEL, WEAPON_MODE_MAGIC, WEAPON_MODE_NONE,
};
pub use router::{PacketRouter, RateLimitedLog, Role, Routed, DEFAULT_MAX_PEERS};
pub use transport::{
    Delivery, PeerHandle, Reliability, Transport, TransportEvent, TransportStats,
};
pub use udp::{TransportError, UdpTransport};
pub use worker::{
    spawn_follower_worker, spawn_host_worker, spawn_worker, NetworkWorker, WorkerError,
    WorkerHandle,
};
