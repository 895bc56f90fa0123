use std::collections::HashMap;
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use super::codec::{decode, DecodeMode};
use super::connection::{PeerRecord, PeerRegistry};
use super::identity::IdentityAllocator;
use super::protocol::{peer_name, NetworkPacket, PacketBody, StateUpdate, HOST_ID};
use super::transport::{PeerHandle, TransportEvent};
use crate::event::{Distribution, NetworkQueues, SessionEvent};

pub const DEFAULT_MAX_PEERS: usize = 32;
const LOG_WINDOW: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Host,
    Follower,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Host => "Host",
            Role::Follower => "Follower",
        }
    }
}

/// Allows one message per key per window. Keys idle for a full window are
/// forgotten, so churning peer ids do not accumulate.
#[derive(Debug)]
pub struct RateLimitedLog {
    window: Duration,
    last: HashMap<String, Instant>,
}

impl Default for RateLimitedLog {
    fn default() -> Self {
        Self::new(LOG_WINDOW)
    }
}

impl RateLimitedLog {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last: HashMap::new(),
        }
    }

    pub fn should_log(&mut self, key: &str) -> bool {
        self.should_log_at(key, Instant::now())
    }

    pub fn should_log_at(&mut self, key: &str, now: Instant) -> bool {
        let window = self.window;
        self.last
            .retain(|_, at| now.saturating_duration_since(*at) < window);
        if self.last.contains_key(key) {
            return false;
        }
        self.last.insert(key.to_string(), now);
        true
    }
}

/// Control-plane outcomes the replication context acts on.
#[derive(Debug, Clone, PartialEq)]
pub enum Routed {
    PeerJoined { name: String },
    PeerLeft { name: String },
    IdentityAssigned { name: String },
    Update { sender: String, update: StateUpdate },
}

/// Turns raw transport events into validated packets for one network role.
#[derive(Debug)]
pub struct PacketRouter {
    role: Role,
    queues: NetworkQueues,
    identities: IdentityAllocator,
    peers: PeerRegistry,
    local_identity: String,
    connect_id: Option<u32>,
    latency: Option<Duration>,
    dropped: RateLimitedLog,
}

impl PacketRouter {
    pub fn new(role: Role, queues: NetworkQueues, max_peers: usize) -> Self {
        let local_identity = match role {
            Role::Host => HOST_ID.to_string(),
            Role::Follower => String::new(),
        };
        Self {
            role,
            queues,
            identities: IdentityAllocator::new(),
            peers: PeerRegistry::new(max_peers),
            local_identity,
            connect_id: None,
            latency: None,
            dropped: RateLimitedLog::default(),
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn is_host(&self) -> bool {
        self.role == Role::Host
    }

    /// Id peers use for the local player. Empty until a follower is assigned one.
    pub fn local_identity(&self) -> &str {
        &self.local_identity
    }

    pub fn peers(&self) -> &PeerRegistry {
        &self.peers
    }

    pub fn latency(&self) -> Option<Duration> {
        self.latency
    }

    pub fn record_latency(&mut self, rtt: Duration) {
        self.latency = Some(rtt);
    }

    pub fn handle(&mut self, event: TransportEvent) -> Vec<Routed> {
        match self.role {
            Role::Host => self.handle_host(event),
            Role::Follower => self.handle_follower(event),
        }
    }

    /// Queues a packet for every peer except the one it came from.
    pub fn distribute(&self, packet: NetworkPacket) {
        let exclude = packet
            .sender()
            .and_then(|sender| self.peers.get_by_name(sender))
            .map(|record| record.peer);
        self.queues.distribute.enqueue(Distribution { packet, exclude });
    }

    fn notify(&self, event: SessionEvent) {
        self.queues.notices.enqueue(event);
    }

    fn handle_host(&mut self, event: TransportEvent) -> Vec<Routed> {
        match event {
            TransportEvent::Connect { peer, connect_id } => self.on_connect(peer, connect_id),
            TransportEvent::Receive { peer, data, .. } => self.on_host_receive(peer, &data),
            TransportEvent::Disconnect { peer } => self.on_disconnect(peer),
        }
    }

    fn on_connect(&mut self, peer: PeerHandle, connect_id: u32) -> Vec<Routed> {
        let identity = self.identities.allocate();
        let name = peer_name(identity);

        if let Err(reason) = self.peers.register(PeerRecord::new(peer, identity, name.clone())) {
            warn!("Rejected connection {peer}: {reason}");
            self.identities.release(identity);
            return Vec::new();
        }

        self.queues
            .outbound
            .enqueue(NetworkPacket::join_game(connect_id, name.clone()).with_sender(HOST_ID));
        info!("Connection {peer} joined as {name}");
        self.notify(SessionEvent::PeerConnected { name: name.clone() });
        vec![Routed::PeerJoined { name }]
    }

    fn on_host_receive(&mut self, peer: PeerHandle, data: &[u8]) -> Vec<Routed> {
        let Some(record) = self.peers.get_mut(peer) else {
            if self.dropped.should_log(&format!("peer-{peer}")) {
                warn!("Dropping packet from unregistered connection {peer}");
            }
            return Vec::new();
        };

        let mut packet = match decode(data, DecodeMode::Server) {
            Ok(packet) => packet,
            Err(e) => {
                warn!("Invalid packet from {}: {e}", record.name);
                return Vec::new();
            }
        };
        let PacketBody::StateUpdate(update) = &packet.body else {
            warn!("Unexpected {:?} packet from {}", packet.kind(), record.name);
            return Vec::new();
        };

        if let StateUpdate::Init(init) = update {
            if record.observe_nickname(&init.nickname) {
                let nickname = record.display_name().to_string();
                info!("Player {nickname} connected as {}", record.name);
                self.queues.notices.enqueue(SessionEvent::PeerAnnounced {
                    name: record.name.clone(),
                    nickname,
                });
            }
        }

        let sender = record.name.clone();
        let update = update.clone();
        packet.sender_id = Some(sender.clone());
        debug!("{packet}");
        self.queues.distribute.enqueue(Distribution {
            packet,
            exclude: Some(peer),
        });
        vec![Routed::Update { sender, update }]
    }

    fn on_disconnect(&mut self, peer: PeerHandle) -> Vec<Routed> {
        let Some(record) = self.peers.remove(peer) else {
            debug!("Unregistered connection {peer} disconnected");
            return Vec::new();
        };

        self.queues.outbound.enqueue(
            NetworkPacket::disconnect(record.name.clone(), record.nickname.clone()).with_sender(HOST_ID),
        );
        self.identities.release(record.identity);

        let display_name = record.display_name().to_string();
        info!(
            "{display_name} disconnected after {}s",
            record.connected_at.elapsed().as_secs()
        );
        self.notify(SessionEvent::PeerDisconnected {
            name: record.name.clone(),
            display_name,
        });
        vec![Routed::PeerLeft { name: record.name }]
    }

    fn handle_follower(&mut self, event: TransportEvent) -> Vec<Routed> {
        match event {
            TransportEvent::Connect { connect_id, .. } => {
                info!("Connected to host (connect id {connect_id})");
                self.connect_id = Some(connect_id);
                Vec::new()
            }
            TransportEvent::Receive { data, .. } => self.on_follower_receive(&data),
            TransportEvent::Disconnect { .. } => {
                warn!("Connection to the host lost");
                self.notify(SessionEvent::ConnectionFailed {
                    reason: "connection to the host lost".into(),
                });
                Vec::new()
            }
        }
    }

    fn on_follower_receive(&mut self, data: &[u8]) -> Vec<Routed> {
        let packet = match decode(data, DecodeMode::Client) {
            Ok(packet) => packet,
            Err(e) => {
                warn!("Invalid packet from host: {e}");
                return Vec::new();
            }
        };
        debug!("{packet}");

        let sender = packet.sender().map(str::to_string);
        match packet.body {
            PacketBody::JoinGame { connect_id, name } => {
                if self.connect_id != Some(connect_id) {
                    debug!("{name} joined the session");
                    return Vec::new();
                }
                info!("Joined the session as {name}");
                self.local_identity = name.clone();
                self.notify(SessionEvent::IdentityAssigned { name: name.clone() });
                vec![Routed::IdentityAssigned { name }]
            }
            PacketBody::PlayerDisconnect { name, nickname } => {
                let display_name = nickname.unwrap_or_else(|| name.clone());
                info!("{display_name} disconnected");
                self.notify(SessionEvent::PeerDisconnected {
                    name: name.clone(),
                    display_name,
                });
                vec![Routed::PeerLeft { name }]
            }
            PacketBody::StateUpdate(update) => match sender {
                Some(sender) => vec![Routed::Update { sender, update }],
                None => {
                    warn!("Dropping {} update without sender", update.update_type().as_str());
                    Vec::new()
                }
            },
        }
    }
}
