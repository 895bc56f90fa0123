use std::time::Duration;

/// Transport-level handle for one connected peer.
pub type PeerHandle = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reliability {
    Reliable,
    Unreliable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delivery {
    pub channel: u8,
    pub reliability: Reliability,
}

impl Delivery {
    pub fn reliable(channel: u8) -> Self {
        Self {
            channel,
            reliability: Reliability::Reliable,
        }
    }
}

/// Datagram counters since the transport was created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransportStats {
    pub packets_sent: u64,
    pub packets_received: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// `connect_id` is shared by both ends of the connection.
    Connect { peer: PeerHandle, connect_id: u32 },
    Receive {
        peer: PeerHandle,
        channel: u8,
        data: Vec<u8>,
    },
    Disconnect { peer: PeerHandle },
}

impl TransportEvent {
    pub fn peer(&self) -> PeerHandle {
        match self {
            TransportEvent::Connect { peer, .. }
            | TransportEvent::Receive { peer, .. }
            | TransportEvent::Disconnect { peer } => *peer,
        }
    }
}

/// Session layer the network workers drive. Implementations own the socket
/// and are moved onto the worker thread.
pub trait Transport: Send {
    type Error: std::error::Error + Send + Sync + 'static;

    fn poll_event(&mut self, timeout: Duration) -> Result<Option<TransportEvent>, Self::Error>;

    fn send(&mut self, peer: PeerHandle, delivery: Delivery, data: &[u8]) -> Result<(), Self::Error>;

    fn broadcast(&mut self, delivery: Delivery, data: &[u8]) -> Result<(), Self::Error>;

    fn peers(&self) -> Vec<PeerHandle>;

    fn round_trip_time(&self, peer: PeerHandle) -> Option<Duration>;

    fn stats(&self) -> TransportStats;
}
