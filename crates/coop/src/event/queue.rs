use crossbeam_channel::{Receiver, Sender, unbounded};

use super::types::SessionEvent;
use crate::net::{NetworkPacket, PeerHandle, TransportEvent};

/// Unbounded multi-producer FIFO shared between the network worker and the
/// simulation thread. Both halves live in every clone, so sends cannot fail.
#[derive(Debug)]
pub struct PacketQueue<T> {
    tx: Sender<T>,
    rx: Receiver<T>,
}

impl<T> Clone for PacketQueue<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            rx: self.rx.clone(),
        }
    }
}

impl<T> Default for PacketQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> PacketQueue<T> {
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self { tx, rx }
    }

    pub fn enqueue(&self, item: T) {
        let _ = self.tx.send(item);
    }

    pub fn dequeue(&self) -> Option<T> {
        self.rx.try_recv().ok()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    /// Yields queued items until the queue is momentarily empty.
    pub fn drain(&self) -> impl Iterator<Item = T> + '_ {
        self.rx.try_iter()
    }
}

/// A packet to fan out to every peer except `exclude`.
#[derive(Debug, Clone, PartialEq)]
pub struct Distribution {
    pub packet: NetworkPacket,
    pub exclude: Option<PeerHandle>,
}

/// The queues that connect one network worker to the simulation thread.
#[derive(Debug, Clone, Default)]
pub struct NetworkQueues {
    pub inbound: PacketQueue<TransportEvent>,
    pub outbound: PacketQueue<NetworkPacket>,
    pub distribute: PacketQueue<Distribution>,
    pub notices: PacketQueue<SessionEvent>,
}

impl NetworkQueues {
    pub fn new() -> Self {
        Self::default()
    }
}
