use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{debug, error, info, warn};

use super::codec::encode;
use super::router::Role;
use super::transport::Transport;
use crate::event::{NetworkQueues, SessionEvent};

const POLL_TIMEOUT: Duration = Duration::from_millis(1);
const LATENCY_REPORT_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("transport failure: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("failed to start network thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Moves bytes between one transport and the simulation thread. It never
/// decodes inbound data and never reads actor state.
pub struct NetworkWorker<T: Transport> {
    role: Role,
    transport: T,
    queues: NetworkQueues,
    last_latency_report: Option<Instant>,
}

impl<T: Transport> NetworkWorker<T> {
    pub fn new(role: Role, transport: T, queues: NetworkQueues) -> Self {
        Self {
            role,
            transport,
            queues,
            last_latency_report: None,
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Polls until the transport fails. The failure is reported on the
    /// notice queue before it is returned.
    pub fn run(mut self) -> Result<(), WorkerError> {
        info!("{} network worker started", self.role.as_str());
        loop {
            if let Err(e) = self.step() {
                error!("{} network worker stopped: {e}", self.role.as_str());
                self.log_stats();
                self.queues.notices.enqueue(SessionEvent::WorkerStopped {
                    role: self.role,
                    reason: e.to_string(),
                });
                return Err(e);
            }
        }
    }

    /// One poll iteration: at most one inbound event, then every queued send.
    pub fn step(&mut self) -> Result<(), WorkerError> {
        if let Some(event) = self.transport.poll_event(POLL_TIMEOUT).map_err(fatal)? {
            self.queues.inbound.enqueue(event);
        }

        self.send_outbound()?;
        if self.role == Role::Host {
            self.send_distributions()?;
        }
        self.report_latency(Instant::now());
        Ok(())
    }

    fn send_outbound(&mut self) -> Result<(), WorkerError> {
        while let Some(packet) = self.queues.outbound.dequeue() {
            let data = match encode(&packet) {
                Ok(data) => data,
                Err(e) => {
                    warn!("Skipping outbound {packet}: {e}");
                    continue;
                }
            };
            self.transport
                .broadcast(packet.delivery(), &data)
                .map_err(fatal)?;
        }
        Ok(())
    }

    fn send_distributions(&mut self) -> Result<(), WorkerError> {
        while let Some(distribution) = self.queues.distribute.dequeue() {
            let packet = &distribution.packet;
            let data = match encode(packet) {
                Ok(data) => data,
                Err(e) => {
                    warn!("Skipping distribution of {packet}: {e}");
                    continue;
                }
            };

            let delivery = packet.delivery();
            for peer in self.transport.peers() {
                if Some(peer) == distribution.exclude {
                    continue;
                }
                self.transport.send(peer, delivery, &data).map_err(fatal)?;
            }
        }
        Ok(())
    }

    fn log_stats(&self) {
        let stats = self.transport.stats();
        info!(
            "{} transport sent {} packets ({} bytes), received {} packets ({} bytes)",
            self.role.as_str(),
            stats.packets_sent,
            stats.bytes_sent,
            stats.packets_received,
            stats.bytes_received
        );
    }

    fn report_latency(&mut self, now: Instant) {
        if self
            .last_latency_report
            .is_some_and(|at| now.duration_since(at) < LATENCY_REPORT_INTERVAL)
        {
            return;
        }
        self.last_latency_report = Some(now);

        let samples: Vec<Duration> = self
            .transport
            .peers()
            .into_iter()
            .filter_map(|peer| self.transport.round_trip_time(peer))
            .collect();
        if samples.is_empty() {
            return;
        }
        let rtt = samples.iter().sum::<Duration>() / samples.len() as u32;
        debug!("{} round trip {} ms", self.role.as_str(), rtt.as_millis());
        self.queues.notices.enqueue(SessionEvent::Latency { rtt });
    }
}

fn fatal<E: std::error::Error + Send + Sync + 'static>(e: E) -> WorkerError {
    WorkerError::Transport(Box::new(e))
}

/// A running network worker thread.
pub struct WorkerHandle {
    role: Role,
    thread: JoinHandle<Result<(), WorkerError>>,
}

impl WorkerHandle {
    pub fn role(&self) -> Role {
        self.role
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    pub fn join(self) -> Result<(), WorkerError> {
        match self.thread.join() {
            Ok(result) => result,
            Err(_) => Err(WorkerError::Transport("network thread panicked".into())),
        }
    }
}

/// Moves the transport onto a dedicated thread running the role's poll loop.
pub fn spawn_worker<T>(role: Role, transport: T, queues: NetworkQueues) -> Result<WorkerHandle, WorkerError>
where
    T: Transport + 'static,
{
    let name = match role {
        Role::Host => "coop-host-net",
        Role::Follower => "coop-follower-net",
    };
    let worker = NetworkWorker::new(role, transport, queues);
    let thread = thread::Builder::new()
        .name(name.to_string())
        .spawn(move || worker.run())?;
    Ok(WorkerHandle { role, thread })
}

pub fn spawn_host_worker<T>(transport: T, queues: NetworkQueues) -> Result<WorkerHandle, WorkerError>
where
    T: Transport + 'static,
{
    spawn_worker(Role::Host, transport, queues)
}

pub fn spawn_follower_worker<T>(transport: T, queues: NetworkQueues) -> Result<WorkerHandle, WorkerError>
where
    T: Transport + 'static,
{
    spawn_worker(Role::Follower, transport, queues)
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::io;

    use super::*;
    use crate::event::Distribution;
    use crate::net::codec::{decode, DecodeMode};
    use crate::net::transport::{Delivery, PeerHandle, TransportEvent, TransportStats};
    use crate::net::{NetworkPacket, StateUpdate};

    #[derive(Default)]
    struct ScriptedTransport {
        events: VecDeque<Result<TransportEvent, io::ErrorKind>>,
        peers: Vec<PeerHandle>,
        sent: Vec<(Option<PeerHandle>, Delivery, Vec<u8>)>,
        rtt: Option<Duration>,
    }

    impl Transport for ScriptedTransport {
        type Error = io::Error;

        fn poll_event(&mut self, _timeout: Duration) -> io::Result<Option<TransportEvent>> {
            match self.events.pop_front() {
                Some(Ok(event)) => Ok(Some(event)),
                Some(Err(kind)) => Err(io::Error::from(kind)),
                None => Ok(None),
            }
        }

        fn send(&mut self, peer: PeerHandle, delivery: Delivery, data: &[u8]) -> io::Result<()> {
            self.sent.push((Some(peer), delivery, data.to_vec()));
            Ok(())
        }

        fn broadcast(&mut self, delivery: Delivery, data: &[u8]) -> io::Result<()> {
            self.sent.push((None, delivery, data.to_vec()));
            Ok(())
        }

        fn peers(&self) -> Vec<PeerHandle> {
            self.peers.clone()
        }

        fn round_trip_time(&self, _peer: PeerHandle) -> Option<Duration> {
            self.rtt
        }

        fn stats(&self) -> TransportStats {
            TransportStats {
                packets_sent: self.sent.len() as u64,
                bytes_sent: self.sent.iter().map(|(_, _, data)| data.len() as u64).sum(),
                ..Default::default()
            }
        }
    }

    #[test]
    fn test_step_forwards_inbound_event() {
        let queues = NetworkQueues::new();
        let mut transport = ScriptedTransport::default();
        transport.events.push_back(Ok(TransportEvent::Disconnect { peer: 4 }));

        let mut worker = NetworkWorker::new(Role::Follower, transport, queues.clone());
        worker.step().unwrap();

        assert_eq!(queues.inbound.dequeue(), Some(TransportEvent::Disconnect { peer: 4 }));
    }

    #[test]
    fn test_oversize_packet_is_skipped() {
        let queues = NetworkQueues::new();
        queues
            .outbound
            .enqueue(NetworkPacket::update(None, StateUpdate::Armor("X".repeat(65))));
        queues
            .outbound
            .enqueue(NetworkPacket::update(None, StateUpdate::Armor("ITAR_PAL_H".into())));

        let mut worker = NetworkWorker::new(Role::Follower, ScriptedTransport::default(), queues);
        worker.step().unwrap();

        let sent = &worker.transport().sent;
        assert_eq!(sent.len(), 1);
        let packet = decode(&sent[0].2, DecodeMode::Server).unwrap();
        assert_eq!(packet.state_update(), Some(&StateUpdate::Armor("ITAR_PAL_H".into())));
    }

    #[test]
    fn test_distribution_skips_excluded_peer() {
        let queues = NetworkQueues::new();
        let transport = ScriptedTransport {
            peers: vec![1, 2, 3],
            ..Default::default()
        };
        queues.distribute.enqueue(Distribution {
            packet: NetworkPacket::update(Some("FRIEND_2".into()), StateUpdate::Heading(90.0)),
            exclude: Some(2),
        });

        let mut worker = NetworkWorker::new(Role::Host, transport, queues);
        worker.step().unwrap();

        let targets: Vec<_> = worker.transport().sent.iter().map(|(peer, ..)| *peer).collect();
        assert_eq!(targets, vec![Some(1), Some(3)]);
        assert_eq!(worker.transport().sent[0].1, StateUpdate::Heading(0.0).update_type().delivery());
    }

    #[test]
    fn test_follower_ignores_distribute_queue() {
        let queues = NetworkQueues::new();
        queues.distribute.enqueue(Distribution {
            packet: NetworkPacket::update(None, StateUpdate::Destroy),
            exclude: None,
        });

        let mut worker = NetworkWorker::new(Role::Follower, ScriptedTransport::default(), queues.clone());
        worker.step().unwrap();

        assert!(worker.transport().sent.is_empty());
        assert_eq!(queues.distribute.len(), 1);
    }

    #[test]
    fn test_latency_is_reported() {
        let queues = NetworkQueues::new();
        let transport = ScriptedTransport {
            peers: vec![1],
            rtt: Some(Duration::from_millis(40)),
            ..Default::default()
        };

        let mut worker = NetworkWorker::new(Role::Follower, transport, queues.clone());
        worker.step().unwrap();
        worker.step().unwrap();

        let notices: Vec<_> = queues.notices.drain().collect();
        assert_eq!(
            notices,
            vec![SessionEvent::Latency {
                rtt: Duration::from_millis(40)
            }]
        );
    }

    #[test]
    fn test_fatal_error_stops_worker() {
        let queues = NetworkQueues::new();
        let mut transport = ScriptedTransport::default();
        transport.events.push_back(Err(io::ErrorKind::ConnectionReset));

        let handle = spawn_host_worker(transport, queues.clone()).unwrap();
        assert!(handle.join().is_err());

        let stopped = queues.notices.drain().find(SessionEvent::is_failure);
        assert!(matches!(
            stopped,
            Some(SessionEvent::WorkerStopped { role: Role::Host, .. })
        ));
    }
}
