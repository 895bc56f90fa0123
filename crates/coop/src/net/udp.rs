use std::collections::{HashMap, VecDeque};
use std::io;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use thiserror::Error;

use super::protocol::MAX_PACKET_SIZE;
use super::transport::{Delivery, PeerHandle, Transport, TransportEvent, TransportStats};

const DEFAULT_PEER_TIMEOUT: Duration = Duration::from_secs(10);
const PING_INTERVAL: Duration = Duration::from_secs(1);
const HELLO_INTERVAL: Duration = Duration::from_millis(250);
const HOST_PEER: PeerHandle = 0;
const FRAME_OVERHEAD: usize = 2;

const TAG_HELLO: u8 = 1;
const TAG_WELCOME: u8 = 2;
const TAG_DATA: u8 = 3;
const TAG_BYE: u8 = 4;
const TAG_PING: u8 = 5;
const TAG_PONG: u8 = 6;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to bind {addr}: {source}")]
    Bind { addr: String, source: io::Error },
    #[error("no answer from {addr} within {timeout:?}")]
    ConnectTimeout { addr: SocketAddr, timeout: Duration },
    #[error("could not resolve {0}")]
    Resolve(String),
    #[error("unknown peer {0}")]
    UnknownPeer(PeerHandle),
    #[error("payload of {0} bytes does not fit a datagram")]
    Oversize(usize),
    #[error(transparent)]
    Io(#[from] io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Frame {
    Hello { connect_id: u32 },
    Welcome { connect_id: u32 },
    Data { channel: u8, payload: Vec<u8> },
    Bye,
    Ping { sent_us: u64 },
    Pong { sent_us: u64 },
}

impl Frame {
    fn encode(&self) -> Vec<u8> {
        match self {
            Frame::Hello { connect_id } => [&[TAG_HELLO][..], &connect_id.to_le_bytes()].concat(),
            Frame::Welcome { connect_id } => [&[TAG_WELCOME][..], &connect_id.to_le_bytes()].concat(),
            Frame::Data { channel, payload } => {
                let mut data = Vec::with_capacity(payload.len() + FRAME_OVERHEAD);
                data.push(TAG_DATA);
                data.push(*channel);
                data.extend_from_slice(payload);
                data
            }
            Frame::Bye => vec![TAG_BYE],
            Frame::Ping { sent_us } => [&[TAG_PING][..], &sent_us.to_le_bytes()].concat(),
            Frame::Pong { sent_us } => [&[TAG_PONG][..], &sent_us.to_le_bytes()].concat(),
        }
    }

    fn decode(data: &[u8]) -> Option<Self> {
        let (&tag, rest) = data.split_first()?;

        match tag {
            TAG_HELLO => Some(Frame::Hello {
                connect_id: read_u32(rest)?,
            }),
            TAG_WELCOME => Some(Frame::Welcome {
                connect_id: read_u32(rest)?,
            }),
            TAG_DATA => {
                let (&channel, payload) = rest.split_first()?;
                Some(Frame::Data {
                    channel,
                    payload: payload.to_vec(),
                })
            }
            TAG_BYE => Some(Frame::Bye),
            TAG_PING => Some(Frame::Ping { sent_us: read_u64(rest)? }),
            TAG_PONG => Some(Frame::Pong { sent_us: read_u64(rest)? }),
            _ => None,
        }
    }
}

fn read_u32(bytes: &[u8]) -> Option<u32> {
    bytes.get(..4)?.try_into().ok().map(u32::from_le_bytes)
}

fn read_u64(bytes: &[u8]) -> Option<u64> {
    bytes.get(..8)?.try_into().ok().map(u64::from_le_bytes)
}

#[derive(Debug)]
struct RemotePeer {
    addr: SocketAddr,
    last_receive: Instant,
    last_ping: Instant,
    rtt: Option<Duration>,
}

impl RemotePeer {
    fn new(addr: SocketAddr) -> Self {
        let now = Instant::now();
        Self {
            addr,
            last_receive: now,
            last_ping: now,
            rtt: None,
        }
    }
}

/// Connection-oriented datagram transport with keepalive and round-trip
/// measurement. Delivery reliability is advisory: nothing is retransmitted.
#[derive(Debug)]
pub struct UdpTransport {
    socket: UdpSocket,
    local_addr: SocketAddr,
    accepting: bool,
    max_peers: usize,
    peers: HashMap<PeerHandle, RemotePeer>,
    peers_by_addr: HashMap<SocketAddr, PeerHandle>,
    next_peer: PeerHandle,
    events: VecDeque<TransportEvent>,
    recv_buffer: Vec<u8>,
    epoch: Instant,
    peer_timeout: Duration,
    stats: TransportStats,
}

impl UdpTransport {
    fn bind<A: ToSocketAddrs>(addr: A, accepting: bool, max_peers: usize) -> Result<Self, TransportError> {
        let requested = addr
            .to_socket_addrs()
            .ok()
            .and_then(|mut addrs| addrs.next())
            .map_or_else(|| "<unresolved>".to_string(), |a| a.to_string());
        let socket = UdpSocket::bind(addr).map_err(|source| TransportError::Bind {
            addr: requested,
            source,
        })?;
        let local_addr = socket.local_addr()?;

        Ok(Self {
            socket,
            local_addr,
            accepting,
            max_peers,
            peers: HashMap::new(),
            peers_by_addr: HashMap::new(),
            next_peer: HOST_PEER + 1,
            events: VecDeque::new(),
            recv_buffer: vec![0u8; MAX_PACKET_SIZE + FRAME_OVERHEAD],
            epoch: Instant::now(),
            peer_timeout: DEFAULT_PEER_TIMEOUT,
            stats: TransportStats::default(),
        })
    }

    /// Binds a host socket that accepts up to `max_peers` followers.
    pub fn listen<A: ToSocketAddrs>(addr: A, max_peers: usize) -> Result<Self, TransportError> {
        let transport = Self::bind(addr, true, max_peers)?;
        info!("Listening on {}", transport.local_addr);
        Ok(transport)
    }

    /// Performs the hello handshake with a host, blocking for at most `timeout`.
    pub fn connect<A: ToSocketAddrs>(addr: A, timeout: Duration) -> Result<Self, TransportError> {
        let remote = addr
            .to_socket_addrs()
            .map_err(|e| TransportError::Resolve(e.to_string()))?
            .next()
            .ok_or_else(|| TransportError::Resolve("no address".into()))?;
        let local: SocketAddr = if remote.is_ipv4() {
            ([0, 0, 0, 0], 0).into()
        } else {
            (std::net::Ipv6Addr::UNSPECIFIED, 0).into()
        };

        let mut transport = Self::bind(local, false, 1)?;
        let connect_id = rand_u64() as u32;
        let hello = Frame::Hello { connect_id }.encode();
        let started = Instant::now();

        while started.elapsed() < timeout {
            let bytes = transport.socket.send_to(&hello, remote)?;
            transport.stats.packets_sent += 1;
            transport.stats.bytes_sent += bytes as u64;

            let wait_until = Instant::now() + HELLO_INTERVAL;
            while Instant::now() < wait_until {
                let remaining = wait_until.saturating_duration_since(Instant::now());
                let Some((frame, from)) = transport.receive_frame(remaining)? else {
                    continue;
                };
                if from == remote && frame == (Frame::Welcome { connect_id }) {
                    transport.peers.insert(HOST_PEER, RemotePeer::new(remote));
                    transport.peers_by_addr.insert(remote, HOST_PEER);
                    transport.events.push_back(TransportEvent::Connect {
                        peer: HOST_PEER,
                        connect_id,
                    });
                    info!("Connected to {remote} in {:?}", started.elapsed());
                    return Ok(transport);
                }
            }
        }

        Err(TransportError::ConnectTimeout { addr: remote, timeout })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Silence after which a peer is dropped.
    pub fn set_peer_timeout(&mut self, timeout: Duration) {
        self.peer_timeout = timeout;
    }

    fn now_us(&self) -> u64 {
        self.epoch.elapsed().as_micros() as u64
    }

    fn send_frame(&mut self, frame: &Frame, addr: SocketAddr) -> Result<(), TransportError> {
        let data = frame.encode();
        let bytes = self.socket.send_to(&data, addr)?;
        self.stats.packets_sent += 1;
        self.stats.bytes_sent += bytes as u64;
        Ok(())
    }

    fn receive_frame(&mut self, timeout: Duration) -> Result<Option<(Frame, SocketAddr)>, TransportError> {
        self.socket
            .set_read_timeout(Some(timeout.max(Duration::from_micros(100))))?;

        match self.socket.recv_from(&mut self.recv_buffer) {
            Ok((size, addr)) => {
                self.stats.packets_received += 1;
                self.stats.bytes_received += size as u64;
                Ok(Frame::decode(&self.recv_buffer[..size]).map(|frame| (frame, addr)))
            }
            Err(ref e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => Ok(None),
            // A previous send to a closed port surfaces here on some platforms.
            Err(ref e) if e.kind() == io::ErrorKind::ConnectionReset => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn handle_frame(&mut self, frame: Frame, addr: SocketAddr) -> Result<(), TransportError> {
        let known = self.peers_by_addr.get(&addr).copied();
        if let Some(peer) = known.and_then(|peer| self.peers.get_mut(&peer)) {
            peer.last_receive = Instant::now();
        }

        match (frame, known) {
            (Frame::Hello { connect_id }, Some(_)) => {
                self.send_frame(&Frame::Welcome { connect_id }, addr)?;
            }
            (Frame::Hello { connect_id }, None) if self.accepting => {
                if self.peers.len() >= self.max_peers {
                    warn!("Ignoring hello from {addr}: session full");
                    return Ok(());
                }
                let peer = self.next_peer;
                self.next_peer = self.next_peer.wrapping_add(1).max(HOST_PEER + 1);
                self.peers.insert(peer, RemotePeer::new(addr));
                self.peers_by_addr.insert(addr, peer);
                self.send_frame(&Frame::Welcome { connect_id }, addr)?;
                debug!("Peer {peer} connected from {addr}");
                self.events.push_back(TransportEvent::Connect { peer, connect_id });
            }
            (Frame::Data { channel, payload }, Some(peer)) => {
                self.events.push_back(TransportEvent::Receive {
                    peer,
                    channel,
                    data: payload,
                });
            }
            (Frame::Bye, Some(peer)) => self.drop_peer(peer),
            (Frame::Ping { sent_us }, Some(_)) => {
                self.send_frame(&Frame::Pong { sent_us }, addr)?;
            }
            (Frame::Pong { sent_us }, Some(peer)) => {
                let rtt = Duration::from_micros(self.now_us().saturating_sub(sent_us));
                if let Some(remote) = self.peers.get_mut(&peer) {
                    remote.rtt = Some(rtt);
                }
            }
            (frame, _) => debug!("Ignoring {frame:?} from {addr}"),
        }
        Ok(())
    }

    fn drop_peer(&mut self, peer: PeerHandle) {
        if let Some(remote) = self.peers.remove(&peer) {
            self.peers_by_addr.remove(&remote.addr);
            debug!("Peer {peer} at {} disconnected", remote.addr);
            self.events.push_back(TransportEvent::Disconnect { peer });
        }
    }

    fn maintain(&mut self) -> Result<(), TransportError> {
        let timed_out: Vec<PeerHandle> = self
            .peers
            .iter()
            .filter(|(_, remote)| remote.last_receive.elapsed() > self.peer_timeout)
            .map(|(&peer, _)| peer)
            .collect();
        for peer in timed_out {
            warn!("Peer {peer} timed out");
            self.drop_peer(peer);
        }

        let due: Vec<SocketAddr> = self
            .peers
            .values_mut()
            .filter(|remote| remote.last_ping.elapsed() >= PING_INTERVAL)
            .map(|remote| {
                remote.last_ping = Instant::now();
                remote.addr
            })
            .collect();
        let ping = Frame::Ping {
            sent_us: self.now_us(),
        };
        for addr in due {
            self.send_frame(&ping, addr)?;
        }
        Ok(())
    }
}

impl Transport for UdpTransport {
    type Error = TransportError;

    fn poll_event(&mut self, timeout: Duration) -> Result<Option<TransportEvent>, TransportError> {
        if let Some(event) = self.events.pop_front() {
            return Ok(Some(event));
        }

        if let Some((frame, addr)) = self.receive_frame(timeout)? {
            self.handle_frame(frame, addr)?;
        }
        self.maintain()?;
        Ok(self.events.pop_front())
    }

    fn send(&mut self, peer: PeerHandle, delivery: Delivery, data: &[u8]) -> Result<(), TransportError> {
        if data.len() > MAX_PACKET_SIZE {
            return Err(TransportError::Oversize(data.len()));
        }
        let addr = self
            .peers
            .get(&peer)
            .map(|remote| remote.addr)
            .ok_or(TransportError::UnknownPeer(peer))?;
        let frame = Frame::Data {
            channel: delivery.channel,
            payload: data.to_vec(),
        };
        self.send_frame(&frame, addr)
    }

    fn broadcast(&mut self, delivery: Delivery, data: &[u8]) -> Result<(), TransportError> {
        for peer in self.peers() {
            self.send(peer, delivery, data)?;
        }
        Ok(())
    }

    fn peers(&self) -> Vec<PeerHandle> {
        let mut peers: Vec<PeerHandle> = self.peers.keys().copied().collect();
        peers.sort_unstable();
        peers
    }

    fn round_trip_time(&self, peer: PeerHandle) -> Option<Duration> {
        self.peers.get(&peer).and_then(|remote| remote.rtt)
    }

    fn stats(&self) -> TransportStats {
        self.stats
    }
}

impl Drop for UdpTransport {
    fn drop(&mut self) {
        let bye = Frame::Bye.encode();
        for remote in self.peers.values() {
            let _ = self.socket.send_to(&bye, remote.addr);
        }
    }
}

fn rand_u64() -> u64 {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    let mut hasher = DefaultHasher::new();
    Instant::now().hash(&mut hasher);
    std::process::id().hash(&mut hasher);
    hasher.finish()
}
