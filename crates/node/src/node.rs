use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use glam::Vec3;
use log::{info, warn};

use coop::actor::{ActorSnapshot, SimWorld};
use coop::net::{spawn_follower_worker, spawn_host_worker, Role, UdpTransport, WorkerHandle};
use coop::{NetworkQueues, ReplicationContext, SessionEvent};

use crate::config::NodeConfig;
use crate::events::log_session_event;

const PATROL_RADIUS: f32 = 400.0;
const PATROL_SPEED: f32 = 150.0;

/// Headless session participant: an in-memory world driven at a fixed tick
/// rate and replicated through one network worker.
pub struct CoopNode {
    context: ReplicationContext,
    world: SimWorld,
    worker: WorkerHandle,
    tick_duration: Duration,
    last_tick_time: Instant,
    accumulator: Duration,
    start_time: Instant,
}

impl CoopNode {
    pub fn host(bind_addr: &str, config: &NodeConfig, tick_rate: u32) -> Result<Self> {
        let mut transport = UdpTransport::listen(bind_addr, config.connection.max_peers)
            .with_context(|| format!("failed to host on {bind_addr}"))?;
        transport.set_peer_timeout(Duration::from_millis(config.connection.peer_timeout_ms));
        info!("Hosting on {}", transport.local_addr());

        let queues = NetworkQueues::new();
        let worker = spawn_host_worker(transport, queues.clone())?;
        Ok(Self::new(Role::Host, queues, worker, config, tick_rate))
    }

    pub fn join(server_addr: &str, config: &NodeConfig, tick_rate: u32) -> Result<Self> {
        let timeout = Duration::from_millis(config.connection.connect_timeout_ms);
        info!("Connecting to {server_addr}");
        let mut transport = UdpTransport::connect(server_addr, timeout)
            .with_context(|| format!("failed to join {server_addr}"))?;
        transport.set_peer_timeout(Duration::from_millis(config.connection.peer_timeout_ms));

        let queues = NetworkQueues::new();
        let worker = spawn_follower_worker(transport, queues.clone())?;
        Ok(Self::new(Role::Follower, queues, worker, config, tick_rate))
    }

    fn new(role: Role, queues: NetworkQueues, worker: WorkerHandle, config: &NodeConfig, tick_rate: u32) -> Self {
        let context = ReplicationContext::new(
            role,
            queues,
            config.sync.clone(),
            config.appearance(),
            config.connection.max_peers,
        );

        let mut world = SimWorld::new();
        let origin = match role {
            Role::Host => Vec3::ZERO,
            Role::Follower => Vec3::new(PATROL_RADIUS, 0.0, 0.0),
        };
        world.add_local_player(
            "PC_HERO",
            ActorSnapshot {
                object_name: "PC_HERO".into(),
                position: origin,
                ..Default::default()
            },
        );

        Self {
            context,
            world,
            worker,
            tick_duration: Duration::from_secs_f64(1.0 / tick_rate.max(1) as f64),
            last_tick_time: Instant::now(),
            accumulator: Duration::ZERO,
            start_time: Instant::now(),
        }
    }

    /// Walks the local player in a circle so the session carries traffic.
    pub fn patrol(&mut self) {
        self.world
            .patrol_local_player(Vec3::ZERO, PATROL_RADIUS, PATROL_SPEED);
    }

    /// Adds host-owned world actors for followers to mirror.
    pub fn populate(&mut self, count: usize) {
        for i in 0..count {
            let angle = i as f32 / count.max(1) as f32 * std::f32::consts::TAU;
            self.world.add_actor(
                format!("SHEEP_{i}"),
                ActorSnapshot {
                    object_name: "SHEEP".into(),
                    is_human: false,
                    position: Vec3::new(angle.cos(), 0.0, angle.sin()) * 600.0,
                    hp: 40,
                    hp_max: 40,
                    ..Default::default()
                },
            );
        }
    }

    pub fn role(&self) -> Role {
        self.context.role()
    }

    /// Ticks until the network worker stops or `limit` elapses.
    pub fn run(&mut self, limit: Option<Duration>) {
        loop {
            if limit.is_some_and(|limit| self.start_time.elapsed() >= limit) {
                info!("Run time elapsed");
                break;
            }
            if !self.tick_once() {
                break;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        self.log_summary();
    }

    /// Returns false once the session is over.
    pub fn tick_once(&mut self) -> bool {
        let now = Instant::now();
        let delta = now - self.last_tick_time;
        self.last_tick_time = now;
        self.accumulator += delta;

        while self.accumulator >= self.tick_duration {
            self.accumulator -= self.tick_duration;
            self.tick();
        }

        let mut alive = self.context.is_connected();
        for event in self.context.drain_events() {
            log_session_event(&event);
            if matches!(event, SessionEvent::WorkerStopped { .. }) {
                alive = false;
            }
        }
        if self.worker.is_finished() && alive {
            warn!("{} network worker exited", self.worker.role().as_str());
            alive = false;
        }
        alive
    }

    fn tick(&mut self) {
        self.world.step(self.tick_duration.as_secs_f32());
        let now_ms = self.start_time.elapsed().as_millis() as u64;
        self.context.tick(&mut self.world, now_ms);
    }

    fn log_summary(&self) {
        let mirrors: Vec<String> = self
            .context
            .mirrors()
            .map(|m| format!("{} ({:?})", m.name(), m.state()))
            .collect();
        info!(
            "{} {} leaving with {} peers, mirrors: [{}]",
            self.role().as_str(),
            self.context.local_identity(),
            self.context.router().peers().len(),
            mirrors.join(", ")
        );
        if let Some(rtt) = self.context.router().latency() {
            info!("Last round trip {} ms", rtt.as_millis());
        }
    }
}
