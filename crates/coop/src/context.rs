use std::collections::{HashMap, VecDeque};

use indexmap::IndexMap;
use log::{debug, info, warn};

use crate::actor::{ActorAdapter, ActorHandle};
use crate::config::SyncConfig;
use crate::event::{NetworkQueues, SessionEvent};
use crate::net::{is_coop_player, PacketRouter, RateLimitedLog, Role, Routed, StateUpdate};
use crate::replication::{
    Appearance, LocalActorShadow, MirrorEnv, MirrorKind, PulseContext, RemoteActorMirror,
};

#[derive(Debug)]
struct BroadcastActor {
    actor: ActorHandle,
    shadow: LocalActorShadow,
}

/// Owns every replication registry of one session and drives it one
/// simulation tick at a time. Runs on the simulation thread only.
#[derive(Debug)]
pub struct ReplicationContext {
    router: PacketRouter,
    queues: NetworkQueues,
    config: SyncConfig,
    point_of_view: LocalActorShadow,
    broadcast: IndexMap<String, BroadcastActor>,
    mirrors: IndexMap<String, RemoteActorMirror>,
    pending_events: VecDeque<SessionEvent>,
    unknown_senders: RateLimitedLog,
    last_visible_refresh: Option<u64>,
    last_registry_refresh: Option<u64>,
    connected: bool,
    paused: bool,
}

impl ReplicationContext {
    pub fn new(
        role: Role,
        queues: NetworkQueues,
        config: SyncConfig,
        appearance: Appearance,
        max_peers: usize,
    ) -> Self {
        let router = PacketRouter::new(role, queues.clone(), max_peers);
        let point_of_view =
            LocalActorShadow::point_of_view(router.local_identity(), appearance, &config);
        Self {
            router,
            queues,
            config,
            point_of_view,
            broadcast: IndexMap::new(),
            mirrors: IndexMap::new(),
            pending_events: VecDeque::new(),
            unknown_senders: RateLimitedLog::default(),
            last_visible_refresh: None,
            last_registry_refresh: None,
            connected: true,
            paused: false,
        }
    }

    pub fn role(&self) -> Role {
        self.router.role()
    }

    pub fn is_host(&self) -> bool {
        self.router.is_host()
    }

    pub fn local_identity(&self) -> &str {
        self.router.local_identity()
    }

    pub fn router(&self) -> &PacketRouter {
        &self.router
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// While paused, local shadows are not flushed and remote updates are
    /// discarded. Peers still join and leave.
    pub fn set_paused(&mut self, paused: bool) {
        if paused == self.paused {
            return;
        }
        if paused {
            info!("Stopping world synchronization");
        } else {
            info!("Restoring world synchronization");
        }
        self.paused = paused;
    }

    pub fn point_of_view(&self) -> &LocalActorShadow {
        &self.point_of_view
    }

    /// Out-of-band reports (attacks, casts, drops) for the local player go here.
    pub fn point_of_view_mut(&mut self) -> &mut LocalActorShadow {
        &mut self.point_of_view
    }

    pub fn broadcast_shadow_mut(&mut self, name: &str) -> Option<&mut LocalActorShadow> {
        self.broadcast.get_mut(name).map(|entry| &mut entry.shadow)
    }

    pub fn broadcast_names(&self) -> impl Iterator<Item = &str> {
        self.broadcast.keys().map(String::as_str)
    }

    pub fn mirror(&self, name: &str) -> Option<&RemoteActorMirror> {
        self.mirrors.get(name)
    }

    pub fn mirrors(&self) -> impl Iterator<Item = &RemoteActorMirror> {
        self.mirrors.values()
    }

    pub fn set_appearance(&mut self, appearance: Appearance) {
        self.point_of_view.set_appearance(appearance);
        self.point_of_view.reinit();
    }

    pub fn drain_events(&mut self) -> impl Iterator<Item = SessionEvent> + '_ {
        self.pending_events.drain(..)
    }

    /// Runs one simulation tick: inbound routing, shadow flushes, then mirror updates.
    pub fn tick<W: ActorAdapter + ?Sized>(&mut self, world: &mut W, now_ms: u64) {
        self.process_inbound(world);
        self.process_notices(world);
        self.refresh_registries(world, now_ms);
        if self.paused {
            return;
        }
        self.flush_shadows(world, now_ms);
        self.update_mirrors(world);
    }

    /// Resets every local shadow so the next tick resends the full state.
    pub fn reinit(&mut self) {
        self.point_of_view.reinit();
        for entry in self.broadcast.values_mut() {
            entry.shadow.reinit();
        }
    }

    /// Announces the end of a host-owned actor. The shadow is dropped once
    /// its destroy update has been flushed.
    pub fn destroy_local_actor(&mut self, name: &str) -> bool {
        match self.broadcast.get_mut(name) {
            Some(entry) => {
                entry.shadow.mark_destroyed();
                true
            }
            None => false,
        }
    }

    /// Destroys and recreates every spawned player proxy.
    pub fn respawn_player_proxies<W: ActorAdapter + ?Sized>(&mut self, world: &mut W) {
        for mirror in self.mirrors.values_mut() {
            if mirror.kind() == MirrorKind::PlayerProxy {
                mirror.respawn(world);
            }
        }
    }

    fn process_inbound<W: ActorAdapter + ?Sized>(&mut self, world: &mut W) {
        let events: Vec<_> = self.queues.inbound.drain().collect();
        for event in events {
            for routed in self.router.handle(event) {
                self.apply_routed(routed, world);
            }
        }
    }

    fn apply_routed<W: ActorAdapter + ?Sized>(&mut self, routed: Routed, world: &mut W) {
        match routed {
            Routed::PeerJoined { name } => {
                self.mirrors
                    .entry(name.clone())
                    .or_insert_with(|| RemoteActorMirror::player_proxy(name));
                self.reinit();
            }
            Routed::PeerLeft { name } => {
                if let Some(mut mirror) = self.mirrors.shift_remove(&name) {
                    mirror.destroy(world);
                }
            }
            Routed::IdentityAssigned { name } => {
                self.point_of_view.rename(name);
            }
            Routed::Update { sender, update } => self.apply_update(sender, update, world),
        }
    }

    fn apply_update<W: ActorAdapter + ?Sized>(&mut self, sender: String, update: StateUpdate, world: &mut W) {
        if sender == self.router.local_identity() || self.broadcast.contains_key(&sender) {
            return;
        }
        // Nickname announcements were already handled by the router.
        if self.paused {
            return;
        }
        if let Some(mirror) = self.mirrors.get_mut(&sender) {
            mirror.push(update);
            return;
        }
        if matches!(update, StateUpdate::Destroy) {
            return;
        }

        let mirror = if is_coop_player(&sender) {
            RemoteActorMirror::player_proxy(sender.clone())
        } else if let Some(actor) = world.lookup_unique_name(&sender) {
            RemoteActorMirror::world_actor(sender.clone(), actor)
        } else {
            if self.unknown_senders.should_log(&sender) {
                warn!("Dropping {} update for unknown actor {sender}", update.update_type().as_str());
            }
            return;
        };

        debug!("created mirror for {sender}");
        self.mirrors.entry(sender).or_insert(mirror).push(update);
    }

    fn process_notices<W: ActorAdapter + ?Sized>(&mut self, world: &mut W) {
        let notices: Vec<_> = self.queues.notices.drain().collect();
        for notice in notices {
            match &notice {
                SessionEvent::Latency { rtt } => self.router.record_latency(*rtt),
                SessionEvent::ConnectionFailed { .. } | SessionEvent::WorkerStopped { .. } => {
                    if self.connected {
                        info!("Session ended, removing {} mirrors", self.mirrors.len());
                    }
                    self.connected = false;
                    for (_, mut mirror) in self.mirrors.drain(..) {
                        mirror.destroy(world);
                    }
                }
                _ => {}
            }
            self.pending_events.push_back(notice);
        }
    }

    fn refresh_registries<W: ActorAdapter + ?Sized>(&mut self, world: &mut W, now_ms: u64) {
        if due(self.last_registry_refresh, now_ms, self.config.unique_name_refresh_ms) {
            self.last_registry_refresh = Some(now_ms);
            world.rebuild_unique_names();
        }

        if !self.is_host() || !due(self.last_visible_refresh, now_ms, self.config.visible_refresh_ms) {
            return;
        }
        self.last_visible_refresh = Some(now_ms);

        let visible: HashMap<String, ActorHandle> = world
            .visible_actors(self.config.broadcast_radius)
            .into_iter()
            .filter(|(name, _)| !self.mirrors.contains_key(name))
            .collect();

        for (name, entry) in self.broadcast.iter_mut() {
            if !visible.contains_key(name) && !entry.shadow.is_destroyed() {
                entry.shadow.mark_destroyed();
            }
        }
        for (name, actor) in visible {
            if !self.broadcast.contains_key(&name) {
                debug!("broadcasting {name}");
                let shadow = LocalActorShadow::broadcast(name.clone());
                self.broadcast.insert(name, BroadcastActor { actor, shadow });
            }
        }
    }

    fn flush_shadows<W: ActorAdapter + ?Sized>(&mut self, world: &mut W, now_ms: u64) {
        let is_host = self.is_host();
        let ctx = PulseContext {
            now_ms,
            is_host,
            time_of_day: world.time_of_day(),
            config: &self.config,
        };

        if let Some(snapshot) = world.local_player().and_then(|actor| world.snapshot(actor)) {
            self.point_of_view.pulse(&snapshot, &ctx);
        }
        for packet in self.point_of_view.flush(is_host) {
            self.queues.outbound.enqueue(packet);
        }

        for entry in self.broadcast.values_mut() {
            match world.snapshot(entry.actor) {
                Some(snapshot) => entry.shadow.pulse(&snapshot, &ctx),
                None if !entry.shadow.is_destroyed() => entry.shadow.mark_destroyed(),
                None => {}
            }
            for packet in entry.shadow.flush(is_host) {
                self.queues.outbound.enqueue(packet);
            }
        }
        self.broadcast
            .retain(|_, entry| !entry.shadow.is_destroyed() || entry.shadow.has_pending());
    }

    fn update_mirrors<W: ActorAdapter + ?Sized>(&mut self, world: &mut W) {
        let player_proxies: HashMap<String, ActorHandle> = self
            .mirrors
            .values()
            .filter(|mirror| mirror.kind() == MirrorKind::PlayerProxy)
            .filter_map(|mirror| mirror.actor().map(|actor| (mirror.name().to_string(), actor)))
            .collect();
        let env = MirrorEnv {
            config: &self.config,
            local_identity: self.router.local_identity(),
            player_proxies: &player_proxies,
        };

        let mut killed = Vec::new();
        for mirror in self.mirrors.values_mut() {
            killed.extend(mirror.update(world, &env));
        }
        for name in killed {
            if let Some(mirror) = self.mirrors.get_mut(&name) {
                mirror.clear_cached_hp();
            }
        }

        self.mirrors.retain(|name, mirror| {
            if mirror.is_destroyed() {
                debug!("removed mirror {name}");
            }
            !mirror.is_destroyed()
        });
    }
}

fn due(last: Option<u64>, now_ms: u64, interval_ms: u64) -> bool {
    last.is_none_or(|at| now_ms.saturating_sub(at) >= interval_ms)
}
