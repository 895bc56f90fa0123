use std::collections::{BTreeSet, HashMap, VecDeque};

use glam::Vec3;
use log::{debug, info};

use crate::actor::{ActorAdapter, ActorHandle, Attribute, EquipSlot, HitTarget, ItemHandle, ProxySpec};
use crate::config::SyncConfig;
use crate::net::{item_ref, Attack, InitState, SpellCast, StateUpdate, WEAPON_MODE_NONE};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MirrorState {
    Unbound,
    Spawned,
    /// Out of range. The object is gone but the record is kept.
    Despawned,
    Destroyed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MirrorKind {
    /// Stand-in for a session participant, created and owned by the mirror.
    PlayerProxy,
    /// An actor that already exists in the local world.
    WorldActor,
}

/// Shared inputs for one mirror tick.
#[derive(Debug, Clone, Copy)]
pub struct MirrorEnv<'a> {
    pub config: &'a SyncConfig,
    /// Id under which remote peers address the local player.
    pub local_identity: &'a str,
    pub player_proxies: &'a HashMap<String, ActorHandle>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Equipment {
    pub armor: Option<String>,
    pub melee: Option<String>,
    pub ranged: Option<String>,
}

#[derive(Debug)]
pub struct RemoteActorMirror {
    name: String,
    kind: MirrorKind,
    state: MirrorState,
    actor: Option<ActorHandle>,
    queue: VecDeque<StateUpdate>,
    appearance: Option<InitState>,
    position: Option<Vec3>,
    heading: Option<f32>,
    hp: Option<(i32, i32)>,
    weapon_mode: Option<i32>,
    equipment: Equipment,
    owned_items: BTreeSet<ItemHandle>,
}

impl RemoteActorMirror {
    pub fn player_proxy(name: impl Into<String>) -> Self {
        Self::new(name.into(), MirrorKind::PlayerProxy, None)
    }

    /// Binds to an actor found in the unique-name registry.
    pub fn world_actor(name: impl Into<String>, actor: ActorHandle) -> Self {
        Self::new(name.into(), MirrorKind::WorldActor, Some(actor))
    }

    fn new(name: String, kind: MirrorKind, actor: Option<ActorHandle>) -> Self {
        Self {
            name,
            kind,
            state: if actor.is_some() {
                MirrorState::Spawned
            } else {
                MirrorState::Unbound
            },
            actor,
            queue: VecDeque::new(),
            appearance: None,
            position: None,
            heading: None,
            hp: None,
            weapon_mode: None,
            equipment: Equipment::default(),
            owned_items: BTreeSet::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> MirrorKind {
        self.kind
    }

    pub fn state(&self) -> MirrorState {
        self.state
    }

    pub fn actor(&self) -> Option<ActorHandle> {
        self.actor
    }

    pub fn position(&self) -> Option<Vec3> {
        self.position
    }

    pub fn hp(&self) -> Option<(i32, i32)> {
        self.hp
    }

    pub fn nickname(&self) -> Option<&str> {
        self.appearance.as_ref().map(|a| a.nickname.as_str())
    }

    pub fn equipment(&self) -> &Equipment {
        &self.equipment
    }

    pub fn owned_items(&self) -> &BTreeSet<ItemHandle> {
        &self.owned_items
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn is_destroyed(&self) -> bool {
        self.state == MirrorState::Destroyed
    }

    pub fn push(&mut self, update: StateUpdate) {
        if !self.is_destroyed() {
            self.queue.push_back(update);
        }
    }

    /// Forgets the last synced hp so reconciliation stops re-applying it.
    pub fn clear_cached_hp(&mut self) {
        self.hp = None;
    }

    /// Runs one tick. Returns the unique names of actors killed by synced attacks.
    pub fn update<W>(&mut self, world: &mut W, env: &MirrorEnv<'_>) -> Vec<String>
    where
        W: ActorAdapter + ?Sized,
    {
        let mut killed = Vec::new();
        if self.is_destroyed() {
            return killed;
        }
        if self.actor.is_some_and(|actor| world.is_talking_to_player(actor)) {
            return killed;
        }

        while let Some(update) = self.queue.pop_front() {
            self.apply(update, world, env, &mut killed);
            if self.is_destroyed() {
                self.queue.clear();
                return killed;
            }
        }

        self.apply_distance(world, env.config);
        if !self.is_destroyed() {
            self.reconcile(world, env.config);
        }
        killed
    }

    fn live_actor<W: ActorAdapter + ?Sized>(&self, world: &W) -> Option<ActorHandle> {
        self.actor
            .filter(|&actor| self.state == MirrorState::Spawned && world.has_model(actor))
    }

    fn suppressed_by_safe_zone(&mut self, position: Vec3, config: &SyncConfig) -> bool {
        if !config.in_safe_zone(position) {
            return false;
        }
        debug!("mirror {} entered the safe zone, detaching", self.name);
        self.detach();
        true
    }

    fn apply<W>(&mut self, update: StateUpdate, world: &mut W, env: &MirrorEnv<'_>, killed: &mut Vec<String>)
    where
        W: ActorAdapter + ?Sized,
    {
        let live = self.live_actor(world);
        match update {
            StateUpdate::Init(init) => self.apply_init(init, world, env.config),
            StateUpdate::Position(position) => {
                if !self.suppressed_by_safe_zone(position, env.config) {
                    self.position = Some(position);
                }
            }
            StateUpdate::Heading(heading) => {
                self.heading = Some(heading);
                if let Some(actor) = live {
                    world.rotate_to(actor, heading);
                }
            }
            StateUpdate::Animation(id) => {
                if let Some(actor) = live {
                    world.play_animation(actor, id);
                }
            }
            StateUpdate::WeaponMode(mode) => {
                if let Some(actor) = live {
                    self.weapon_mode = Some(mode);
                    world.set_weapon_mode(actor, mode);
                    if self.kind == MirrorKind::WorldActor || world.is_unconscious(actor) {
                        world.reset_ai(actor);
                    }
                }
            }
            StateUpdate::Destroy => self.destroy(world),
            StateUpdate::Attacks(attacks) => {
                if let Some(actor) = live {
                    self.apply_attacks(actor, &attacks, world, env, killed);
                }
            }
            StateUpdate::Armor(armor) => {
                self.equipment.armor = item_ref(&armor).map(str::to_string);
                if let Some(actor) = live {
                    self.swap_item(world, actor, EquipSlot::Armor, &armor);
                }
            }
            StateUpdate::Weapons { melee, ranged } => {
                self.equipment.melee = item_ref(&melee).map(str::to_string);
                self.equipment.ranged = item_ref(&ranged).map(str::to_string);
                if let Some(actor) = live {
                    self.swap_item(world, actor, EquipSlot::Melee, &melee);
                    self.swap_item(world, actor, EquipSlot::Ranged, &ranged);
                }
            }
            StateUpdate::Hp { hp, hp_max } => self.apply_hp(hp, hp_max, world),
            StateUpdate::Time { hour, minute } => {
                if !world.player_in_dialog() {
                    world.set_time(hour, minute);
                }
            }
            StateUpdate::Hand { left, right } => {
                if let Some(actor) = live {
                    self.swap_item(world, actor, EquipSlot::LeftHand, &left);
                    self.swap_item(world, actor, EquipSlot::RightHand, &right);
                }
            }
            StateUpdate::MagicSetup(spell) => {
                if let Some(actor) = live {
                    world.set_active_spell(actor, item_ref(&spell));
                }
            }
            StateUpdate::SpellCasts(casts) => {
                if let Some(actor) = live {
                    self.apply_spell_casts(actor, &casts, world);
                }
            }
            StateUpdate::Revived(name) => {
                if name == env.local_identity && world.local_player_dead() {
                    info!("revived by {}", self.name);
                    world.revive_local_player();
                }
            }
            StateUpdate::Protections(protections) => {
                if let Some(actor) = self.bound_actor() {
                    world.set_protections(actor, &protections);
                }
            }
            StateUpdate::Talents(talents) => {
                if let Some(actor) = self.bound_actor() {
                    world.set_talents(actor, &talents);
                }
            }
            StateUpdate::BodyState(state) => {
                if let Some(actor) = self.bound_actor() {
                    world.set_body_state(actor, state);
                }
            }
            StateUpdate::Overlays(overlays) => {
                if let Some(actor) = self.bound_actor() {
                    world.set_overlays(actor, &overlays);
                }
            }
            StateUpdate::DropItem(item) => {
                if let Some(dropped) = live.and_then(|actor| world.drop_item(actor, &item)) {
                    self.owned_items.insert(dropped);
                }
            }
            StateUpdate::TakeItem(item) => {
                if live.is_some() && !world.remove_ground_item(&item) {
                    debug!("{} took {} but it is not on the ground", self.name, item.unique_name);
                }
            }
        }
    }

    fn bound_actor(&self) -> Option<ActorHandle> {
        self.actor.filter(|_| self.state == MirrorState::Spawned)
    }

    fn apply_init<W>(&mut self, init: InitState, world: &mut W, config: &SyncConfig)
    where
        W: ActorAdapter + ?Sized,
    {
        if self.state != MirrorState::Unbound && self.kind == MirrorKind::PlayerProxy {
            self.appearance = Some(init);
            return;
        }
        if self.suppressed_by_safe_zone(init.position, config) {
            return;
        }

        self.position = Some(init.position);
        let position = init.position;
        self.appearance = Some(init);
        match (self.kind, self.actor) {
            (MirrorKind::PlayerProxy, _) => self.spawn(world, position),
            (MirrorKind::WorldActor, Some(actor)) => {
                world.insert_at(actor, position);
                self.state = MirrorState::Spawned;
            }
            (MirrorKind::WorldActor, None) => {}
        }
    }

    fn apply_hp<W: ActorAdapter + ?Sized>(&mut self, hp: i32, hp_max: i32, world: &mut W) {
        let actor = self.bound_actor();
        if self.kind == MirrorKind::WorldActor && hp == 0 {
            if let Some(actor) = actor {
                let held = if world.is_dead(actor) { 0 } else { 1 };
                world.set_attribute(actor, Attribute::Hp, held);
            }
            self.hp = None;
            return;
        }

        self.hp = Some((hp, hp_max));
        if let Some(actor) = actor {
            world.set_attribute(actor, Attribute::Hp, hp);
            world.set_attribute(actor, Attribute::HpMax, hp_max);
        }
    }

    fn apply_attacks<W>(
        &self,
        attacker: ActorHandle,
        attacks: &[Attack],
        world: &mut W,
        env: &MirrorEnv<'_>,
        killed: &mut Vec<String>,
    ) where
        W: ActorAdapter + ?Sized,
    {
        for attack in attacks {
            let target = if attack.target == env.local_identity {
                HitTarget::LocalPlayer
            } else if let Some(&proxy) = env.player_proxies.get(&attack.target) {
                HitTarget::Actor(proxy)
            } else if let Some(actor) = world.resolve_unique_name(&attack.target) {
                HitTarget::Actor(actor)
            } else {
                debug!("{} attacked unknown target {}", self.name, attack.target);
                continue;
            };

            world.apply_hit(attacker, target, attack);
            if attack.dead && matches!(target, HitTarget::Actor(_)) {
                killed.push(attack.target.clone());
            }
        }
    }

    fn apply_spell_casts<W>(&self, caster: ActorHandle, casts: &[SpellCast], world: &mut W)
    where
        W: ActorAdapter + ?Sized,
    {
        for cast in casts {
            let target = if cast.target.is_empty() {
                None
            } else {
                world.resolve_unique_name(&cast.target)
            };
            world.cast_spell(caster, cast, target);
        }
    }

    fn swap_item<W>(&mut self, world: &mut W, actor: ActorHandle, slot: EquipSlot, item: &str)
    where
        W: ActorAdapter + ?Sized,
    {
        if let Some(old) = world.unequip(actor, slot) {
            self.owned_items.remove(&old);
        }
        if let Some(handle) = item_ref(item).and_then(|item| world.equip(actor, slot, item)) {
            self.owned_items.insert(handle);
        }
    }

    fn spawn<W: ActorAdapter + ?Sized>(&mut self, world: &mut W, position: Vec3) {
        let spec = match &self.appearance {
            Some(init) => ProxySpec {
                name: self.name.clone(),
                nickname: if init.nickname.is_empty() {
                    self.name.clone()
                } else {
                    init.nickname.clone()
                },
                instance_id: init.instance_id,
                body_tex: init.body_tex,
                head_tex: init.head_tex,
            },
            None => ProxySpec {
                name: self.name.clone(),
                nickname: self.name.clone(),
                instance_id: 0,
                body_tex: 0,
                head_tex: 0,
            },
        };

        let Some(actor) = world.spawn_at(&spec, position) else {
            debug!("failed to spawn proxy for {}", self.name);
            return;
        };
        debug!("spawned proxy for {} at {position}", self.name);
        self.actor = Some(actor);
        self.state = MirrorState::Spawned;

        if let Some((_, hp_max)) = self.hp {
            world.set_attribute(actor, Attribute::HpMax, hp_max);
        }
        let equipment = self.equipment.clone();
        for (slot, item) in [
            (EquipSlot::Melee, equipment.melee),
            (EquipSlot::Ranged, equipment.ranged),
            (EquipSlot::Armor, equipment.armor),
        ] {
            if let Some(handle) = item.and_then(|item| world.equip(actor, slot, &item)) {
                self.owned_items.insert(handle);
            }
        }
        if let Some(mode) = self.weapon_mode.filter(|&mode| mode != WEAPON_MODE_NONE) {
            world.set_weapon_mode(actor, mode);
        }
        world.mark_companion(actor);
    }

    fn apply_distance<W: ActorAdapter + ?Sized>(&mut self, world: &mut W, config: &SyncConfig) {
        let (Some(position), Some(origin)) = (self.position, world.local_player_position()) else {
            return;
        };
        let distance = position.distance(origin);
        let radius = config.broadcast_radius;

        match self.kind {
            MirrorKind::PlayerProxy => match self.state {
                MirrorState::Spawned if distance > radius => {
                    if let Some(actor) = self.actor.take() {
                        world.despawn(actor);
                    }
                    self.owned_items.clear();
                    self.state = MirrorState::Despawned;
                    debug!("despawned proxy for {} at distance {distance:.0}", self.name);
                }
                MirrorState::Spawned if distance < radius => {
                    if let Some(actor) = self.actor.filter(|&actor| !world.has_model(actor)) {
                        world.insert_at(actor, position);
                    }
                }
                MirrorState::Unbound | MirrorState::Despawned if distance < radius => {
                    self.spawn(world, position);
                }
                _ => {}
            },
            MirrorKind::WorldActor => {
                if distance > config.destroy_radius() {
                    debug!("{} left the destroy radius, detaching", self.name);
                    self.detach();
                } else if distance < radius {
                    if let Some(actor) = self.actor.filter(|&actor| !world.has_model(actor)) {
                        world.insert_at(actor, position);
                        self.state = MirrorState::Spawned;
                    }
                }
            }
        }
    }

    fn reconcile<W: ActorAdapter + ?Sized>(&mut self, world: &mut W, config: &SyncConfig) {
        let Some(actor) = self.live_actor(world) else {
            return;
        };

        let drift = self
            .position
            .and_then(|target| world.distance_to(actor, target).map(|drift| (target, drift)));
        if let Some((target, drift)) = drift {
            if drift < config.teleport_threshold {
                if drift > 0.0 {
                    world.move_to(actor, target, false);
                }
            } else if world.is_moving(actor) {
                world.stop_moving(actor);
                world.move_to(actor, target, false);
                world.resume_moving(actor);
            } else {
                world.move_to(actor, target, false);
            }
        }

        let revivable = self.kind == MirrorKind::PlayerProxy || !world.is_dead(actor);
        if let Some((hp, _)) = self.hp.filter(|&(hp, _)| revivable && hp != world.attribute(actor, Attribute::Hp)) {
            world.set_attribute(actor, Attribute::Hp, hp);
        }

        if let Some(mode) = self.weapon_mode.filter(|&mode| mode != world.weapon_mode(actor)) {
            world.set_weapon_mode(actor, mode);
        }

        if let Some(heading) = self.heading.filter(|&heading| world.heading(actor) != Some(heading)) {
            world.rotate_to(actor, heading);
        }
    }

    /// Marks the mirror destroyed without touching the world.
    fn detach(&mut self) {
        self.state = MirrorState::Destroyed;
        self.actor = None;
        self.owned_items.clear();
        self.queue.clear();
    }

    /// Releases the adapter object and ends the mirror.
    pub fn destroy<W: ActorAdapter + ?Sized>(&mut self, world: &mut W) {
        if let Some(actor) = self.actor {
            world.destroy(actor);
        }
        debug!("destroyed mirror {}", self.name);
        self.detach();
    }

    /// Recreates a spawned player proxy from the cached appearance.
    pub fn respawn<W: ActorAdapter + ?Sized>(&mut self, world: &mut W) {
        if self.kind != MirrorKind::PlayerProxy || self.state != MirrorState::Spawned {
            return;
        }
        let Some(position) = self.position else {
            return;
        };
        if let Some(actor) = self.actor.take() {
            world.destroy(actor);
        }
        self.owned_items.clear();
        self.spawn(world, position);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::{ActorSnapshot, AdapterCall, SimWorld};
    use crate::config::SafeZone;

    fn world_with_player() -> SimWorld {
        let mut world = SimWorld::new();
        world.add_local_player("PC_HERO", ActorSnapshot::default());
        world
    }

    fn env<'a>(config: &'a SyncConfig, proxies: &'a HashMap<String, ActorHandle>) -> MirrorEnv<'a> {
        MirrorEnv {
            config,
            local_identity: "HOST",
            player_proxies: proxies,
        }
    }

    fn init_at(position: Vec3) -> StateUpdate {
        StateUpdate::Init(InitState {
            instance_id: 11,
            nickname: "Bob".into(),
            position,
            body_tex: 9,
            head_tex: 18,
        })
    }

    fn spawn_count(world: &SimWorld) -> usize {
        world
            .calls()
            .iter()
            .filter(|c| matches!(c, AdapterCall::SpawnAt { .. }))
            .count()
    }

    #[test]
    fn test_position_spawns_unbound_proxy() {
        let config = SyncConfig::default();
        let proxies = HashMap::new();
        let mut world = world_with_player();
        let mut mirror = RemoteActorMirror::player_proxy("FRIEND_1");

        let target = Vec3::new(100.0, 0.0, 100.0);
        mirror.push(StateUpdate::Position(target));
        mirror.update(&mut world, &env(&config, &proxies));

        assert_eq!(spawn_count(&world), 1);
        assert_eq!(mirror.state(), MirrorState::Spawned);
        assert_eq!(mirror.position(), Some(target));

        mirror.update(&mut world, &env(&config, &proxies));
        assert_eq!(spawn_count(&world), 1);
    }

    #[test]
    fn test_distance_hysteresis_reapplies_equipment() {
        let config = SyncConfig::default();
        let proxies = HashMap::new();
        let mut world = world_with_player();
        let mut mirror = RemoteActorMirror::player_proxy("FRIEND_1");

        mirror.push(init_at(Vec3::new(100.0, 0.0, 0.0)));
        mirror.push(StateUpdate::Armor("ITAR_PAL_H".into()));
        mirror.push(StateUpdate::Weapons {
            melee: "ITMW_1H_SWORD".into(),
            ranged: "NULL".into(),
        });
        mirror.update(&mut world, &env(&config, &proxies));
        assert_eq!(mirror.state(), MirrorState::Spawned);
        assert_eq!(mirror.owned_items().len(), 2);

        mirror.push(StateUpdate::Position(Vec3::new(5000.0, 0.0, 0.0)));
        mirror.update(&mut world, &env(&config, &proxies));
        assert_eq!(mirror.state(), MirrorState::Despawned);
        assert_eq!(mirror.actor(), None);

        world.take_calls();
        mirror.push(StateUpdate::Position(Vec3::new(200.0, 0.0, 0.0)));
        mirror.update(&mut world, &env(&config, &proxies));
        assert_eq!(mirror.state(), MirrorState::Spawned);

        let actor = mirror.actor().unwrap();
        let proxy = world.actor(actor).unwrap();
        assert_eq!(proxy.equipped(EquipSlot::Armor), Some("ITAR_PAL_H"));
        assert_eq!(proxy.equipped(EquipSlot::Melee), Some("ITMW_1H_SWORD"));
        assert_eq!(proxy.equipped(EquipSlot::Ranged), None);
        assert_eq!(spawn_count(&world), 1);
    }

    #[test]
    fn test_safe_zone_init_issues_no_calls() {
        let config = SyncConfig {
            safe_zone: Some(SafeZone {
                center: Vec3::new(1000.0, 0.0, 1000.0),
                radius: 500.0,
            }),
            ..Default::default()
        };
        let proxies = HashMap::new();
        let mut world = world_with_player();
        let mut mirror = RemoteActorMirror::player_proxy("FRIEND_1");

        mirror.push(init_at(Vec3::new(1100.0, 0.0, 1100.0)));
        mirror.push(StateUpdate::Hp { hp: 10, hp_max: 10 });
        mirror.update(&mut world, &env(&config, &proxies));

        assert_eq!(mirror.state(), MirrorState::Destroyed);
        assert!(world.calls().is_empty());
        assert_eq!(mirror.pending(), 0);
    }

    #[test]
    fn test_world_actor_destroyed_beyond_factor() {
        let config = SyncConfig::default();
        let proxies = HashMap::new();
        let mut world = world_with_player();
        let wolf = world.add_actor("WOLF_1", ActorSnapshot::default());
        let mut mirror = RemoteActorMirror::world_actor("WOLF_1", wolf);

        mirror.push(StateUpdate::Position(Vec3::new(5000.0, 0.0, 0.0)));
        mirror.update(&mut world, &env(&config, &proxies));
        assert_eq!(mirror.state(), MirrorState::Spawned);

        world.take_calls();
        mirror.push(StateUpdate::Position(Vec3::new(7000.0, 0.0, 0.0)));
        mirror.update(&mut world, &env(&config, &proxies));
        assert_eq!(mirror.state(), MirrorState::Destroyed);
        assert!(world.calls().is_empty());
        assert!(world.actor(wolf).is_some());
    }

    #[test]
    fn test_explicit_destroy_releases_actor() {
        let config = SyncConfig::default();
        let proxies = HashMap::new();
        let mut world = world_with_player();
        let mut mirror = RemoteActorMirror::player_proxy("FRIEND_2");
        mirror.push(init_at(Vec3::new(10.0, 0.0, 10.0)));
        mirror.update(&mut world, &env(&config, &proxies));
        let actor = mirror.actor().unwrap();

        mirror.push(StateUpdate::Destroy);
        mirror.push(StateUpdate::Heading(45.0));
        mirror.update(&mut world, &env(&config, &proxies));

        assert!(mirror.is_destroyed());
        assert!(world.calls().contains(&AdapterCall::Destroy(actor)));
        assert!(world.actor(actor).is_none());
        assert!(mirror.owned_items().is_empty());
    }

    #[test]
    fn test_world_actor_zero_hp_is_held_at_one() {
        let config = SyncConfig::default();
        let proxies = HashMap::new();
        let mut world = world_with_player();
        let wolf = world.add_actor("WOLF_1", ActorSnapshot::default());
        let mut mirror = RemoteActorMirror::world_actor("WOLF_1", wolf);

        mirror.push(StateUpdate::Hp { hp: 0, hp_max: 100 });
        mirror.update(&mut world, &env(&config, &proxies));

        assert_eq!(world.attribute(wolf, Attribute::Hp), 1);
        assert_eq!(mirror.hp(), None);
    }

    #[test]
    fn test_attack_resolves_targets_in_order() {
        let config = SyncConfig::default();
        let mut world = world_with_player();
        let sheep = world.add_actor("SHEEP_1", ActorSnapshot::default());
        let proxy = world.add_actor("FRIEND_1", ActorSnapshot::default());
        let wolf = world.add_actor("WOLF_1", ActorSnapshot::default());
        let proxies = HashMap::from([("FRIEND_1".to_string(), proxy)]);
        let mut mirror = RemoteActorMirror::world_actor("WOLF_1", wolf);

        let hit = |target: &str, dead: bool| Attack {
            target: target.into(),
            damage: 10.0,
            unconscious: 0,
            dead,
            finish: false,
            damage_mode: 2,
        };
        mirror.push(StateUpdate::Attacks(vec![
            hit("HOST", false),
            hit("FRIEND_1", false),
            hit("GHOST", false),
            hit("SHEEP_1", true),
        ]));
        let killed = mirror.update(&mut world, &env(&config, &proxies));

        let targets: Vec<HitTarget> = world
            .calls()
            .iter()
            .filter_map(|c| match c {
                AdapterCall::ApplyHit { target, .. } => Some(*target),
                _ => None,
            })
            .collect();
        assert_eq!(
            targets,
            vec![
                HitTarget::LocalPlayer,
                HitTarget::Actor(proxy),
                HitTarget::Actor(sheep)
            ]
        );
        assert_eq!(killed, vec!["SHEEP_1".to_string()]);
        assert_eq!(world.attribute(sheep, Attribute::Hp), 0);
    }

    #[test]
    fn test_far_teleport_interrupts_movement() {
        let config = SyncConfig::default();
        let proxies = HashMap::new();
        let mut world = world_with_player();
        let mut mirror = RemoteActorMirror::player_proxy("FRIEND_1");
        mirror.push(init_at(Vec3::new(10.0, 0.0, 0.0)));
        mirror.update(&mut world, &env(&config, &proxies));
        let actor = mirror.actor().unwrap();
        world.actor_mut(actor).unwrap().moving = true;
        world.take_calls();

        let target = Vec3::new(900.0, 0.0, 0.0);
        mirror.push(StateUpdate::Position(target));
        mirror.update(&mut world, &env(&config, &proxies));

        assert_eq!(
            &world.calls()[..3],
            &[
                AdapterCall::StopMoving(actor),
                AdapterCall::MoveTo {
                    actor,
                    position: target,
                    collide: false
                },
                AdapterCall::ResumeMoving(actor),
            ]
        );
    }

    #[test]
    fn test_dialogue_skips_tick() {
        let config = SyncConfig::default();
        let proxies = HashMap::new();
        let mut world = world_with_player();
        let npc = world.add_actor("VLK_1", ActorSnapshot::default());
        world.actor_mut(npc).unwrap().talking_to_player = true;
        let mut mirror = RemoteActorMirror::world_actor("VLK_1", npc);

        mirror.push(StateUpdate::Heading(90.0));
        mirror.update(&mut world, &env(&config, &proxies));

        assert_eq!(mirror.pending(), 1);
        assert!(world.calls().is_empty());
    }

    #[test]
    fn test_revived_applies_only_to_local_identity() {
        let config = SyncConfig::default();
        let proxies = HashMap::new();
        let mut world = SimWorld::new();
        let hero = world.add_local_player(
            "PC_HERO",
            ActorSnapshot {
                hp: 0,
                hp_max: 120,
                ..Default::default()
            },
        );
        let mut mirror = RemoteActorMirror::player_proxy("FRIEND_1");

        mirror.push(StateUpdate::Revived("FRIEND_3".into()));
        mirror.update(&mut world, &env(&config, &proxies));
        assert!(!world.calls().contains(&AdapterCall::ReviveLocalPlayer));

        mirror.push(StateUpdate::Revived("HOST".into()));
        mirror.update(&mut world, &env(&config, &proxies));
        assert!(world.calls().contains(&AdapterCall::ReviveLocalPlayer));
        assert_eq!(world.attribute(hero, Attribute::Hp), 120);

        world.take_calls();
        mirror.push(StateUpdate::Revived("HOST".into()));
        mirror.update(&mut world, &env(&config, &proxies));
        assert!(!world.calls().contains(&AdapterCall::ReviveLocalPlayer));
    }

    #[test]
    fn test_respawn_recreates_proxy_with_equipment() {
        let config = SyncConfig::default();
        let proxies = HashMap::new();
        let mut world = world_with_player();
        let mut mirror = RemoteActorMirror::player_proxy("FRIEND_1");
        mirror.push(init_at(Vec3::new(100.0, 0.0, 0.0)));
        mirror.push(StateUpdate::Weapons {
            melee: "ITMW_1H_SWORD".into(),
            ranged: "NULL".into(),
        });
        mirror.push(StateUpdate::WeaponMode(3));
        mirror.update(&mut world, &env(&config, &proxies));
        let old = mirror.actor().unwrap();
        world.take_calls();

        mirror.respawn(&mut world);

        let new = mirror.actor().unwrap();
        assert_ne!(new, old);
        assert_eq!(mirror.state(), MirrorState::Spawned);
        assert!(world.calls().contains(&AdapterCall::Destroy(old)));
        assert!(world.actor(old).is_none());
        assert_eq!(spawn_count(&world), 1);
        let proxy = world.actor(new).unwrap();
        assert_eq!(proxy.equipped(EquipSlot::Melee), Some("ITMW_1H_SWORD"));
        assert!(proxy.companion);
        assert_eq!(world.weapon_mode(new), 3);
        assert_eq!(mirror.owned_items().len(), 1);
    }

    #[test]
    fn test_respawn_ignores_despawned_proxy() {
        let config = SyncConfig::default();
        let proxies = HashMap::new();
        let mut world = world_with_player();
        let mut mirror = RemoteActorMirror::player_proxy("FRIEND_1");
        mirror.push(init_at(Vec3::new(100.0, 0.0, 0.0)));
        mirror.push(StateUpdate::Position(Vec3::new(5000.0, 0.0, 0.0)));
        mirror.update(&mut world, &env(&config, &proxies));
        assert_eq!(mirror.state(), MirrorState::Despawned);
        world.take_calls();

        mirror.respawn(&mut world);

        assert!(world.calls().is_empty());
        assert_eq!(mirror.actor(), None);
    }

    #[test]
    fn test_armor_waits_for_model() {
        let config = SyncConfig::default();
        let proxies = HashMap::new();
        let mut world = world_with_player();
        let guard = world.add_actor("GRD_1", ActorSnapshot::default());
        world.actor_mut(guard).unwrap().state.has_model = false;
        let mut mirror = RemoteActorMirror::world_actor("GRD_1", guard);

        mirror.push(StateUpdate::Armor("ITAR_GRD_L".into()));
        mirror.update(&mut world, &env(&config, &proxies));

        assert!(!world.calls().iter().any(|c| matches!(c, AdapterCall::Equip { .. })));
        assert_eq!(mirror.equipment().armor.as_deref(), Some("ITAR_GRD_L"));
    }
}
