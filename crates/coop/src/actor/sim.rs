use std::collections::HashMap;

use glam::Vec3;

use super::adapter::{
    ActorAdapter, ActorHandle, ActorSnapshot, Attribute, EquipSlot, HitTarget, ItemHandle,
    ProxySpec,
};
use crate::net::{Attack, DropItem, SpellCast, TakeItem, WEAPON_MODE_NONE};

/// Every mutating adapter call, in issue order.
#[derive(Debug, Clone, PartialEq)]
pub enum AdapterCall {
    SpawnAt { name: String, position: Vec3 },
    InsertAt { actor: ActorHandle, position: Vec3 },
    Despawn(ActorHandle),
    Destroy(ActorHandle),
    MoveTo {
        actor: ActorHandle,
        position: Vec3,
        collide: bool,
    },
    StopMoving(ActorHandle),
    ResumeMoving(ActorHandle),
    RotateTo { actor: ActorHandle, heading: f32 },
    PlayAnimation { actor: ActorHandle, id: i32 },
    SetWeaponMode { actor: ActorHandle, mode: i32 },
    SetAttribute {
        actor: ActorHandle,
        attribute: Attribute,
        value: i32,
    },
    ResetAi(ActorHandle),
    MarkCompanion(ActorHandle),
    SetOverlays { actor: ActorHandle, overlays: Vec<i32> },
    SetProtections { actor: ActorHandle, protections: [i32; 8] },
    SetTalents { actor: ActorHandle, talents: [i32; 4] },
    SetBodyState { actor: ActorHandle, state: i32 },
    Equip {
        actor: ActorHandle,
        slot: EquipSlot,
        item: String,
    },
    Unequip { actor: ActorHandle, slot: EquipSlot },
    DropItem { actor: ActorHandle, item: String },
    RemoveGroundItem { unique_name: String },
    SetActiveSpell {
        actor: ActorHandle,
        spell: Option<String>,
    },
    CastSpell {
        actor: ActorHandle,
        spell_instance: i32,
        target: Option<ActorHandle>,
    },
    ApplyHit {
        attacker: ActorHandle,
        target: HitTarget,
        damage: f32,
    },
    SetTime { hour: i32, minute: i32 },
    ReviveLocalPlayer,
    RebuildUniqueNames,
}

#[derive(Debug, Clone)]
pub struct SimActor {
    pub unique_name: String,
    pub state: ActorSnapshot,
    pub proxy: bool,
    pub in_world: bool,
    pub moving: bool,
    pub companion: bool,
    pub talking_to_player: bool,
    equipped: HashMap<EquipSlot, ItemHandle>,
}

impl SimActor {
    fn new(unique_name: String, state: ActorSnapshot, proxy: bool) -> Self {
        Self {
            unique_name,
            state,
            proxy,
            in_world: true,
            moving: false,
            companion: false,
            talking_to_player: false,
            equipped: HashMap::new(),
        }
    }

    pub fn equipped(&self, slot: EquipSlot) -> Option<&str> {
        match slot {
            EquipSlot::Armor => self.state.armor.as_deref(),
            EquipSlot::Melee => self.state.melee_weapon.as_deref(),
            EquipSlot::Ranged => self.state.ranged_weapon.as_deref(),
            EquipSlot::LeftHand => self.state.left_hand.as_deref(),
            EquipSlot::RightHand => self.state.right_hand.as_deref(),
        }
    }

    fn slot_mut(&mut self, slot: EquipSlot) -> &mut Option<String> {
        match slot {
            EquipSlot::Armor => &mut self.state.armor,
            EquipSlot::Melee => &mut self.state.melee_weapon,
            EquipSlot::Ranged => &mut self.state.ranged_weapon,
            EquipSlot::LeftHand => &mut self.state.left_hand,
            EquipSlot::RightHand => &mut self.state.right_hand,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroundItem {
    pub item: String,
    pub unique_name: String,
    pub count: i32,
    pub position: Vec3,
}

#[derive(Debug, Clone, Copy)]
struct Patrol {
    center: Vec3,
    radius: f32,
    speed: f32,
}

/// In-memory world backing the headless node and the test suite.
#[derive(Debug, Default)]
pub struct SimWorld {
    actors: HashMap<ActorHandle, SimActor>,
    registry: HashMap<String, ActorHandle>,
    ground_items: HashMap<ItemHandle, GroundItem>,
    local_player: Option<ActorHandle>,
    clock: (i32, i32),
    player_in_dialog: bool,
    patrol: Option<Patrol>,
    elapsed: f32,
    next_handle: u64,
    calls: Vec<AdapterCall>,
}

impl SimWorld {
    pub fn new() -> Self {
        Self {
            clock: (8, 0),
            next_handle: 1,
            ..Default::default()
        }
    }

    fn next_handle(&mut self) -> u64 {
        let handle = self.next_handle;
        self.next_handle += 1;
        handle
    }

    /// Adds a world actor. It becomes discoverable after the next registry rebuild.
    pub fn add_actor(&mut self, unique_name: impl Into<String>, state: ActorSnapshot) -> ActorHandle {
        let handle = ActorHandle(self.next_handle());
        self.actors
            .insert(handle, SimActor::new(unique_name.into(), state, false));
        handle
    }

    pub fn add_local_player(&mut self, unique_name: impl Into<String>, state: ActorSnapshot) -> ActorHandle {
        let handle = self.add_actor(unique_name, state);
        self.local_player = Some(handle);
        handle
    }

    pub fn remove_actor(&mut self, actor: ActorHandle) -> Option<SimActor> {
        self.actors.remove(&actor)
    }

    pub fn actor(&self, actor: ActorHandle) -> Option<&SimActor> {
        self.actors.get(&actor)
    }

    pub fn actor_mut(&mut self, actor: ActorHandle) -> Option<&mut SimActor> {
        self.actors.get_mut(&actor)
    }

    pub fn actor_by_name(&self, unique_name: &str) -> Option<(ActorHandle, &SimActor)> {
        self.actors
            .iter()
            .find(|(_, a)| a.unique_name == unique_name)
            .map(|(&h, a)| (h, a))
    }

    pub fn actor_count(&self) -> usize {
        self.actors.len()
    }

    pub fn ground_items(&self) -> impl Iterator<Item = &GroundItem> {
        self.ground_items.values()
    }

    pub fn clock(&self) -> (i32, i32) {
        self.clock
    }

    pub fn set_clock(&mut self, hour: i32, minute: i32) {
        self.clock = (hour, minute);
    }

    pub fn set_player_in_dialog(&mut self, in_dialog: bool) {
        self.player_in_dialog = in_dialog;
    }

    pub fn calls(&self) -> &[AdapterCall] {
        &self.calls
    }

    pub fn take_calls(&mut self) -> Vec<AdapterCall> {
        std::mem::take(&mut self.calls)
    }

    /// Walks the local player around a circle when `step` runs.
    pub fn patrol_local_player(&mut self, center: Vec3, radius: f32, speed: f32) {
        self.patrol = Some(Patrol {
            center,
            radius,
            speed,
        });
    }

    pub fn step(&mut self, dt: f32) {
        self.elapsed += dt;
        let (Some(patrol), Some(player)) = (self.patrol, self.local_player) else {
            return;
        };
        let Some(actor) = self.actors.get_mut(&player) else {
            return;
        };

        let angle = self.elapsed * patrol.speed / patrol.radius.max(1.0);
        actor.state.position =
            patrol.center + Vec3::new(angle.cos(), 0.0, angle.sin()) * patrol.radius;
        actor.state.heading = (angle.to_degrees() + 90.0) % 360.0;
        actor.moving = true;
    }

    fn with_actor(&mut self, actor: ActorHandle, f: impl FnOnce(&mut SimActor)) {
        if let Some(a) = self.actors.get_mut(&actor) {
            f(a);
        }
    }
}

impl ActorAdapter for SimWorld {
    fn local_player(&self) -> Option<ActorHandle> {
        self.local_player
    }

    fn snapshot(&self, actor: ActorHandle) -> Option<ActorSnapshot> {
        self.actors.get(&actor).map(|a| {
            let mut state = a.state.clone();
            state.has_model = a.in_world && state.has_model;
            state
        })
    }

    fn visible_actors(&self, radius: f32) -> Vec<(String, ActorHandle)> {
        let Some(origin) = self.local_player_position() else {
            return Vec::new();
        };
        let mut visible: Vec<(String, ActorHandle)> = self
            .actors
            .iter()
            .filter(|(h, a)| {
                Some(**h) != self.local_player
                    && !a.proxy
                    && a.in_world
                    && a.state.position.distance(origin) <= radius
            })
            .map(|(&h, a)| (a.unique_name.clone(), h))
            .collect();
        visible.sort();
        visible
    }

    fn time_of_day(&self) -> (i32, i32) {
        self.clock
    }

    fn set_time(&mut self, hour: i32, minute: i32) {
        self.clock = (hour, minute);
        self.calls.push(AdapterCall::SetTime { hour, minute });
    }

    fn spawn_at(&mut self, spec: &ProxySpec, position: Vec3) -> Option<ActorHandle> {
        let handle = ActorHandle(self.next_handle());
        let state = ActorSnapshot {
            object_name: spec.name.clone(),
            instance_id: spec.instance_id,
            position,
            ..Default::default()
        };
        self.actors
            .insert(handle, SimActor::new(spec.name.clone(), state, true));
        self.calls.push(AdapterCall::SpawnAt {
            name: spec.name.clone(),
            position,
        });
        Some(handle)
    }

    fn insert_at(&mut self, actor: ActorHandle, position: Vec3) {
        self.with_actor(actor, |a| {
            a.in_world = true;
            a.state.position = position;
        });
        self.calls.push(AdapterCall::InsertAt { actor, position });
    }

    fn despawn(&mut self, actor: ActorHandle) {
        self.actors.remove(&actor);
        self.calls.push(AdapterCall::Despawn(actor));
    }

    fn destroy(&mut self, actor: ActorHandle) {
        self.actors.remove(&actor);
        self.calls.push(AdapterCall::Destroy(actor));
    }

    fn has_model(&self, actor: ActorHandle) -> bool {
        self.actors
            .get(&actor)
            .is_some_and(|a| a.in_world && a.state.has_model)
    }

    fn position(&self, actor: ActorHandle) -> Option<Vec3> {
        self.actors.get(&actor).map(|a| a.state.position)
    }

    fn move_to(&mut self, actor: ActorHandle, position: Vec3, collide: bool) {
        self.with_actor(actor, |a| a.state.position = position);
        self.calls.push(AdapterCall::MoveTo {
            actor,
            position,
            collide,
        });
    }

    fn is_moving(&self, actor: ActorHandle) -> bool {
        self.actors.get(&actor).is_some_and(|a| a.moving)
    }

    fn stop_moving(&mut self, actor: ActorHandle) {
        self.with_actor(actor, |a| a.moving = false);
        self.calls.push(AdapterCall::StopMoving(actor));
    }

    fn resume_moving(&mut self, actor: ActorHandle) {
        self.with_actor(actor, |a| a.moving = true);
        self.calls.push(AdapterCall::ResumeMoving(actor));
    }

    fn heading(&self, actor: ActorHandle) -> Option<f32> {
        self.actors.get(&actor).map(|a| a.state.heading)
    }

    fn rotate_to(&mut self, actor: ActorHandle, heading: f32) {
        self.with_actor(actor, |a| a.state.heading = heading);
        self.calls.push(AdapterCall::RotateTo { actor, heading });
    }

    fn play_animation(&mut self, actor: ActorHandle, id: i32) {
        self.with_actor(actor, |a| a.state.animation = Some(id));
        self.calls.push(AdapterCall::PlayAnimation { actor, id });
    }

    fn weapon_mode(&self, actor: ActorHandle) -> i32 {
        self.actors.get(&actor).map_or(WEAPON_MODE_NONE, |a| a.state.weapon_mode)
    }

    fn set_weapon_mode(&mut self, actor: ActorHandle, mode: i32) {
        self.with_actor(actor, |a| a.state.weapon_mode = mode);
        self.calls.push(AdapterCall::SetWeaponMode { actor, mode });
    }

    fn attribute(&self, actor: ActorHandle, attribute: Attribute) -> i32 {
        self.actors.get(&actor).map_or(0, |a| match attribute {
            Attribute::Hp => a.state.hp,
            Attribute::HpMax => a.state.hp_max,
        })
    }

    fn set_attribute(&mut self, actor: ActorHandle, attribute: Attribute, value: i32) {
        self.with_actor(actor, |a| match attribute {
            Attribute::Hp => a.state.hp = value,
            Attribute::HpMax => a.state.hp_max = value,
        });
        self.calls.push(AdapterCall::SetAttribute {
            actor,
            attribute,
            value,
        });
    }

    fn is_unconscious(&self, actor: ActorHandle) -> bool {
        self.actors
            .get(&actor)
            .is_some_and(|a| a.state.hp == 1 && a.state.is_human)
    }

    fn reset_ai(&mut self, actor: ActorHandle) {
        self.calls.push(AdapterCall::ResetAi(actor));
    }

    fn mark_companion(&mut self, actor: ActorHandle) {
        self.with_actor(actor, |a| a.companion = true);
        self.calls.push(AdapterCall::MarkCompanion(actor));
    }

    fn set_overlays(&mut self, actor: ActorHandle, overlays: &[i32]) {
        self.with_actor(actor, |a| a.state.overlays = overlays.to_vec());
        self.calls.push(AdapterCall::SetOverlays {
            actor,
            overlays: overlays.to_vec(),
        });
    }

    fn set_protections(&mut self, actor: ActorHandle, protections: &[i32; 8]) {
        self.with_actor(actor, |a| a.state.protections = *protections);
        self.calls.push(AdapterCall::SetProtections {
            actor,
            protections: *protections,
        });
    }

    fn set_talents(&mut self, actor: ActorHandle, talents: &[i32; 4]) {
        self.with_actor(actor, |a| a.state.talents = *talents);
        self.calls.push(AdapterCall::SetTalents {
            actor,
            talents: *talents,
        });
    }

    fn set_body_state(&mut self, actor: ActorHandle, state: i32) {
        self.with_actor(actor, |a| a.state.body_state = state);
        self.calls.push(AdapterCall::SetBodyState { actor, state });
    }

    fn equip(&mut self, actor: ActorHandle, slot: EquipSlot, item: &str) -> Option<ItemHandle> {
        if !self.actors.contains_key(&actor) {
            return None;
        }
        let handle = ItemHandle(self.next_handle());
        self.with_actor(actor, |a| {
            *a.slot_mut(slot) = Some(item.to_string());
            a.equipped.insert(slot, handle);
        });
        self.calls.push(AdapterCall::Equip {
            actor,
            slot,
            item: item.to_string(),
        });
        Some(handle)
    }

    fn unequip(&mut self, actor: ActorHandle, slot: EquipSlot) -> Option<ItemHandle> {
        let mut removed = None;
        self.with_actor(actor, |a| {
            *a.slot_mut(slot) = None;
            removed = a.equipped.remove(&slot);
        });
        self.calls.push(AdapterCall::Unequip { actor, slot });
        removed
    }

    fn drop_item(&mut self, actor: ActorHandle, item: &DropItem) -> Option<ItemHandle> {
        let position = self.position(actor)?;
        let handle = ItemHandle(self.next_handle());
        self.ground_items.insert(
            handle,
            GroundItem {
                item: item.item.clone(),
                unique_name: item.unique_name.clone(),
                count: item.count,
                position,
            },
        );
        self.calls.push(AdapterCall::DropItem {
            actor,
            item: item.item.clone(),
        });
        Some(handle)
    }

    fn remove_ground_item(&mut self, item: &TakeItem) -> bool {
        let found = self
            .ground_items
            .iter()
            .find(|(_, g)| g.unique_name == item.unique_name)
            .map(|(&h, _)| h);
        self.calls.push(AdapterCall::RemoveGroundItem {
            unique_name: item.unique_name.clone(),
        });
        found.and_then(|h| self.ground_items.remove(&h)).is_some()
    }

    fn set_active_spell(&mut self, actor: ActorHandle, spell: Option<&str>) {
        self.with_actor(actor, |a| a.state.active_spell = spell.map(str::to_string));
        self.calls.push(AdapterCall::SetActiveSpell {
            actor,
            spell: spell.map(str::to_string),
        });
    }

    fn cast_spell(&mut self, actor: ActorHandle, cast: &SpellCast, target: Option<ActorHandle>) {
        self.calls.push(AdapterCall::CastSpell {
            actor,
            spell_instance: cast.spell_instance,
            target,
        });
    }

    fn apply_hit(&mut self, attacker: ActorHandle, target: HitTarget, attack: &Attack) {
        let victim = match target {
            HitTarget::LocalPlayer => self.local_player,
            HitTarget::Actor(actor) => Some(actor),
        };
        if let Some(victim) = victim {
            let damage = attack.damage as i32;
            let dead = attack.dead;
            self.with_actor(victim, |a| {
                a.state.hp = if dead { 0 } else { (a.state.hp - damage).max(0) };
            });
        }
        self.calls.push(AdapterCall::ApplyHit {
            attacker,
            target,
            damage: attack.damage,
        });
    }

    fn is_talking_to_player(&self, actor: ActorHandle) -> bool {
        self.actors.get(&actor).is_some_and(|a| a.talking_to_player)
    }

    fn player_in_dialog(&self) -> bool {
        self.player_in_dialog
    }

    fn revive_local_player(&mut self) {
        if let Some(player) = self.local_player {
            self.with_actor(player, |a| a.state.hp = a.state.hp_max);
        }
        self.calls.push(AdapterCall::ReviveLocalPlayer);
    }

    fn lookup_unique_name(&self, name: &str) -> Option<ActorHandle> {
        self.registry
            .get(name)
            .copied()
            .filter(|h| self.actors.contains_key(h))
    }

    fn rebuild_unique_names(&mut self) {
        self.registry = self
            .actors
            .iter()
            .filter(|(_, a)| !a.proxy)
            .map(|(&h, a)| (a.unique_name.clone(), h))
            .collect();
        self.calls.push(AdapterCall::RebuildUniqueNames);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_needs_rebuild() {
        let mut world = SimWorld::new();
        let wolf = world.add_actor("WOLF_1", ActorSnapshot::default());

        assert_eq!(world.lookup_unique_name("WOLF_1"), None);
        assert_eq!(world.resolve_unique_name("WOLF_1"), Some(wolf));
        assert_eq!(world.calls(), &[AdapterCall::RebuildUniqueNames]);
    }

    #[test]
    fn test_equip_tracks_slot() {
        let mut world = SimWorld::new();
        let actor = world.add_actor("GRD_1", ActorSnapshot::default());

        let item = world.equip(actor, EquipSlot::Armor, "ITAR_GRD_L");
        assert!(item.is_some());
        assert_eq!(world.actor(actor).unwrap().equipped(EquipSlot::Armor), Some("ITAR_GRD_L"));

        assert_eq!(world.unequip(actor, EquipSlot::Armor), item);
        assert_eq!(world.actor(actor).unwrap().equipped(EquipSlot::Armor), None);
    }

    #[test]
    fn test_visible_actors_excludes_player_and_far_actors() {
        let mut world = SimWorld::new();
        world.add_local_player("PC_HERO", ActorSnapshot::default());
        world.add_actor(
            "NEAR",
            ActorSnapshot {
                position: Vec3::new(100.0, 0.0, 0.0),
                ..Default::default()
            },
        );
        world.add_actor(
            "FAR",
            ActorSnapshot {
                position: Vec3::new(9000.0, 0.0, 0.0),
                ..Default::default()
            },
        );

        let names: Vec<String> = world.visible_actors(4500.0).into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["NEAR".to_string()]);
    }

    #[test]
    fn test_patrol_moves_player() {
        let mut world = SimWorld::new();
        let player = world.add_local_player("PC_HERO", ActorSnapshot::default());
        world.patrol_local_player(Vec3::ZERO, 500.0, 250.0);

        world.step(1.0);
        let first = world.position(player).unwrap();
        world.step(1.0);
        let second = world.position(player).unwrap();

        assert!((first.length() - 500.0).abs() < 0.01);
        assert!(first.distance(second) > 5.0);
    }
}
