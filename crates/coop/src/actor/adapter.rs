use glam::Vec3;

use crate::net::{Attack, DropItem, SpellCast, TakeItem, WEAPON_MODE_NONE};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActorHandle(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemHandle(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Attribute {
    Hp,
    HpMax,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EquipSlot {
    Armor,
    Melee,
    Ranged,
    LeftHand,
    RightHand,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitTarget {
    LocalPlayer,
    Actor(ActorHandle),
}

/// Everything needed to materialize a player proxy.
#[derive(Debug, Clone, PartialEq)]
pub struct ProxySpec {
    pub name: String,
    pub nickname: String,
    pub instance_id: i32,
    pub body_tex: i32,
    pub head_tex: i32,
}

/// Authoritative state of one locally owned actor, read once per tick.
#[derive(Debug, Clone, PartialEq)]
pub struct ActorSnapshot {
    pub object_name: String,
    pub instance_id: i32,
    pub is_human: bool,
    pub has_model: bool,
    pub position: Vec3,
    pub heading: f32,
    pub animation: Option<i32>,
    pub weapon_mode: i32,
    pub active_spell: Option<String>,
    pub armor: Option<String>,
    pub melee_weapon: Option<String>,
    pub ranged_weapon: Option<String>,
    pub hp: i32,
    pub hp_max: i32,
    pub body_state: i32,
    pub overlays: Vec<i32>,
    pub protections: [i32; 8],
    pub talents: [i32; 4],
    pub left_hand: Option<String>,
    pub right_hand: Option<String>,
}

impl Default for ActorSnapshot {
    fn default() -> Self {
        Self {
            object_name: String::new(),
            instance_id: 1,
            is_human: true,
            has_model: true,
            position: Vec3::ZERO,
            heading: 0.0,
            animation: None,
            weapon_mode: WEAPON_MODE_NONE,
            active_spell: None,
            armor: None,
            melee_weapon: None,
            ranged_weapon: None,
            hp: 100,
            hp_max: 100,
            body_state: 0,
            overlays: Vec::new(),
            protections: [0; 8],
            talents: [0; 4],
            left_hand: None,
            right_hand: None,
        }
    }
}

/// Entity primitives of the host simulation. Mirrors drive remote actors
/// through it and shadows read local actors from it.
pub trait ActorAdapter {
    fn local_player(&self) -> Option<ActorHandle>;

    fn snapshot(&self, actor: ActorHandle) -> Option<ActorSnapshot>;

    /// Actors close enough to the local player to be broadcast, keyed by unique name.
    fn visible_actors(&self, radius: f32) -> Vec<(String, ActorHandle)>;

    fn time_of_day(&self) -> (i32, i32);

    fn set_time(&mut self, hour: i32, minute: i32);

    fn spawn_at(&mut self, spec: &ProxySpec, position: Vec3) -> Option<ActorHandle>;

    fn insert_at(&mut self, actor: ActorHandle, position: Vec3);

    fn despawn(&mut self, actor: ActorHandle);

    fn destroy(&mut self, actor: ActorHandle);

    fn has_model(&self, actor: ActorHandle) -> bool;

    fn position(&self, actor: ActorHandle) -> Option<Vec3>;

    fn local_player_position(&self) -> Option<Vec3> {
        self.local_player().and_then(|actor| self.position(actor))
    }

    fn distance_to(&self, actor: ActorHandle, other: Vec3) -> Option<f32> {
        self.position(actor).map(|pos| pos.distance(other))
    }

    /// Writes the position. `collide` false skips collision for this write.
    fn move_to(&mut self, actor: ActorHandle, position: Vec3, collide: bool);

    fn is_moving(&self, actor: ActorHandle) -> bool;

    fn stop_moving(&mut self, actor: ActorHandle);

    fn resume_moving(&mut self, actor: ActorHandle);

    fn heading(&self, actor: ActorHandle) -> Option<f32>;

    fn rotate_to(&mut self, actor: ActorHandle, heading: f32);

    fn play_animation(&mut self, actor: ActorHandle, id: i32);

    fn weapon_mode(&self, actor: ActorHandle) -> i32;

    fn set_weapon_mode(&mut self, actor: ActorHandle, mode: i32);

    fn attribute(&self, actor: ActorHandle, attribute: Attribute) -> i32;

    fn set_attribute(&mut self, actor: ActorHandle, attribute: Attribute, value: i32);

    fn is_dead(&self, actor: ActorHandle) -> bool {
        self.attribute(actor, Attribute::Hp) <= 0
    }

    fn is_unconscious(&self, _actor: ActorHandle) -> bool {
        false
    }

    fn reset_ai(&mut self, _actor: ActorHandle) {}

    fn mark_companion(&mut self, _actor: ActorHandle) {}

    fn set_overlays(&mut self, actor: ActorHandle, overlays: &[i32]);

    fn set_protections(&mut self, actor: ActorHandle, protections: &[i32; 8]);

    fn set_talents(&mut self, actor: ActorHandle, talents: &[i32; 4]);

    fn set_body_state(&mut self, actor: ActorHandle, state: i32);

    fn equip(&mut self, actor: ActorHandle, slot: EquipSlot, item: &str) -> Option<ItemHandle>;

    /// Returns the handle of the item that left the slot, if any.
    fn unequip(&mut self, actor: ActorHandle, slot: EquipSlot) -> Option<ItemHandle>;

    fn drop_item(&mut self, actor: ActorHandle, item: &DropItem) -> Option<ItemHandle>;

    fn remove_ground_item(&mut self, item: &TakeItem) -> bool;

    fn set_active_spell(&mut self, actor: ActorHandle, spell: Option<&str>);

    fn cast_spell(&mut self, actor: ActorHandle, cast: &SpellCast, target: Option<ActorHandle>);

    fn apply_hit(&mut self, attacker: ActorHandle, target: HitTarget, attack: &Attack);

    fn is_talking_to_player(&self, _actor: ActorHandle) -> bool {
        false
    }

    fn player_in_dialog(&self) -> bool {
        false
    }

    fn local_player_dead(&self) -> bool {
        self.local_player().is_some_and(|actor| self.is_dead(actor))
    }

    fn revive_local_player(&mut self);

    fn lookup_unique_name(&self, name: &str) -> Option<ActorHandle>;

    fn rebuild_unique_names(&mut self);

    /// Registry lookup that rebuilds once on a miss.
    fn resolve_unique_name(&mut self, name: &str) -> Option<ActorHandle> {
        if let Some(actor) = self.lookup_unique_name(name) {
            return Some(actor);
        }
        self.rebuild_unique_names();
        self.lookup_unique_name(name)
    }
}
