use std::collections::VecDeque;

use glam::Vec3;

use super::tracker::{Debounced, DirtySet};
use crate::actor::ActorSnapshot;
use crate::config::SyncConfig;
use crate::net::{
    item_name, Attack, DropItem, InitState, NetworkPacket, SpellCast, StateUpdate, TakeItem,
    UpdateType, MAX_ATTACKS, MAX_SPELL_CASTS, WEAPON_MODE_MAGIC,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShadowKind {
    /// The local player. Tracks every facet.
    PointOfView,
    /// A world actor the host broadcasts to followers.
    Broadcast,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Appearance {
    pub nickname: String,
    pub body_tex: i32,
    pub head_tex: i32,
}

/// Per-tick inputs shared by every shadow.
#[derive(Debug, Clone, Copy)]
pub struct PulseContext<'a> {
    pub now_ms: u64,
    pub is_host: bool,
    pub time_of_day: (i32, i32),
    pub config: &'a SyncConfig,
}

/// Values as of the last flush. `None` means never sent.
#[derive(Debug, Clone, Default)]
struct SyncedState {
    position: Option<Vec3>,
    heading: Option<f32>,
    weapon_mode: Option<i32>,
    armor: Option<String>,
    weapons: Option<(String, String)>,
    hp: Option<(i32, i32)>,
    magic: Option<String>,
    body_state: Option<i32>,
    protections: Option<[i32; 8]>,
    talents: Option<[i32; 4]>,
    overlays: Option<Vec<i32>>,
    last_time_sync_ms: Option<u64>,
}

fn sorted(values: &[i32]) -> Vec<i32> {
    let mut values = values.to_vec();
    values.sort_unstable();
    values
}

/// Last-broadcast state of one locally owned actor.
#[derive(Debug)]
pub struct LocalActorShadow {
    name: String,
    kind: ShadowKind,
    appearance: Appearance,
    synced: SyncedState,
    dirty: DirtySet,
    initialized: bool,
    destroyed: bool,
    current: Option<ActorSnapshot>,
    time_of_day: (i32, i32),
    hand: Debounced<(String, String)>,
    last_animation: Option<i32>,
    pending_animations: VecDeque<i32>,
    attacks: Vec<Attack>,
    spell_casts: Vec<SpellCast>,
    drops: VecDeque<DropItem>,
    takes: VecDeque<TakeItem>,
    revived: Option<String>,
}

impl LocalActorShadow {
    pub fn point_of_view(name: impl Into<String>, appearance: Appearance, config: &SyncConfig) -> Self {
        Self::new(name.into(), ShadowKind::PointOfView, appearance, config.hand_debounce_ms)
    }

    pub fn broadcast(name: impl Into<String>) -> Self {
        Self::new(name.into(), ShadowKind::Broadcast, Appearance::default(), 0)
    }

    fn new(name: String, kind: ShadowKind, appearance: Appearance, hand_debounce_ms: u64) -> Self {
        Self {
            name,
            kind,
            appearance,
            synced: SyncedState::default(),
            dirty: DirtySet::new(),
            initialized: false,
            destroyed: false,
            current: None,
            time_of_day: (0, 0),
            hand: Debounced::new(hand_debounce_ms),
            last_animation: None,
            pending_animations: VecDeque::new(),
            attacks: Vec::new(),
            spell_casts: Vec::new(),
            drops: VecDeque::new(),
            takes: VecDeque::new(),
            revived: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ShadowKind {
        self.kind
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    pub fn has_pending(&self) -> bool {
        !self.dirty.is_empty()
    }

    pub fn set_appearance(&mut self, appearance: Appearance) {
        self.appearance = appearance;
    }

    /// Renames the subject. Later packets carry the new id.
    pub fn rename(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Forgets everything sent so the full state goes out again.
    pub fn reinit(&mut self) {
        self.synced = SyncedState::default();
        self.initialized = false;
        self.hand.reset();
        self.drops.clear();
        self.takes.clear();
        self.pending_animations.clear();
        if let Some(id) = self.last_animation {
            self.pending_animations.push_back(id);
        }
    }

    pub fn mark_destroyed(&mut self) {
        self.destroyed = true;
        self.dirty.mark(UpdateType::Destroy);
    }

    pub fn push_attack(&mut self, attack: Attack) {
        self.attacks.push(attack);
    }

    pub fn push_spell_cast(&mut self, cast: SpellCast) {
        self.spell_casts.push(cast);
    }

    pub fn report_drop(&mut self, item: DropItem) {
        self.drops.push_back(item);
    }

    pub fn report_take(&mut self, item: TakeItem) {
        self.takes.push_back(item);
    }

    pub fn report_revive(&mut self, name: impl Into<String>) {
        self.revived = Some(name.into());
        self.dirty.mark(UpdateType::Revived);
    }

    /// Compares the actor against the last flush and marks changed facets.
    pub fn pulse(&mut self, snapshot: &ActorSnapshot, ctx: &PulseContext<'_>) {
        if self.destroyed {
            return;
        }
        let config = ctx.config;

        if !self.initialized {
            self.dirty.mark(UpdateType::Init);
            self.initialized = true;
        }

        let moved = self
            .synced
            .position
            .is_none_or(|last| last.distance(snapshot.position) > config.position_threshold);
        if moved {
            self.dirty.mark(UpdateType::Position);
        }

        let turned = self
            .synced
            .heading
            .is_none_or(|last| (snapshot.heading - last).abs() > config.heading_threshold);
        if turned {
            self.dirty.mark(UpdateType::Heading);
        }

        let overlays_changed = self
            .synced
            .overlays
            .as_ref()
            .is_none_or(|last| *last != sorted(&snapshot.overlays));
        if overlays_changed {
            self.dirty.mark(UpdateType::Overlays);
        }

        self.pulse_animation(snapshot, config.max_pending_animations);

        if self.synced.weapon_mode != Some(snapshot.weapon_mode) {
            self.dirty.mark(UpdateType::WeaponMode);
        }
        if !self.attacks.is_empty() {
            self.dirty.mark(UpdateType::Attacks);
        }
        if !self.spell_casts.is_empty() {
            self.dirty.mark(UpdateType::SpellCasts);
        }

        self.pulse_magic(snapshot);

        let skip_hp = config.skips_hp_sync(&snapshot.object_name, snapshot.hp);
        if !skip_hp && self.synced.hp != Some((snapshot.hp, snapshot.hp_max)) {
            self.dirty.mark(UpdateType::Hp);
        }

        if !self.drops.is_empty() {
            self.dirty.mark(UpdateType::DropItem);
        }
        if !self.takes.is_empty() {
            self.dirty.mark(UpdateType::TakeItem);
        }

        if self.kind == ShadowKind::PointOfView {
            self.pulse_player(snapshot, ctx);
        }

        self.time_of_day = ctx.time_of_day;
        self.current = Some(snapshot.clone());
    }

    fn pulse_animation(&mut self, snapshot: &ActorSnapshot, max_pending: usize) {
        if !snapshot.has_model {
            return;
        }
        if let Some(id) = snapshot.animation.filter(|id| self.last_animation != Some(*id)) {
            if self.pending_animations.len() >= max_pending.max(1) {
                self.pending_animations.pop_front();
            }
            self.pending_animations.push_back(id);
            self.last_animation = Some(id);
        }
        if !self.pending_animations.is_empty() {
            self.dirty.mark(UpdateType::Animation);
        }
    }

    fn pulse_magic(&mut self, snapshot: &ActorSnapshot) {
        if !snapshot.has_model || snapshot.hp == 0 {
            return;
        }
        let wanted = if snapshot.weapon_mode == WEAPON_MODE_MAGIC {
            match &snapshot.active_spell {
                Some(spell) => Some(spell.as_str()),
                None => return,
            }
        } else {
            None
        };
        if self.synced.magic.as_deref() != wanted {
            self.dirty.mark(UpdateType::MagicSetup);
        }
    }

    fn pulse_player(&mut self, snapshot: &ActorSnapshot, ctx: &PulseContext<'_>) {
        let armor = item_name(snapshot.armor.as_deref());
        if self.synced.armor.as_ref() != Some(&armor) {
            self.dirty.mark(UpdateType::Armor);
        }

        if snapshot.is_human {
            let weapons = (
                item_name(snapshot.melee_weapon.as_deref()),
                item_name(snapshot.ranged_weapon.as_deref()),
            );
            if self.synced.weapons.as_ref() != Some(&weapons) {
                self.dirty.mark(UpdateType::Weapons);
            }
        }

        if self.synced.body_state != Some(snapshot.body_state) {
            self.dirty.mark(UpdateType::BodyState);
        }
        if self.synced.protections != Some(snapshot.protections) {
            self.dirty.mark(UpdateType::Protections);
        }
        if self.synced.talents != Some(snapshot.talents) {
            self.dirty.mark(UpdateType::Talents);
        }

        let hand = (
            item_name(snapshot.left_hand.as_deref()),
            item_name(snapshot.right_hand.as_deref()),
        );
        if self.hand.observe(hand, ctx.now_ms).is_some() {
            self.dirty.mark(UpdateType::Hand);
        }

        if ctx.is_host {
            let due = self
                .synced
                .last_time_sync_ms
                .is_none_or(|last| ctx.now_ms.saturating_sub(last) >= ctx.config.time_sync_interval_ms);
            if due {
                self.dirty.mark(UpdateType::Time);
                self.synced.last_time_sync_ms = Some(ctx.now_ms);
            }
        }
    }

    /// One packet per pending facet, built from the latest pulse.
    pub fn flush(&mut self, is_host: bool) -> Vec<NetworkPacket> {
        let sender = is_host.then(|| self.name.clone());
        let pending: Vec<UpdateType> = self.dirty.drain().collect();

        pending
            .into_iter()
            .filter_map(|kind| self.materialize(kind))
            .map(|update| NetworkPacket::update(sender.clone(), update))
            .collect()
    }

    fn materialize(&mut self, kind: UpdateType) -> Option<StateUpdate> {
        if kind == UpdateType::Destroy {
            return Some(StateUpdate::Destroy);
        }
        if kind == UpdateType::Revived {
            return self.revived.take().map(StateUpdate::Revived);
        }

        let current = self.current.as_ref()?;
        let update = match kind {
            UpdateType::Init => StateUpdate::Init(InitState {
                instance_id: current.instance_id,
                nickname: self.appearance.nickname.clone(),
                position: current.position,
                body_tex: self.appearance.body_tex,
                head_tex: self.appearance.head_tex,
            }),
            UpdateType::Position => {
                self.synced.position = Some(current.position);
                StateUpdate::Position(current.position)
            }
            UpdateType::Heading => {
                self.synced.heading = Some(current.heading);
                StateUpdate::Heading(current.heading)
            }
            UpdateType::Animation => StateUpdate::Animation(self.pending_animations.pop_front()?),
            UpdateType::WeaponMode => {
                self.synced.weapon_mode = Some(current.weapon_mode);
                StateUpdate::WeaponMode(current.weapon_mode)
            }
            UpdateType::Attacks => {
                let count = self.attacks.len().min(MAX_ATTACKS);
                StateUpdate::Attacks(self.attacks.drain(..count).collect())
            }
            UpdateType::SpellCasts => {
                let count = self.spell_casts.len().min(MAX_SPELL_CASTS);
                StateUpdate::SpellCasts(self.spell_casts.drain(..count).collect())
            }
            UpdateType::Armor => {
                let armor = item_name(current.armor.as_deref());
                self.synced.armor = Some(armor.clone());
                StateUpdate::Armor(armor)
            }
            UpdateType::Weapons => {
                let melee = item_name(current.melee_weapon.as_deref());
                let ranged = item_name(current.ranged_weapon.as_deref());
                self.synced.weapons = Some((melee.clone(), ranged.clone()));
                StateUpdate::Weapons { melee, ranged }
            }
            UpdateType::Hp => {
                self.synced.hp = Some((current.hp, current.hp_max));
                StateUpdate::Hp {
                    hp: current.hp,
                    hp_max: current.hp_max,
                }
            }
            UpdateType::Time => {
                let (hour, minute) = self.time_of_day;
                StateUpdate::Time { hour, minute }
            }
            UpdateType::Hand => {
                let (left, right) = self.hand.stable()?.clone();
                StateUpdate::Hand { left, right }
            }
            UpdateType::MagicSetup => {
                let spell = if current.weapon_mode == WEAPON_MODE_MAGIC {
                    current.active_spell.clone()
                } else {
                    None
                };
                let name = item_name(spell.as_deref());
                self.synced.magic = spell;
                StateUpdate::MagicSetup(name)
            }
            UpdateType::Protections => {
                self.synced.protections = Some(current.protections);
                StateUpdate::Protections(current.protections)
            }
            UpdateType::Talents => {
                self.synced.talents = Some(current.talents);
                StateUpdate::Talents(current.talents)
            }
            UpdateType::BodyState => {
                self.synced.body_state = Some(current.body_state);
                StateUpdate::BodyState(current.body_state)
            }
            UpdateType::Overlays => {
                self.synced.overlays = Some(sorted(&current.overlays));
                StateUpdate::Overlays(current.overlays.clone())
            }
            UpdateType::DropItem => StateUpdate::DropItem(self.drops.pop_front()?),
            UpdateType::TakeItem => StateUpdate::TakeItem(self.takes.pop_front()?),
            UpdateType::Destroy | UpdateType::Revived => return None,
        };
        Some(update)
    }
}
