use std::fmt;

use glam::Vec3;

use super::transport::{Delivery, Reliability};

pub const PROTOCOL_VERSION: u8 = 1;
pub const MAX_PACKET_SIZE: usize = 16384;
pub const DEFAULT_PORT: u16 = 1234;

pub const MAX_NAME_LEN: usize = 64;
pub const MAX_NICKNAME_LEN: usize = 32;
pub const MAX_INSTANCE_NAME_LEN: usize = 64;
pub const MAX_UNIQUE_NAME_LEN: usize = 96;
pub const MAX_OVERLAYS: usize = 96;
pub const MAX_SPELL_CASTS: usize = 32;
pub const MAX_ATTACKS: usize = 32;

/// Wire sentinel for an empty item slot.
pub const NO_ITEM: &str = "NULL";
pub const HOST_ID: &str = "HOST";
pub const PEER_ID_PREFIX: &str = "FRIEND_";

pub const WEAPON_MODE_NONE: i32 = 0;
pub const WEAPON_MODE_MAGIC: i32 = 7;

pub const RELIABLE_CHANNEL: u8 = 0;
pub const MOTION_CHANNEL: u8 = 1;

/// Ids that belong to session participants rather than world actors.
pub fn is_coop_player(id: &str) -> bool {
    id == HOST_ID || id.starts_with(PEER_ID_PREFIX)
}

pub fn peer_name(identity: u32) -> String {
    format!("{PEER_ID_PREFIX}{identity}")
}

/// Maps the wire sentinel to an optional item reference.
pub fn item_ref(name: &str) -> Option<&str> {
    if name.is_empty() || name == NO_ITEM {
        None
    } else {
        Some(name)
    }
}

pub fn item_name(item: Option<&str>) -> String {
    item.unwrap_or(NO_ITEM).to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PacketKind {
    JoinGame = 1,
    PlayerDisconnect = 2,
    PlayerStateUpdate = 3,
}

impl PacketKind {
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            1 => Some(Self::JoinGame),
            2 => Some(Self::PlayerDisconnect),
            3 => Some(Self::PlayerStateUpdate),
            _ => None,
        }
    }

    pub fn tag(self) -> u8 {
        self as u8
    }
}

/// One independently tracked slice of actor state. Tags 16 and 17 are
/// reserved and never appear on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum UpdateType {
    Position = 0,
    Heading = 1,
    Animation = 2,
    WeaponMode = 3,
    Init = 4,
    Destroy = 5,
    Attacks = 6,
    Armor = 7,
    Weapons = 8,
    Hp = 9,
    Time = 10,
    Hand = 11,
    MagicSetup = 12,
    SpellCasts = 13,
    Revived = 14,
    Protections = 15,
    Talents = 18,
    BodyState = 19,
    Overlays = 20,
    DropItem = 21,
    TakeItem = 22,
}

impl UpdateType {
    pub const ALL: [UpdateType; 21] = [
        UpdateType::Position,
        UpdateType::Heading,
        UpdateType::Animation,
        UpdateType::WeaponMode,
        UpdateType::Init,
        UpdateType::Destroy,
        UpdateType::Attacks,
        UpdateType::Armor,
        UpdateType::Weapons,
        UpdateType::Hp,
        UpdateType::Time,
        UpdateType::Hand,
        UpdateType::MagicSetup,
        UpdateType::SpellCasts,
        UpdateType::Revived,
        UpdateType::Protections,
        UpdateType::Talents,
        UpdateType::BodyState,
        UpdateType::Overlays,
        UpdateType::DropItem,
        UpdateType::TakeItem,
    ];

    pub fn from_tag(tag: u8) -> Option<Self> {
        Self::ALL.iter().copied().find(|kind| kind.tag() == tag)
    }

    pub fn tag(self) -> u8 {
        self as u8
    }

    pub fn as_str(self) -> &'static str {
        match self {
            UpdateType::Position => "position",
            UpdateType::Heading => "heading",
            UpdateType::Animation => "animation",
            UpdateType::WeaponMode => "weapon_mode",
            UpdateType::Init => "init",
            UpdateType::Destroy => "destroy",
            UpdateType::Attacks => "attacks",
            UpdateType::Armor => "armor",
            UpdateType::Weapons => "weapons",
            UpdateType::Hp => "hp",
            UpdateType::Time => "time",
            UpdateType::Hand => "hand",
            UpdateType::MagicSetup => "magic_setup",
            UpdateType::SpellCasts => "spell_casts",
            UpdateType::Revived => "revived",
            UpdateType::Protections => "protections",
            UpdateType::Talents => "talents",
            UpdateType::BodyState => "body_state",
            UpdateType::Overlays => "overlays",
            UpdateType::DropItem => "drop_item",
            UpdateType::TakeItem => "take_item",
        }
    }

    /// Continuous facets tolerate loss; the next change supersedes them.
    pub fn delivery(self) -> Delivery {
        match self {
            UpdateType::Position | UpdateType::Heading | UpdateType::Animation => Delivery {
                channel: MOTION_CHANNEL,
                reliability: Reliability::Unreliable,
            },
            _ => Delivery::reliable(RELIABLE_CHANNEL),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InitState {
    pub instance_id: i32,
    pub nickname: String,
    pub position: Vec3,
    pub body_tex: i32,
    pub head_tex: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpellCast {
    pub target: String,
    pub spell_instance: i32,
    pub level: i32,
    pub charge: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Attack {
    pub target: String,
    pub damage: f32,
    pub unconscious: i32,
    pub dead: bool,
    pub finish: bool,
    pub damage_mode: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DropItem {
    pub item: String,
    pub unique_name: String,
    pub count: i32,
    pub flags: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TakeItem {
    pub item: String,
    pub unique_name: String,
    pub count: i32,
    pub flags: i32,
    pub position: Vec3,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StateUpdate {
    Position(Vec3),
    Heading(f32),
    Animation(i32),
    WeaponMode(i32),
    Init(InitState),
    Destroy,
    Attacks(Vec<Attack>),
    Armor(String),
    Weapons { melee: String, ranged: String },
    Hp { hp: i32, hp_max: i32 },
    Time { hour: i32, minute: i32 },
    Hand { left: String, right: String },
    MagicSetup(String),
    SpellCasts(Vec<SpellCast>),
    Revived(String),
    Protections([i32; 8]),
    Talents([i32; 4]),
    BodyState(i32),
    Overlays(Vec<i32>),
    DropItem(DropItem),
    TakeItem(TakeItem),
}

impl StateUpdate {
    pub fn update_type(&self) -> UpdateType {
        match self {
            StateUpdate::Position(_) => UpdateType::Position,
            StateUpdate::Heading(_) => UpdateType::Heading,
            StateUpdate::Animation(_) => UpdateType::Animation,
            StateUpdate::WeaponMode(_) => UpdateType::WeaponMode,
            StateUpdate::Init(_) => UpdateType::Init,
            StateUpdate::Destroy => UpdateType::Destroy,
            StateUpdate::Attacks(_) => UpdateType::Attacks,
            StateUpdate::Armor(_) => UpdateType::Armor,
            StateUpdate::Weapons { .. } => UpdateType::Weapons,
            StateUpdate::Hp { .. } => UpdateType::Hp,
            StateUpdate::Time { .. } => UpdateType::Time,
            StateUpdate::Hand { .. } => UpdateType::Hand,
            StateUpdate::MagicSetup(_) => UpdateType::MagicSetup,
            StateUpdate::SpellCasts(_) => UpdateType::SpellCasts,
            StateUpdate::Revived(_) => UpdateType::Revived,
            StateUpdate::Protections(_) => UpdateType::Protections,
            StateUpdate::Talents(_) => UpdateType::Talents,
            StateUpdate::BodyState(_) => UpdateType::BodyState,
            StateUpdate::Overlays(_) => UpdateType::Overlays,
            StateUpdate::DropItem(_) => UpdateType::DropItem,
            StateUpdate::TakeItem(_) => UpdateType::TakeItem,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PacketBody {
    JoinGame {
        connect_id: u32,
        name: String,
    },
    PlayerDisconnect {
        name: String,
        nickname: Option<String>,
    },
    StateUpdate(StateUpdate),
}

#[derive(Debug, Clone, PartialEq)]
pub struct NetworkPacket {
    pub sender_id: Option<String>,
    pub body: PacketBody,
}

impl NetworkPacket {
    pub fn join_game(connect_id: u32, name: impl Into<String>) -> Self {
        Self {
            sender_id: None,
            body: PacketBody::JoinGame {
                connect_id,
                name: name.into(),
            },
        }
    }

    pub fn disconnect(name: impl Into<String>, nickname: Option<String>) -> Self {
        Self {
            sender_id: None,
            body: PacketBody::PlayerDisconnect {
                name: name.into(),
                nickname: nickname.filter(|n| !n.is_empty()),
            },
        }
    }

    /// An empty sender is stored as `None`.
    pub fn update(sender_id: Option<String>, update: StateUpdate) -> Self {
        Self {
            sender_id: sender_id.filter(|s| !s.is_empty()),
            body: PacketBody::StateUpdate(update),
        }
    }

    pub fn with_sender(mut self, sender_id: impl Into<String>) -> Self {
        self.sender_id = Some(sender_id.into()).filter(|s| !s.is_empty());
        self
    }

    pub fn kind(&self) -> PacketKind {
        match self.body {
            PacketBody::JoinGame { .. } => PacketKind::JoinGame,
            PacketBody::PlayerDisconnect { .. } => PacketKind::PlayerDisconnect,
            PacketBody::StateUpdate(_) => PacketKind::PlayerStateUpdate,
        }
    }

    /// Sender id, with an empty string treated as absent.
    pub fn sender(&self) -> Option<&str> {
        self.sender_id.as_deref().filter(|s| !s.is_empty())
    }

    pub fn state_update(&self) -> Option<&StateUpdate> {
        match &self.body {
            PacketBody::StateUpdate(update) => Some(update),
            _ => None,
        }
    }

    pub fn delivery(&self) -> Delivery {
        match &self.body {
            PacketBody::StateUpdate(update) => update.update_type().delivery(),
            _ => Delivery::reliable(RELIABLE_CHANNEL),
        }
    }
}

impl fmt::Display for NetworkPacket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sender = self.sender().unwrap_or("-");
        match &self.body {
            PacketBody::JoinGame { connect_id, name } => {
                write!(f, "join(sender={sender}, connect_id={connect_id}, name={name})")
            }
            PacketBody::PlayerDisconnect { name, nickname } => write!(
                f,
                "disconnect(sender={sender}, name={name}, nickname={})",
                nickname.as_deref().unwrap_or("-")
            ),
            PacketBody::StateUpdate(update) => {
                write!(f, "update(sender={sender}, type={})", update.update_type().as_str())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_tags_are_stable() {
        assert_eq!(UpdateType::Position.tag(), 0);
        assert_eq!(UpdateType::Destroy.tag(), 5);
        assert_eq!(UpdateType::Protections.tag(), 15);
        assert_eq!(UpdateType::Talents.tag(), 18);
        assert_eq!(UpdateType::TakeItem.tag(), 22);
        assert_eq!(UpdateType::from_tag(16), None);
        assert_eq!(UpdateType::from_tag(17), None);
        assert_eq!(UpdateType::from_tag(23), None);

        for kind in UpdateType::ALL {
            assert_eq!(UpdateType::from_tag(kind.tag()), Some(kind));
        }
    }

    #[test]
    fn test_coop_player_ids() {
        assert!(is_coop_player("HOST"));
        assert!(is_coop_player(&peer_name(3)));
        assert!(!is_coop_player("PC_HERO"));
        assert_eq!(peer_name(12), "FRIEND_12");
    }

    #[test]
    fn test_item_sentinel() {
        assert_eq!(item_ref(NO_ITEM), None);
        assert_eq!(item_ref(""), None);
        assert_eq!(item_ref("ITAR_BAU_L"), Some("ITAR_BAU_L"));
        assert_eq!(item_name(None), NO_ITEM);
    }

    #[test]
    fn test_empty_sender_is_absent() {
        let packet = NetworkPacket::update(Some(String::new()), StateUpdate::Destroy);
        assert_eq!(packet.sender_id, None);
        assert_eq!(packet.sender(), None);
        assert_eq!(packet.clone().with_sender("").sender_id, None);
        assert_eq!(packet.with_sender("HOST").sender(), Some("HOST"));
    }

    #[test]
    fn test_motion_facets_are_unreliable() {
        let packet = NetworkPacket::update(None, StateUpdate::Heading(10.0));
        assert_eq!(packet.delivery().reliability, Reliability::Unreliable);
        let packet = NetworkPacket::update(None, StateUpdate::Hp { hp: 1, hp_max: 2 });
        assert_eq!(packet.delivery().reliability, Reliability::Reliable);
        let packet = NetworkPacket::join_game(7, "FRIEND_1");
        assert_eq!(packet.delivery().channel, RELIABLE_CHANNEL);
    }
}
