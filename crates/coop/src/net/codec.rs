use glam::Vec3;

use super::protocol::{
    Attack, DropItem, InitState, MAX_ATTACKS, MAX_INSTANCE_NAME_LEN, MAX_NAME_LEN,
    MAX_NICKNAME_LEN, MAX_OVERLAYS, MAX_PACKET_SIZE, MAX_SPELL_CASTS, MAX_UNIQUE_NAME_LEN,
    NetworkPacket, PROTOCOL_VERSION, PacketBody, PacketKind, SpellCast, StateUpdate, TakeItem,
    UpdateType,
};

const WORLD_BOUND: f32 = 100_000.0;

/// Decoding role. Text from clients is sanitized and must not claim a sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeMode {
    Client,
    Server,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("empty packet")]
    Empty,
    #[error("packet of {size} bytes exceeds the size limit")]
    Oversize { size: usize },
    #[error("unsupported protocol version {0}")]
    Version(u8),
    #[error("unknown packet type {0}")]
    UnknownPacketType(u8),
    #[error("unknown update type {0}")]
    UnknownUpdateType(u8),
    #[error("truncated packet while reading {0}")]
    Truncated(&'static str),
    #[error("{field} length {len} exceeds {max}")]
    TooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },
    #[error("{0} out of range")]
    OutOfRange(&'static str),
    #[error("{0} is not valid text")]
    InvalidText(&'static str),
    #[error("{0} is not a boolean")]
    InvalidBool(&'static str),
    #[error("sender id not allowed from client")]
    ForbiddenSender,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EncodeError {
    #[error("{field} length {len} exceeds {max}")]
    StringTooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },
    #[error("{field} has {count} entries, limit is {max}")]
    TooManyEntries {
        field: &'static str,
        count: usize,
        max: usize,
    },
    #[error("encoded packet of {size} bytes exceeds the size limit")]
    Oversize { size: usize },
}

struct PacketWriter {
    buf: Vec<u8>,
}

impl PacketWriter {
    fn new() -> Self {
        Self {
            buf: Vec::with_capacity(64),
        }
    }

    fn u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    fn u16(&mut self, value: u16) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    fn u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    fn i32(&mut self, value: i32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    fn f32(&mut self, value: f32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    fn bool(&mut self, value: bool) {
        self.u8(u8::from(value));
    }

    fn vec3(&mut self, value: Vec3) {
        self.f32(value.x);
        self.f32(value.y);
        self.f32(value.z);
    }

    fn string(&mut self, field: &'static str, value: &str, max: usize) -> Result<(), EncodeError> {
        let len = value.len();
        if len > max {
            return Err(EncodeError::StringTooLong { field, len, max });
        }
        self.u16(len as u16);
        self.buf.extend_from_slice(value.as_bytes());
        Ok(())
    }

    fn count(&mut self, field: &'static str, count: usize, max: usize) -> Result<(), EncodeError> {
        if count > max {
            return Err(EncodeError::TooManyEntries { field, count, max });
        }
        self.u8(count as u8);
        Ok(())
    }

    fn finish(self) -> Result<Vec<u8>, EncodeError> {
        if self.buf.len() > MAX_PACKET_SIZE {
            return Err(EncodeError::Oversize {
                size: self.buf.len(),
            });
        }
        Ok(self.buf)
    }
}

struct PacketReader<'a> {
    data: &'a [u8],
    offset: usize,
    mode: DecodeMode,
}

impl<'a> PacketReader<'a> {
    fn new(data: &'a [u8], mode: DecodeMode) -> Self {
        Self {
            data,
            offset: 0,
            mode,
        }
    }

    fn take(&mut self, len: usize, field: &'static str) -> Result<&'a [u8], ProtocolError> {
        let end = self
            .offset
            .checked_add(len)
            .filter(|&end| end <= self.data.len())
            .ok_or(ProtocolError::Truncated(field))?;
        let bytes = &self.data[self.offset..end];
        self.offset = end;
        Ok(bytes)
    }

    fn array<const N: usize>(&mut self, field: &'static str) -> Result<[u8; N], ProtocolError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N, field)?);
        Ok(out)
    }

    fn u8(&mut self, field: &'static str) -> Result<u8, ProtocolError> {
        Ok(self.take(1, field)?[0])
    }

    fn u16(&mut self, field: &'static str) -> Result<u16, ProtocolError> {
        Ok(u16::from_le_bytes(self.array(field)?))
    }

    fn u32(&mut self, field: &'static str) -> Result<u32, ProtocolError> {
        Ok(u32::from_le_bytes(self.array(field)?))
    }

    fn bool(&mut self, field: &'static str) -> Result<bool, ProtocolError> {
        match self.u8(field)? {
            0 => Ok(false),
            1 => Ok(true),
            _ => Err(ProtocolError::InvalidBool(field)),
        }
    }

    fn int_in(&mut self, field: &'static str, min: i32, max: i32) -> Result<i32, ProtocolError> {
        let value = i32::from_le_bytes(self.array(field)?);
        if (min..=max).contains(&value) {
            Ok(value)
        } else {
            Err(ProtocolError::OutOfRange(field))
        }
    }

    fn float_in(&mut self, field: &'static str, min: f32, max: f32) -> Result<f32, ProtocolError> {
        let value = f32::from_le_bytes(self.array(field)?);
        if value.is_finite() && value >= min && value <= max {
            Ok(value)
        } else {
            Err(ProtocolError::OutOfRange(field))
        }
    }

    fn position(&mut self, field: &'static str) -> Result<Vec3, ProtocolError> {
        let x = self.float_in(field, -WORLD_BOUND, WORLD_BOUND)?;
        let y = self.float_in(field, -WORLD_BOUND, WORLD_BOUND)?;
        let z = self.float_in(field, -WORLD_BOUND, WORLD_BOUND)?;
        Ok(Vec3::new(x, y, z))
    }

    fn count(&mut self, field: &'static str, max: usize) -> Result<usize, ProtocolError> {
        let len = self.u8(field)? as usize;
        if len > max {
            return Err(ProtocolError::TooLong { field, len, max });
        }
        Ok(len)
    }

    fn string(&mut self, field: &'static str, max: usize) -> Result<String, ProtocolError> {
        let len = self.u16(field)? as usize;
        if len > max {
            return Err(ProtocolError::TooLong { field, len, max });
        }
        let raw = self.take(len, field)?;
        match self.mode {
            DecodeMode::Client => String::from_utf8(raw.to_vec())
                .map_err(|_| ProtocolError::InvalidText(field)),
            DecodeMode::Server => sanitize(raw, max).ok_or(ProtocolError::InvalidText(field)),
        }
    }
}

/// Keeps printable ASCII only. Fails when a non-empty input sanitizes to nothing.
fn sanitize(raw: &[u8], max: usize) -> Option<String> {
    let mut text: String = raw
        .iter()
        .filter(|&&b| (32..=126).contains(&b))
        .map(|&b| b as char)
        .collect();
    text.truncate(max);
    if text.is_empty() && !raw.is_empty() {
        None
    } else {
        Some(text)
    }
}

pub fn encode(packet: &NetworkPacket) -> Result<Vec<u8>, EncodeError> {
    let mut w = PacketWriter::new();
    w.u8(PROTOCOL_VERSION);
    w.u8(packet.kind().tag());

    match packet.sender() {
        Some(sender) => {
            w.bool(true);
            w.string("sender id", sender, MAX_NAME_LEN)?;
        }
        None => w.bool(false),
    }

    match &packet.body {
        PacketBody::JoinGame { connect_id, name } => {
            w.u32(*connect_id);
            w.string("join name", name, MAX_NAME_LEN)?;
        }
        PacketBody::PlayerDisconnect { name, nickname } => {
            w.string("disconnect name", name, MAX_NAME_LEN)?;
            match nickname {
                Some(nickname) => {
                    w.bool(true);
                    w.string("disconnect nickname", nickname, MAX_NICKNAME_LEN)?;
                }
                None => w.bool(false),
            }
        }
        PacketBody::StateUpdate(update) => {
            w.u8(update.update_type().tag());
            encode_update(&mut w, update)?;
        }
    }

    w.finish()
}

fn encode_update(w: &mut PacketWriter, update: &StateUpdate) -> Result<(), EncodeError> {
    match update {
        StateUpdate::Init(init) => {
            w.i32(init.instance_id);
            w.string("nickname", &init.nickname, MAX_NICKNAME_LEN)?;
            w.vec3(init.position);
            w.i32(init.body_tex);
            w.i32(init.head_tex);
        }
        StateUpdate::Position(position) => w.vec3(*position),
        StateUpdate::Heading(heading) => w.f32(*heading),
        StateUpdate::Animation(id) => w.i32(*id),
        StateUpdate::WeaponMode(mode) => w.i32(*mode),
        StateUpdate::MagicSetup(spell) => {
            w.string("magic setup spell", spell, MAX_INSTANCE_NAME_LEN)?;
        }
        StateUpdate::SpellCasts(casts) => {
            w.count("spell casts", casts.len(), MAX_SPELL_CASTS)?;
            for cast in casts {
                w.string("spell cast target", &cast.target, MAX_UNIQUE_NAME_LEN)?;
                w.i32(cast.spell_instance);
                w.i32(cast.level);
                w.i32(cast.charge);
            }
        }
        StateUpdate::Armor(armor) => w.string("armor", armor, MAX_INSTANCE_NAME_LEN)?,
        StateUpdate::Weapons { melee, ranged } => {
            w.string("melee weapon", melee, MAX_INSTANCE_NAME_LEN)?;
            w.string("ranged weapon", ranged, MAX_INSTANCE_NAME_LEN)?;
        }
        StateUpdate::Hp { hp, hp_max } => {
            w.i32(*hp);
            w.i32(*hp_max);
        }
        StateUpdate::BodyState(state) => w.i32(*state),
        StateUpdate::Overlays(overlays) => {
            w.count("overlays", overlays.len(), MAX_OVERLAYS)?;
            for id in overlays {
                w.i32(*id);
            }
        }
        StateUpdate::Protections(values) => values.iter().for_each(|v| w.i32(*v)),
        StateUpdate::Talents(values) => values.iter().for_each(|v| w.i32(*v)),
        StateUpdate::Hand { left, right } => {
            w.string("left hand item", left, MAX_INSTANCE_NAME_LEN)?;
            w.string("right hand item", right, MAX_INSTANCE_NAME_LEN)?;
        }
        StateUpdate::Time { hour, minute } => {
            w.i32(*hour);
            w.i32(*minute);
        }
        StateUpdate::Revived(name) => w.string("revived name", name, MAX_NAME_LEN)?,
        StateUpdate::Attacks(attacks) => {
            w.count("attacks", attacks.len(), MAX_ATTACKS)?;
            for attack in attacks {
                w.string("attack target", &attack.target, MAX_UNIQUE_NAME_LEN)?;
                w.f32(attack.damage);
                w.i32(attack.unconscious);
                w.bool(attack.dead);
                w.bool(attack.finish);
                w.u32(attack.damage_mode);
            }
        }
        StateUpdate::DropItem(drop) => {
            w.string("dropped item", &drop.item, MAX_INSTANCE_NAME_LEN)?;
            w.string("dropped item unique name", &drop.unique_name, MAX_UNIQUE_NAME_LEN)?;
            w.i32(drop.count);
            w.i32(drop.flags);
        }
        StateUpdate::TakeItem(take) => {
            w.string("taken item", &take.item, MAX_INSTANCE_NAME_LEN)?;
            w.string("taken item unique name", &take.unique_name, MAX_UNIQUE_NAME_LEN)?;
            w.i32(take.count);
            w.i32(take.flags);
            w.vec3(take.position);
        }
        StateUpdate::Destroy => {}
    }
    Ok(())
}

pub fn decode(data: &[u8], mode: DecodeMode) -> Result<NetworkPacket, ProtocolError> {
    if data.is_empty() {
        return Err(ProtocolError::Empty);
    }
    if data.len() > MAX_PACKET_SIZE {
        return Err(ProtocolError::Oversize { size: data.len() });
    }

    let mut r = PacketReader::new(data, mode);

    let version = r.u8("version")?;
    if version != PROTOCOL_VERSION {
        return Err(ProtocolError::Version(version));
    }

    let tag = r.u8("packet type")?;
    let kind = PacketKind::from_tag(tag).ok_or(ProtocolError::UnknownPacketType(tag))?;

    let sender_id = if r.bool("sender flag")? {
        let sender = r.string("sender id", MAX_NAME_LEN)?;
        if mode == DecodeMode::Server {
            return Err(ProtocolError::ForbiddenSender);
        }
        Some(sender).filter(|s| !s.is_empty())
    } else {
        None
    };

    let body = match kind {
        PacketKind::JoinGame => {
            let connect_id = r.u32("connect id")?;
            let name = r.string("join name", MAX_NAME_LEN)?;
            PacketBody::JoinGame { connect_id, name }
        }
        PacketKind::PlayerDisconnect => {
            let name = r.string("disconnect name", MAX_NAME_LEN)?;
            let nickname = if r.bool("nickname flag")? {
                Some(r.string("disconnect nickname", MAX_NICKNAME_LEN)?)
            } else {
                None
            };
            PacketBody::PlayerDisconnect { name, nickname }
        }
        PacketKind::PlayerStateUpdate => {
            let tag = r.u8("update type")?;
            let kind = UpdateType::from_tag(tag).ok_or(ProtocolError::UnknownUpdateType(tag))?;
            PacketBody::StateUpdate(decode_update(&mut r, kind)?)
        }
    };

    Ok(NetworkPacket { sender_id, body })
}

fn decode_update(r: &mut PacketReader<'_>, kind: UpdateType) -> Result<StateUpdate, ProtocolError> {
    let update = match kind {
        UpdateType::Init => {
            let instance_id = r.int_in("instance id", 1, 100_000)?;
            let nickname = r.string("nickname", MAX_NICKNAME_LEN)?;
            let position = r.position("init position")?;
            let body_tex = r.int_in("body texture", 0, 200)?;
            let head_tex = r.int_in("head texture", 0, 200)?;
            StateUpdate::Init(InitState {
                instance_id,
                nickname,
                position,
                body_tex,
                head_tex,
            })
        }
        UpdateType::Position => StateUpdate::Position(r.position("position")?),
        UpdateType::Heading => StateUpdate::Heading(r.float_in("heading", -360.0, 360.0)?),
        UpdateType::Animation => StateUpdate::Animation(r.int_in("animation id", 0, 100_000)?),
        UpdateType::WeaponMode => StateUpdate::WeaponMode(r.int_in("weapon mode", 0, 100)?),
        UpdateType::MagicSetup => {
            StateUpdate::MagicSetup(r.string("magic setup spell", MAX_INSTANCE_NAME_LEN)?)
        }
        UpdateType::SpellCasts => {
            let count = r.count("spell casts", MAX_SPELL_CASTS)?;
            let mut casts = Vec::with_capacity(count);
            for _ in 0..count {
                casts.push(SpellCast {
                    target: r.string("spell cast target", MAX_UNIQUE_NAME_LEN)?,
                    spell_instance: r.int_in("spell instance", 0, 100_000)?,
                    level: r.int_in("spell level", 0, 100)?,
                    charge: r.int_in("spell charge", 0, 10_000)?,
                });
            }
            StateUpdate::SpellCasts(casts)
        }
        UpdateType::Armor => StateUpdate::Armor(r.string("armor", MAX_INSTANCE_NAME_LEN)?),
        UpdateType::Weapons => StateUpdate::Weapons {
            melee: r.string("melee weapon", MAX_INSTANCE_NAME_LEN)?,
            ranged: r.string("ranged weapon", MAX_INSTANCE_NAME_LEN)?,
        },
        UpdateType::Hp => StateUpdate::Hp {
            hp: r.int_in("hp", 0, 100_000)?,
            hp_max: r.int_in("hp max", 0, 100_000)?,
        },
        UpdateType::BodyState => StateUpdate::BodyState(r.int_in("body state", 0, 1000)?),
        UpdateType::Overlays => {
            let count = r.count("overlays", MAX_OVERLAYS)?;
            let mut overlays = Vec::with_capacity(count);
            for _ in 0..count {
                overlays.push(r.int_in("overlay id", 0, 200_000)?);
            }
            StateUpdate::Overlays(overlays)
        }
        UpdateType::Protections => {
            let mut values = [0; 8];
            for value in &mut values {
                *value = r.int_in("protection", 0, 10_000)?;
            }
            StateUpdate::Protections(values)
        }
        UpdateType::Talents => {
            let mut values = [0; 4];
            for value in &mut values {
                *value = r.int_in("talent", 0, 1000)?;
            }
            StateUpdate::Talents(values)
        }
        UpdateType::Hand => StateUpdate::Hand {
            left: r.string("left hand item", MAX_INSTANCE_NAME_LEN)?,
            right: r.string("right hand item", MAX_INSTANCE_NAME_LEN)?,
        },
        UpdateType::Time => StateUpdate::Time {
            hour: r.int_in("hour", 0, 23)?,
            minute: r.int_in("minute", 0, 59)?,
        },
        UpdateType::Revived => StateUpdate::Revived(r.string("revived name", MAX_NAME_LEN)?),
        UpdateType::Attacks => {
            let count = r.count("attacks", MAX_ATTACKS)?;
            let mut attacks = Vec::with_capacity(count);
            for _ in 0..count {
                attacks.push(Attack {
                    target: r.string("attack target", MAX_UNIQUE_NAME_LEN)?,
                    damage: r.float_in("attack damage", 0.0, 100_000.0)?,
                    unconscious: r.int_in("unconscious flag", 0, 1)?,
                    dead: r.bool("dead flag")?,
                    finish: r.bool("finish flag")?,
                    damage_mode: r.u32("damage mode")?,
                });
            }
            StateUpdate::Attacks(attacks)
        }
        UpdateType::DropItem => StateUpdate::DropItem(DropItem {
            item: r.string("dropped item", MAX_INSTANCE_NAME_LEN)?,
            unique_name: r.string("dropped item unique name", MAX_UNIQUE_NAME_LEN)?,
            count: r.int_in("item count", 0, 10_000)?,
            flags: r.int_in("item flags", 0, 1_000_000)?,
        }),
        UpdateType::TakeItem => StateUpdate::TakeItem(TakeItem {
            item: r.string("taken item", MAX_INSTANCE_NAME_LEN)?,
            unique_name: r.string("taken item unique name", MAX_UNIQUE_NAME_LEN)?,
            count: r.int_in("item count", 0, 10_000)?,
            flags: r.int_in("item flags", 0, 1_000_000)?,
            position: r.position("item position")?,
        }),
        UpdateType::Destroy => StateUpdate::Destroy,
    };
    Ok(update)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(kind: UpdateType) -> StateUpdate {
        match kind {
            UpdateType::Position => StateUpdate::Position(Vec3::new(100.0, -20.5, 3000.0)),
            UpdateType::Heading => StateUpdate::Heading(-45.5),
            UpdateType::Animation => StateUpdate::Animation(321),
            UpdateType::WeaponMode => StateUpdate::WeaponMode(3),
            UpdateType::Init => StateUpdate::Init(InitState {
                instance_id: 11471,
                nickname: "Diego".into(),
                position: Vec3::new(1.0, 2.0, 3.0),
                body_tex: 9,
                head_tex: 18,
            }),
            UpdateType::Destroy => StateUpdate::Destroy,
            UpdateType::Attacks => StateUpdate::Attacks(vec![Attack {
                target: "WOLF_12_0".into(),
                damage: 42.0,
                unconscious: 0,
                dead: true,
                finish: false,
                damage_mode: 2,
            }]),
            UpdateType::Armor => StateUpdate::Armor("ITAR_BAU_L".into()),
            UpdateType::Weapons => StateUpdate::Weapons {
                melee: "ITMW_1H_SWORD_01".into(),
                ranged: "NULL".into(),
            },
            UpdateType::Hp => StateUpdate::Hp { hp: 80, hp_max: 120 },
            UpdateType::Time => StateUpdate::Time { hour: 23, minute: 59 },
            UpdateType::Hand => StateUpdate::Hand {
                left: "ITLSTORCH".into(),
                right: "NULL".into(),
            },
            UpdateType::MagicSetup => StateUpdate::MagicSetup("ITRU_FIREBOLT".into()),
            UpdateType::SpellCasts => StateUpdate::SpellCasts(vec![SpellCast {
                target: "HOST".into(),
                spell_instance: 5,
                level: 1,
                charge: 0,
            }]),
            UpdateType::Revived => StateUpdate::Revived("FRIEND_2".into()),
            UpdateType::Protections => StateUpdate::Protections([1, 2, 3, 4, 5, 6, 7, 8]),
            UpdateType::Talents => StateUpdate::Talents([0, 1, 2, 3]),
            UpdateType::BodyState => StateUpdate::BodyState(12),
            UpdateType::Overlays => StateUpdate::Overlays(vec![10, 10, 200_000]),
            UpdateType::DropItem => StateUpdate::DropItem(DropItem {
                item: "ITMI_GOLD".into(),
                unique_name: "ITMI_GOLD_1".into(),
                count: 50,
                flags: 0,
            }),
            UpdateType::TakeItem => StateUpdate::TakeItem(TakeItem {
                item: "ITMI_GOLD".into(),
                unique_name: "ITMI_GOLD_1".into(),
                count: 50,
                flags: 0,
                position: Vec3::new(5.0, 6.0, 7.0),
            }),
        }
    }

    fn all_packets() -> Vec<NetworkPacket> {
        let mut packets: Vec<NetworkPacket> = UpdateType::ALL
            .iter()
            .map(|&kind| NetworkPacket::update(Some("HOST".into()), sample(kind)))
            .collect();
        packets.push(NetworkPacket::join_game(99, "FRIEND_1").with_sender("HOST"));
        packets.push(NetworkPacket::disconnect("FRIEND_1", Some("Milten".into())));
        packets
    }

    #[test]
    fn test_roundtrip_every_update_type() {
        for packet in all_packets() {
            let bytes = encode(&packet).unwrap();
            assert_eq!(decode(&bytes, DecodeMode::Client).unwrap(), packet);
        }
    }

    #[test]
    fn test_empty_sender_roundtrips_as_absent() {
        let packet = NetworkPacket::update(Some(String::new()), StateUpdate::Heading(3.0));
        let bytes = encode(&packet).unwrap();
        assert_eq!(bytes[2], 0);
        assert_eq!(decode(&bytes, DecodeMode::Client).unwrap(), packet);
        assert_eq!(decode(&bytes, DecodeMode::Server).unwrap(), packet);
    }

    #[test]
    fn test_header_layout() {
        let packet = NetworkPacket::update(Some("HOST".into()), StateUpdate::Animation(7));
        let bytes = encode(&packet).unwrap();
        assert_eq!(&bytes[..5], &[1, 3, 1, 4, 0]);
        assert_eq!(&bytes[5..9], b"HOST");
        assert_eq!(bytes[9], UpdateType::Animation.tag());
        assert_eq!(&bytes[10..], &7i32.to_le_bytes());
    }

    #[test]
    fn test_rejects_wrong_version_for_every_type() {
        for packet in all_packets() {
            let mut bytes = encode(&packet).unwrap();
            bytes[0] = PROTOCOL_VERSION + 1;
            assert_eq!(
                decode(&bytes, DecodeMode::Client),
                Err(ProtocolError::Version(PROTOCOL_VERSION + 1))
            );
            assert!(decode(&bytes, DecodeMode::Server).is_err());
        }
    }

    #[test]
    fn test_server_mode_rejects_sender() {
        let packet = NetworkPacket::update(Some("FRIEND_3".into()), StateUpdate::Heading(1.0));
        let bytes = encode(&packet).unwrap();
        assert_eq!(
            decode(&bytes, DecodeMode::Server),
            Err(ProtocolError::ForbiddenSender)
        );

        let anonymous = NetworkPacket::update(None, StateUpdate::Heading(1.0));
        let bytes = encode(&anonymous).unwrap();
        assert_eq!(decode(&bytes, DecodeMode::Server).unwrap(), anonymous);
    }

    #[test]
    fn test_string_length_boundary() {
        let exact = "N".repeat(MAX_NICKNAME_LEN);
        let packet = NetworkPacket::disconnect("FRIEND_1", Some(exact));
        let bytes = encode(&packet).unwrap();
        assert_eq!(decode(&bytes, DecodeMode::Server).unwrap(), packet);

        let over = NetworkPacket::disconnect("FRIEND_1", Some("N".repeat(MAX_NICKNAME_LEN + 1)));
        assert!(matches!(
            encode(&over),
            Err(EncodeError::StringTooLong { max: MAX_NICKNAME_LEN, .. })
        ));

        let target = "T".repeat(MAX_UNIQUE_NAME_LEN);
        let packet = NetworkPacket::update(
            None,
            StateUpdate::SpellCasts(vec![SpellCast {
                target,
                spell_instance: 1,
                level: 1,
                charge: 1,
            }]),
        );
        assert!(encode(&packet).is_ok());
    }

    #[test]
    fn test_list_cap_fails_encode() {
        let packet = NetworkPacket::update(None, StateUpdate::Overlays(vec![1; MAX_OVERLAYS + 1]));
        assert_eq!(
            encode(&packet),
            Err(EncodeError::TooManyEntries {
                field: "overlays",
                count: MAX_OVERLAYS + 1,
                max: MAX_OVERLAYS,
            })
        );
    }

    #[test]
    fn test_server_mode_sanitizes_text() {
        let packet = NetworkPacket::update(None, StateUpdate::Armor("ITAR\n_\u{7}PAL".into()));
        let bytes = encode(&packet).unwrap();

        let decoded = decode(&bytes, DecodeMode::Server).unwrap();
        assert_eq!(decoded.state_update(), Some(&StateUpdate::Armor("ITAR_PAL".into())));

        let trusted = decode(&bytes, DecodeMode::Client).unwrap();
        assert_eq!(trusted, packet);
    }

    #[test]
    fn test_sanitized_to_empty_fails() {
        let packet = NetworkPacket::update(None, StateUpdate::Revived("\t\n".into()));
        let bytes = encode(&packet).unwrap();
        assert_eq!(
            decode(&bytes, DecodeMode::Server),
            Err(ProtocolError::InvalidText("revived name"))
        );

        let empty = NetworkPacket::update(None, StateUpdate::Revived(String::new()));
        let bytes = encode(&empty).unwrap();
        assert_eq!(decode(&bytes, DecodeMode::Server).unwrap(), empty);
    }

    #[test]
    fn test_range_violations() {
        let cases = [
            StateUpdate::Heading(360.5),
            StateUpdate::Heading(f32::NAN),
            StateUpdate::Position(Vec3::new(0.0, 100_001.0, 0.0)),
            StateUpdate::Position(Vec3::new(f32::INFINITY, 0.0, 0.0)),
            StateUpdate::Hp { hp: -1, hp_max: 10 },
            StateUpdate::Animation(100_001),
            StateUpdate::Time { hour: 24, minute: 0 },
            StateUpdate::Talents([0, 0, 0, 1001]),
            StateUpdate::Overlays(vec![200_001]),
        ];
        for update in cases {
            let bytes = encode(&NetworkPacket::update(None, update.clone())).unwrap();
            assert!(
                matches!(decode(&bytes, DecodeMode::Client), Err(ProtocolError::OutOfRange(_))),
                "{update:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_init_instance_must_be_positive() {
        let update = StateUpdate::Init(InitState {
            instance_id: 0,
            nickname: String::new(),
            position: Vec3::ZERO,
            body_tex: 0,
            head_tex: 0,
        });
        let bytes = encode(&NetworkPacket::update(None, update)).unwrap();
        assert_eq!(
            decode(&bytes, DecodeMode::Client),
            Err(ProtocolError::OutOfRange("instance id"))
        );
    }

    #[test]
    fn test_reserved_and_unknown_tags() {
        for tag in [16u8, 17, 23, 255] {
            let bytes = [PROTOCOL_VERSION, 3, 0, tag];
            assert_eq!(
                decode(&bytes, DecodeMode::Client),
                Err(ProtocolError::UnknownUpdateType(tag))
            );
        }
        let bytes = [PROTOCOL_VERSION, 4, 0];
        assert_eq!(
            decode(&bytes, DecodeMode::Client),
            Err(ProtocolError::UnknownPacketType(4))
        );
    }

    #[test]
    fn test_truncated_and_oversize_input() {
        assert_eq!(decode(&[], DecodeMode::Client), Err(ProtocolError::Empty));

        let bytes = encode(&NetworkPacket::update(None, sample(UpdateType::TakeItem))).unwrap();
        for len in 1..bytes.len() {
            assert!(decode(&bytes[..len], DecodeMode::Client).is_err());
        }

        let huge = vec![PROTOCOL_VERSION; MAX_PACKET_SIZE + 1];
        assert_eq!(
            decode(&huge, DecodeMode::Client),
            Err(ProtocolError::Oversize {
                size: MAX_PACKET_SIZE + 1
            })
        );
    }

    #[test]
    fn test_bool_must_be_canonical() {
        let bytes = [PROTOCOL_VERSION, 3, 2];
        assert_eq!(
            decode(&bytes, DecodeMode::Client),
            Err(ProtocolError::InvalidBool("sender flag"))
        );
    }

    #[test]
    fn test_trailing_bytes_ignored() {
        let packet = NetworkPacket::update(None, StateUpdate::Destroy);
        let mut bytes = encode(&packet).unwrap();
        bytes.extend_from_slice(&[0xAA, 0xBB]);
        assert_eq!(decode(&bytes, DecodeMode::Server).unwrap(), packet);
    }
}
