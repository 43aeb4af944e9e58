//! `svc_*` messages: server to client state.
//!
//! Messages with a length field split their payload off before decoding it,
//! so a payload failure costs only that message.

use bitstream::{index_bits, BitReader, BitSpan, Vector3};
use protocol::{GameVariant, MessageKind, ProtocolFacts, MAX_EDICT_BITS, MAX_STRING_TABLE_BITS};

use super::{expect_consumed, Failure, MessageResult, ResyncExt};
use crate::context::DecodeContext;
use crate::entity::{EntityUpdate, PacketEntitiesShape};
use crate::error::{CodecError, LimitKind, LzssError};
use crate::game_event::{GameEvent, GameEventDescriptor, EVENT_INDEX_BITS};
use crate::lzss;
use crate::sound::SoundInfo;
use crate::string_table::StringTable;
use crate::user_message::{decode_user_message, UserMessage, UserMessageBody};

const SEND_TABLE_LENGTH_BITS: u32 = 16;
const SPLIT_SCREEN_LENGTH_BITS: u32 = 11;
const ENTITY_MESSAGE_CLASS_BITS: u32 = 9;
const ENTITY_MESSAGE_LENGTH_BITS: u32 = 11;
const GAME_EVENT_LENGTH_BITS: u32 = 11;
const DELTA_SIZE_BITS: u32 = 20;
const STRING_TABLE_UPDATE_LENGTH_BITS: u32 = 20;
const USER_DATA_SIZE_BITS: u32 = 12;
const USER_DATA_SIZE_BITS_BITS: u32 = 4;
const DECAL_INDEX_BITS: u32 = 9;
const ANGLE_BITS: u32 = 16;

fn read_angles(r: &mut BitReader<'_>) -> bitstream::BitResult<Vector3> {
    Ok(Vector3::new(
        r.read_bit_angle(ANGLE_BITS)?,
        r.read_bit_angle(ANGLE_BITS)?,
        r.read_bit_angle(ANGLE_BITS)?,
    ))
}

/// Splits off `bits` bits of payload, returning it and its span.
fn payload<'a>(r: &mut BitReader<'a>, bits: usize) -> MessageResult<(BitReader<'a>, BitSpan)> {
    let data = r.split_and_skip(bits)?;
    let span = data.span();
    Ok((data, span))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SvcPrint {
    pub text: String,
}

impl SvcPrint {
    pub(crate) fn read(r: &mut BitReader<'_>) -> MessageResult<Self> {
        Ok(Self {
            text: r.read_cstring()?,
        })
    }
}

/// The map checksum a `SvcServerInfo` carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapChecksum {
    Crc(u32),
    Md5([u8; 16]),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SvcServerInfo {
    pub protocol: u16,
    pub server_count: u32,
    pub is_hltv: bool,
    pub is_dedicated: bool,
    pub client_crc: i32,
    pub string_table_crc: Option<u32>,
    pub max_classes: u16,
    pub map_checksum: MapChecksum,
    pub player_slot: u8,
    pub max_clients: u8,
    pub tick_interval: f32,
    pub os: char,
    pub game_dir: String,
    pub map_name: String,
    pub sky_name: String,
    pub host_name: String,
    /// L4D2 only.
    pub mission_name: Option<String>,
    /// L4D2 only.
    pub mutation_name: Option<String>,
    pub has_replay: Option<bool>,
}

impl SvcServerInfo {
    /// Reads the message and resets string tables for the new connection.
    pub(crate) fn read(r: &mut BitReader<'_>, ctx: &mut DecodeContext) -> MessageResult<Self> {
        let facts = &ctx.facts;
        let variant = facts.layout_variant();
        let protocol = r.read_u16()?;
        let server_count = r.read_u32()?;
        let is_hltv = r.read_bool()?;
        let is_dedicated = r.read_bool()?;
        let client_crc = r.read_i32()?;
        let string_table_crc = if facts.is_new_engine() && variant != GameVariant::L4d1 {
            Some(r.read_u32()?)
        } else {
            None
        };
        let max_classes = r.read_u16()?;
        let map_checksum = if facts.server_info_has_md5 {
            let bytes = r.read_bytes(16)?;
            let mut md5 = [0u8; 16];
            md5.copy_from_slice(&bytes);
            MapChecksum::Md5(md5)
        } else {
            MapChecksum::Crc(r.read_u32()?)
        };
        let player_slot = r.read_u8()?;
        let max_clients = r.read_u8()?;
        let tick_interval = r.read_f32()?;
        let os = char::from(r.read_u8()?);
        let game_dir = r.read_cstring()?;
        let map_name = r.read_cstring()?;
        let sky_name = r.read_cstring()?;
        let host_name = r.read_cstring()?;
        let (mission_name, mutation_name) = if variant == GameVariant::L4d2 {
            (Some(r.read_cstring()?), Some(r.read_cstring()?))
        } else {
            (None, None)
        };
        let has_replay = if facts.network_protocol == 24 {
            Some(r.read_bool()?)
        } else {
            None
        };

        ctx.reset_for_server_info();
        Ok(Self {
            protocol,
            server_count,
            is_hltv,
            is_dedicated,
            client_crc,
            string_table_crc,
            max_classes,
            map_checksum,
            player_slot,
            max_clients,
            tick_interval,
            os,
            game_dir,
            map_name,
            sky_name,
            host_name,
            mission_name,
            mutation_name,
            has_replay,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SvcSendTable {
    pub needs_decoder: bool,
    pub data: BitSpan,
}

impl SvcSendTable {
    pub(crate) fn read(r: &mut BitReader<'_>) -> MessageResult<Self> {
        let needs_decoder = r.read_bool()?;
        let length = r.read_bits(SEND_TABLE_LENGTH_BITS)? as usize;
        let (_, data) = payload(r, length)?;
        Ok(Self {
            needs_decoder,
            data,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassInfoEntry {
    pub class_id: u32,
    pub class_name: String,
    pub data_table_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SvcClassInfo {
    pub class_count: u16,
    /// The client builds classes from its own tables; no list follows.
    pub create_on_client: bool,
    pub classes: Vec<ClassInfoEntry>,
}

impl SvcClassInfo {
    pub(crate) fn read(r: &mut BitReader<'_>) -> MessageResult<Self> {
        let class_count = r.read_u16()?;
        let create_on_client = r.read_bool()?;
        let mut classes = Vec::new();
        if !create_on_client {
            let id_bits = index_bits(u32::from(class_count));
            for _ in 0..class_count {
                classes.push(ClassInfoEntry {
                    class_id: r.read_bits(id_bits)?,
                    class_name: r.read_cstring()?,
                    data_table_name: r.read_cstring()?,
                });
            }
        }
        Ok(Self {
            class_count,
            create_on_client,
            classes,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SvcSetPause {
    pub paused: bool,
}

impl SvcSetPause {
    pub(crate) fn read(r: &mut BitReader<'_>) -> MessageResult<Self> {
        Ok(Self {
            paused: r.read_bool()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SvcCreateStringTable {
    /// Id the table was registered under.
    pub table_id: usize,
    pub name: String,
    pub max_entries: u16,
    pub num_entries: u32,
    pub user_data_fixed_size: bool,
    pub user_data_size: u32,
    pub user_data_size_bits: u32,
    pub compressed: bool,
    pub data: BitSpan,
}

impl SvcCreateStringTable {
    pub(crate) fn read(r: &mut BitReader<'_>, ctx: &mut DecodeContext) -> MessageResult<Self> {
        let facts = &ctx.facts;
        let name = r.read_cstring()?;
        let max_entries = r.read_u16()?;
        let num_entries = r.read_bits(index_bits(u32::from(max_entries)))?;
        let length = r.read_bits(facts.create_string_table_length_bits)? as usize;
        let user_data_fixed_size = r.read_bool()?;
        let (user_data_size, user_data_size_bits) = if user_data_fixed_size {
            (
                r.read_bits(USER_DATA_SIZE_BITS)?,
                r.read_bits(USER_DATA_SIZE_BITS_BITS)?,
            )
        } else {
            (0, 0)
        };
        let compressed = facts.string_table_compression && r.read_bool()?;
        let (mut data, span) = payload(r, length)?;

        let mut table = StringTable::new(name.clone(), u32::from(max_entries));
        if user_data_fixed_size {
            table = table.with_fixed_user_data(user_data_size, user_data_size_bits);
        }
        let table_id = if compressed {
            match inflate(&mut data, ctx.options.max_decompressed_bytes) {
                Ok(bytes) => {
                    ctx.create_string_table(table, &mut BitReader::new(&bytes), num_entries)
                }
                Err(err) => {
                    let id = ctx.string_tables.create(table);
                    ctx.fail_string_table(id, &err);
                    id
                }
            }
        } else {
            ctx.create_string_table(table, &mut data, num_entries)
        };

        Ok(Self {
            table_id,
            name,
            max_entries,
            num_entries,
            user_data_fixed_size,
            user_data_size,
            user_data_size_bits,
            compressed,
            data: span,
        })
    }
}

/// Reads the size prefix and LZSS block of a compressed table payload.
fn inflate(data: &mut BitReader<'_>, limit: usize) -> Result<Vec<u8>, CodecError> {
    let decompressed_size = data.read_u32()? as usize;
    let compressed_size = data.read_u32()? as usize;
    if decompressed_size > limit {
        return Err(CodecError::LimitsExceeded {
            kind: LimitKind::DecompressedBytes,
            limit,
            actual: decompressed_size,
        });
    }
    let block = data.read_bytes(compressed_size)?;
    let declared = lzss::declared_size(&block)?;
    if declared != decompressed_size {
        return Err(LzssError::SizeMismatch {
            expected: decompressed_size,
            actual: declared,
        }
        .into());
    }
    let bytes = lzss::decompress(&block)?;
    if bytes.len() != decompressed_size {
        return Err(LzssError::SizeMismatch {
            expected: decompressed_size,
            actual: bytes.len(),
        }
        .into());
    }
    Ok(bytes)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SvcUpdateStringTable {
    pub table_id: u32,
    pub changed_entries: u32,
    pub data: BitSpan,
    /// Entries the update wrote; empty if the table could not be read.
    pub touched: Vec<usize>,
}

impl SvcUpdateStringTable {
    pub(crate) fn read(r: &mut BitReader<'_>, ctx: &mut DecodeContext) -> MessageResult<Self> {
        let table_id = r.read_bits(MAX_STRING_TABLE_BITS)?;
        let changed_entries = if r.read_bool()? {
            u32::from(r.read_u16()?)
        } else {
            1
        };
        let length = r.read_bits(STRING_TABLE_UPDATE_LENGTH_BITS)? as usize;
        let (mut data, span) = payload(r, length)?;
        let touched = ctx.update_string_table(table_id as usize, &mut data, changed_entries);
        Ok(Self {
            table_id,
            changed_entries,
            data: span,
            touched,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SvcVoiceInit {
    pub codec: String,
    pub quality: u8,
    pub sample_rate: Option<u16>,
}

impl SvcVoiceInit {
    pub(crate) fn read(r: &mut BitReader<'_>) -> MessageResult<Self> {
        let codec = r.read_cstring()?;
        let quality = r.read_u8()?;
        let sample_rate = if quality == u8::MAX {
            Some(r.read_u16()?)
        } else {
            None
        };
        Ok(Self {
            codec,
            quality,
            sample_rate,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SvcVoiceData {
    pub client: u8,
    pub proximity: u8,
    pub data: BitSpan,
}

impl SvcVoiceData {
    pub(crate) fn read(r: &mut BitReader<'_>) -> MessageResult<Self> {
        let client = r.read_u8()?;
        let proximity = r.read_u8()?;
        let length = usize::from(r.read_u16()?);
        let (_, data) = payload(r, length)?;
        Ok(Self {
            client,
            proximity,
            data,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SvcSounds {
    pub reliable: bool,
    pub sounds: Vec<SoundInfo>,
    pub data: BitSpan,
}

impl SvcSounds {
    pub(crate) fn read(r: &mut BitReader<'_>, ctx: &DecodeContext) -> MessageResult<Self> {
        let reliable = r.read_bool()?;
        let (count, length) = if reliable {
            (1, r.read_bits(8)? as usize)
        } else {
            (r.read_u8()?, usize::from(r.read_u16()?))
        };
        let (mut data, span) = payload(r, length)?;
        let mut sounds = Vec::with_capacity(usize::from(count));
        let mut prev = SoundInfo::initial();
        for _ in 0..count {
            let sound = SoundInfo::read_delta(&mut data, &prev, &ctx.facts).resync()?;
            sounds.push(sound.clone());
            prev = sound;
        }
        Ok(Self {
            reliable,
            sounds,
            data: span,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SvcSetView {
    pub entity_index: u32,
}

impl SvcSetView {
    pub(crate) fn read(r: &mut BitReader<'_>) -> MessageResult<Self> {
        Ok(Self {
            entity_index: r.read_bits(MAX_EDICT_BITS)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SvcFixAngle {
    pub relative: bool,
    pub angles: Vector3,
}

impl SvcFixAngle {
    pub(crate) fn read(r: &mut BitReader<'_>) -> MessageResult<Self> {
        Ok(Self {
            relative: r.read_bool()?,
            angles: read_angles(r)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SvcCrosshairAngle {
    pub angles: Vector3,
}

impl SvcCrosshairAngle {
    pub(crate) fn read(r: &mut BitReader<'_>) -> MessageResult<Self> {
        Ok(Self {
            angles: read_angles(r)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SvcBspDecal {
    pub position: Vector3,
    pub decal_texture_index: u32,
    /// Entity and model the decal sticks to, if any.
    pub target: Option<(u32, u32)>,
    pub low_priority: bool,
}

impl SvcBspDecal {
    pub(crate) fn read(r: &mut BitReader<'_>, facts: &ProtocolFacts) -> MessageResult<Self> {
        let position = r.read_vector_coord()?;
        let decal_texture_index = r.read_bits(DECAL_INDEX_BITS)?;
        let target = if r.read_bool()? {
            let entity = r.read_bits(MAX_EDICT_BITS)?;
            let model = r.read_bits(facts.model_index_bits)?;
            Some((entity, model))
        } else {
            None
        };
        Ok(Self {
            position,
            decal_texture_index,
            target,
            low_priority: r.read_bool()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SvcSplitScreen {
    pub remove_user: bool,
    pub data: BitSpan,
}

impl SvcSplitScreen {
    pub(crate) fn read(r: &mut BitReader<'_>) -> MessageResult<Self> {
        let remove_user = r.read_bool()?;
        let length = r.read_bits(SPLIT_SCREEN_LENGTH_BITS)? as usize;
        let (_, data) = payload(r, length)?;
        Ok(Self { remove_user, data })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SvcUserMessage {
    pub message: UserMessage,
}

impl SvcUserMessage {
    pub(crate) fn read(r: &mut BitReader<'_>, ctx: &DecodeContext) -> MessageResult<Self> {
        let byte = r.read_u8()?;
        let length = r.read_bits(ctx.facts.user_message_length_bits)? as usize;
        let (mut data, span) = payload(r, length)?;
        let kind = ctx.facts.user_message_kind(byte);
        let body = if ctx.options.decode_user_messages {
            let body = decode_user_message(kind, &mut data).resync()?;
            if !body.is_unimplemented() {
                expect_consumed(&data, MessageKind::SvcUserMessage)?;
            }
            body
        } else {
            UserMessageBody::Unimplemented
        };
        Ok(Self {
            message: UserMessage {
                kind,
                byte,
                span,
                body,
            },
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SvcEntityMessage {
    pub entity_index: u32,
    pub class_id: u32,
    pub data: BitSpan,
}

impl SvcEntityMessage {
    pub(crate) fn read(r: &mut BitReader<'_>) -> MessageResult<Self> {
        let entity_index = r.read_bits(MAX_EDICT_BITS)?;
        let class_id = r.read_bits(ENTITY_MESSAGE_CLASS_BITS)?;
        let length = r.read_bits(ENTITY_MESSAGE_LENGTH_BITS)? as usize;
        let (_, data) = payload(r, length)?;
        Ok(Self {
            entity_index,
            class_id,
            data,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SvcGameEvent {
    pub event: GameEvent,
    pub data: BitSpan,
}

impl SvcGameEvent {
    pub(crate) fn read(r: &mut BitReader<'_>, ctx: &DecodeContext) -> MessageResult<Self> {
        let length = r.read_bits(GAME_EVENT_LENGTH_BITS)? as usize;
        let (mut data, span) = payload(r, length)?;
        let event = ctx.game_events.decode(&mut data).resync()?;
        expect_consumed_bytes(&data, MessageKind::SvcGameEvent)?;
        Ok(Self { event, data: span })
    }
}

/// Like [`expect_consumed`], but tolerates padding to the next byte.
fn expect_consumed_bytes(data: &BitReader<'_>, kind: MessageKind) -> MessageResult<()> {
    if data.bits_remaining() < 8 {
        Ok(())
    } else {
        expect_consumed(data, kind)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SvcPacketEntities {
    pub max_entries: u32,
    pub delta_from: Option<i32>,
    pub baseline: bool,
    pub updated_entries: u32,
    pub update_baseline: bool,
    pub data: BitSpan,
    /// Entity changes applied from the payload.
    pub updates: Vec<EntityUpdate>,
}

impl SvcPacketEntities {
    pub(crate) fn read(r: &mut BitReader<'_>, ctx: &mut DecodeContext) -> MessageResult<Self> {
        let max_entries = r.read_bits(MAX_EDICT_BITS)?;
        let delta_from = if r.read_bool()? {
            Some(r.read_i32()?)
        } else {
            None
        };
        let baseline = r.read_bool()?;
        let updated_entries = r.read_bits(MAX_EDICT_BITS)?;
        let length = r.read_bits(DELTA_SIZE_BITS)? as usize;
        let update_baseline = r.read_bool()?;
        let (mut data, span) = payload(r, length)?;

        let mut updates = Vec::new();
        if ctx.options.decode_entities {
            let shape = PacketEntitiesShape {
                updated_entries,
                is_delta: delta_from.is_some(),
                update_baseline,
            };
            let pass = ctx.apply_packet_entities(&mut data, shape);
            if let Some(err) = pass.error {
                let line = format!(
                    "[tick {}] packet entities stopped after {} updates: {err}",
                    ctx.tick,
                    pass.updates.len()
                );
                ctx.log(line);
            }
            updates = pass.updates;
        }

        Ok(Self {
            max_entries,
            delta_from,
            baseline,
            updated_entries,
            update_baseline,
            data: span,
            updates,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SvcTempEntities {
    pub num_entries: u8,
    pub data: BitSpan,
}

impl SvcTempEntities {
    pub(crate) fn read(r: &mut BitReader<'_>, facts: &ProtocolFacts) -> MessageResult<Self> {
        let num_entries = r.read_u8()?;
        let length = r.read_bits(facts.temp_entities_length_bits)? as usize;
        let (_, data) = payload(r, length)?;
        Ok(Self { num_entries, data })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SvcPrefetch {
    pub sound_index: u32,
}

impl SvcPrefetch {
    pub(crate) fn read(r: &mut BitReader<'_>, facts: &ProtocolFacts) -> MessageResult<Self> {
        Ok(Self {
            sound_index: r.read_bits(facts.sound_index_bits)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SvcMenu {
    pub menu_type: u16,
    pub data: BitSpan,
}

impl SvcMenu {
    pub(crate) fn read(r: &mut BitReader<'_>) -> MessageResult<Self> {
        let menu_type = r.read_u16()?;
        let length = usize::from(r.read_u16()?) * 8;
        let (_, data) = payload(r, length)?;
        Ok(Self { menu_type, data })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SvcGameEventList {
    pub descriptors: Vec<GameEventDescriptor>,
    pub data: BitSpan,
}

impl SvcGameEventList {
    /// Reads the descriptors and installs them for later `SvcGameEvent`s.
    pub(crate) fn read(r: &mut BitReader<'_>, ctx: &mut DecodeContext) -> MessageResult<Self> {
        let count = r.read_bits(EVENT_INDEX_BITS)?;
        let length = r.read_bits(DELTA_SIZE_BITS)? as usize;
        let (mut data, span) = payload(r, length)?;
        let mut descriptors = Vec::with_capacity(count as usize);
        for _ in 0..count {
            descriptors.push(GameEventDescriptor::read(&mut data).resync()?);
        }
        for descriptor in &descriptors {
            ctx.game_events.insert(descriptor.clone());
        }
        Ok(Self {
            descriptors,
            data: span,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SvcGetCvarValue {
    pub cookie: i32,
    pub cvar_name: String,
}

impl SvcGetCvarValue {
    pub(crate) fn read(r: &mut BitReader<'_>) -> MessageResult<Self> {
        Ok(Self {
            cookie: r.read_i32()?,
            cvar_name: r.read_cstring()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SvcCmdKeyValues {
    pub data: BitSpan,
}

impl SvcCmdKeyValues {
    pub(crate) fn read(r: &mut BitReader<'_>) -> MessageResult<Self> {
        let length = r.read_u32()? as usize * 8;
        let (_, data) = payload(r, length)?;
        Ok(Self { data })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SvcPaintmapData {
    pub data: BitSpan,
}

impl SvcPaintmapData {
    pub(crate) fn read(r: &mut BitReader<'_>) -> MessageResult<Self> {
        let length = r.read_i32()?;
        if length < 0 {
            return Err(Failure::Desync(CodecError::NegativeLength {
                field: "paintmap data length",
                value: length,
            }));
        }
        let (_, data) = payload(r, length as usize)?;
        Ok(Self { data })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::limits::ParseOptions;
    use bitstream::BitWriter;
    use protocol::UserMessageKind;

    fn context(demo: i32, net: i32) -> DecodeContext {
        DecodeContext::new(ProtocolFacts::new(demo, net), ParseOptions::for_testing())
    }

    fn userinfo_entries() -> Vec<u8> {
        let mut writer = BitWriter::new();
        writer.write_bool(true);
        writer.write_bool(true);
        writer.write_bool(false);
        writer.write_cstring("0");
        writer.write_bool(false);
        writer.finish()
    }

    #[test]
    fn server_info_portal1_steampipe() {
        let mut ctx = context(3, 24);
        ctx.string_tables.create(StringTable::new("downloadables", 8));

        let mut writer = BitWriter::new();
        writer.write_u16(24);
        writer.write_u32(1);
        writer.write_bool(false);
        writer.write_bool(false);
        writer.write_i32(-5);
        writer.write_u16(250);
        writer.write_bytes(&[0xAB; 16]);
        writer.write_u8(0);
        writer.write_u8(1);
        writer.write_f32(0.015);
        writer.write_u8(b'w');
        for text in ["portal", "testchmb_a_00", "sky_day01_01", "local"] {
            writer.write_cstring(text);
        }
        writer.write_bool(true);
        let bytes = writer.finish();

        let mut reader = BitReader::new(&bytes);
        let info = SvcServerInfo::read(&mut reader, &mut ctx).unwrap();
        assert_eq!(info.max_classes, 250);
        assert_eq!(info.string_table_crc, None);
        assert_eq!(info.map_checksum, MapChecksum::Md5([0xAB; 16]));
        assert_eq!(info.os, 'w');
        assert_eq!(info.map_name, "testchmb_a_00");
        assert_eq!(info.has_replay, Some(true));
        assert!(ctx.string_tables.is_empty());
        assert!(reader.bits_remaining() < 8);
    }

    #[test]
    fn class_info_lists_classes_unless_created_on_client() {
        let mut writer = BitWriter::new();
        writer.write_u16(3);
        writer.write_bool(false);
        for (id, name) in [(0, "CWorld"), (1, "CPlayer"), (2, "CProp")] {
            writer.write_bits(id, 2).unwrap();
            writer.write_cstring(name);
            writer.write_cstring(&format!("DT_{}", &name[1..]));
        }
        let bytes = writer.finish();
        let info = SvcClassInfo::read(&mut BitReader::new(&bytes)).unwrap();
        assert_eq!(info.classes.len(), 3);
        assert_eq!(info.classes[2].data_table_name, "DT_Prop");

        let info = SvcClassInfo::read(&mut BitReader::new(&[3, 0, 1])).unwrap();
        assert!(info.create_on_client);
        assert!(info.classes.is_empty());
    }

    #[test]
    fn create_string_table_registers_and_fills() {
        let mut ctx = context(3, 24);
        let entries = userinfo_entries();

        let mut writer = BitWriter::new();
        writer.write_cstring("userinfo");
        writer.write_u16(256);
        writer.write_bits(1, 9).unwrap();
        writer
            .write_bits((entries.len() * 8) as u32, ctx.facts.create_string_table_length_bits)
            .unwrap();
        writer.write_bool(false);
        writer.write_bool(false);
        writer.write_bytes(&entries);
        let bytes = writer.finish();

        let msg = SvcCreateStringTable::read(&mut BitReader::new(&bytes), &mut ctx).unwrap();
        assert_eq!(msg.num_entries, 1);
        assert!(!msg.compressed);
        let table = ctx.string_tables.get(msg.table_id).unwrap();
        assert_eq!(table.name, "userinfo");
        assert_eq!(table.entries().unwrap()[0].name, "0");
    }

    #[test]
    fn compressed_string_table_is_inflated() {
        let mut ctx = context(3, 24);
        let entries = userinfo_entries();
        let block = lzss::compress(&entries);

        let mut payload = BitWriter::new();
        payload.write_u32(entries.len() as u32);
        payload.write_u32(block.len() as u32);
        payload.write_bytes(&block);
        let payload = payload.finish();

        let mut writer = BitWriter::new();
        writer.write_cstring("userinfo");
        writer.write_u16(256);
        writer.write_bits(1, 9).unwrap();
        writer
            .write_bits((payload.len() * 8) as u32, ctx.facts.create_string_table_length_bits)
            .unwrap();
        writer.write_bool(false);
        writer.write_bool(true);
        writer.write_bytes(&payload);
        let bytes = writer.finish();

        let msg = SvcCreateStringTable::read(&mut BitReader::new(&bytes), &mut ctx).unwrap();
        assert!(msg.compressed);
        assert_eq!(ctx.string_tables.get(0).unwrap().len(), Some(1));
        assert!(ctx.error_log().is_empty());
    }

    #[test]
    fn oversized_decompression_marks_table_unreadable() {
        let mut ctx = context(3, 24);
        ctx.options.max_decompressed_bytes = 4;
        let mut payload = BitWriter::new();
        payload.write_u32(1 << 20);
        payload.write_u32(0);
        let payload = payload.finish();

        let mut writer = BitWriter::new();
        writer.write_cstring("modelprecache");
        writer.write_u16(1024);
        writer.write_bits(1, 11).unwrap();
        writer
            .write_bits((payload.len() * 8) as u32, ctx.facts.create_string_table_length_bits)
            .unwrap();
        writer.write_bool(false);
        writer.write_bool(true);
        writer.write_bytes(&payload);
        let bytes = writer.finish();

        let msg = SvcCreateStringTable::read(&mut BitReader::new(&bytes), &mut ctx).unwrap();
        assert!(!ctx.string_tables.get(msg.table_id).unwrap().is_readable());
        assert_eq!(ctx.error_log().len(), 1);
    }

    #[test]
    fn block_size_must_match_outer_size() {
        let mut ctx = context(3, 24);
        let mut block = lzss::LZSS_TAG.to_vec();
        block.extend_from_slice(&u32::MAX.to_le_bytes());
        block.extend_from_slice(&[0x00, b'a']);

        let mut payload = BitWriter::new();
        payload.write_u32(3);
        payload.write_u32(block.len() as u32);
        payload.write_bytes(&block);
        let payload = payload.finish();

        let mut reader = BitReader::new(&payload);
        let err = inflate(&mut reader, ctx.options.max_decompressed_bytes).unwrap_err();
        assert_eq!(
            err,
            CodecError::Compression(LzssError::SizeMismatch {
                expected: 3,
                actual: u32::MAX as usize,
            })
        );

        let mut writer = BitWriter::new();
        writer.write_cstring("userinfo");
        writer.write_u16(256);
        writer.write_bits(1, 9).unwrap();
        writer
            .write_bits((payload.len() * 8) as u32, ctx.facts.create_string_table_length_bits)
            .unwrap();
        writer.write_bool(false);
        writer.write_bool(true);
        writer.write_bytes(&payload);
        let bytes = writer.finish();

        let msg = SvcCreateStringTable::read(&mut BitReader::new(&bytes), &mut ctx).unwrap();
        assert!(!ctx.string_tables.get(msg.table_id).unwrap().is_readable());
        assert_eq!(ctx.error_log().len(), 1);
    }

    #[test]
    fn user_message_with_trailing_bits_resyncs() {
        let ctx = context(3, 24);
        let byte = ctx.facts.user_message_byte(UserMessageKind::Battery).unwrap();
        let mut writer = BitWriter::new();
        writer.write_u8(byte);
        writer
            .write_bits(24, ctx.facts.user_message_length_bits)
            .unwrap();
        writer.write_u16(50);
        writer.write_u8(0);
        let bytes = writer.finish();

        let mut reader = BitReader::new(&bytes);
        let result = SvcUserMessage::read(&mut reader, &ctx);
        assert!(matches!(
            result,
            Err(Failure::Resync(CodecError::TrailingBits {
                remaining_bits: 8,
                ..
            }))
        ));
        assert_eq!(
            reader.bit_position(),
            8 + ctx.facts.user_message_length_bits as usize + 24
        );
    }

    #[test]
    fn packet_entities_without_schema_logs_once() {
        let mut ctx = context(3, 24);
        let mut writer = BitWriter::new();
        writer.write_bits(2048 - 1, MAX_EDICT_BITS).unwrap();
        writer.write_bool(false);
        writer.write_bool(false);
        writer.write_bits(1, MAX_EDICT_BITS).unwrap();
        writer.write_bits(8, DELTA_SIZE_BITS).unwrap();
        writer.write_bool(false);
        writer.write_u8(0);
        let bytes = writer.finish();

        let msg = SvcPacketEntities::read(&mut BitReader::new(&bytes), &mut ctx).unwrap();
        assert_eq!(msg.updated_entries, 1);
        assert!(msg.updates.is_empty());
        assert_eq!(ctx.error_log().len(), 1);
    }

    #[test]
    fn negative_paintmap_length_desyncs() {
        let bytes = (-8i32).to_le_bytes();
        let result = SvcPaintmapData::read(&mut BitReader::new(&bytes));
        assert!(matches!(
            result,
            Err(Failure::Desync(CodecError::NegativeLength { value: -8, .. }))
        ));
    }

    #[test]
    fn game_event_list_installs_descriptors() {
        let mut ctx = context(3, 24);
        let mut list = BitWriter::new();
        list.write_bits(4, EVENT_INDEX_BITS).unwrap();
        list.write_cstring("round_start");
        list.write_bits(3, 3).unwrap();
        list.write_cstring("timelimit");
        list.write_bits(0, 3).unwrap();
        let bits = list.bits_written();
        let list = list.finish();

        let mut writer = BitWriter::new();
        writer.write_bits(1, EVENT_INDEX_BITS).unwrap();
        writer.write_bits(bits as u32, DELTA_SIZE_BITS).unwrap();
        writer.write_reader(&BitReader::new(&list).split(bits).unwrap());
        let bytes = writer.finish();

        let msg = SvcGameEventList::read(&mut BitReader::new(&bytes), &mut ctx).unwrap();
        assert_eq!(msg.descriptors[0].name, "round_start");
        assert!(ctx.game_events.get(4).is_some());
    }
}
