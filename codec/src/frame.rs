//! Frames: the top-level units after the demo header.
//!
//! A frame is a packet byte, a tick, an optional player slot and a payload
//! whose layout depends on the packet kind. Errors while locating the
//! payload are fatal to the parse. Errors inside a sized payload demote the
//! packet to [`Packet::Unknown`] and are logged.

use bitstream::{BitReader, BitSpan, Vector3};
use protocol::PacketKind;
use schema::DataTables;
use tracing::debug;

use crate::context::DecodeContext;
use crate::error::{CodecError, CodecResult};
use crate::message::{read_messages, NetMessage};
use crate::string_table::StringTablesSnapshot;
use crate::user_cmd::UserCmd;

/// Bytes in one `CmdInfo` record.
pub const CMD_INFO_SIZE: usize = 76;

/// One frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Position in the file, from zero.
    pub index: usize,
    pub tick: i32,
    pub player_slot: Option<u8>,
    pub kind: PacketKind,
    /// Raw packet byte.
    pub byte: u8,
    pub packet: Packet,
    /// The whole frame, header included.
    pub span: BitSpan,
}

impl Frame {
    /// Messages of a `SignOn` or `Packet` frame; empty for other kinds.
    #[must_use]
    pub fn messages(&self) -> &[NetMessage] {
        match &self.packet {
            Packet::SignOn(data) | Packet::Packet(data) => &data.messages,
            _ => &[],
        }
    }
}

/// Packet payloads.
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    SignOn(PacketData),
    Packet(PacketData),
    SyncTick,
    ConsoleCmd(ConsoleCmd),
    UserCmd(UserCmdPacket),
    DataTables(DataTablesPacket),
    Stop,
    StringTables(StringTablesPacket),
    CustomData(CustomData),
    /// A sized payload that failed to decode.
    Unknown(BitSpan),
}

/// View state of one split-screen slot.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CmdInfo {
    pub flags: i32,
    pub view_origin: Vector3,
    pub view_angles: Vector3,
    pub local_view_angles: Vector3,
    pub view_origin2: Vector3,
    pub view_angles2: Vector3,
    pub local_view_angles2: Vector3,
}

impl CmdInfo {
    pub fn read(r: &mut BitReader<'_>) -> CodecResult<Self> {
        Ok(Self {
            flags: r.read_i32()?,
            view_origin: r.read_vector3()?,
            view_angles: r.read_vector3()?,
            local_view_angles: r.read_vector3()?,
            view_origin2: r.read_vector3()?,
            view_angles2: r.read_vector3()?,
            local_view_angles2: r.read_vector3()?,
        })
    }
}

/// Body of `SignOn` and `Packet` frames.
#[derive(Debug, Clone, PartialEq)]
pub struct PacketData {
    pub cmd_info: Vec<CmdInfo>,
    pub in_sequence: i32,
    pub out_sequence: i32,
    pub messages: Vec<NetMessage>,
    /// The message stream.
    pub data: BitSpan,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleCmd {
    pub command: String,
    /// The command bytes; the `i32` size sits in the 32 bits before it.
    pub data: BitSpan,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UserCmdPacket {
    pub sequence: i32,
    pub cmd: UserCmd,
    pub data: BitSpan,
}

/// What a `DataTables` frame installed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataTablesPacket {
    pub table_count: usize,
    pub class_count: usize,
    pub data: BitSpan,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StringTablesPacket {
    pub snapshot: StringTablesSnapshot,
    pub data: BitSpan,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CustomData {
    pub kind: i32,
    pub data: BitSpan,
}

/// Reads one frame at the cursor.
pub(crate) fn read_frame(r: &mut BitReader<'_>, ctx: &mut DecodeContext) -> CodecResult<Frame> {
    let start = r.absolute_position();
    let byte = r.read_u8()?;
    let tick = r.read_i32()?;
    let player_slot = if ctx.facts.has_player_slot {
        Some(r.read_u8()?)
    } else {
        None
    };
    ctx.tick = tick;
    let kind = ctx.facts.packet_kind(byte);
    let packet = decode_packet(kind, byte, r, ctx)?;
    Ok(Frame {
        index: ctx.frame_index,
        tick,
        player_slot,
        kind,
        byte,
        packet,
        span: r.span_from(start),
    })
}

/// Reads an `i32` byte count and splits off that many bytes.
fn sized<'a>(
    r: &mut BitReader<'a>,
    field: &'static str,
) -> CodecResult<(BitReader<'a>, BitSpan)> {
    let size = r.read_i32()?;
    if size < 0 {
        return Err(CodecError::NegativeLength { field, value: size });
    }
    let data = r.split_and_skip((size as usize).saturating_mul(8))?;
    let span = data.span();
    Ok((data, span))
}

/// Decodes the payload of a packet whose header was already read.
pub fn decode_packet(
    kind: PacketKind,
    byte: u8,
    r: &mut BitReader<'_>,
    ctx: &mut DecodeContext,
) -> CodecResult<Packet> {
    use PacketKind as K;

    let packet = match kind {
        K::SignOn => Packet::SignOn(read_packet_data(r, ctx)?),
        K::Packet => Packet::Packet(read_packet_data(r, ctx)?),
        K::SyncTick => Packet::SyncTick,
        K::Stop => Packet::Stop,
        K::ConsoleCmd => {
            let (mut data, span) = sized(r, "console command size")?;
            let command = data.read_string_of_length(span.len / 8)?;
            Packet::ConsoleCmd(ConsoleCmd {
                command,
                data: span,
            })
        }
        K::UserCmd => {
            let sequence = r.read_i32()?;
            let (mut data, span) = sized(r, "user command size")?;
            match UserCmd::read(&mut data) {
                Ok(cmd) => Packet::UserCmd(UserCmdPacket {
                    sequence,
                    cmd,
                    data: span,
                }),
                Err(err) => demote(ctx, kind, byte, span, r.buffer(), &err.into()),
            }
        }
        K::DataTables => {
            let (mut data, span) = sized(r, "data tables size")?;
            let installed = DataTables::read(&mut data, &ctx.facts)
                .map_err(CodecError::from)
                .and_then(|tables| {
                    let packet = DataTablesPacket {
                        table_count: tables.tables.len(),
                        class_count: tables.classes.len(),
                        data: span,
                    };
                    ctx.install_data_tables(tables)?;
                    Ok(packet)
                });
            match installed {
                Ok(packet) => Packet::DataTables(packet),
                Err(err) => demote(ctx, kind, byte, span, r.buffer(), &err),
            }
        }
        K::StringTables => {
            let (mut data, span) = sized(r, "string tables size")?;
            let applied = StringTablesSnapshot::read(&mut data).and_then(|snapshot| {
                ctx.apply_string_tables(&snapshot)?;
                Ok(snapshot)
            });
            match applied {
                Ok(snapshot) => Packet::StringTables(StringTablesPacket {
                    snapshot,
                    data: span,
                }),
                Err(err) => demote(ctx, kind, byte, span, r.buffer(), &err),
            }
        }
        K::CustomData => {
            let custom_kind = r.read_i32()?;
            let (_, span) = sized(r, "custom data size")?;
            Packet::CustomData(CustomData {
                kind: custom_kind,
                data: span,
            })
        }
        K::Unknown | K::Invalid => return Err(CodecError::UnmappedPacket { byte, kind }),
    };
    Ok(packet)
}

fn demote(
    ctx: &mut DecodeContext,
    kind: PacketKind,
    byte: u8,
    span: BitSpan,
    buffer: &[u8],
    err: &CodecError,
) -> Packet {
    ctx.log_demoted(kind, byte, span, buffer, err);
    Packet::Unknown(span)
}

fn read_packet_data(r: &mut BitReader<'_>, ctx: &mut DecodeContext) -> CodecResult<PacketData> {
    let slots = ctx.facts.cmd_info_slots;
    let mut cmd_info = Vec::with_capacity(slots);
    for _ in 0..slots {
        cmd_info.push(CmdInfo::read(r)?);
    }
    let in_sequence = r.read_i32()?;
    let out_sequence = r.read_i32()?;
    let (mut data, span) = sized(r, "packet size")?;
    let messages = read_messages(&mut data, ctx);
    debug!(
        tick = ctx.tick,
        messages = messages.len(),
        "decoded packet"
    );
    Ok(PacketData {
        cmd_info,
        in_sequence,
        out_sequence,
        messages,
        data: span,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::limits::ParseOptions;
    use bitstream::BitWriter;
    use protocol::ProtocolFacts;

    fn context(demo: i32, net: i32) -> DecodeContext {
        DecodeContext::new(ProtocolFacts::new(demo, net), ParseOptions::for_testing())
    }

    fn frame_header(writer: &mut BitWriter, ctx: &DecodeContext, kind: PacketKind, tick: i32) {
        writer.write_u8(ctx.facts.packet_byte(kind).unwrap());
        writer.write_i32(tick);
        if ctx.facts.has_player_slot {
            writer.write_u8(0);
        }
    }

    #[test]
    fn console_command_keeps_text_and_span() {
        let mut ctx = context(3, 24);
        let mut writer = BitWriter::new();
        frame_header(&mut writer, &ctx, PacketKind::ConsoleCmd, 40);
        writer.write_i32(9);
        writer.write_fixed_string("+jump", 9);
        let bytes = writer.finish();

        let frame = read_frame(&mut BitReader::new(&bytes), &mut ctx).unwrap();
        assert_eq!(frame.tick, 40);
        assert_eq!(frame.player_slot, None);
        let Packet::ConsoleCmd(cmd) = &frame.packet else {
            panic!("expected console command, got {:?}", frame.packet);
        };
        assert_eq!(cmd.command, "+jump");
        assert_eq!(cmd.data, BitSpan::new(72, 72));
        assert_eq!(frame.span.len, bytes.len() * 8);
    }

    #[test]
    fn portal2_packet_has_two_cmd_infos_and_slot() {
        let mut ctx = context(4, 2001);
        let mut writer = BitWriter::new();
        frame_header(&mut writer, &ctx, PacketKind::Packet, 7);
        writer.write_bytes(&[0; CMD_INFO_SIZE * 2]);
        writer.write_i32(1);
        writer.write_i32(2);
        writer.write_i32(0);
        let bytes = writer.finish();

        let frame = read_frame(&mut BitReader::new(&bytes), &mut ctx).unwrap();
        assert_eq!(frame.player_slot, Some(0));
        let Packet::Packet(data) = &frame.packet else {
            panic!("expected packet");
        };
        assert_eq!(data.cmd_info.len(), 2);
        assert_eq!(data.out_sequence, 2);
        assert!(data.messages.is_empty());
    }

    #[test]
    fn negative_size_is_a_framing_error() {
        let mut ctx = context(3, 24);
        let mut writer = BitWriter::new();
        frame_header(&mut writer, &ctx, PacketKind::ConsoleCmd, 1);
        writer.write_i32(-1);
        let bytes = writer.finish();

        let err = read_frame(&mut BitReader::new(&bytes), &mut ctx).unwrap_err();
        assert!(matches!(err, CodecError::NegativeLength { value: -1, .. }));
    }

    #[test]
    fn unmapped_packet_byte_is_a_framing_error() {
        let mut ctx = context(3, 24);
        let mut writer = BitWriter::new();
        writer.write_u8(200);
        writer.write_i32(0);
        let bytes = writer.finish();

        let err = read_frame(&mut BitReader::new(&bytes), &mut ctx).unwrap_err();
        assert!(matches!(err, CodecError::UnmappedPacket { byte: 200, .. }));
    }

    #[test]
    fn broken_data_tables_demote_to_unknown() {
        let mut ctx = context(3, 24);
        let mut writer = BitWriter::new();
        frame_header(&mut writer, &ctx, PacketKind::DataTables, 0);
        writer.write_i32(1);
        writer.write_u8(0xFF);
        let bytes = writer.finish();

        let frame = read_frame(&mut BitReader::new(&bytes), &mut ctx).unwrap();
        assert!(matches!(frame.packet, Packet::Unknown(span) if span.len == 8));
        assert_eq!(ctx.error_log().len(), 1);
        assert!(ctx.error_log()[0].contains("DataTables (byte"));
    }
}
