//! The whole-file decode pipeline and its query surface.

use bitstream::{BitReader, BitResult, BitSpan};
use protocol::{DemoHeader, MessageKind, PacketKind, ProtocolFacts, HEADER_SIZE};
use schema::{DataTables, FlattenedClass};
use tracing::{debug, info};

use crate::context::DecodeContext;
use crate::error::{CodecError, CodecResult};
use crate::frame::{read_frame, ConsoleCmd, Frame, Packet};
use crate::game_event::GameEventList;
use crate::limits::ParseOptions;
use crate::message::{MessageBody, NetMessage};
use crate::snapshot::{Baselines, EntitySnapshot};
use crate::string_table::StringTableManager;
use crate::user_message::UserMessage;

/// Fewer bits than this after a frame means the file is done.
const MIN_FRAME_BITS: usize = 24;

/// A decoded demo file. Owns its bytes; every span points into them.
#[derive(Debug, Clone)]
pub struct Demo {
    bytes: Vec<u8>,
    header: DemoHeader,
    frames: Vec<Frame>,
    ctx: DecodeContext,
}

impl Demo {
    /// Decodes `bytes`. Per-message and per-table failures are recorded in
    /// [`Demo::error_log`]; only framing failures are returned.
    pub fn parse(bytes: Vec<u8>, options: &ParseOptions) -> CodecResult<Self> {
        let header = DemoHeader::parse(&bytes)?;
        let facts = ProtocolFacts::new(header.demo_protocol, header.network_protocol);
        info!(
            demo_protocol = header.demo_protocol,
            network_protocol = header.network_protocol,
            variant = ?facts.variant,
            map = %header.map_name,
            "parsing demo"
        );
        let mut ctx = DecodeContext::new(facts, options.clone());

        let mut reader = BitReader::new(&bytes);
        reader.skip_bytes(HEADER_SIZE)?;
        let frames = read_frames(&mut reader, &mut ctx)?;
        debug!(
            frames = frames.len(),
            errors = ctx.error_log().len(),
            "demo parsed"
        );

        Ok(Self {
            bytes,
            header,
            frames,
            ctx,
        })
    }

    #[must_use]
    pub const fn header(&self) -> &DemoHeader {
        &self.header
    }

    #[must_use]
    pub const fn facts(&self) -> &ProtocolFacts {
        &self.ctx.facts
    }

    #[must_use]
    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    /// One line per demoted message, packet, table or entity pass.
    #[must_use]
    pub fn error_log(&self) -> &[String] {
        self.ctx.error_log()
    }

    /// Log lines dropped once the log reached its cap.
    #[must_use]
    pub const fn dropped_errors(&self) -> usize {
        self.ctx.dropped_errors()
    }

    /// String tables as they stand at the end of the file.
    #[must_use]
    pub const fn string_tables(&self) -> &StringTableManager {
        &self.ctx.string_tables
    }

    /// Entities as they stand at the end of the file.
    #[must_use]
    pub const fn entities(&self) -> &EntitySnapshot {
        &self.ctx.entities
    }

    #[must_use]
    pub const fn baselines(&self) -> &Baselines {
        &self.ctx.baselines
    }

    #[must_use]
    pub const fn data_tables(&self) -> Option<&DataTables> {
        self.ctx.data_tables.as_ref()
    }

    #[must_use]
    pub fn flattened_classes(&self) -> &[FlattenedClass] {
        &self.ctx.flattened
    }

    #[must_use]
    pub const fn game_events(&self) -> &GameEventList {
        &self.ctx.game_events
    }

    /// The original file.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// A reader over `span` of the original file.
    pub fn reader_at(&self, span: BitSpan) -> BitResult<BitReader<'_>> {
        BitReader::at(&self.bytes, span)
    }

    /// Hex dump of `span`; empty if the span is out of bounds.
    #[must_use]
    pub fn hex_of(&self, span: BitSpan) -> String {
        self.reader_at(span)
            .map(|reader| reader.to_hex_string())
            .unwrap_or_default()
    }

    pub fn frames_where<'a>(
        &'a self,
        mut predicate: impl FnMut(&Frame) -> bool + 'a,
    ) -> impl Iterator<Item = &'a Frame> + 'a {
        self.frames.iter().filter(move |frame| predicate(frame))
    }

    /// Every message of every `SignOn` and `Packet` frame, with its frame.
    pub fn messages(&self) -> impl Iterator<Item = (&Frame, &NetMessage)> {
        self.frames
            .iter()
            .flat_map(|frame| frame.messages().iter().map(move |message| (frame, message)))
    }

    pub fn messages_of_kind(
        &self,
        kind: MessageKind,
    ) -> impl Iterator<Item = (&Frame, &NetMessage)> {
        self.messages()
            .filter(move |(_, message)| message.kind == kind)
    }

    /// User messages carried by `SvcUserMessage`.
    pub fn user_messages(&self) -> impl Iterator<Item = (&Frame, &UserMessage)> {
        self.messages().filter_map(|(frame, message)| match &message.body {
            MessageBody::SvcUserMessage(msg) => Some((frame, &msg.message)),
            _ => None,
        })
    }

    /// `ConsoleCmd` frames whose command satisfies `predicate`.
    pub fn console_commands_matching<'a>(
        &'a self,
        mut predicate: impl FnMut(&str) -> bool + 'a,
    ) -> impl Iterator<Item = (&'a Frame, &'a ConsoleCmd)> + 'a {
        self.frames.iter().filter_map(move |frame| match &frame.packet {
            Packet::ConsoleCmd(cmd) if predicate(&cmd.command) => Some((frame, cmd)),
            _ => None,
        })
    }

    pub fn console_commands_containing<'a>(
        &'a self,
        text: &'a str,
    ) -> impl Iterator<Item = (&'a Frame, &'a ConsoleCmd)> + 'a {
        self.console_commands_matching(move |command| command.contains(text))
    }
}

fn read_frames(reader: &mut BitReader<'_>, ctx: &mut DecodeContext) -> CodecResult<Vec<Frame>> {
    let mut frames = Vec::new();
    while reader.bits_remaining() >= MIN_FRAME_BITS {
        if frames.len() >= ctx.options.max_frames {
            let line = format!(
                "[tick {}] stopped after {} frames: frame limit reached",
                ctx.tick,
                frames.len()
            );
            ctx.log(line);
            break;
        }
        let frame_index = frames.len();
        ctx.frame_index = frame_index;
        let frame = read_frame(reader, ctx).map_err(|source| {
            let err = CodecError::Framing {
                frame_index,
                source: Box::new(source),
            };
            let line = format!("[tick {}] {err}", ctx.tick);
            ctx.log(line);
            err
        })?;
        let stop = frame.kind == PacketKind::Stop;
        frames.push(frame);
        if stop {
            break;
        }
    }
    Ok(frames)
}
