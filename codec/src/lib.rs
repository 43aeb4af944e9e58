//! Frame, message, string table and entity decoding for srcdem.
//!
//! This is the main crate that ties together bitstream, protocol and schema
//! to decode a whole demo file:
//!
//! - Frames and their packet payloads
//! - Net/svc messages, user messages, sounds and game events
//! - String tables, including LZSS-compressed creates and history-coded names
//! - Entity snapshots and per-class baselines
//!
//! # Design Principles
//!
//! - **One bad unit, one log line** - A failed message, table or entity pass
//!   is demoted and logged; decoding continues wherever its end is known.
//! - **Spans, not copies** - Decoded objects record [`BitSpan`]s into the
//!   file, so raw bits stay reachable for hex dumps and patching.
//! - **One context per file** - All mutable state lives in a
//!   [`DecodeContext`]; there are no globals.
//!
//! # Example
//!
//! ```no_run
//! use codec::{Demo, ParseOptions};
//!
//! let bytes = std::fs::read("demo.dem").unwrap();
//! let demo = Demo::parse(bytes, &ParseOptions::default()).unwrap();
//! for (frame, cmd) in demo.console_commands_containing("jump") {
//!     println!("{} {}", frame.tick, cmd.command);
//! }
//! ```

mod context;
mod demo;
mod entity;
mod error;
mod frame;
mod game_event;
mod limits;
pub mod lzss;
pub mod message;
pub mod render;
mod snapshot;
mod sound;
mod string_table;
mod user_cmd;
mod user_message;

pub use bitstream::BitSpan;
pub use context::DecodeContext;
pub use demo::Demo;
pub use entity::{
    decode_prop, EntityDecoder, EntityPass, EntityUpdate, PacketEntitiesShape, PropDelta,
    PropValue, UpdateKind,
};
pub use error::{CodecError, CodecResult, LimitKind, LzssError};
pub use frame::{
    decode_packet, CmdInfo, ConsoleCmd, CustomData, DataTablesPacket, Frame, Packet, PacketData,
    StringTablesPacket, UserCmdPacket, CMD_INFO_SIZE,
};
pub use game_event::{
    EventKeyType, GameEvent, GameEventDescriptor, GameEventList, GameEventValue,
};
pub use limits::ParseOptions;
pub use message::{MessageBody, NetMessage};
pub use render::{render, Render};
pub use snapshot::{write_props, Baselines, Entity, EntitySnapshot, PropArray};
pub use sound::SoundInfo;
pub use string_table::{
    EntryData, PayloadDecoding, PlayerInfo, StringTable, StringTableEntry, StringTableManager,
    StringTablesSnapshot, TableSnapshot,
};
pub use user_cmd::UserCmd;
pub use user_message::{decode_user_message, UserMessage, UserMessageBody};
