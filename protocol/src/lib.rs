//! Demo header, protocol version registry and dispatch tables for srcdem.
//!
//! This crate turns a demo's two header integers into a [`ProtocolFacts`]
//! value: the game variant, every version-conditional field width, and the
//! byte <-> kind tables for packets, messages, user messages and send-prop
//! types. It knows nothing about message payloads.
//!
//! # Design Principles
//!
//! - **Tables as data** - One static array per variant, selected by a single match.
//! - **Total construction** - Unknown versions degrade to `Unknown` kinds, never an error.
//! - **Build once** - Reverse maps are built when facts are created and never mutated.

mod dispatch;
mod error;
mod header;
mod props;
mod registry;

pub use dispatch::{
    DispatchKind, DispatchTable, MessageKind, PacketKind, PropKind, UserMessageKind,
};
pub use error::{HeaderError, ProtocolError, ProtocolResult};
pub use header::{DemoHeader, HEADER_SIZE, HEADER_STRING_LEN, MAGIC};
pub use props::{FlagLayout, PropFlags};
pub use registry::{GameVariant, ProtocolFacts};

/// Width of an entity index.
pub const MAX_EDICT_BITS: u32 = 11;

/// Number of entity slots.
pub const MAX_EDICTS: usize = 1 << MAX_EDICT_BITS;

/// Width of an entity handle's serial number.
pub const ENTITY_SERIAL_BITS: u32 = 10;

/// Width of a string table id.
pub const MAX_STRING_TABLE_BITS: u32 = 5;
