//! Error types for demo decoding.

use std::fmt;

use bitstream::BitError;
use protocol::{HeaderError, MessageKind, PacketKind, PropKind, ProtocolError};
use schema::SchemaError;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors that can occur while decoding a demo.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CodecError {
    /// Bitstream error; the out-of-range condition that drives recovery.
    Bitstream(BitError),

    /// Demo header error.
    Header(HeaderError),

    /// Dispatch table error.
    Protocol(ProtocolError),

    /// Send table or flattening error.
    Schema(SchemaError),

    /// Packet framing failed; decoding of the file stops here.
    Framing {
        frame_index: usize,
        source: Box<CodecError>,
    },

    /// A frame's packet byte has no usable kind.
    UnmappedPacket { byte: u8, kind: PacketKind },

    /// A size field is negative.
    NegativeLength { field: &'static str, value: i32 },

    /// A message selector has no decoder in the active variant.
    UnmappedMessage { byte: u8, kind: MessageKind },

    /// A length-prefixed payload was not fully consumed.
    TrailingBits {
        kind: MessageKind,
        remaining_bits: usize,
    },

    /// A string table update could not be applied, or the table was a
    /// placeholder.
    TableNotReadable { table: String },

    /// A string table entry index is outside the table.
    EntryIndexOutOfRange { index: u32, max_entries: u32 },

    /// A string history reference points past the history window.
    HistoryIndexOutOfRange { index: u32, len: usize },

    /// Compressed string table data is malformed.
    Compression(LzssError),

    /// A game event id has no descriptor.
    UnknownGameEvent { id: u32 },

    /// A class id is outside the class catalog.
    UnknownServerClass { id: u32, count: usize },

    /// An entity index is outside the entity table.
    EntityIndexOutOfRange { index: u32 },

    /// An entity update targets an empty slot.
    EntityNotFound { index: u32 },

    /// A prop index is outside the class's flattened list.
    PropIndexOutOfRange { index: usize, count: usize },

    /// A flattened prop has a kind that carries no value.
    UnsupportedPropKind { prop: String, kind: PropKind },

    /// Entity data arrived before any class schema.
    MissingSchema,

    /// Limits exceeded.
    LimitsExceeded {
        kind: LimitKind,
        limit: usize,
        actual: usize,
    },
}

/// Malformed LZSS streams.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LzssError {
    /// The block does not start with the `LZSS` tag.
    BadTag { found: [u8; 4] },
    /// The stream ended before its terminator.
    Truncated { at: usize },
    /// A back-reference points before the start of the output.
    BadOffset { offset: usize, produced: usize },
    /// The output length differs from the declared size.
    SizeMismatch { expected: usize, actual: usize },
}

/// Specific limit that was exceeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitKind {
    Frames,
    ErrorLog,
    DecompressedBytes,
}

impl CodecError {
    /// Returns `true` if the error is the read-past-end condition.
    #[must_use]
    pub fn is_out_of_range(&self) -> bool {
        match self {
            Self::Bitstream(err) => err.is_out_of_range(),
            Self::Schema(SchemaError::Bits(err)) => err.is_out_of_range(),
            Self::Framing { source, .. } => source.is_out_of_range(),
            _ => false,
        }
    }
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bitstream(e) => write!(f, "bitstream error: {e}"),
            Self::Header(e) => write!(f, "header error: {e}"),
            Self::Protocol(e) => write!(f, "protocol error: {e}"),
            Self::Schema(e) => write!(f, "schema error: {e}"),
            Self::Framing {
                frame_index,
                source,
            } => {
                write!(f, "framing failed at frame {frame_index}: {source}")
            }
            Self::UnmappedPacket { byte, kind } => {
                write!(f, "packet byte {byte} resolves to {kind:?}")
            }
            Self::NegativeLength { field, value } => {
                write!(f, "negative {field}: {value}")
            }
            Self::UnmappedMessage { byte, kind } => {
                write!(f, "message byte {byte} resolves to {kind:?}")
            }
            Self::TrailingBits {
                kind,
                remaining_bits,
            } => {
                write!(f, "{kind:?} left {remaining_bits} bits unread")
            }
            Self::TableNotReadable { table } => {
                write!(f, "string table '{table}' is not readable")
            }
            Self::EntryIndexOutOfRange { index, max_entries } => {
                write!(
                    f,
                    "string table entry {index} out of range (max {max_entries})"
                )
            }
            Self::HistoryIndexOutOfRange { index, len } => {
                write!(f, "string history slot {index} out of range ({len} names)")
            }
            Self::Compression(e) => write!(f, "compression error: {e}"),
            Self::UnknownGameEvent { id } => write!(f, "unknown game event id {id}"),
            Self::UnknownServerClass { id, count } => {
                write!(f, "server class {id} out of range ({count} classes)")
            }
            Self::EntityIndexOutOfRange { index } => {
                write!(f, "entity index {index} out of range")
            }
            Self::EntityNotFound { index } => write!(f, "entity {index} not present"),
            Self::PropIndexOutOfRange { index, count } => {
                write!(f, "prop index {index} out of range ({count} props)")
            }
            Self::UnsupportedPropKind { prop, kind } => {
                write!(f, "prop '{prop}' has undecodable kind {kind:?}")
            }
            Self::MissingSchema => write!(f, "entity data before data tables"),
            Self::LimitsExceeded {
                kind,
                limit,
                actual,
            } => {
                write!(f, "{kind} limit exceeded: {actual} > {limit}")
            }
        }
    }
}

impl fmt::Display for LzssError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadTag { found } => {
                write!(f, "bad LZSS tag {:?}", String::from_utf8_lossy(found))
            }
            Self::Truncated { at } => write!(f, "LZSS stream truncated at byte {at}"),
            Self::BadOffset { offset, produced } => {
                write!(
                    f,
                    "LZSS back-reference {offset} before start ({produced} bytes produced)"
                )
            }
            Self::SizeMismatch { expected, actual } => {
                write!(f, "LZSS produced {actual} bytes, expected {expected}")
            }
        }
    }
}

impl fmt::Display for LimitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Frames => "frames",
            Self::ErrorLog => "error log",
            Self::DecompressedBytes => "decompressed bytes",
        };
        write!(f, "{name}")
    }
}

impl std::error::Error for CodecError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Bitstream(e) => Some(e),
            Self::Header(e) => Some(e),
            Self::Protocol(e) => Some(e),
            Self::Schema(e) => Some(e),
            Self::Framing { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

impl From<BitError> for CodecError {
    fn from(err: BitError) -> Self {
        Self::Bitstream(err)
    }
}

impl From<HeaderError> for CodecError {
    fn from(err: HeaderError) -> Self {
        Self::Header(err)
    }
}

impl From<ProtocolError> for CodecError {
    fn from(err: ProtocolError) -> Self {
        Self::Protocol(err)
    }
}

impl From<SchemaError> for CodecError {
    fn from(err: SchemaError) -> Self {
        Self::Schema(err)
    }
}

impl From<LzssError> for CodecError {
    fn from(err: LzssError) -> Self {
        Self::Compression(err)
    }
}
