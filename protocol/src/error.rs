//! Error types for header parsing and dispatch lookups.

use std::fmt;

use bitstream::BitError;

use crate::registry::GameVariant;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors raised by the dispatch tables.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ProtocolError {
    /// The active variant's table has no byte for this kind.
    NoMapping {
        /// Dispatch axis ("packet", "message", ...).
        axis: &'static str,
        /// Debug rendering of the kind.
        kind: String,
        /// Variant whose table was consulted.
        variant: GameVariant,
    },
}

/// Errors raised while reading the fixed-size demo header.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum HeaderError {
    /// Buffer is shorter than the header.
    TooShort { actual: usize, required: usize },

    /// The first eight bytes are not `HL2DEMO\0`.
    InvalidMagic { found: [u8; 8] },

    /// Low-level read failure.
    Bits(BitError),
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoMapping {
                axis,
                kind,
                variant,
            } => {
                write!(f, "no {axis} byte for {kind} on {variant:?}")
            }
        }
    }
}

impl std::error::Error for ProtocolError {}

impl fmt::Display for HeaderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooShort { actual, required } => {
                write!(
                    f,
                    "demo too short: {actual} bytes, header needs {required}"
                )
            }
            Self::InvalidMagic { found } => {
                write!(f, "invalid demo magic: {}", String::from_utf8_lossy(found))
            }
            Self::Bits(err) => write!(f, "header read failed: {err}"),
        }
    }
}

impl std::error::Error for HeaderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Bits(err) => Some(err),
            _ => None,
        }
    }
}

impl From<BitError> for HeaderError {
    fn from(err: BitError) -> Self {
        Self::Bits(err)
    }
}
