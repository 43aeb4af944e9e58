//! Schema decoding and flattening errors.

use std::fmt;

use bitstream::BitError;

/// Result type for schema operations.
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Errors that can occur when reading or flattening send tables.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SchemaError {
    /// Low-level read failure.
    Bits(BitError),

    /// A send prop's type byte has no kind in the active variant.
    UnknownPropType { byte: u8, prop: String },

    /// A data table prop or server class names a table that was not sent.
    MissingTable { name: String },

    /// Table nesting exceeded the recursion limit.
    TooDeep { table: String, limit: usize },

    /// An array prop is not preceded by its element prop.
    MissingArrayElement { table: String, prop: String },
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bits(err) => write!(f, "send table read failed: {err}"),
            Self::UnknownPropType { byte, prop } => {
                write!(f, "unknown send prop type {byte} for '{prop}'")
            }
            Self::MissingTable { name } => write!(f, "send table '{name}' not found"),
            Self::TooDeep { table, limit } => {
                write!(f, "send table '{table}' nested deeper than {limit}")
            }
            Self::MissingArrayElement { table, prop } => {
                write!(f, "array '{prop}' in '{table}' has no element prop")
            }
        }
    }
}

impl std::error::Error for SchemaError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Bits(err) => Some(err),
            _ => None,
        }
    }
}

impl From<BitError> for SchemaError {
    fn from(err: BitError) -> Self {
        Self::Bits(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_mentions_names() {
        let err = SchemaError::MissingTable {
            name: "DT_BaseEntity".to_string(),
        };
        assert!(err.to_string().contains("DT_BaseEntity"));

        let err = SchemaError::UnknownPropType {
            byte: 9,
            prop: "m_vecOrigin".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains('9'));
        assert!(msg.contains("m_vecOrigin"));
    }

    #[test]
    fn wraps_bit_errors() {
        let err: SchemaError = BitError::OutOfRange {
            requested: 5,
            available: 1,
        }
        .into();
        assert!(std::error::Error::source(&err).is_some());
    }
}
