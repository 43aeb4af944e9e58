//! Error types for bitstream operations.

use std::fmt;

/// Result type for bitstream operations.
pub type BitResult<T> = Result<T, BitError>;

/// Errors that can occur during bit-level encoding/decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BitError {
    /// Attempted to read past the end of the reader's bounds.
    OutOfRange {
        /// Number of bits requested.
        requested: usize,
        /// Number of bits available.
        available: usize,
    },

    /// Invalid bit count for the operation.
    InvalidBitCount {
        /// The invalid bit count provided.
        bits: u32,
        /// Maximum allowed bits for this operation.
        max_bits: u32,
    },

    /// Value exceeds the range representable by the specified number of bits.
    ValueOutOfRange {
        /// The value that was out of range.
        value: i64,
        /// Number of bits available.
        bits: u32,
    },

    /// A bit span does not fit inside the underlying buffer.
    InvalidSpan {
        /// Absolute start bit of the span.
        start: usize,
        /// Length of the span in bits.
        len: usize,
        /// Total bits in the buffer.
        buffer_bits: usize,
    },
}

impl BitError {
    /// Returns `true` for the read-side range conditions: reading past the
    /// bounds, or asking for a wider integer than the reader supports.
    #[must_use]
    pub const fn is_out_of_range(&self) -> bool {
        matches!(self, Self::OutOfRange { .. } | Self::InvalidBitCount { .. })
    }
}

impl fmt::Display for BitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfRange {
                requested,
                available,
            } => {
                write!(
                    f,
                    "attempted to read {requested} bits but only {available} bits available"
                )
            }
            Self::InvalidBitCount { bits, max_bits } => {
                write!(f, "invalid bit count {bits}, maximum allowed is {max_bits}")
            }
            Self::ValueOutOfRange { value, bits } => {
                write!(f, "value {value} cannot be represented in {bits} bits")
            }
            Self::InvalidSpan {
                start,
                len,
                buffer_bits,
            } => {
                write!(
                    f,
                    "span of {len} bits at {start} exceeds buffer of {buffer_bits} bits"
                )
            }
        }
    }
}

impl std::error::Error for BitError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_out_of_range() {
        let err = BitError::OutOfRange {
            requested: 8,
            available: 3,
        };
        let msg = err.to_string();
        assert!(msg.contains("8 bits"), "should mention requested bits");
        assert!(msg.contains("3 bits"), "should mention available bits");
        assert!(msg.contains("read"), "should mention read operation");
    }

    #[test]
    fn error_display_invalid_bit_count() {
        let err = BitError::InvalidBitCount {
            bits: 40,
            max_bits: 32,
        };
        let msg = err.to_string();
        assert!(msg.contains("40"));
        assert!(msg.contains("32"));
    }

    #[test]
    fn error_display_value_out_of_range() {
        let err = BitError::ValueOutOfRange {
            value: 256,
            bits: 8,
        };
        let msg = err.to_string();
        assert!(msg.contains("256"));
        assert!(msg.contains("8 bits"));
    }

    #[test]
    fn error_display_invalid_span() {
        let err = BitError::InvalidSpan {
            start: 10,
            len: 100,
            buffer_bits: 64,
        };
        assert!(err.to_string().contains("64 bits"));
    }

    #[test]
    fn out_of_range_classification() {
        assert!(BitError::OutOfRange {
            requested: 1,
            available: 0
        }
        .is_out_of_range());
        assert!(BitError::InvalidBitCount {
            bits: 33,
            max_bits: 32
        }
        .is_out_of_range());
        assert!(!BitError::ValueOutOfRange { value: 2, bits: 1 }.is_out_of_range());
    }

    #[test]
    fn error_is_std_error() {
        fn assert_error<E: std::error::Error>() {}
        assert_error::<BitError>();
    }
}
