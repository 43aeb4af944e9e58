//! Options for a decode pass.

/// Options and limits applied while decoding a demo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseOptions {
    /// Maximum number of frames decoded before the pass stops.
    pub max_frames: usize,
    /// Maximum number of lines kept in the error log; later lines are
    /// counted but dropped.
    pub max_error_log: usize,
    /// Maximum size of one decompressed string table block.
    pub max_decompressed_bytes: usize,
    /// Decode `SvcPacketEntities` payloads into the entity snapshot.
    pub decode_entities: bool,
    /// Decode user message payloads; otherwise they stay unimplemented.
    pub decode_user_messages: bool,
    /// Decode string table entry payloads by table name.
    pub decode_string_table_payloads: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            max_frames: 1 << 24,
            max_error_log: 4096,
            max_decompressed_bytes: 16 * 1024 * 1024,
            decode_entities: true,
            decode_user_messages: true,
            decode_string_table_payloads: true,
        }
    }
}

impl ParseOptions {
    /// Creates options suitable for testing with smaller values.
    #[must_use]
    pub const fn for_testing() -> Self {
        Self {
            max_frames: 1024,
            max_error_log: 64,
            max_decompressed_bytes: 64 * 1024,
            decode_entities: true,
            decode_user_messages: true,
            decode_string_table_payloads: true,
        }
    }

    /// Creates options with no restrictions (use with caution).
    #[must_use]
    pub const fn unlimited() -> Self {
        Self {
            max_frames: usize::MAX,
            max_error_log: usize::MAX,
            max_decompressed_bytes: usize::MAX,
            decode_entities: true,
            decode_user_messages: true,
            decode_string_table_payloads: true,
        }
    }

    /// Framing and string tables only; skips entity and user message payloads.
    #[must_use]
    pub fn framing_only() -> Self {
        Self {
            decode_entities: false,
            decode_user_messages: false,
            ..Self::default()
        }
    }
}
