//! The fixed-size demo file header.

use bitstream::{BitReader, BitWriter};

use crate::error::HeaderError;

/// Magic bytes at the start of every demo.
pub const MAGIC: [u8; 8] = *b"HL2DEMO\0";

/// Width of each fixed string field.
pub const HEADER_STRING_LEN: usize = 260;

/// Header size in bytes (1072 total).
pub const HEADER_SIZE: usize = 8 + 4 + 4 + 4 * HEADER_STRING_LEN + 4 + 4 + 4 + 4;

/// Demo file header.
///
/// The header fixes the two version numbers that select a
/// [`ProtocolFacts`](crate::ProtocolFacts) for the rest of the file.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DemoHeader {
    /// Demo container format version.
    pub demo_protocol: i32,
    /// Engine network protocol version.
    pub network_protocol: i32,
    pub server_name: String,
    pub client_name: String,
    pub map_name: String,
    pub game_directory: String,
    /// Recorded duration in seconds.
    pub playback_time: f32,
    pub playback_ticks: i32,
    pub playback_frames: i32,
    /// Byte length of the sign-on section.
    pub signon_length: i32,
}

impl DemoHeader {
    /// Reads the header from the start of `reader`, leaving the cursor on
    /// the first frame.
    pub fn read(reader: &mut BitReader<'_>) -> Result<Self, HeaderError> {
        let available = reader.bits_remaining() / 8;
        if available < HEADER_SIZE {
            return Err(HeaderError::TooShort {
                actual: available,
                required: HEADER_SIZE,
            });
        }
        let magic = reader.read_bytes(MAGIC.len())?;
        if magic != MAGIC {
            let mut found = [0u8; 8];
            found.copy_from_slice(&magic);
            return Err(HeaderError::InvalidMagic { found });
        }
        Ok(Self {
            demo_protocol: reader.read_i32()?,
            network_protocol: reader.read_i32()?,
            server_name: reader.read_string_of_length(HEADER_STRING_LEN)?,
            client_name: reader.read_string_of_length(HEADER_STRING_LEN)?,
            map_name: reader.read_string_of_length(HEADER_STRING_LEN)?,
            game_directory: reader.read_string_of_length(HEADER_STRING_LEN)?,
            playback_time: reader.read_f32()?,
            playback_ticks: reader.read_i32()?,
            playback_frames: reader.read_i32()?,
            signon_length: reader.read_i32()?,
        })
    }

    /// Parses a header from the first [`HEADER_SIZE`] bytes of `bytes`.
    pub fn parse(bytes: &[u8]) -> Result<Self, HeaderError> {
        Self::read(&mut BitReader::new(bytes))
    }

    /// Encodes the header. Strings longer than a field are truncated.
    pub fn write(&self, writer: &mut BitWriter) {
        writer.write_bytes(&MAGIC);
        writer.write_i32(self.demo_protocol);
        writer.write_i32(self.network_protocol);
        writer.write_fixed_string(&self.server_name, HEADER_STRING_LEN);
        writer.write_fixed_string(&self.client_name, HEADER_STRING_LEN);
        writer.write_fixed_string(&self.map_name, HEADER_STRING_LEN);
        writer.write_fixed_string(&self.game_directory, HEADER_STRING_LEN);
        writer.write_f32(self.playback_time);
        writer.write_i32(self.playback_ticks);
        writer.write_i32(self.playback_frames);
        writer.write_i32(self.signon_length);
    }

    /// A header with the given versions and empty display fields.
    #[must_use]
    pub fn minimal(demo_protocol: i32, network_protocol: i32) -> Self {
        Self {
            demo_protocol,
            network_protocol,
            server_name: String::new(),
            client_name: String::new(),
            map_name: String::new(),
            game_directory: String::new(),
            playback_time: 0.0,
            playback_ticks: 0,
            playback_frames: 0,
            signon_length: 0,
        }
    }
}
