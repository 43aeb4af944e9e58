//! Delta-encoded sound descriptions carried by `SvcSounds`.
//!
//! Each field is optional on the wire and falls back to the previous sound
//! in the same message.

use bitstream::{BitReader, BitResult, Vector3};
use protocol::{ProtocolFacts, MAX_EDICT_BITS};

/// Width of a small entity index.
const SHORT_ENTITY_BITS: u32 = 5;
/// Width of a channel number.
const CHANNEL_BITS: u32 = 3;
/// Width of an explicit sequence number.
const SEQUENCE_BITS: u32 = 10;
/// Width of each origin axis, in units of eight.
const ORIGIN_BITS: u32 = 12;
/// The sound stops a playing sound; no parameters follow.
pub const SND_STOP: u32 = 1 << 2;

/// One sound.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SoundInfo {
    pub entity_index: u32,
    pub sound_num: u32,
    pub flags: u32,
    pub channel: u32,
    pub is_ambient: bool,
    pub is_sentence: bool,
    pub sequence: u32,
    pub volume: f32,
    pub sound_level: u32,
    pub pitch: u32,
    pub special_dsp: u32,
    pub delay: f32,
    pub origin: Vector3,
    pub speaker_entity: i32,
}

impl SoundInfo {
    /// Defaults a delta starts from when there is no previous sound.
    #[must_use]
    pub fn initial() -> Self {
        Self {
            volume: 1.0,
            sound_level: 75,
            pitch: 100,
            speaker_entity: -1,
            ..Self::default()
        }
    }

    /// Reads one sound as a delta against `prev`.
    pub fn read_delta(
        reader: &mut BitReader<'_>,
        prev: &Self,
        facts: &ProtocolFacts,
    ) -> BitResult<Self> {
        let mut sound = prev.clone();
        sound.delay = 0.0;

        if reader.read_bool()? {
            sound.entity_index = if reader.read_bool()? {
                reader.read_bits(SHORT_ENTITY_BITS)?
            } else {
                reader.read_bits(MAX_EDICT_BITS)?
            };
        }
        if reader.read_bool()? {
            sound.sound_num = reader.read_bits(facts.sound_index_bits)?;
        }
        if reader.read_bool()? {
            sound.flags = reader.read_bits(facts.sound_flag_bits)?;
        }
        if reader.read_bool()? {
            sound.channel = reader.read_bits(CHANNEL_BITS)?;
        }
        sound.is_ambient = reader.read_bool()?;
        sound.is_sentence = reader.read_bool()?;

        if sound.flags & SND_STOP != 0 {
            return Ok(sound);
        }

        if reader.read_bool()? {
            sound.sequence = 0;
        } else if reader.read_bool()? {
            sound.sequence = prev.sequence.wrapping_add(1);
        } else {
            sound.sequence = reader.read_bits(SEQUENCE_BITS)?;
        }
        if reader.read_bool()? {
            sound.volume = reader.read_bits(7)? as f32 / 127.0;
        }
        if reader.read_bool()? {
            sound.sound_level = reader.read_bits(9)?;
        }
        if reader.read_bool()? {
            sound.pitch = reader.read_bits(8)?;
        }
        if facts.is_new_engine() && reader.read_bool()? {
            sound.special_dsp = reader.read_bits(8)?;
        }
        if reader.read_bool()? {
            let raw = reader.read_sbits(13)? as f32 / 1000.0;
            let scaled = if raw < 0.0 { raw * 10.0 } else { raw };
            sound.delay = scaled - 0.1;
        }
        sound.origin = Vector3::new(
            read_origin_axis(reader)?,
            read_origin_axis(reader)?,
            read_origin_axis(reader)?,
        );
        if reader.read_bool()? {
            sound.speaker_entity = reader.read_sbits(ORIGIN_BITS)?;
        }
        Ok(sound)
    }
}

fn read_origin_axis(reader: &mut BitReader<'_>) -> BitResult<f32> {
    if reader.read_bool()? {
        Ok((reader.read_sbits(ORIGIN_BITS)? * 8) as f32)
    } else {
        Ok(0.0)
    }
}
