//! Delta-encoded player input from `UserCmd` frames.
//!
//! Every field sits behind a presence bit; absent fields are unchanged from
//! the previous command and decode as `None`.

use bitstream::{BitReader, BitResult};
use protocol::MAX_EDICT_BITS;

const WEAPON_SUBTYPE_BITS: u32 = 6;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserCmd {
    pub command_number: Option<u32>,
    pub tick_count: Option<u32>,
    pub view_angles: [Option<f32>; 3],
    /// Forward, side and up move.
    pub movement: [Option<f32>; 3],
    pub buttons: Option<u32>,
    pub impulse: Option<u8>,
    pub weapon_select: Option<u32>,
    pub weapon_subtype: Option<u32>,
    pub mouse_dx: Option<i16>,
    pub mouse_dy: Option<i16>,
}

fn optional<T>(
    r: &mut BitReader<'_>,
    read: impl FnOnce(&mut BitReader<'_>) -> BitResult<T>,
) -> BitResult<Option<T>> {
    if r.read_bool()? {
        read(r).map(Some)
    } else {
        Ok(None)
    }
}

impl UserCmd {
    pub fn read(r: &mut BitReader<'_>) -> BitResult<Self> {
        let command_number = optional(r, |r| r.read_u32())?;
        let tick_count = optional(r, |r| r.read_u32())?;
        let view_angles = [
            optional(r, |r| r.read_f32())?,
            optional(r, |r| r.read_f32())?,
            optional(r, |r| r.read_f32())?,
        ];
        let movement = [
            optional(r, |r| r.read_f32())?,
            optional(r, |r| r.read_f32())?,
            optional(r, |r| r.read_f32())?,
        ];
        let buttons = optional(r, |r| r.read_u32())?;
        let impulse = optional(r, |r| r.read_u8())?;
        let (weapon_select, weapon_subtype) = if r.read_bool()? {
            let select = r.read_bits(MAX_EDICT_BITS)?;
            let subtype = optional(r, |r| r.read_bits(WEAPON_SUBTYPE_BITS))?;
            (Some(select), subtype)
        } else {
            (None, None)
        };
        let mouse_dx = optional(r, |r| r.read_i16())?;
        let mouse_dy = optional(r, |r| r.read_i16())?;
        Ok(Self {
            command_number,
            tick_count,
            view_angles,
            movement,
            buttons,
            impulse,
            weapon_select,
            weapon_subtype,
            mouse_dx,
            mouse_dy,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitstream::BitWriter;

    #[test]
    fn absent_fields_are_none() {
        let mut writer = BitWriter::new();
        writer.write_bool(true);
        writer.write_u32(77);
        writer.write_bool(false);
        writer.write_bool(false);
        writer.write_bool(true);
        writer.write_f32(90.0);
        writer.write_bool(false);
        writer.write_bool(true);
        writer.write_f32(175.0);
        for _ in 0..2 {
            writer.write_bool(false);
        }
        writer.write_bool(true);
        writer.write_u32(1 << 1);
        writer.write_bool(false);
        writer.write_bool(true);
        writer.write_bits(3, MAX_EDICT_BITS).unwrap();
        writer.write_bool(false);
        writer.write_bool(true);
        writer.write_u16((-4i16) as u16);
        writer.write_bool(false);
        let bytes = writer.finish();

        let cmd = UserCmd::read(&mut BitReader::new(&bytes)).unwrap();
        assert_eq!(cmd.command_number, Some(77));
        assert_eq!(cmd.tick_count, None);
        assert_eq!(cmd.view_angles, [None, Some(90.0), None]);
        assert_eq!(cmd.movement, [Some(175.0), None, None]);
        assert_eq!(cmd.buttons, Some(2));
        assert_eq!(cmd.weapon_select, Some(3));
        assert_eq!(cmd.weapon_subtype, None);
        assert_eq!(cmd.mouse_dx, Some(-4));
        assert_eq!(cmd.mouse_dy, None);
    }

    #[test]
    fn truncated_command_fails() {
        let mut writer = BitWriter::new();
        writer.write_bool(true);
        writer.write_u8(1);
        let bytes = writer.finish();
        assert!(UserCmd::read(&mut BitReader::new(&bytes)).is_err());
    }
}
