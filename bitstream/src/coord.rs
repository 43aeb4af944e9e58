//! Vector and quantized coordinate encodings.
//!
//! These are the fixed-point float formats used by the engine's transport:
//! presence-bit-gated integer/fraction coordinates, multiplayer coordinates
//! with an in-bounds flag, cell-relative coordinates and unit normals.

use crate::error::BitResult;
use crate::reader::BitReader;
use crate::writer::BitWriter;

/// Integer bits of a legacy coordinate.
pub const COORD_INTEGER_BITS: u32 = 14;
/// Fraction bits of a coordinate.
pub const COORD_FRACTIONAL_BITS: u32 = 5;
/// Fraction bits of a low-precision coordinate.
pub const COORD_FRACTIONAL_BITS_LOWPRECISION: u32 = 3;
/// Integer bits of an in-bounds multiplayer coordinate.
pub const COORD_INTEGER_BITS_MP: u32 = 11;
/// Fraction bits of a unit normal component.
pub const NORMAL_FRACTIONAL_BITS: u32 = 11;

const COORD_RESOLUTION: f32 = 1.0 / (1 << COORD_FRACTIONAL_BITS) as f32;
const COORD_RESOLUTION_LOWPRECISION: f32 = 1.0 / (1 << COORD_FRACTIONAL_BITS_LOWPRECISION) as f32;
const NORMAL_RESOLUTION: f32 = 1.0 / ((1 << NORMAL_FRACTIONAL_BITS) - 1) as f32;

/// A three-component float vector.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vector3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vector3 {
    /// Creates a vector.
    #[must_use]
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

/// A two-component float vector.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vector2 {
    pub x: f32,
    pub y: f32,
}

impl BitReader<'_> {
    /// Reads three raw floats.
    pub fn read_vector3(&mut self) -> BitResult<Vector3> {
        Ok(Vector3 {
            x: self.read_f32()?,
            y: self.read_f32()?,
            z: self.read_f32()?,
        })
    }

    /// Reads two raw floats.
    pub fn read_vector2(&mut self) -> BitResult<Vector2> {
        Ok(Vector2 {
            x: self.read_f32()?,
            y: self.read_f32()?,
        })
    }

    /// Reads an `bits`-wide unsigned value scaled onto `[0, 360)` degrees.
    pub fn read_bit_angle(&mut self, bits: u32) -> BitResult<f32> {
        let raw = self.read_bits(bits)?;
        let shift = (1u64 << bits) as f32;
        Ok(raw as f32 * (360.0 / shift))
    }

    /// Reads a legacy coordinate: an integer-present bit, a fraction-present
    /// bit, then sign, integer (stored minus one) and fraction as flagged.
    pub fn read_bit_coord(&mut self) -> BitResult<f32> {
        let has_int = self.read_bool()?;
        let has_fract = self.read_bool()?;
        if !has_int && !has_fract {
            return Ok(0.0);
        }
        let negative = self.read_bool()?;
        let int_value = if has_int {
            self.read_bits(COORD_INTEGER_BITS)? + 1
        } else {
            0
        };
        let fract_value = if has_fract {
            self.read_bits(COORD_FRACTIONAL_BITS)?
        } else {
            0
        };
        let value = int_value as f32 + fract_value as f32 * COORD_RESOLUTION;
        Ok(if negative { -value } else { value })
    }

    /// Reads a vector of legacy coordinates, each gated by a presence bit.
    pub fn read_vector_coord(&mut self) -> BitResult<Vector3> {
        let has_x = self.read_bool()?;
        let has_y = self.read_bool()?;
        let has_z = self.read_bool()?;
        let mut out = Vector3::default();
        if has_x {
            out.x = self.read_bit_coord()?;
        }
        if has_y {
            out.y = self.read_bit_coord()?;
        }
        if has_z {
            out.z = self.read_bit_coord()?;
        }
        Ok(out)
    }

    /// Reads a multiplayer coordinate with an in-bounds flag selecting
    /// the integer width.
    pub fn read_bit_coord_mp(&mut self, integral: bool, low_precision: bool) -> BitResult<f32> {
        let in_bounds = self.read_bool()?;
        let int_bits = if in_bounds {
            COORD_INTEGER_BITS_MP
        } else {
            COORD_INTEGER_BITS
        };
        let has_int = self.read_bool()?;
        if integral {
            if !has_int {
                return Ok(0.0);
            }
            let negative = self.read_bool()?;
            let value = (self.read_bits(int_bits)? + 1) as f32;
            return Ok(if negative { -value } else { value });
        }

        let negative = self.read_bool()?;
        let int_value = if has_int {
            self.read_bits(int_bits)? + 1
        } else {
            0
        };
        let (fract_bits, resolution) = if low_precision {
            (COORD_FRACTIONAL_BITS_LOWPRECISION, COORD_RESOLUTION_LOWPRECISION)
        } else {
            (COORD_FRACTIONAL_BITS, COORD_RESOLUTION)
        };
        let fract_value = self.read_bits(fract_bits)?;
        let value = int_value as f32 + fract_value as f32 * resolution;
        Ok(if negative { -value } else { value })
    }

    /// Reads a cell-relative coordinate.
    pub fn read_bit_cell_coord(
        &mut self,
        bits: u32,
        integral: bool,
        low_precision: bool,
    ) -> BitResult<f32> {
        let int_value = self.read_bits(bits)?;
        if integral {
            return Ok(int_value as f32);
        }
        let (fract_bits, resolution) = if low_precision {
            (COORD_FRACTIONAL_BITS_LOWPRECISION, COORD_RESOLUTION_LOWPRECISION)
        } else {
            (COORD_FRACTIONAL_BITS, COORD_RESOLUTION)
        };
        let fract_value = self.read_bits(fract_bits)?;
        Ok(int_value as f32 + fract_value as f32 * resolution)
    }

    /// Reads one component of a unit normal.
    pub fn read_bit_normal(&mut self) -> BitResult<f32> {
        let negative = self.read_bool()?;
        let fract = self.read_bits(NORMAL_FRACTIONAL_BITS)?;
        let value = fract as f32 * NORMAL_RESOLUTION;
        Ok(if negative { -value } else { value })
    }
}

impl BitWriter {
    /// Writes three raw floats.
    pub fn write_vector3(&mut self, v: Vector3) {
        self.write_f32(v.x);
        self.write_f32(v.y);
        self.write_f32(v.z);
    }

    /// Writes a legacy coordinate, truncating to the encodable resolution.
    pub fn write_bit_coord(&mut self, value: f32) -> BitResult<()> {
        let negative = value < 0.0;
        let magnitude = value.abs();
        let int_value = magnitude.trunc() as u32;
        let fract_value = ((magnitude - int_value as f32) / COORD_RESOLUTION) as u32;
        self.write_bool(int_value != 0);
        self.write_bool(fract_value != 0);
        if int_value == 0 && fract_value == 0 {
            return Ok(());
        }
        self.write_bool(negative);
        if int_value != 0 {
            self.write_bits(int_value - 1, COORD_INTEGER_BITS)?;
        }
        if fract_value != 0 {
            self.write_bits(fract_value, COORD_FRACTIONAL_BITS)?;
        }
        Ok(())
    }

    /// Writes a vector of legacy coordinates with presence bits for non-zero
    /// components.
    pub fn write_vector_coord(&mut self, v: Vector3) -> BitResult<()> {
        let parts = [v.x, v.y, v.z];
        for part in parts {
            self.write_bool(part != 0.0);
        }
        for part in parts {
            if part != 0.0 {
                self.write_bit_coord(part)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bit_angle_scales_to_degrees() {
        let mut w = BitWriter::new();
        w.write_bits(1 << 15, 16).unwrap();
        let bytes = w.finish();
        let mut r = BitReader::new(&bytes);
        assert_eq!(r.read_bit_angle(16).unwrap(), 180.0);
    }

    #[test]
    fn coord_roundtrip() {
        for value in [0.0f32, 1.0, -1.0, 12.5, -300.03125, 4000.96875] {
            let mut w = BitWriter::new();
            w.write_bit_coord(value).unwrap();
            let bytes = w.finish();
            let mut r = BitReader::new(&bytes);
            assert_eq!(r.read_bit_coord().unwrap(), value, "value {value}");
        }
    }

    #[test]
    fn zero_coord_is_two_bits() {
        let mut w = BitWriter::new();
        w.write_bit_coord(0.0).unwrap();
        assert_eq!(w.bits_written(), 2);
    }

    #[test]
    fn vector_coord_skips_absent_components() {
        let v = Vector3::new(0.0, -2.5, 0.0);
        let mut w = BitWriter::new();
        w.write_vector_coord(v).unwrap();
        let bytes = w.finish();
        let mut r = BitReader::new(&bytes);
        assert_eq!(r.read_vector_coord().unwrap(), v);
    }

    #[test]
    fn coord_mp_integral() {
        let mut w = BitWriter::new();
        w.write_bool(true); // in bounds
        w.write_bool(true); // has int
        w.write_bool(true); // negative
        w.write_bits(9, COORD_INTEGER_BITS_MP).unwrap();
        let bytes = w.finish();
        let mut r = BitReader::new(&bytes);
        assert_eq!(r.read_bit_coord_mp(true, false).unwrap(), -10.0);
    }

    #[test]
    fn coord_mp_low_precision_fraction() {
        let mut w = BitWriter::new();
        w.write_bool(false); // out of bounds
        w.write_bool(false); // no int
        w.write_bool(false); // positive
        w.write_bits(4, COORD_FRACTIONAL_BITS_LOWPRECISION).unwrap();
        let bytes = w.finish();
        let mut r = BitReader::new(&bytes);
        assert_eq!(r.read_bit_coord_mp(false, true).unwrap(), 0.5);
    }

    #[test]
    fn cell_coord() {
        let mut w = BitWriter::new();
        w.write_bits(7, 10).unwrap();
        w.write_bits(16, COORD_FRACTIONAL_BITS).unwrap();
        let bytes = w.finish();
        let mut r = BitReader::new(&bytes);
        assert_eq!(r.read_bit_cell_coord(10, false, false).unwrap(), 7.5);
    }

    #[test]
    fn normal_extremes() {
        let mut w = BitWriter::new();
        w.write_bool(true);
        w.write_bits((1 << NORMAL_FRACTIONAL_BITS) - 1, NORMAL_FRACTIONAL_BITS)
            .unwrap();
        let bytes = w.finish();
        let mut r = BitReader::new(&bytes);
        let value = r.read_bit_normal().unwrap();
        assert!((value + 1.0).abs() < 1e-6, "got {value}");
    }
}
