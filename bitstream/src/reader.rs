//! Bit-level reader with bounded operations.

use std::fmt::Write as _;

use crate::error::{BitError, BitResult};

/// Absolute bounds of a region of a buffer, in bits.
///
/// Decoded objects keep a `BitSpan` instead of a reader so they stay
/// independent of the buffer's lifetime; [`BitReader::at`] turns the span
/// back into a reader over the same bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BitSpan {
    /// Absolute bit offset of the first bit.
    pub start: usize,
    /// Length in bits.
    pub len: usize,
}

impl BitSpan {
    /// Creates a span.
    #[must_use]
    pub const fn new(start: usize, len: usize) -> Self {
        Self { start, len }
    }

    /// Absolute bit offset one past the last bit.
    #[must_use]
    pub const fn end(self) -> usize {
        self.start + self.len
    }

    /// Returns `true` if the span covers no bits.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.len == 0
    }
}

/// A bit-level cursor over an immutable byte buffer.
///
/// Bits are consumed least-significant first within each byte, and multi-bit
/// integers are assembled least-significant bit first. A reader is bounded to
/// `[start, end)` of the buffer; sub-readers produced by [`split`](Self::split)
/// borrow the same buffer and never copy it.
///
/// All read operations are bounds-checked and return errors on failure.
/// The reader never panics on malformed input.
#[derive(Debug, Clone)]
pub struct BitReader<'a> {
    data: &'a [u8],
    start: usize,
    end: usize,
    pos: usize,
}

impl<'a> BitReader<'a> {
    /// Creates a new `BitReader` over a whole byte slice.
    #[must_use]
    pub const fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            start: 0,
            end: data.len() * 8,
            pos: 0,
        }
    }

    /// Creates a reader bounded to `span` of `data`.
    pub fn at(data: &'a [u8], span: BitSpan) -> BitResult<Self> {
        let buffer_bits = data.len() * 8;
        if span.end() > buffer_bits {
            return Err(BitError::InvalidSpan {
                start: span.start,
                len: span.len,
                buffer_bits,
            });
        }
        Ok(Self {
            data,
            start: span.start,
            end: span.end(),
            pos: span.start,
        })
    }

    /// Returns the underlying buffer.
    #[must_use]
    pub const fn buffer(&self) -> &'a [u8] {
        self.data
    }

    /// Returns the absolute bounds of this reader.
    #[must_use]
    pub const fn span(&self) -> BitSpan {
        BitSpan {
            start: self.start,
            len: self.end - self.start,
        }
    }

    /// Returns the span from absolute position `from` up to the cursor.
    #[must_use]
    pub fn span_from(&self, from: usize) -> BitSpan {
        let from = from.clamp(self.start, self.pos);
        BitSpan::new(from, self.pos - from)
    }

    /// Returns the number of bits remaining to read.
    #[must_use]
    pub const fn bits_remaining(&self) -> usize {
        self.end - self.pos
    }

    /// Returns `true` if there are no more bits to read.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.bits_remaining() == 0
    }

    /// Returns the current bit position relative to the start of this reader.
    #[must_use]
    pub const fn bit_position(&self) -> usize {
        self.pos - self.start
    }

    /// Returns the current bit position in the underlying buffer.
    #[must_use]
    pub const fn absolute_position(&self) -> usize {
        self.pos
    }

    /// Moves the cursor to a position relative to the start of this reader.
    pub fn seek(&mut self, bit_position: usize) -> BitResult<()> {
        let len = self.end - self.start;
        if bit_position > len {
            return Err(BitError::OutOfRange {
                requested: bit_position,
                available: len,
            });
        }
        self.pos = self.start + bit_position;
        Ok(())
    }

    /// Rewinds the cursor to the start of this reader.
    pub fn reset(&mut self) {
        self.pos = self.start;
    }

    fn ensure_bits(&self, bits: usize) -> BitResult<()> {
        let available = self.bits_remaining();
        if bits > available {
            return Err(BitError::OutOfRange {
                requested: bits,
                available,
            });
        }
        Ok(())
    }

    /// Reads a single bit as a boolean.
    pub fn read_bool(&mut self) -> BitResult<bool> {
        self.ensure_bits(1)?;
        let bit = (self.data[self.pos >> 3] >> (self.pos & 7)) & 1;
        self.pos += 1;
        Ok(bit == 1)
    }

    /// Reads up to 32 bits as an unsigned integer.
    pub fn read_bits(&mut self, bits: u32) -> BitResult<u32> {
        if bits > 32 {
            return Err(BitError::InvalidBitCount { bits, max_bits: 32 });
        }
        let wanted = bits as usize;
        self.ensure_bits(wanted)?;

        let mut value = 0u64;
        let mut read = 0usize;
        while read < wanted {
            let bit_offset = self.pos & 7;
            let take = (8 - bit_offset).min(wanted - read);
            let chunk = u64::from(self.data[self.pos >> 3] >> bit_offset) & ((1u64 << take) - 1);
            value |= chunk << read;
            read += take;
            self.pos += take;
        }
        Ok(value as u32)
    }

    /// Reads up to 32 bits and sign-extends bit `bits - 1`.
    pub fn read_sbits(&mut self, bits: u32) -> BitResult<i32> {
        if bits == 0 {
            return Ok(0);
        }
        let raw = self.read_bits(bits)?;
        let shift = 32 - bits;
        Ok(((raw << shift) as i32) >> shift)
    }

    /// Reads an unsigned byte.
    pub fn read_u8(&mut self) -> BitResult<u8> {
        Ok(self.read_bits(8)? as u8)
    }

    /// Reads a little-endian `u16`.
    pub fn read_u16(&mut self) -> BitResult<u16> {
        Ok(self.read_bits(16)? as u16)
    }

    /// Reads a little-endian `i16`.
    pub fn read_i16(&mut self) -> BitResult<i16> {
        Ok(self.read_bits(16)? as u16 as i16)
    }

    /// Reads a little-endian `u32`.
    pub fn read_u32(&mut self) -> BitResult<u32> {
        self.read_bits(32)
    }

    /// Reads a little-endian `i32`.
    pub fn read_i32(&mut self) -> BitResult<i32> {
        Ok(self.read_bits(32)? as i32)
    }

    /// Reads a little-endian `u64`.
    pub fn read_u64(&mut self) -> BitResult<u64> {
        self.ensure_bits(64)?;
        let low = u64::from(self.read_u32()?);
        let high = u64::from(self.read_u32()?);
        Ok(low | (high << 32))
    }

    /// Reads an IEEE-754 single.
    pub fn read_f32(&mut self) -> BitResult<f32> {
        Ok(f32::from_bits(self.read_u32()?))
    }

    /// Reads `count` bytes, byte-aligned or not.
    pub fn read_bytes(&mut self, count: usize) -> BitResult<Vec<u8>> {
        self.ensure_bits(count.saturating_mul(8))?;
        if self.pos & 7 == 0 {
            let idx = self.pos >> 3;
            let out = self.data[idx..idx + count].to_vec();
            self.pos += count * 8;
            return Ok(out);
        }
        let mut out = Vec::with_capacity(count);
        for _ in 0..count {
            out.push(self.read_u8()?);
        }
        Ok(out)
    }

    /// Reads a null-terminated string. Invalid UTF-8 is replaced lossily.
    pub fn read_cstring(&mut self) -> BitResult<String> {
        let mut bytes = Vec::new();
        loop {
            let byte = self.read_u8()?;
            if byte == 0 {
                break;
            }
            bytes.push(byte);
        }
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Reads exactly `count` bytes and returns the text before the first NUL.
    pub fn read_string_of_length(&mut self, count: usize) -> BitResult<String> {
        let bytes = self.read_bytes(count)?;
        let text = bytes.split(|b| *b == 0).next().unwrap_or(&[]);
        Ok(String::from_utf8_lossy(text).into_owned())
    }

    /// Reads the entity-index style variable integer: 4 low bits, a 2-bit
    /// selector, then 0, 4, 8 or 28 more high bits.
    pub fn read_ubit_int(&mut self) -> BitResult<u32> {
        let ret = self.read_bits(6)?;
        Ok(match ret & (16 | 32) {
            16 => (ret & 15) | (self.read_bits(4)? << 4),
            32 => (ret & 15) | (self.read_bits(8)? << 4),
            48 => (ret & 15) | (self.read_bits(28)? << 4),
            _ => ret,
        })
    }

    /// Skips `bits` bits.
    pub fn skip_bits(&mut self, bits: usize) -> BitResult<()> {
        self.ensure_bits(bits)?;
        self.pos += bits;
        Ok(())
    }

    /// Skips `count` bytes.
    pub fn skip_bytes(&mut self, count: usize) -> BitResult<()> {
        self.skip_bits(count.saturating_mul(8))
    }

    /// Returns a reader over the next `bits` bits without advancing.
    pub fn split(&self, bits: usize) -> BitResult<BitReader<'a>> {
        self.ensure_bits(bits)?;
        Ok(BitReader {
            data: self.data,
            start: self.pos,
            end: self.pos + bits,
            pos: self.pos,
        })
    }

    /// Returns a reader over the next `bits` bits and advances past them.
    pub fn split_and_skip(&mut self, bits: usize) -> BitResult<BitReader<'a>> {
        let sub = self.split(bits)?;
        self.pos += bits;
        Ok(sub)
    }

    /// Renders the whole span of this reader as space-separated hex bytes.
    ///
    /// A trailing partial byte is rendered with its missing high bits zeroed.
    #[must_use]
    pub fn to_hex_string(&self) -> String {
        let mut copy = self.clone();
        copy.reset();
        let mut out = String::with_capacity(copy.bits_remaining() / 8 * 3 + 2);
        while !copy.is_empty() {
            let take = copy.bits_remaining().min(8) as u32;
            let byte = copy.read_bits(take).unwrap_or(0);
            if !out.is_empty() {
                out.push(' ');
            }
            let _ = write!(out, "{byte:02X}");
        }
        out
    }

    /// Finds every bit offset (relative to this reader's start) at which
    /// `pattern` occurs, at any bit alignment.
    ///
    /// Brute force; meant for diagnostics, not decoding.
    #[must_use]
    pub fn find_bytes(&self, pattern: &[u8]) -> Vec<usize> {
        let pattern_bits = pattern.len() * 8;
        let len = self.end - self.start;
        if pattern.is_empty() || pattern_bits > len {
            return Vec::new();
        }
        let mut hits = Vec::new();
        for offset in 0..=(len - pattern_bits) {
            let mut probe = BitReader {
                data: self.data,
                start: self.start,
                end: self.end,
                pos: self.start + offset,
            };
            let matched = pattern
                .iter()
                .all(|expected| probe.read_u8().is_ok_and(|b| b == *expected));
            if matched {
                hits.push(offset);
            }
        }
        hits
    }

    /// Finds every bit offset at which the `bits`-wide value `value` occurs.
    #[must_use]
    pub fn find_uint(&self, value: u32, bits: u32) -> Vec<usize> {
        let len = self.end - self.start;
        if bits == 0 || bits > 32 || bits as usize > len {
            return Vec::new();
        }
        (0..=(len - bits as usize))
            .filter(|offset| {
                let mut probe = BitReader {
                    data: self.data,
                    start: self.start,
                    end: self.end,
                    pos: self.start + offset,
                };
                probe.read_bits(bits).is_ok_and(|v| v == value)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_reader() {
        let reader = BitReader::new(&[]);
        assert!(reader.is_empty());
        assert_eq!(reader.bits_remaining(), 0);
        assert_eq!(reader.bit_position(), 0);
    }

    #[test]
    fn read_from_empty_fails() {
        let mut reader = BitReader::new(&[]);
        let result = reader.read_bool();
        assert!(matches!(result, Err(BitError::OutOfRange { .. })));
    }

    #[test]
    fn bits_are_lsb_first() {
        let mut reader = BitReader::new(&[0b0000_0101]);
        assert!(reader.read_bool().unwrap());
        assert!(!reader.read_bool().unwrap());
        assert!(reader.read_bool().unwrap());
    }

    #[test]
    fn read_bits_across_bytes() {
        let mut reader = BitReader::new(&[0xF0, 0x0F]);
        reader.skip_bits(4).unwrap();
        assert_eq!(reader.read_bits(8).unwrap(), 0xFF);
        assert_eq!(reader.bits_remaining(), 4);
    }

    #[test]
    fn read_u32_little_endian() {
        let mut reader = BitReader::new(&[0x78, 0x56, 0x34, 0x12]);
        assert_eq!(reader.read_u32().unwrap(), 0x1234_5678);
    }

    #[test]
    fn read_bits_rejects_more_than_32() {
        let mut reader = BitReader::new(&[0; 8]);
        let err = reader.read_bits(33).unwrap_err();
        assert!(matches!(err, BitError::InvalidBitCount { bits: 33, .. }));
        assert!(err.is_out_of_range());
        assert_eq!(reader.bit_position(), 0);
    }

    #[test]
    fn read_sbits_sign_extends() {
        let mut reader = BitReader::new(&[0b0000_0111]);
        assert_eq!(reader.read_sbits(3).unwrap(), -1);
        let mut reader = BitReader::new(&[0b0000_0011]);
        assert_eq!(reader.read_sbits(3).unwrap(), 3);
    }

    #[test]
    fn read_cstring_and_fixed_string() {
        let mut reader = BitReader::new(b"abc\0de\0\0z");
        assert_eq!(reader.read_cstring().unwrap(), "abc");
        assert_eq!(reader.read_string_of_length(4).unwrap(), "de");
        assert_eq!(reader.read_u8().unwrap(), b'z');
    }

    #[test]
    fn unterminated_cstring_is_out_of_range() {
        let mut reader = BitReader::new(b"abc");
        assert!(reader.read_cstring().unwrap_err().is_out_of_range());
    }

    #[test]
    fn unaligned_bytes() {
        let mut reader = BitReader::new(&[0xFF, 0x00, 0xFF]);
        reader.skip_bits(4).unwrap();
        assert_eq!(reader.read_bytes(2).unwrap(), vec![0x0F, 0xF0]);
    }

    #[test]
    fn split_is_bounded_and_shares_buffer() {
        let data = [0xAB, 0xCD, 0xEF];
        let mut reader = BitReader::new(&data);
        reader.skip_bits(8).unwrap();
        let mut sub = reader.split_and_skip(8).unwrap();
        assert_eq!(sub.span(), BitSpan::new(8, 8));
        assert_eq!(sub.read_u8().unwrap(), 0xCD);
        assert!(sub.read_bool().is_err());
        assert_eq!(reader.read_u8().unwrap(), 0xEF);
        assert!(std::ptr::eq(sub.buffer(), reader.buffer()));
    }

    #[test]
    fn split_past_end_fails() {
        let reader = BitReader::new(&[0]);
        assert!(reader.split(9).is_err());
    }

    #[test]
    fn at_rejects_span_outside_buffer() {
        assert!(BitReader::at(&[0, 0], BitSpan::new(8, 9)).is_err());
        let reader = BitReader::at(&[0, 0xFF], BitSpan::new(8, 8)).unwrap();
        assert_eq!(reader.bits_remaining(), 8);
    }

    #[test]
    fn ubit_int_forms() {
        // 6-bit form: value 5, selector 0.
        let mut reader = BitReader::new(&[0b0000_0101]);
        assert_eq!(reader.read_ubit_int().unwrap(), 5);
        // selector 16: low nibble 1, then 4 bits = 2 -> 0x21.
        let mut reader = BitReader::new(&[0b1001_0001, 0b0000_0000]);
        assert_eq!(reader.read_ubit_int().unwrap(), 0x21);
    }

    #[test]
    fn hex_string_covers_whole_span() {
        let mut reader = BitReader::new(&[0x01, 0xA0]);
        reader.read_u8().unwrap();
        assert_eq!(reader.to_hex_string(), "01 A0");
    }

    #[test]
    fn find_bytes_at_any_alignment() {
        // "AB" shifted left by 3 bits.
        let value: u32 = 0xBA << 3;
        let data = value.to_le_bytes();
        let reader = BitReader::new(&data);
        assert_eq!(reader.find_bytes(&[0xBA]), vec![3]);
        assert_eq!(reader.find_uint(0xBA, 8), vec![3]);
    }

    #[test]
    fn seek_and_span_from() {
        let mut reader = BitReader::new(&[0, 0, 0]);
        reader.seek(10).unwrap();
        let start = reader.absolute_position();
        reader.skip_bits(5).unwrap();
        assert_eq!(reader.span_from(start), BitSpan::new(10, 5));
        assert!(reader.seek(25).is_err());
    }
}
