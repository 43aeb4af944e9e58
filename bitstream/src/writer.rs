//! Bit-level writer for encoding and patching packed binary data.

use crate::error::{BitError, BitResult};
use crate::reader::{BitReader, BitSpan};

/// A growable bit buffer.
///
/// Bits are written least-significant first, matching [`BitReader`]. Besides
/// appending, a writer built from an existing encoded buffer supports
/// in-place patching: overwriting, removing or inserting runs of bits at an
/// arbitrary bit index. Removal and insertion shift every following bit;
/// any length prefix that covers the edited region must be rewritten by the
/// caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BitWriter {
    bytes: Vec<u8>,
    bit_len: usize,
}

impl BitWriter {
    /// Creates a new empty `BitWriter`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new `BitWriter` with pre-allocated capacity.
    #[must_use]
    pub fn with_capacity(bytes: usize) -> Self {
        Self {
            bytes: Vec::with_capacity(bytes),
            bit_len: 0,
        }
    }

    /// Wraps an existing encoded buffer for patching.
    #[must_use]
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        let bit_len = bytes.len() * 8;
        Self { bytes, bit_len }
    }

    /// Returns the number of bits written so far.
    #[must_use]
    pub fn bits_written(&self) -> usize {
        self.bit_len
    }

    /// Returns the bytes written so far; a trailing partial byte is
    /// zero-padded in its high bits.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Returns a reader over exactly the bits written so far.
    #[must_use]
    pub fn reader(&self) -> BitReader<'_> {
        // bit_len never exceeds bytes.len() * 8.
        BitReader::at(&self.bytes, BitSpan::new(0, self.bit_len))
            .unwrap_or_else(|_| BitReader::new(&[]))
    }

    /// Writes a single bit.
    pub fn write_bool(&mut self, value: bool) {
        if self.bit_len % 8 == 0 {
            self.bytes.push(0);
        }
        if value {
            self.bytes[self.bit_len >> 3] |= 1 << (self.bit_len & 7);
        }
        self.bit_len += 1;
    }

    /// Writes up to 32 bits from an unsigned integer.
    ///
    /// # Errors
    ///
    /// Returns [`BitError::InvalidBitCount`] if `bits > 32`.
    /// Returns [`BitError::ValueOutOfRange`] if `value` doesn't fit in `bits`.
    pub fn write_bits(&mut self, value: u32, bits: u32) -> BitResult<()> {
        if bits > 32 {
            return Err(BitError::InvalidBitCount { bits, max_bits: 32 });
        }
        if bits < 32 && u64::from(value) >= (1u64 << bits) {
            return Err(BitError::ValueOutOfRange {
                value: i64::from(value),
                bits,
            });
        }
        for i in 0..bits {
            self.write_bool((value >> i) & 1 == 1);
        }
        Ok(())
    }

    /// Writes a signed integer in `bits` two's-complement bits.
    pub fn write_sbits(&mut self, value: i32, bits: u32) -> BitResult<()> {
        if bits == 0 || bits > 32 {
            return Err(BitError::InvalidBitCount { bits, max_bits: 32 });
        }
        let min = -(1i64 << (bits - 1));
        let max = (1i64 << (bits - 1)) - 1;
        if i64::from(value) < min || i64::from(value) > max {
            return Err(BitError::ValueOutOfRange {
                value: i64::from(value),
                bits,
            });
        }
        let mask = if bits == 32 {
            u32::MAX
        } else {
            (1u32 << bits) - 1
        };
        self.write_bits(value as u32 & mask, bits)
    }

    /// Writes a byte.
    pub fn write_u8(&mut self, value: u8) {
        self.write_raw(u64::from(value), 8);
    }

    /// Writes a little-endian `u16`.
    pub fn write_u16(&mut self, value: u16) {
        self.write_raw(u64::from(value), 16);
    }

    /// Writes a little-endian `u32`.
    pub fn write_u32(&mut self, value: u32) {
        self.write_raw(u64::from(value), 32);
    }

    /// Writes a little-endian `i32`.
    pub fn write_i32(&mut self, value: i32) {
        self.write_raw(u64::from(value as u32), 32);
    }

    /// Writes a little-endian `u64`.
    pub fn write_u64(&mut self, value: u64) {
        self.write_raw(value, 64);
    }

    /// Writes an IEEE-754 single.
    pub fn write_f32(&mut self, value: f32) {
        self.write_u32(value.to_bits());
    }

    /// Writes raw bytes.
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        if self.bit_len % 8 == 0 {
            self.bytes.extend_from_slice(bytes);
            self.bit_len += bytes.len() * 8;
            return;
        }
        for byte in bytes {
            self.write_u8(*byte);
        }
    }

    /// Writes a string followed by a NUL byte.
    pub fn write_cstring(&mut self, text: &str) {
        self.write_bytes(text.as_bytes());
        self.write_u8(0);
    }

    /// Writes `text` into a fixed-size, NUL-padded field of `len` bytes,
    /// truncating if necessary.
    pub fn write_fixed_string(&mut self, text: &str, len: usize) {
        let bytes = text.as_bytes();
        let used = bytes.len().min(len);
        self.write_bytes(&bytes[..used]);
        for _ in used..len {
            self.write_u8(0);
        }
    }

    /// Writes the entity-index style variable integer.
    pub fn write_ubit_int(&mut self, value: u32) -> BitResult<()> {
        let low = value & 15;
        let high = value >> 4;
        if high == 0 {
            self.write_bits(low, 6)
        } else if high < (1 << 4) {
            self.write_bits(low | 16, 6)?;
            self.write_bits(high, 4)
        } else if high < (1 << 8) {
            self.write_bits(low | 32, 6)?;
            self.write_bits(high, 8)
        } else {
            self.write_bits(low | 48, 6)?;
            self.write_bits(high, 28)
        }
    }

    /// Copies the remaining bits of `reader` onto the end of this writer.
    pub fn write_reader(&mut self, reader: &BitReader<'_>) {
        let mut copy = reader.clone();
        while copy.bits_remaining() >= 32 {
            // bits_remaining was checked above.
            if let Ok(value) = copy.read_bits(32) {
                self.write_raw(u64::from(value), 32);
            }
        }
        let tail = copy.bits_remaining() as u32;
        if let Ok(value) = copy.read_bits(tail) {
            self.write_raw(u64::from(value), tail);
        }
    }

    /// Appends all bits of another writer.
    pub fn append(&mut self, other: &BitWriter) {
        self.write_reader(&other.reader());
    }

    /// Overwrites `src_bits` bits starting at bit `index` with the first
    /// `src_bits` bits of `src`. The total length does not change.
    pub fn edit_bits_at_index(&mut self, index: usize, src: &[u8], src_bits: usize) -> BitResult<()> {
        self.check_source(src, src_bits)?;
        let end = index.saturating_add(src_bits);
        if end > self.bit_len {
            return Err(BitError::OutOfRange {
                requested: end,
                available: self.bit_len,
            });
        }
        for i in 0..src_bits {
            let bit = get_bit(src, i);
            set_bit(&mut self.bytes, index + i, bit);
        }
        Ok(())
    }

    /// Removes `count` bits starting at bit `index`, shifting every
    /// following bit down.
    pub fn remove_bits_at_index(&mut self, index: usize, count: usize) -> BitResult<()> {
        let end = index.saturating_add(count);
        if end > self.bit_len {
            return Err(BitError::OutOfRange {
                requested: end,
                available: self.bit_len,
            });
        }
        let mut out = BitWriter::with_capacity(self.bytes.len());
        for i in (0..index).chain(end..self.bit_len) {
            out.write_bool(get_bit(&self.bytes, i));
        }
        *self = out;
        Ok(())
    }

    /// Inserts the first `src_bits` bits of `src` before bit `index`,
    /// shifting every following bit up.
    pub fn insert_bits_at_index(
        &mut self,
        index: usize,
        src: &[u8],
        src_bits: usize,
    ) -> BitResult<()> {
        self.check_source(src, src_bits)?;
        if index > self.bit_len {
            return Err(BitError::OutOfRange {
                requested: index,
                available: self.bit_len,
            });
        }
        let mut out = BitWriter::with_capacity(self.bytes.len() + src_bits / 8 + 1);
        for i in 0..index {
            out.write_bool(get_bit(&self.bytes, i));
        }
        for i in 0..src_bits {
            out.write_bool(get_bit(src, i));
        }
        for i in index..self.bit_len {
            out.write_bool(get_bit(&self.bytes, i));
        }
        *self = out;
        Ok(())
    }

    /// Finishes writing and returns the byte buffer.
    ///
    /// If the last byte is incomplete, its unused high bits are zero.
    #[must_use]
    pub fn finish(self) -> Vec<u8> {
        self.bytes
    }

    fn write_raw(&mut self, value: u64, bits: u32) {
        for i in 0..bits {
            self.write_bool((value >> i) & 1 == 1);
        }
    }

    fn check_source(&self, src: &[u8], src_bits: usize) -> BitResult<()> {
        if src_bits > src.len() * 8 {
            return Err(BitError::OutOfRange {
                requested: src_bits,
                available: src.len() * 8,
            });
        }
        Ok(())
    }
}

fn get_bit(bytes: &[u8], index: usize) -> bool {
    (bytes[index >> 3] >> (index & 7)) & 1 == 1
}

fn set_bit(bytes: &mut [u8], index: usize, value: bool) {
    let mask = 1 << (index & 7);
    if value {
        bytes[index >> 3] |= mask;
    } else {
        bytes[index >> 3] &= !mask;
    }
}
