//! Bit-addressable cursor and writer for the srcdem demo decoder.
//!
//! This crate provides [`BitReader`] and [`BitWriter`] for bit-level decoding,
//! encoding and patching. It is designed for bounded, panic-free operation
//! with explicit error handling.
//!
//! # Design Principles
//!
//! - **No unsafe code** - Safety is paramount.
//! - **Bounded operations** - All reads are bounds-checked against the reader's span.
//! - **No copies** - Sub-readers borrow the parent's buffer.
//! - **Explicit errors** - All failures return structured errors, never panic.
//!
//! # Example
//!
//! ```
//! use bitstream::{BitReader, BitWriter};
//!
//! let mut writer = BitWriter::new();
//! writer.write_bool(true);
//! writer.write_bits(42, 7).unwrap();
//!
//! let bytes = writer.finish();
//!
//! let mut reader = BitReader::new(&bytes);
//! assert_eq!(reader.read_bool().unwrap(), true);
//! assert_eq!(reader.read_bits(7).unwrap(), 42);
//! ```

mod coord;
mod error;
mod reader;
mod writer;

pub use coord::{
    Vector2, Vector3, COORD_FRACTIONAL_BITS, COORD_FRACTIONAL_BITS_LOWPRECISION,
    COORD_INTEGER_BITS, COORD_INTEGER_BITS_MP, NORMAL_FRACTIONAL_BITS,
};
pub use error::{BitError, BitResult};
pub use reader::{BitReader, BitSpan};
pub use writer::BitWriter;

/// Number of bits needed to index `count` distinct values; the engine's
/// `log2(n) + 1` width rule, with `0` and `1` both needing one bit.
#[must_use]
pub const fn index_bits(count: u32) -> u32 {
    if count <= 1 {
        1
    } else {
        count.ilog2() + 1
    }
}
