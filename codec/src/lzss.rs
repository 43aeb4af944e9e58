//! The engine's LZSS block format used for compressed string tables.
//!
//! A block is the tag `LZSS`, the little-endian decompressed size, then a
//! stream of control bytes. Each control byte covers the next eight items,
//! low bit first: a clear bit is one literal byte, a set bit is a two-byte
//! back-reference `(offset:12, count-1:4)` copying from
//! `output_len - offset - 1`. A reference with a count of one ends the
//! stream.

use crate::error::LzssError;

/// Block tag.
pub const LZSS_TAG: [u8; 4] = *b"LZSS";
/// Tag plus decompressed size.
pub const LZSS_HEADER_SIZE: usize = 8;

const WINDOW: usize = 1 << 12;
const MIN_MATCH: usize = 2;
const MAX_MATCH: usize = 16;

/// Returns `true` if `block` starts with the LZSS tag.
#[must_use]
pub fn is_compressed(block: &[u8]) -> bool {
    block.len() >= LZSS_HEADER_SIZE && block[..4] == LZSS_TAG
}

/// Reads the declared decompressed size from a block header.
pub fn declared_size(block: &[u8]) -> Result<usize, LzssError> {
    if block.len() < LZSS_HEADER_SIZE {
        return Err(LzssError::Truncated { at: block.len() });
    }
    let mut tag = [0u8; 4];
    tag.copy_from_slice(&block[..4]);
    if tag != LZSS_TAG {
        return Err(LzssError::BadTag { found: tag });
    }
    Ok(u32::from_le_bytes([block[4], block[5], block[6], block[7]]) as usize)
}

/// Decompresses a tagged block.
pub fn decompress(block: &[u8]) -> Result<Vec<u8>, LzssError> {
    let expected = declared_size(block)?;
    let input = &block[LZSS_HEADER_SIZE..];
    // A two-byte reference yields at most 16 bytes.
    let mut out = Vec::with_capacity(expected.min(input.len().saturating_mul(8)));
    let mut pos = 0;
    let mut control = 0u8;
    let mut control_left = 0;

    loop {
        if control_left == 0 {
            control = *input.get(pos).ok_or(LzssError::Truncated {
                at: pos + LZSS_HEADER_SIZE,
            })?;
            pos += 1;
            control_left = 8;
        }

        if control & 1 == 1 {
            let (b0, b1) = match (input.get(pos), input.get(pos + 1)) {
                (Some(&b0), Some(&b1)) => (b0, b1),
                _ => {
                    return Err(LzssError::Truncated {
                        at: pos + LZSS_HEADER_SIZE,
                    })
                }
            };
            pos += 2;
            let offset = (usize::from(b0) << 4) | usize::from(b1 >> 4);
            let count = usize::from(b1 & 0xF) + 1;
            if count == 1 {
                break;
            }
            if offset + 1 > out.len() {
                return Err(LzssError::BadOffset {
                    offset,
                    produced: out.len(),
                });
            }
            let start = out.len() - offset - 1;
            // Runs may overlap their own output.
            for i in 0..count {
                let byte = out[start + i];
                out.push(byte);
            }
        } else {
            let byte = *input.get(pos).ok_or(LzssError::Truncated {
                at: pos + LZSS_HEADER_SIZE,
            })?;
            pos += 1;
            out.push(byte);
        }

        if out.len() > expected {
            return Err(LzssError::SizeMismatch {
                expected,
                actual: out.len(),
            });
        }
        control >>= 1;
        control_left -= 1;
    }

    if out.len() != expected {
        return Err(LzssError::SizeMismatch {
            expected,
            actual: out.len(),
        });
    }
    Ok(out)
}

/// Compresses `data` into a tagged block with a greedy longest-match search.
#[must_use]
pub fn compress(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(LZSS_HEADER_SIZE + data.len() + data.len() / 8 + 3);
    out.extend_from_slice(&LZSS_TAG);
    out.extend_from_slice(&(data.len() as u32).to_le_bytes());

    let mut control_at = out.len();
    out.push(0);
    let mut items = 0;
    let mut pos = 0;

    while pos < data.len() {
        next_item(&mut out, &mut items, &mut control_at);
        let (distance, len) = longest_match(data, pos);
        if len >= MIN_MATCH {
            let offset = distance - 1;
            out[control_at] |= 1u8 << items;
            out.push((offset >> 4) as u8);
            out.push((((offset & 0xF) << 4) | (len - 1)) as u8);
            pos += len;
        } else {
            out.push(data[pos]);
            pos += 1;
        }
        items += 1;
    }

    next_item(&mut out, &mut items, &mut control_at);
    out[control_at] |= 1u8 << items;
    out.extend_from_slice(&[0, 0]);
    out
}

/// Starts a new control byte once the current one covers eight items.
fn next_item(out: &mut Vec<u8>, items: &mut usize, control_at: &mut usize) {
    if *items == 8 {
        *control_at = out.len();
        out.push(0);
        *items = 0;
    }
}

/// Longest earlier occurrence of the bytes at `pos`, as `(distance, len)`.
fn longest_match(data: &[u8], pos: usize) -> (usize, usize) {
    let max_len = MAX_MATCH.min(data.len() - pos);
    let mut best = (0, 0);
    if max_len < MIN_MATCH {
        return best;
    }
    let window_start = pos.saturating_sub(WINDOW);
    for start in (window_start..pos).rev() {
        let len = (0..max_len)
            .take_while(|&i| data[start + i] == data[pos + i])
            .count();
        if len > best.1 {
            best = (pos - start, len);
            if len == max_len {
                break;
            }
        }
    }
    best
}
