//! UTF-8 encode/decode with an ASCII fast path.
//!
//! The serializer and deserializer both go through this module rather than
//! `str::as_bytes`/`String::from_utf8` directly, since string headers on the
//! wire are byte-length-prefixed and decoding needs a windowed view into a
//! larger buffer rather than a whole-slice conversion.

use crate::error::{Error, Result};

/// Encode a string to UTF-8 bytes.
///
/// All-ASCII input takes a fast path: it allocates a buffer of exactly
/// `s.len()` bytes and copies byte-for-byte. Mixed input still ends up as a
/// plain copy of `s.as_bytes()` since Rust strings are already valid UTF-8 —
/// there is no surrogate-pair reassembly to do on this side.
pub fn encode(s: &str) -> Vec<u8> {
    if s.is_ascii() {
        let mut buf = Vec::with_capacity(s.len());
        buf.extend_from_slice(s.as_bytes());
        buf
    } else {
        s.as_bytes().to_vec()
    }
}

/// Decode a UTF-8 byte window into a string.
///
/// `start..start+len` must lie within `bytes`. ASCII-only windows take a
/// fast path (no UTF-8 validation beyond the byte check). Mixed windows are
/// validated and fail with a precise message on truncated sequences or
/// scalars beyond `0x10FFFF`, matching the source format's per-case errors.
pub fn decode(bytes: &[u8], start: usize, len: usize) -> Result<String> {
    let end = start
        .checked_add(len)
        .filter(|&e| e <= bytes.len())
        .ok_or_else(|| {
            Error::deserialization(format!(
                "utf8 decode window [{start}, {start}+{len}) exceeds buffer length {}",
                bytes.len()
            ))
        })?;
    let window = &bytes[start..end];

    if window.iter().all(|&b| b < 0x80) {
        // SAFETY-free fast path: all-ASCII bytes are valid UTF-8 by construction.
        return Ok(window.iter().map(|&b| b as char).collect());
    }

    let mut out = String::with_capacity(window.len());
    let mut i = 0;
    while i < window.len() {
        let b0 = window[i];
        let (width, cp) = if b0 < 0x80 {
            (1, b0 as u32)
        } else if b0 < 0xC0 {
            return Err(Error::deserialization(format!(
                "invalid utf8 leading byte 0x{b0:02X} at index {i}"
            )));
        } else if b0 < 0xE0 {
            let b1 = read_continuation(window, i, 2)?;
            (2, ((b0 as u32 & 0x1F) << 6) | b1)
        } else if b0 < 0xF0 {
            let (b1, b2) = (
                read_continuation(window, i, 3)?,
                read_continuation_at(window, i, 2)?,
            );
            (3, ((b0 as u32 & 0x0F) << 12) | (b1 << 6) | b2)
        } else {
            let (b1, b2, b3) = (
                read_continuation(window, i, 4)?,
                read_continuation_at(window, i, 2)?,
                read_continuation_at(window, i, 3)?,
            );
            (4, ((b0 as u32 & 0x07) << 18) | (b1 << 12) | (b2 << 6) | b3)
        };

        if cp > 0x10FFFF {
            return Err(Error::deserialization(format!(
                "code point 0x{cp:X} at index {i} exceeds 0x10FFFF"
            )));
        }
        let ch = char::from_u32(cp).ok_or_else(|| {
            Error::deserialization(format!("code point 0x{cp:X} at index {i} is not a valid scalar value"))
        })?;
        out.push(ch);
        i += width;
    }
    Ok(out)
}

/// Read the final continuation byte of a `width`-byte sequence starting at
/// `start`, returning its low 6 bits. `width` is used only for the error
/// message (which byte position is missing).
fn read_continuation(window: &[u8], start: usize, width: usize) -> Result<u32> {
    read_continuation_at(window, start, width - 1)
}

/// Read the continuation byte at `start + offset`.
fn read_continuation_at(window: &[u8], start: usize, offset: usize) -> Result<u32> {
    let idx = start + offset;
    let b = *window.get(idx).ok_or_else(|| {
        Error::deserialization(format!(
            "incomplete utf8 sequence starting at index {start}: missing byte at offset {offset}"
        ))
    })?;
    if b & 0xC0 != 0x80 {
        return Err(Error::deserialization(format!(
            "invalid utf8 continuation byte 0x{b:02X} at index {idx}"
        )));
    }
    Ok((b & 0x3F) as u32)
}
