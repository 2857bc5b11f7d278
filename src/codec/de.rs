//! MessagePack deserializer.
//!
//! A single-pass recursive-descent parser over a byte slice. Every read is
//! bounds-checked against the slice's remaining length; running out of
//! bytes mid-value is reported as an "incomplete" error naming the byte
//! tag, the offset it was read from, and how many bytes were missing,
//! rather than panicking or silently truncating.

use super::utf8;
use super::value::Value;
use crate::error::{Error, Result};
use chrono::{TimeZone, Utc};

/// Parse exactly one value starting at the front of `bytes`, returning the
/// value and the number of bytes consumed.
pub fn decode(bytes: &[u8]) -> Result<(Value, usize)> {
    let mut pos = 0;
    let value = read_value(bytes, &mut pos)?;
    Ok((value, pos))
}

/// Parse values until `bytes` is exhausted — the `multiple=true` read mode
/// matching [`super::ser::encode_multiple`].
pub fn decode_multiple(bytes: &[u8]) -> Result<Vec<Value>> {
    let mut pos = 0;
    let mut out = Vec::new();
    while pos < bytes.len() {
        out.push(read_value(bytes, &mut pos)?);
    }
    Ok(out)
}

fn incomplete(tag: u8, pos: usize, need: usize, have: usize) -> Error {
    Error::deserialization(format!(
        "incomplete sequence for tag 0x{tag:02X} at offset {pos}: need {need} more byte(s), {have} available"
    ))
}

fn need(bytes: &[u8], pos: usize, tag: u8, n: usize) -> Result<&[u8]> {
    let end = pos.checked_add(n).ok_or_else(|| incomplete(tag, pos, n, bytes.len().saturating_sub(pos)))?;
    if end > bytes.len() {
        return Err(incomplete(tag, pos, n, bytes.len() - pos));
    }
    Ok(&bytes[pos..end])
}

fn read_u8(bytes: &[u8], pos: &mut usize, tag: u8) -> Result<u8> {
    let b = need(bytes, *pos, tag, 1)?[0];
    *pos += 1;
    Ok(b)
}

fn read_u16(bytes: &[u8], pos: &mut usize, tag: u8) -> Result<u16> {
    let window = need(bytes, *pos, tag, 2)?;
    let v = u16::from_be_bytes([window[0], window[1]]);
    *pos += 2;
    Ok(v)
}

fn read_u32(bytes: &[u8], pos: &mut usize, tag: u8) -> Result<u32> {
    let window = need(bytes, *pos, tag, 4)?;
    let v = u32::from_be_bytes([window[0], window[1], window[2], window[3]]);
    *pos += 4;
    Ok(v)
}

fn read_i64(bytes: &[u8], pos: &mut usize, tag: u8) -> Result<i64> {
    let window = need(bytes, *pos, tag, 8)?;
    let mut arr = [0u8; 8];
    arr.copy_from_slice(window);
    let v = i64::from_be_bytes(arr);
    *pos += 8;
    Ok(v)
}

fn read_bytes<'a>(bytes: &'a [u8], pos: &mut usize, tag: u8, n: usize) -> Result<&'a [u8]> {
    let window = need(bytes, *pos, tag, n)?;
    *pos += n;
    Ok(window)
}

fn read_value(bytes: &[u8], pos: &mut usize) -> Result<Value> {
    let tag = read_u8(bytes, pos, 0)?;

    match tag {
        0xC0 => Ok(Value::Null),
        0xC1 => Err(Error::deserialization(format!("tag 0xC1 is never valid at offset {}", *pos - 1))),
        0xC2 => Ok(Value::Bool(false)),
        0xC3 => Ok(Value::Bool(true)),

        // positive fixint
        0x00..=0x7F => Ok(Value::Int(tag as i64)),
        // negative fixint
        0xE0..=0xFF => Ok(Value::Int(tag as i8 as i64)),

        0xCC => Ok(Value::Int(read_u8(bytes, pos, tag)? as i64)),
        0xCD => Ok(Value::Int(read_u16(bytes, pos, tag)? as i64)),
        0xCE => Ok(Value::Int(read_u32(bytes, pos, tag)? as i64)),
        0xCF => Ok(Value::Int(read_i64(bytes, pos, tag)?)),
        0xD0 => Ok(Value::Int(read_u8(bytes, pos, tag)? as i8 as i64)),
        0xD1 => Ok(Value::Int(read_u16(bytes, pos, tag)? as i16 as i64)),
        0xD2 => Ok(Value::Int(read_u32(bytes, pos, tag)? as i32 as i64)),
        0xD3 => Ok(Value::Int(read_i64(bytes, pos, tag)?)),

        0xCA => {
            let window = need(bytes, *pos, tag, 4)?;
            let mut arr = [0u8; 4];
            arr.copy_from_slice(window);
            *pos += 4;
            Ok(Value::Float(f32::from_be_bytes(arr) as f64))
        }
        0xCB => {
            let window = need(bytes, *pos, tag, 8)?;
            let mut arr = [0u8; 8];
            arr.copy_from_slice(window);
            *pos += 8;
            Ok(Value::Float(f64::from_be_bytes(arr)))
        }

        // fixstr
        0xA0..=0xBF => {
            let len = (tag & 0x1F) as usize;
            read_str(bytes, pos, tag, len)
        }
        0xD9 => {
            let len = read_u8(bytes, pos, tag)? as usize;
            read_str(bytes, pos, tag, len)
        }
        0xDA => {
            let len = read_u16(bytes, pos, tag)? as usize;
            read_str(bytes, pos, tag, len)
        }
        0xDB => {
            let len = read_u32(bytes, pos, tag)? as usize;
            read_str(bytes, pos, tag, len)
        }

        0xC4 => {
            let len = read_u8(bytes, pos, tag)? as usize;
            Ok(Value::Bin(read_bytes(bytes, pos, tag, len)?.to_vec()))
        }
        0xC5 => {
            let len = read_u16(bytes, pos, tag)? as usize;
            Ok(Value::Bin(read_bytes(bytes, pos, tag, len)?.to_vec()))
        }
        0xC6 => {
            let len = read_u32(bytes, pos, tag)? as usize;
            Ok(Value::Bin(read_bytes(bytes, pos, tag, len)?.to_vec()))
        }

        // fixarray
        0x90..=0x9F => read_array(bytes, pos, tag, (tag & 0x0F) as usize),
        0xDC => {
            let len = read_u16(bytes, pos, tag)? as usize;
            read_array(bytes, pos, tag, len)
        }
        0xDD => {
            let len = read_u32(bytes, pos, tag)? as usize;
            read_array(bytes, pos, tag, len)
        }

        // fixmap
        0x80..=0x8F => read_map(bytes, pos, tag, (tag & 0x0F) as usize),
        0xDE => {
            let len = read_u16(bytes, pos, tag)? as usize;
            read_map(bytes, pos, tag, len)
        }
        0xDF => {
            let len = read_u32(bytes, pos, tag)? as usize;
            read_map(bytes, pos, tag, len)
        }

        0xD4 => read_ext(bytes, pos, tag, 1),
        0xD5 => read_ext(bytes, pos, tag, 2),
        0xD6 => read_ext(bytes, pos, tag, 4),
        0xD7 => read_ext(bytes, pos, tag, 8),
        0xD8 => read_ext(bytes, pos, tag, 16),
        0xC7 => {
            let len = read_u8(bytes, pos, tag)? as usize;
            read_ext(bytes, pos, tag, len)
        }
        0xC8 => {
            let len = read_u16(bytes, pos, tag)? as usize;
            read_ext(bytes, pos, tag, len)
        }
        0xC9 => {
            let len = read_u32(bytes, pos, tag)? as usize;
            read_ext(bytes, pos, tag, len)
        }

        other => Err(Error::deserialization(format!(
            "unknown tag 0x{other:02X} at offset {}",
            *pos - 1
        ))),
    }
}

fn read_str(bytes: &[u8], pos: &mut usize, tag: u8, len: usize) -> Result<Value> {
    let start = *pos;
    need(bytes, start, tag, len)?;
    let s = utf8::decode(bytes, start, len)?;
    *pos += len;
    Ok(Value::Str(s))
}

fn read_array(bytes: &[u8], pos: &mut usize, tag: u8, len: usize) -> Result<Value> {
    let _ = tag;
    let mut items = Vec::with_capacity(len.min(4096));
    for _ in 0..len {
        items.push(read_value(bytes, pos)?);
    }
    Ok(Value::Array(items))
}

fn read_map(bytes: &[u8], pos: &mut usize, tag: u8, len: usize) -> Result<Value> {
    let _ = tag;
    let mut members = Vec::with_capacity(len.min(4096));
    for _ in 0..len {
        let key_pos = *pos;
        let key = read_value(bytes, pos)?;
        let key = match key {
            Value::Str(s) => s,
            other => {
                return Err(Error::deserialization(format!(
                    "map key at offset {key_pos} must decode to a string, got {other:?}"
                )))
            }
        };
        let value = read_value(bytes, pos)?;
        members.push((key, value));
    }
    Ok(Value::Map(members))
}

fn read_ext(bytes: &[u8], pos: &mut usize, tag: u8, len: usize) -> Result<Value> {
    let ext_type = read_u8(bytes, pos, tag)? as i8;
    let data = read_bytes(bytes, pos, tag, len)?.to_vec();

    if ext_type == -1 {
        return decode_date(&data, len);
    }
    Ok(Value::Ext(ext_type, data))
}

fn decode_date(data: &[u8], len: usize) -> Result<Value> {
    match len {
        4 => {
            let mut arr = [0u8; 4];
            arr.copy_from_slice(data);
            let secs = u32::from_be_bytes(arr) as i64;
            Ok(Value::Date(
                Utc.timestamp_opt(secs, 0)
                    .single()
                    .ok_or_else(|| Error::deserialization(format!("timestamp {secs} out of range")))?,
            ))
        }
        8 => {
            let mut arr = [0u8; 8];
            arr.copy_from_slice(data);
            let packed = u64::from_be_bytes(arr);
            let secs = (packed & 0x3_FFFF_FFFF) as i64;
            let nanos = (packed >> 34) as u32;
            Ok(Value::Date(
                Utc.timestamp_opt(secs, nanos)
                    .single()
                    .ok_or_else(|| Error::deserialization(format!("timestamp {secs}.{nanos} out of range")))?,
            ))
        }
        12 => {
            let mut nanos_arr = [0u8; 4];
            nanos_arr.copy_from_slice(&data[0..4]);
            let nanos = u32::from_be_bytes(nanos_arr);
            let mut secs_arr = [0u8; 8];
            secs_arr.copy_from_slice(&data[4..12]);
            let secs = i64::from_be_bytes(secs_arr);
            Ok(Value::Date(
                Utc.timestamp_opt(secs, nanos)
                    .single()
                    .ok_or_else(|| Error::deserialization(format!("timestamp {secs}.{nanos} out of range")))?,
            ))
        }
        other => Err(Error::deserialization(format!(
            "ext type 0xFF (timestamp) with unsupported payload length {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::super::ser;
    use super::*;

    #[test]
    fn rejects_0xc1() {
        let err = decode(&[0xC1]).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::DeserializationError);
    }

    #[test]
    fn round_trips_integers_across_widths() {
        for v in [0i64, 127, 128, 255, 256, 65535, 65536, 4_294_967_295, 4_294_967_296, -1, -32, -33, -128, -129, -32768, -32769] {
            let encoded = ser::encode(&Value::Int(v)).unwrap();
            let (decoded, consumed) = decode(&encoded).unwrap();
            assert_eq!(consumed, encoded.len());
            assert_eq!(decoded, Value::Int(v));
        }
    }

    #[test]
    fn round_trips_strings_arrays_maps() {
        let v = Value::Map(vec![
            ("name".into(), Value::Str("hello".into())),
            ("tags".into(), Value::Array(vec![Value::Int(1), Value::Int(2), Value::Bool(true)])),
        ]);
        let encoded = ser::encode(&v).unwrap();
        let (decoded, _) = decode(&encoded).unwrap();
        assert_eq!(decoded, v);
    }

    #[test]
    fn round_trips_bin_and_ext() {
        let v = Value::Bin(vec![1, 2, 3, 4, 5]);
        let encoded = ser::encode(&v).unwrap();
        let (decoded, _) = decode(&encoded).unwrap();
        assert_eq!(decoded, v);

        let v = Value::Ext(5, vec![9, 9]);
        let encoded = ser::encode(&v).unwrap();
        let (decoded, _) = decode(&encoded).unwrap();
        assert_eq!(decoded, v);
    }

    #[test]
    fn round_trips_dates_across_all_three_encodings() {
        for d in [
            Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            Utc.timestamp_opt(1_700_000_000, 500_000_000).unwrap(),
            Utc.timestamp_opt(1i64 << 35, 123).unwrap(),
        ] {
            let encoded = ser::encode(&Value::Date(d)).unwrap();
            let (decoded, _) = decode(&encoded).unwrap();
            assert_eq!(decoded, Value::Date(d));
        }
    }

    #[test]
    fn truncated_buffer_reports_incomplete() {
        let encoded = ser::encode(&Value::Str("hello world".into())).unwrap();
        let truncated = &encoded[..encoded.len() - 2];
        let err = decode(truncated).unwrap_err();
        assert!(err.to_string().contains("incomplete"));
    }

    #[test]
    fn map_with_non_string_key_fails() {
        let mut bytes = vec![0x81]; // fixmap len 1
        bytes.extend(ser::encode(&Value::Int(1)).unwrap());
        bytes.extend(ser::encode(&Value::Int(2)).unwrap());
        let err = decode(&bytes).unwrap_err();
        assert!(err.to_string().contains("must decode to a string"));
    }

    #[test]
    fn decode_multiple_reads_until_exhausted() {
        let encoded = ser::encode_multiple(&[Value::Int(1), Value::Str("a".into()), Value::Bool(true)]).unwrap();
        let values = decode_multiple(&encoded).unwrap();
        assert_eq!(values, vec![Value::Int(1), Value::Str("a".into()), Value::Bool(true)]);
    }
}
