//! MessagePack serializer.
//!
//! Encodes the [`Value`] universe to a MessagePack byte stream, choosing
//! the narrowest tag available for each value. Binary data is the one
//! deliberate exception: it always goes out through the `0xC4`/`0xC5`/`0xC6`
//! `bin` family, even a zero-length blob — there is no fixbin fast path.

use super::utf8;
use super::value::Value;
use crate::error::{Error, Result};

/// A growable output buffer, starting at 256 bytes and growing ×1.5
/// (rounded up) whenever the next write would overflow it. `Vec<u8>`
/// already amortizes growth on its own, but the codec's origin format
/// specifies this exact policy, so we mirror it rather than lean on
/// whatever `Vec` happens to do internally.
struct Buffer {
    data: Vec<u8>,
    len: usize,
}

impl Buffer {
    fn new() -> Self {
        Self {
            data: vec![0u8; 256],
            len: 0,
        }
    }

    fn ensure(&mut self, additional: usize) {
        let needed = self.len + additional;
        if needed > self.data.len() {
            let mut cap = self.data.len().max(1);
            while cap < needed {
                cap = ((cap as f64) * 1.5).ceil() as usize;
            }
            self.data.resize(cap, 0);
        }
    }

    fn push(&mut self, byte: u8) {
        self.ensure(1);
        self.data[self.len] = byte;
        self.len += 1;
    }

    fn extend(&mut self, bytes: &[u8]) {
        self.ensure(bytes.len());
        self.data[self.len..self.len + bytes.len()].copy_from_slice(bytes);
        self.len += bytes.len();
    }

    fn into_vec(mut self) -> Vec<u8> {
        self.data.truncate(self.len);
        self.data
    }
}

/// Encode a single value to MessagePack bytes. Values that can't be
/// represented don't arise here — build any replacement-on-failure
/// semantics into the `Value` itself via [`Value::from_serialize`] before
/// calling this.
pub fn encode(value: &Value) -> Result<Vec<u8>> {
    let mut buf = Buffer::new();
    write_value(&mut buf, value)?;
    Ok(buf.into_vec())
}

/// Encode an ordered sequence of values, concatenating their encodings one
/// after another with no separator or length prefix between them.
pub fn encode_multiple(values: &[Value]) -> Result<Vec<u8>> {
    let mut buf = Buffer::new();
    for value in values {
        write_value(&mut buf, value)?;
    }
    Ok(buf.into_vec())
}

fn write_value(buf: &mut Buffer, value: &Value) -> Result<()> {
    match value {
        Value::Null => buf.push(0xC0),
        Value::Bool(false) => buf.push(0xC2),
        Value::Bool(true) => buf.push(0xC3),
        Value::Int(i) => write_int(buf, *i),
        Value::Float(f) => write_float(buf, *f),
        Value::Str(s) => write_str(buf, s),
        Value::Bin(b) => write_bin(buf, b),
        Value::Array(items) => write_array(buf, items)?,
        Value::Map(members) => write_map(buf, members)?,
        Value::Date(d) => write_date(buf, d),
        Value::Ext(tag, data) => write_ext(buf, *tag, data)?,
    }
    Ok(())
}

fn write_int(buf: &mut Buffer, v: i64) {
    if v >= 0 {
        if v <= 0x7F {
            buf.push(v as u8);
        } else if v <= 0xFF {
            buf.push(0xCC);
            buf.push(v as u8);
        } else if v <= 0xFFFF {
            buf.push(0xCD);
            buf.extend(&(v as u16).to_be_bytes());
        } else if v <= 0xFFFF_FFFF {
            buf.push(0xCE);
            buf.extend(&(v as u32).to_be_bytes());
        } else {
            buf.push(0xD3);
            buf.extend(&v.to_be_bytes());
        }
    } else if v >= -32 {
        buf.push(v as i8 as u8);
    } else if v >= -128 {
        buf.push(0xD0);
        buf.extend(&(v as i8).to_be_bytes());
    } else if v >= -32_768 {
        buf.push(0xD1);
        buf.extend(&(v as i16).to_be_bytes());
    } else if v >= -2_147_483_648 {
        buf.push(0xD2);
        buf.extend(&(v as i32).to_be_bytes());
    } else {
        buf.push(0xD3);
        buf.extend(&v.to_be_bytes());
    }
}

fn write_float(buf: &mut Buffer, f: f64) {
    buf.push(0xCB);
    buf.extend(&f.to_be_bytes());
}

fn write_str(buf: &mut Buffer, s: &str) {
    let bytes = utf8::encode(s);
    let len = bytes.len();
    if len <= 31 {
        buf.push(0xA0 | len as u8);
    } else if len <= 0xFF {
        buf.push(0xD9);
        buf.push(len as u8);
    } else if len <= 0xFFFF {
        buf.push(0xDA);
        buf.extend(&(len as u16).to_be_bytes());
    } else {
        buf.push(0xDB);
        buf.extend(&(len as u32).to_be_bytes());
    }
    buf.extend(&bytes);
}

fn write_bin(buf: &mut Buffer, b: &[u8]) {
    let len = b.len();
    if len <= 0xFF {
        buf.push(0xC4);
        buf.push(len as u8);
    } else if len <= 0xFFFF {
        buf.push(0xC5);
        buf.extend(&(len as u16).to_be_bytes());
    } else {
        buf.push(0xC6);
        buf.extend(&(len as u32).to_be_bytes());
    }
    buf.extend(b);
}

fn write_array(buf: &mut Buffer, items: &[Value]) -> Result<()> {
    let len = items.len();
    if len <= 15 {
        buf.push(0x90 | len as u8);
    } else if len <= 0xFFFF {
        buf.push(0xDC);
        buf.extend(&(len as u16).to_be_bytes());
    } else {
        buf.push(0xDD);
        buf.extend(&(len as u32).to_be_bytes());
    }
    for item in items {
        write_value(buf, item)?;
    }
    Ok(())
}

fn write_map(buf: &mut Buffer, members: &[(String, Value)]) -> Result<()> {
    let len = members.len();
    if len <= 15 {
        buf.push(0x80 | len as u8);
    } else if len <= 0xFFFF {
        buf.push(0xDE);
        buf.extend(&(len as u16).to_be_bytes());
    } else {
        buf.push(0xDF);
        buf.extend(&(len as u32).to_be_bytes());
    }
    for (key, value) in members {
        write_str(buf, key);
        write_value(buf, value)?;
    }
    Ok(())
}

fn write_date(buf: &mut Buffer, date: &chrono::DateTime<chrono::Utc>) {
    let secs = date.timestamp();
    let nanos = date.timestamp_subsec_nanos();

    if nanos == 0 && (0..=u32::MAX as i64).contains(&secs) {
        buf.push(0xD6);
        buf.push(0xFF);
        buf.extend(&(secs as u32).to_be_bytes());
    } else if (0..(1i64 << 34)).contains(&secs) {
        let packed: u64 = ((nanos as u64) << 34) | (secs as u64);
        buf.push(0xD7);
        buf.push(0xFF);
        buf.extend(&packed.to_be_bytes());
    } else {
        buf.push(0xC7);
        buf.push(12);
        buf.push(0xFF);
        buf.extend(&nanos.to_be_bytes());
        buf.extend(&secs.to_be_bytes());
    }
}

fn write_ext(buf: &mut Buffer, tag: i8, data: &[u8]) -> Result<()> {
    let len = data.len();
    match len {
        1 => buf.push(0xD4),
        2 => buf.push(0xD5),
        4 => buf.push(0xD6),
        8 => buf.push(0xD7),
        16 => buf.push(0xD8),
        _ if len <= 0xFF => {
            buf.push(0xC7);
            buf.push(len as u8);
        }
        _ if len <= 0xFFFF => {
            buf.push(0xC8);
            buf.extend(&(len as u16).to_be_bytes());
        }
        _ if len <= 0xFFFF_FFFF => {
            buf.push(0xC9);
            buf.extend(&(len as u32).to_be_bytes());
        }
        _ => return Err(Error::serialization(format!("ext payload of {len} bytes exceeds u32 length"))),
    }
    buf.push(tag as u8);
    buf.extend(data);
    Ok(())
}
