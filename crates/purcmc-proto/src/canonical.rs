// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Deterministic CBOR encoder/decoder for [`crate::Message`].
//!
//! Enforces:
//! - Definite lengths only (no break/indefinite)
//! - No tags
//! - Canonical integer widths (shortest)
//! - Floats encoded with the smallest width that round-trips (integral
//!   values are encoded as integers)
//! - Map keys sorted by their CBOR byte encoding; no duplicates
//!
//! This guarantees `serialize(parse(serialize(m))) == serialize(m)`
//! byte-for-byte, not just value-equal, satisfying the round-trip
//! property every valid message must hold.

use crate::Message;
use half::f16;
use serde_cbor::Value;
use std::collections::BTreeMap;

/// Failure modes for canonical CBOR encoding/decoding.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CanonError {
    /// The byte stream ended before a complete value was read.
    #[error("incomplete input")]
    Incomplete,
    /// Extra bytes remained after decoding one top-level value.
    #[error("trailing bytes after value")]
    Trailing,
    /// A CBOR tag was encountered; tags are not part of this wire format.
    #[error("tags not allowed")]
    Tag,
    /// An indefinite-length item was encountered.
    #[error("indefinite length not allowed")]
    Indefinite,
    /// An integer was encoded in a wider form than necessary.
    #[error("non-canonical integer width")]
    NonCanonicalInt,
    /// A float was encoded in a wider form than necessary.
    #[error("non-canonical float width")]
    NonCanonicalFloat,
    /// A float encodes an integral value and should have been an integer.
    #[error("float encodes integral value; must be integer")]
    FloatShouldBeInt,
    /// Map keys were not in strictly increasing byte order.
    #[error("map keys not strictly increasing")]
    MapKeyOrder,
    /// A map contained a duplicate key.
    #[error("duplicate map key")]
    MapKeyDuplicate,
    /// Failed to convert between `Message` and the CBOR value tree.
    #[error("message conversion error: {0}")]
    Message(#[from] serde_cbor::Error),
    /// Any other structural decode failure.
    #[error("decode error: {0}")]
    Decode(String),
}

type Result<T> = std::result::Result<T, CanonError>;

/// Encode a [`Message`] into canonical CBOR bytes.
pub fn encode_canonical(msg: &Message) -> Result<Vec<u8>> {
    let value = serde_cbor::value::to_value(msg)?;
    let mut out = Vec::new();
    enc_value(&value, &mut out)?;
    Ok(out)
}

/// Decode a [`Message`] from canonical CBOR bytes, rejecting any
/// non-canonical encoding rather than silently accepting it.
pub fn decode_canonical(bytes: &[u8]) -> Result<Message> {
    let mut idx = 0usize;
    let value = dec_value(bytes, &mut idx, true)?;
    if idx != bytes.len() {
        return Err(CanonError::Trailing);
    }
    let msg = serde_cbor::value::from_value(value)?;
    Ok(msg)
}

// --- Encoder --------------------------------------------------------------

fn enc_value(v: &Value, out: &mut Vec<u8>) -> Result<()> {
    match v {
        Value::Bool(b) => {
            out.push(if *b { 0xf5 } else { 0xf4 });
        }
        Value::Null => out.push(0xf6),
        Value::Integer(n) => enc_int(*n, out),
        Value::Float(f) => enc_float(*f, out),
        Value::Text(s) => enc_text(s, out),
        Value::Bytes(b) => enc_bytes(b, out),
        Value::Array(items) => {
            enc_len(4, items.len() as u64, out);
            for it in items {
                enc_value(it, out)?;
            }
        }
        Value::Map(map) => {
            let mut sorted: Vec<(Vec<u8>, Vec<u8>)> = Vec::with_capacity(map.len());
            for (k, v) in map {
                let mut kb = Vec::new();
                enc_value(k, &mut kb)?;
                let mut vb = Vec::new();
                enc_value(v, &mut vb)?;
                sorted.push((kb, vb));
            }
            sorted.sort_by(|a, b| a.0.cmp(&b.0));
            for win in sorted.windows(2) {
                if win[0].0 == win[1].0 {
                    return Err(CanonError::MapKeyDuplicate);
                }
            }
            enc_len(5, sorted.len() as u64, out);
            for (kb, vb) in sorted {
                out.extend_from_slice(&kb);
                out.extend_from_slice(&vb);
            }
        }
        Value::Tag(_, _) => return Err(CanonError::Tag),
        _ => return Err(CanonError::Decode("unsupported value kind".into())),
    }
    Ok(())
}

fn enc_len(major: u8, len: u64, out: &mut Vec<u8>) {
    write_major(major, u128::from(len), out);
}

fn enc_int(n: i128, out: &mut Vec<u8>) {
    if n >= 0 {
        write_major(0, n as u128, out);
    } else {
        let m = (-1 - n) as u128;
        write_major(1, m, out);
    }
}

fn enc_float(f: f64, out: &mut Vec<u8>) {
    if f.is_nan() {
        write_half(f16::NAN, out);
        return;
    }
    if f.is_infinite() {
        let h = if f.is_sign_positive() {
            f16::INFINITY
        } else {
            f16::NEG_INFINITY
        };
        write_half(h, out);
        return;
    }
    if f.fract() == 0.0 {
        let i = f as i128;
        if i as f64 == f {
            enc_int(i, out);
            return;
        }
    }
    let h = f16::from_f64(f);
    if h.to_f64() == f {
        write_half(h, out);
        return;
    }
    let f32v = f as f32;
    if f64::from(f32v) == f {
        write_f32(f32v, out);
    } else {
        write_f64(f, out);
    }
}

fn write_half(h: f16, out: &mut Vec<u8>) {
    out.push(0xf9);
    out.extend_from_slice(&h.to_bits().to_be_bytes());
}

fn write_f32(fv: f32, out: &mut Vec<u8>) {
    out.push(0xfa);
    out.extend_from_slice(&fv.to_be_bytes());
}

fn write_f64(fv: f64, out: &mut Vec<u8>) {
    out.push(0xfb);
    out.extend_from_slice(&fv.to_be_bytes());
}

fn enc_bytes(b: &[u8], out: &mut Vec<u8>) {
    enc_len(2, b.len() as u64, out);
    out.extend_from_slice(b);
}

fn enc_text(s: &str, out: &mut Vec<u8>) {
    enc_len(3, s.len() as u64, out);
    out.extend_from_slice(s.as_bytes());
}

fn write_major(major: u8, n: u128, out: &mut Vec<u8>) {
    debug_assert!(major <= 7);
    match n {
        0..=23 => out.push((major << 5) | n as u8),
        24..=0xff => {
            out.push((major << 5) | 24);
            out.push(n as u8);
        }
        0x100..=0xffff => {
            out.push((major << 5) | 25);
            out.extend_from_slice(&(n as u16).to_be_bytes());
        }
        0x1_0000..=0xffff_ffff => {
            out.push((major << 5) | 26);
            out.extend_from_slice(&(n as u32).to_be_bytes());
        }
        _ => {
            out.push((major << 5) | 27);
            out.extend_from_slice(&(n as u64).to_be_bytes());
        }
    }
}

// --- Decoder --------------------------------------------------------------

fn dec_value(bytes: &[u8], idx: &mut usize, strict: bool) -> Result<Value> {
    if *idx >= bytes.len() {
        return Err(CanonError::Incomplete);
    }
    let b0 = bytes[*idx];
    *idx += 1;
    let major = b0 >> 5;
    let ai = b0 & 0x1f;

    if major == 6 {
        return Err(CanonError::Tag);
    }
    if ai == 31 {
        return Err(CanonError::Indefinite);
    }

    let n = match ai {
        0..=23 => u64::from(ai),
        24 => take_u(bytes, idx, 1)?,
        25 => take_u(bytes, idx, 2)?,
        26 => take_u(bytes, idx, 4)?,
        27 => take_u(bytes, idx, 8)?,
        _ => return Err(CanonError::Decode("invalid additional info".into())),
    };

    match major {
        0 => {
            check_min_int(ai, n, strict)?;
            Ok(int_to_value(u128::from(n), false))
        }
        1 => {
            check_min_int(ai, n, strict)?;
            Ok(int_to_value(u128::from(n), true))
        }
        2 => {
            let len = n as usize;
            let end = idx_add(*idx, len)?;
            if end > bytes.len() {
                return Err(CanonError::Incomplete);
            }
            let v = Value::Bytes(bytes[*idx..end].to_vec());
            *idx = end;
            Ok(v)
        }
        3 => {
            let len = n as usize;
            let end = idx_add(*idx, len)?;
            if end > bytes.len() {
                return Err(CanonError::Incomplete);
            }
            let s = std::str::from_utf8(&bytes[*idx..end])
                .map_err(|e| CanonError::Decode(e.to_string()))?
                .to_string();
            *idx = end;
            Ok(Value::Text(s))
        }
        4 => {
            let len = n as usize;
            let mut items = Vec::with_capacity(len.min(1024));
            for _ in 0..len {
                items.push(dec_value(bytes, idx, strict)?);
            }
            Ok(Value::Array(items))
        }
        5 => {
            let len = n as usize;
            let mut entries = Vec::with_capacity(len.min(1024));
            let mut prev_bytes: Option<Vec<u8>> = None;
            for _ in 0..len {
                let key_start = *idx;
                let key = dec_value(bytes, idx, strict)?;
                let key_end = *idx;
                let curr_bytes = bytes[key_start..key_end].to_vec();
                if let Some(pb) = &prev_bytes {
                    match pb.cmp(&curr_bytes) {
                        std::cmp::Ordering::Less => {}
                        std::cmp::Ordering::Equal => return Err(CanonError::MapKeyDuplicate),
                        std::cmp::Ordering::Greater => return Err(CanonError::MapKeyOrder),
                    }
                }
                prev_bytes = Some(curr_bytes);
                let val = dec_value(bytes, idx, strict)?;
                entries.push((key, val));
            }
            let map: BTreeMap<Value, Value> = entries.into_iter().collect();
            Ok(Value::Map(map))
        }
        7 => match ai {
            20 => Ok(Value::Bool(false)),
            21 => Ok(Value::Bool(true)),
            22 | 23 => Ok(Value::Null),
            25 => {
                let bits = n as u16;
                let f = f16::from_bits(bits).to_f64();
                reject_non_canonical_float(f, 16, strict)?;
                Ok(Value::Float(f))
            }
            26 => {
                let bits = take_u(bytes, idx, 4)? as u32;
                let f = f64::from(f32::from_bits(bits));
                reject_non_canonical_float(f, 32, strict)?;
                Ok(Value::Float(f))
            }
            27 => {
                let bits = take_u(bytes, idx, 8)?;
                let f = f64::from_bits(bits);
                reject_non_canonical_float(f, 64, strict)?;
                Ok(Value::Float(f))
            }
            _ => Err(CanonError::Decode("unknown simple/float".into())),
        },
        _ => Err(CanonError::Decode("unknown major".into())),
    }
}

fn reject_non_canonical_float(f: f64, width: u8, strict: bool) -> Result<()> {
    if !strict {
        return Ok(());
    }
    if float_should_be_int(f) {
        return Err(CanonError::FloatShouldBeInt);
    }
    if !float_canonical_width(f, width) {
        return Err(CanonError::NonCanonicalFloat);
    }
    Ok(())
}

fn idx_add(idx: usize, len: usize) -> Result<usize> {
    idx.checked_add(len).ok_or(CanonError::Incomplete)
}

fn take_u(bytes: &[u8], idx: &mut usize, len: usize) -> Result<u64> {
    let mut buf = [0u8; 8];
    let end = idx_add(*idx, len)?;
    if end > bytes.len() {
        return Err(CanonError::Incomplete);
    }
    buf[8 - len..].copy_from_slice(&bytes[*idx..end]);
    *idx = end;
    Ok(u64::from_be_bytes(buf))
}

fn check_min_int(ai: u8, n: u64, strict: bool) -> Result<()> {
    if !strict {
        return Ok(());
    }
    let min_ok = match ai {
        0..=23 => true,
        24 => n >= 24,
        25 => n > 0xff,
        26 => n > 0xffff,
        27 => n > 0xffff_ffff,
        _ => false,
    };
    if min_ok {
        Ok(())
    } else {
        Err(CanonError::NonCanonicalInt)
    }
}

fn int_to_value(n: u128, negative: bool) -> Value {
    if negative {
        Value::Integer(-1i128 - (n as i128))
    } else {
        Value::Integer(n as i128)
    }
}

fn float_should_be_int(f: f64) -> bool {
    f.is_finite() && f.fract() == 0.0 && fits_i128(f)
}

fn fits_i128(f: f64) -> bool {
    const MAX: f64 = i128::MAX as f64;
    const MIN: f64 = i128::MIN as f64;
    (MIN..=MAX).contains(&f)
}

fn float_canonical_width(f: f64, width: u8) -> bool {
    if f.is_nan() || f.is_infinite() {
        return width == 16;
    }
    let h = f16::from_f64(f);
    if h.to_f64() == f {
        return width == 16;
    }
    let f32v = f as f32;
    if f64::from(f32v) == f {
        return width == 32;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ElementType, MsgType, Target};

    fn sample_message() -> Message {
        Message {
            msg_type: MsgType::Request,
            target: Target::Session,
            target_value: 0,
            operation: Some("startSession".into()),
            element_type: ElementType::Void,
            element_value: None,
            property: None,
            request_id: Some("r1".into()),
            data_type: crate::DataType::Void,
            data: None,
            ret_code: None,
            result_value: None,
            source_uri: Some("edpt://localhost/app/runner".into()),
        }
    }

    #[test]
    fn round_trips_byte_for_byte() {
        let msg = sample_message();
        let bytes1 = encode_canonical(&msg).expect("encode");
        let decoded = decode_canonical(&bytes1).expect("decode");
        let bytes2 = encode_canonical(&decoded).expect("re-encode");
        assert_eq!(bytes1, bytes2);
        assert_eq!(msg, decoded);
    }

    #[test]
    fn rejects_indefinite_length() {
        let bytes = vec![0x9f, 0x01, 0x02, 0xff];
        let mut idx = 0;
        let res = dec_value(&bytes, &mut idx, true);
        assert!(matches!(res, Err(CanonError::Indefinite)));
    }

    #[test]
    fn rejects_non_canonical_int_width() {
        let bytes = vec![0x19, 0x00, 0x01];
        let mut idx = 0;
        let res = dec_value(&bytes, &mut idx, true);
        assert!(matches!(res, Err(CanonError::NonCanonicalInt)));
    }

    #[test]
    fn rejects_duplicate_map_keys() {
        let bytes = vec![0xa2, 0x61, 0x61, 0x01, 0x61, 0x61, 0x02];
        let mut idx = 0;
        let res = dec_value(&bytes, &mut idx, true);
        assert!(matches!(res, Err(CanonError::MapKeyDuplicate)));
    }

    #[test]
    fn rejects_out_of_order_map_keys() {
        let bytes = vec![0xa2, 0x61, 0x7a, 0x01, 0x61, 0x61, 0x01];
        let mut idx = 0;
        let res = dec_value(&bytes, &mut idx, true);
        assert!(matches!(res, Err(CanonError::MapKeyOrder)));
    }
}
