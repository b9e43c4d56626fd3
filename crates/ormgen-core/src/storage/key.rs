//! Order-preserving key encoding for identity values.
//!
//! Key format: `[tag (1 byte)][payload]`. Integers and timestamps are stored
//! big-endian with the sign bit flipped, so lexicographic order of the encoded
//! bytes matches numeric order and range scans return rows by identity.

use crate::error::Error;
use crate::value::Value;

const TAG_BOOL: u8 = 0x01;
const TAG_INT: u8 = 0x02;
const TAG_TIMESTAMP: u8 = 0x03;
const TAG_STRING: u8 = 0x04;
const TAG_UUID: u8 = 0x05;

const SIGN_BIT: u64 = 1 << 63;

/// Encode an identity value into a storage key.
pub fn encode_key(value: &Value) -> Result<Vec<u8>, Error> {
    let mut buf = Vec::with_capacity(9);
    match value {
        Value::Bool(b) => {
            buf.push(TAG_BOOL);
            buf.push(*b as u8);
        }
        Value::Int32(i) => encode_signed(&mut buf, TAG_INT, *i as i64),
        Value::Int64(i) => encode_signed(&mut buf, TAG_INT, *i),
        Value::Timestamp(t) => encode_signed(&mut buf, TAG_TIMESTAMP, *t),
        Value::String(s) => {
            buf.push(TAG_STRING);
            buf.extend_from_slice(s.as_bytes());
        }
        Value::Uuid(u) => {
            buf.push(TAG_UUID);
            buf.extend_from_slice(u);
        }
        Value::Null | Value::Float64(_) => {
            return Err(Error::InvalidValue {
                field: "pk".to_string(),
                message: format!("{:?} cannot be used as an identity", value),
            })
        }
    }
    Ok(buf)
}

/// Decode an integer key produced by [`encode_key`].
pub fn decode_int_key(bytes: &[u8]) -> Option<i64> {
    if bytes.len() != 9 || bytes[0] != TAG_INT {
        return None;
    }
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&bytes[1..]);
    Some((u64::from_be_bytes(raw) ^ SIGN_BIT) as i64)
}

fn encode_signed(buf: &mut Vec<u8>, tag: u8, value: i64) {
    buf.push(tag);
    buf.extend_from_slice(&((value as u64) ^ SIGN_BIT).to_be_bytes());
}
