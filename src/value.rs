//! NCP param value codec — maps a [`ParamValue`] to a `(tag byte, payload
//! bytes)` pair and back.
//!
//! Tag assignments are a small, fixed, implementation-local table (the
//! domain vocabulary of field/param *names* is data owned by the caller;
//! this tag table for value *types* is the only part of the value layer
//! that is code).

use crate::error::NcpError;

/// Signed 32-bit integer tag.
pub const TAG_I32: u8 = 1;
/// Unsigned 32-bit integer tag.
pub const TAG_U32: u8 = 2;
/// Latin-1 text tag.
pub const TAG_STRING: u8 = 3;
/// Opaque bytes tag.
pub const TAG_RAW: u8 = 4;
/// Signed 32-bit integer array tag.
pub const TAG_I32_ARRAY: u8 = 5;
/// Unsigned 32-bit integer array tag.
pub const TAG_U32_ARRAY: u8 = 6;
/// IEEE-754 double tag.
pub const TAG_F64: u8 = 7;
/// IEEE-754 double array tag.
pub const TAG_F64_ARRAY: u8 = 8;

/// A typed NCP param value.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    /// Signed 32-bit integer.
    I32(i32),
    /// Unsigned 32-bit integer.
    U32(u32),
    /// Text, stored as a Latin-1 byte sequence with no terminator.
    String(String),
    /// Opaque bytes.
    Raw(Vec<u8>),
    /// A homogeneous array of signed 32-bit integers.
    I32Array(Vec<i32>),
    /// A homogeneous array of unsigned 32-bit integers.
    U32Array(Vec<u32>),
    /// A double-precision float.
    F64(f64),
    /// A homogeneous array of double-precision floats.
    F64Array(Vec<f64>),
}

impl ParamValue {
    /// Build the narrowest-fitting integer variant for a single value:
    /// signed if negative, unsigned otherwise.
    pub fn from_int(value: i64) -> Self {
        if value < 0 {
            ParamValue::I32(value as i32)
        } else {
            ParamValue::U32(value as u32)
        }
    }

    /// Build the narrowest-fitting integer array variant: signed if any
    /// element is negative, unsigned otherwise (the sender widens to a
    /// single variant for the whole array).
    pub fn from_ints(values: impl IntoIterator<Item = i64>) -> Self {
        let values: Vec<i64> = values.into_iter().collect();
        if values.iter().any(|&v| v < 0) {
            ParamValue::I32Array(values.iter().map(|&v| v as i32).collect())
        } else {
            ParamValue::U32Array(values.iter().map(|&v| v as u32).collect())
        }
    }

    /// Encode this value to its `(tag, payload)` pair. The payload is
    /// *not* padded here — padding to a 4-byte boundary is the param
    /// layer's responsibility.
    pub fn encode(&self) -> (u8, Vec<u8>) {
        match self {
            ParamValue::I32(v) => (TAG_I32, v.to_le_bytes().to_vec()),
            ParamValue::U32(v) => (TAG_U32, v.to_le_bytes().to_vec()),
            ParamValue::String(s) => (
                TAG_STRING,
                s.chars().map(|c| c as u32 as u8).collect(),
            ),
            ParamValue::Raw(bytes) => (TAG_RAW, bytes.clone()),
            ParamValue::I32Array(values) => {
                let mut buf = Vec::with_capacity(values.len() * 4);
                for v in values {
                    buf.extend_from_slice(&v.to_le_bytes());
                }
                (TAG_I32_ARRAY, buf)
            }
            ParamValue::U32Array(values) => {
                let mut buf = Vec::with_capacity(values.len() * 4);
                for v in values {
                    buf.extend_from_slice(&v.to_le_bytes());
                }
                (TAG_U32_ARRAY, buf)
            }
            ParamValue::F64(v) => (TAG_F64, v.to_le_bytes().to_vec()),
            ParamValue::F64Array(values) => {
                let mut buf = Vec::with_capacity(values.len() * 8);
                for v in values {
                    buf.extend_from_slice(&v.to_le_bytes());
                }
                (TAG_F64_ARRAY, buf)
            }
        }
    }

    /// Decode a `(tag, payload)` pair into a `ParamValue`.
    pub fn decode(tag: u8, payload: &[u8]) -> Result<Self, NcpError> {
        match tag {
            TAG_I32 => Ok(ParamValue::I32(read_i32(payload)?)),
            TAG_U32 => Ok(ParamValue::U32(read_u32(payload)?)),
            TAG_STRING => Ok(ParamValue::String(
                payload.iter().map(|&b| b as char).collect(),
            )),
            TAG_RAW => Ok(ParamValue::Raw(payload.to_vec())),
            TAG_I32_ARRAY => Ok(ParamValue::I32Array(
                payload.chunks_exact(4).map(i32::from_le_bytes_chunk).collect(),
            )),
            TAG_U32_ARRAY => Ok(ParamValue::U32Array(
                payload.chunks_exact(4).map(u32::from_le_bytes_chunk).collect(),
            )),
            TAG_F64 => Ok(ParamValue::F64(read_f64(payload)?)),
            TAG_F64_ARRAY => Ok(ParamValue::F64Array(
                payload.chunks_exact(8).map(f64::from_le_bytes_chunk).collect(),
            )),
            other => Err(NcpError::UnknownParamType(other)),
        }
    }

    /// Interpret the value as an `i32`, where applicable.
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            ParamValue::I32(v) => Some(*v),
            ParamValue::U32(v) => i32::try_from(*v).ok(),
            _ => None,
        }
    }

    /// Interpret the value as a UTF-8/Latin-1 string, where applicable.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::String(s) => Some(s),
            _ => None,
        }
    }
}

fn read_i32(payload: &[u8]) -> Result<i32, NcpError> {
    let bytes: [u8; 4] = payload
        .try_into()
        .map_err(|_| NcpError::Truncated {
            expected: 4,
            actual: payload.len(),
        })?;
    Ok(i32::from_le_bytes(bytes))
}

fn read_u32(payload: &[u8]) -> Result<u32, NcpError> {
    let bytes: [u8; 4] = payload
        .try_into()
        .map_err(|_| NcpError::Truncated {
            expected: 4,
            actual: payload.len(),
        })?;
    Ok(u32::from_le_bytes(bytes))
}

fn read_f64(payload: &[u8]) -> Result<f64, NcpError> {
    let bytes: [u8; 8] = payload
        .try_into()
        .map_err(|_| NcpError::Truncated {
            expected: 8,
            actual: payload.len(),
        })?;
    Ok(f64::from_le_bytes(bytes))
}

trait FromLeBytesChunk {
    fn from_le_bytes_chunk(chunk: &[u8]) -> Self;
}

impl FromLeBytesChunk for i32 {
    fn from_le_bytes_chunk(chunk: &[u8]) -> Self {
        i32::from_le_bytes(chunk.try_into().expect("chunks_exact(4) guarantees length"))
    }
}

impl FromLeBytesChunk for u32 {
    fn from_le_bytes_chunk(chunk: &[u8]) -> Self {
        u32::from_le_bytes(chunk.try_into().expect("chunks_exact(4) guarantees length"))
    }
}

impl FromLeBytesChunk for f64 {
    fn from_le_bytes_chunk(chunk: &[u8]) -> Self {
        f64::from_le_bytes(chunk.try_into().expect("chunks_exact(8) guarantees length"))
    }
}

/// Round up to the next multiple of 4, returning the padding byte count.
pub fn padding_for(len: usize) -> usize {
    (4 - (len % 4)) % 4
}
