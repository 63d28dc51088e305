//! NCP packet framing — the 32-byte header, the field/param body, and the
//! 8-byte footer, plus the continuation-style decode contract.
//!
//! ```text
//!   offset  size   field
//!   0       4      magic_header      = DD CC BB AA
//!   4       4      packet_type       (identifier, 4 bytes)
//!   8       4      total_size_words  (uint32; total packet size / 4)
//!  12       4      packet_id         (uint32)
//!  16       4      format_tag        = 01 00 00 00
//!  20       4      time_unix         (uint32 seconds since epoch)
//!  24       4      time_nano         (uint32 nanoseconds within second)
//!  28       4      info              (4 bytes)
//!  32       …      fields            (repeated)
//!   ?       4      checksum          = 00 00 00 00 (unused)
//!   ?       4      magic_footer      = AA BB CC DD
//! ```

use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{DecodeWarning, NcpError};
use crate::field::Field;
use crate::identifier::{IDENTIFIER_SIZE, Identifier};
use crate::param::Params;
use crate::value::{ParamValue, padding_for};

/// The bytes a packet begins with.
pub const MAGIC_HEADER: [u8; 4] = [0xDD, 0xCC, 0xBB, 0xAA];
/// The bytes a packet ends with.
pub const MAGIC_FOOTER: [u8; 4] = [0xAA, 0xBB, 0xCC, 0xDD];
/// The only format tag this crate writes or accepts.
pub const FORMAT_TAG: u32 = 1;
/// Fixed size of the leading header.
pub const HEADER_SIZE: usize = 32;
/// Fixed size of the trailing checksum + footer.
pub const FOOTER_SIZE: usize = 8;

/// Wall-clock timestamp carried by every packet, split the way the wire
/// format carries it: seconds since epoch, plus a nanosecond remainder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timestamp {
    /// Unix seconds.
    pub unix_seconds: u32,
    /// Nanoseconds within the second.
    pub unix_nanos: u32,
}

impl Timestamp {
    /// Sample the current wall-clock time.
    pub fn now() -> Self {
        let since_epoch = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Self {
            unix_seconds: since_epoch.as_secs() as u32,
            unix_nanos: since_epoch.subsec_nanos(),
        }
    }

    /// Compose the two components into a single floating-point timestamp.
    pub fn as_secs_f64(&self) -> f64 {
        self.unix_seconds as f64 + self.unix_nanos as f64 / 1_000_000_000.0
    }
}

/// A fully assembled NCP packet.
#[derive(Debug, Clone, PartialEq)]
pub struct Packet {
    /// The packet's 4-byte type, e.g. `LINK`.
    pub packet_type: Identifier,
    /// Monotonic id shared with field ids, assigned by the sender.
    pub id: u32,
    /// Sender's wall-clock time at encode.
    pub timestamp: Timestamp,
    /// Sender identity: client MAC-derived bytes, or server-configured bytes.
    pub info: [u8; 4],
    /// The packet's fields, in wire order.
    pub fields: Vec<Field>,
}

impl Packet {
    /// Build a packet stamped with the current time.
    pub fn now(packet_type: Identifier, id: u32, info: [u8; 4], fields: Vec<Field>) -> Self {
        Self {
            packet_type,
            id,
            timestamp: Timestamp::now(),
            info,
            fields,
        }
    }

    /// Find the first field with the given name.
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name.as_str() == name)
    }

    /// Encode this packet to its wire representation.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEADER_SIZE + 64);
        buf.extend_from_slice(&MAGIC_HEADER);
        buf.extend_from_slice(&self.packet_type.to_bytes());

        let total_size_pos = buf.len();
        buf.extend_from_slice(&[0u8; 4]); // backpatched below

        buf.extend_from_slice(&self.id.to_le_bytes());
        buf.extend_from_slice(&FORMAT_TAG.to_le_bytes());
        buf.extend_from_slice(&self.timestamp.unix_seconds.to_le_bytes());
        buf.extend_from_slice(&self.timestamp.unix_nanos.to_le_bytes());
        buf.extend_from_slice(&self.info);

        debug_assert_eq!(buf.len(), HEADER_SIZE);

        for field in &self.fields {
            encode_field(field, &mut buf);
        }

        buf.extend_from_slice(&[0u8; 4]); // checksum, unused
        buf.extend_from_slice(&MAGIC_FOOTER);

        let total_size_words = (buf.len() / 4) as u32;
        buf[total_size_pos..total_size_pos + 4].copy_from_slice(&total_size_words.to_le_bytes());

        buf
    }

    /// Decode a packet from its complete on-wire bytes (header through
    /// footer inclusive). Returns any non-fatal decode warnings alongside
    /// the packet.
    pub fn decode(full: &[u8]) -> Result<(Self, Vec<DecodeWarning>), NcpError> {
        if full.len() < HEADER_SIZE + FOOTER_SIZE {
            return Err(NcpError::Truncated {
                expected: HEADER_SIZE + FOOTER_SIZE,
                actual: full.len(),
            });
        }

        if full[0..4] != MAGIC_HEADER {
            return Err(NcpError::BadMagic);
        }

        let packet_type = Identifier::from_bytes(&full[4..8]);
        let total_size_words = u32::from_le_bytes(full[8..12].try_into().unwrap());
        let id = u32::from_le_bytes(full[12..16].try_into().unwrap());
        // format_tag at full[16..20] is not validated; only this format is written.
        let unix_seconds = u32::from_le_bytes(full[20..24].try_into().unwrap());
        let unix_nanos = u32::from_le_bytes(full[24..28].try_into().unwrap());
        let info: [u8; 4] = full[28..32].try_into().unwrap();

        let total_bytes = total_size_words as usize * 4;
        if total_bytes != full.len() {
            return Err(NcpError::Truncated {
                expected: total_bytes,
                actual: full.len(),
            });
        }

        let footer_start = total_bytes - FOOTER_SIZE;
        if full[footer_start + 4..footer_start + 8] != MAGIC_FOOTER {
            return Err(NcpError::BadFooter);
        }

        let field_region = &full[HEADER_SIZE..footer_start];
        let (fields, warnings) = decode_fields(field_region, HEADER_SIZE)?;

        Ok((
            Self {
                packet_type,
                id,
                timestamp: Timestamp {
                    unix_seconds,
                    unix_nanos,
                },
                info,
                fields,
            },
            warnings,
        ))
    }

    /// Peek a buffered 32-byte header to learn how many more bytes the
    /// continuation-style decoder needs before it can finish decoding.
    pub fn body_bytes_expected(header: &[u8]) -> Result<usize, NcpError> {
        if header.len() < HEADER_SIZE {
            return Err(NcpError::Truncated {
                expected: HEADER_SIZE,
                actual: header.len(),
            });
        }
        if header[0..4] != MAGIC_HEADER {
            return Err(NcpError::BadMagic);
        }
        let total_size_words = u32::from_le_bytes(header[8..12].try_into().unwrap());
        let total_bytes = total_size_words as usize * 4;
        if total_bytes < HEADER_SIZE {
            return Err(NcpError::Truncated {
                expected: HEADER_SIZE,
                actual: total_bytes,
            });
        }
        Ok(total_bytes - HEADER_SIZE)
    }
}

fn write_size24_type(buf: &mut [u8], pos: usize, size_words: u32, type_byte: u8) {
    buf[pos] = (size_words & 0xFF) as u8;
    buf[pos + 1] = ((size_words >> 8) & 0xFF) as u8;
    buf[pos + 2] = ((size_words >> 16) & 0xFF) as u8;
    buf[pos + 3] = type_byte;
}

fn read_size24_type(chunk: &[u8]) -> (u32, u8) {
    let size_words = chunk[0] as u32 | (chunk[1] as u32) << 8 | (chunk[2] as u32) << 16;
    (size_words, chunk[3])
}

fn encode_field(field: &Field, buf: &mut Vec<u8>) {
    let field_start = buf.len();
    buf.extend_from_slice(&field.name.to_bytes());
    let size_pos = buf.len();
    buf.extend_from_slice(&[0u8; 4]);
    buf.extend_from_slice(&field.id.to_le_bytes());

    for (name, value) in field.params.iter() {
        encode_param(name, value, buf);
    }

    let field_len = buf.len() - field_start;
    let size_words = (field_len / 4) as u32;
    write_size24_type(buf, size_pos, size_words, 0);
}

fn encode_param(name: &Identifier, value: &ParamValue, buf: &mut Vec<u8>) {
    buf.extend_from_slice(&name.to_bytes());
    let size_pos = buf.len();
    buf.extend_from_slice(&[0u8; 4]);

    let (tag, payload) = value.encode();
    buf.extend_from_slice(&payload);
    let pad = padding_for(payload.len());
    buf.extend(std::iter::repeat(0u8).take(pad));

    let size = 8 + payload.len() + pad;
    let size_words = (size / 4) as u32;
    write_size24_type(buf, size_pos, size_words, tag);
}

/// Parse fields out of a region until it is exhausted, tolerating the
/// embedded-footer corruption bug between params.
fn decode_fields(region: &[u8], base_offset: usize) -> Result<(Vec<Field>, Vec<DecodeWarning>), NcpError> {
    let mut fields = Vec::new();
    let mut warnings = Vec::new();
    let mut offset = 0;

    while offset < region.len() {
        let (field, consumed, mut field_warnings) =
            decode_field(&region[offset..], base_offset + offset)?;
        fields.push(field);
        warnings.append(&mut field_warnings);
        offset += consumed;
    }

    Ok((fields, warnings))
}

fn decode_field(data: &[u8], base_offset: usize) -> Result<(Field, usize, Vec<DecodeWarning>), NcpError> {
    const FIELD_HEADER_SIZE: usize = IDENTIFIER_SIZE + 4 + 4;

    if data.len() < FIELD_HEADER_SIZE {
        return Err(NcpError::Overflow {
            region: "field",
            excess: FIELD_HEADER_SIZE - data.len(),
        });
    }

    let name = Identifier::from_bytes(&data[0..4]);
    let (size_words, _type_id) = read_size24_type(&data[4..8]);
    let field_size = size_words as usize * 4;
    if field_size < FIELD_HEADER_SIZE {
        return Err(NcpError::Truncated {
            expected: FIELD_HEADER_SIZE,
            actual: field_size,
        });
    }
    if field_size > data.len() {
        return Err(NcpError::Overflow {
            region: "field",
            excess: field_size - data.len(),
        });
    }
    let id = u32::from_le_bytes(data[8..12].try_into().unwrap());

    let mut params = Params::new();
    let mut warnings = Vec::new();
    let mut offset = FIELD_HEADER_SIZE;

    while offset < field_size {
        if offset + FOOTER_SIZE <= field_size
            && data[offset..offset + 4] == [0, 0, 0, 0]
            && data[offset + 4..offset + 8] == MAGIC_FOOTER
        {
            warnings.push(DecodeWarning {
                offset: base_offset + offset,
            });
            offset += FOOTER_SIZE;
            continue;
        }

        let (param_name, param_value, consumed) = decode_param(&data[offset..field_size])?;
        params.insert(param_name, param_value);
        offset += consumed;
    }

    Ok((Field { name, id, params }, field_size, warnings))
}

fn decode_param(data: &[u8]) -> Result<(Identifier, ParamValue, usize), NcpError> {
    const PARAM_HEADER_SIZE: usize = IDENTIFIER_SIZE + 4;

    if data.len() < PARAM_HEADER_SIZE {
        return Err(NcpError::Overflow {
            region: "param",
            excess: PARAM_HEADER_SIZE - data.len(),
        });
    }

    let name = Identifier::from_bytes(&data[0..4]);
    let (size_words, tag) = read_size24_type(&data[4..8]);
    let size = size_words as usize * 4;
    if size < PARAM_HEADER_SIZE {
        return Err(NcpError::Truncated {
            expected: PARAM_HEADER_SIZE,
            actual: size,
        });
    }
    if size > data.len() {
        return Err(NcpError::Overflow {
            region: "param",
            excess: size - data.len(),
        });
    }

    let payload = &data[PARAM_HEADER_SIZE..size];
    let value = ParamValue::decode(tag, payload)?;

    Ok((name, value, size))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> Identifier {
        Identifier::new(s).unwrap()
    }

    #[test]
    fn empty_packet_roundtrip() {
        let packet = Packet::now(id("LINK"), 1, *b"\x01\x02\x03\x04", Vec::new());
        let bytes = packet.encode();
        assert_eq!(bytes.len() % 4, 0);
        assert_eq!(&bytes[0..4], &MAGIC_HEADER);
        assert_eq!(&bytes[bytes.len() - 4..], &MAGIC_FOOTER);

        let (decoded, warnings) = Packet::decode(&bytes).unwrap();
        assert!(warnings.is_empty());
        assert_eq!(decoded.packet_type.as_str(), "LINK");
        assert_eq!(decoded.id, 1);
        assert_eq!(decoded.info, *b"\x01\x02\x03\x04");
        assert!(decoded.fields.is_empty());
    }

    #[test]
    fn single_i32_param_roundtrip() {
        let field = Field::new(id("CMD1"), 2).with_param(id("X"), ParamValue::I32(-7));
        let packet = Packet::now(id("EXEC"), 2, [0; 4], vec![field]);
        let bytes = packet.encode();

        let (decoded, warnings) = Packet::decode(&bytes).unwrap();
        assert!(warnings.is_empty());
        let field = decoded.field("CMD1").unwrap();
        assert_eq!(field.id, 2);
        assert_eq!(field.params.get("X"), Some(&ParamValue::I32(-7)));
    }

    #[test]
    fn string_param_is_padded_on_wire() {
        let field = Field::new(id("CMD1"), 1).with_param(id("S"), ParamValue::String("ab".into()));
        let packet = Packet::now(id("EXEC"), 1, [0; 4], vec![field]);
        let bytes = packet.encode();
        let (decoded, _) = Packet::decode(&bytes).unwrap();
        assert_eq!(
            decoded.field("CMD1").unwrap().params.get("S"),
            Some(&ParamValue::String("ab".into()))
        );
    }

    #[test]
    fn multiple_fields_and_params_roundtrip() {
        let field1 = Field::new(id("A"), 1)
            .with_param(id("P1"), ParamValue::U32(1))
            .with_param(id("P2"), ParamValue::String("hi".into()));
        let field2 = Field::new(id("B"), 2).with_param(id("P3"), ParamValue::F64(2.5));
        let packet = Packet::now(id("EXEC"), 9, [9; 4], vec![field1, field2]);
        let bytes = packet.encode();

        let (decoded, warnings) = Packet::decode(&bytes).unwrap();
        assert!(warnings.is_empty());
        assert_eq!(decoded.fields.len(), 2);
        assert_eq!(decoded.field("A").unwrap().params.len(), 2);
        assert_eq!(
            decoded.field("B").unwrap().params.get("P3"),
            Some(&ParamValue::F64(2.5))
        );
    }

    #[test]
    fn bad_magic_header_rejected() {
        let packet = Packet::now(id("LINK"), 1, [0; 4], Vec::new());
        let mut bytes = packet.encode();
        bytes[0] = 0;
        assert!(matches!(Packet::decode(&bytes), Err(NcpError::BadMagic)));
    }

    #[test]
    fn bad_magic_footer_rejected() {
        let packet = Packet::now(id("LINK"), 1, [0; 4], Vec::new());
        let mut bytes = packet.encode();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        assert!(matches!(Packet::decode(&bytes), Err(NcpError::BadFooter)));
    }

    #[test]
    fn truncated_packet_rejected() {
        let packet = Packet::now(id("LINK"), 1, [0; 4], Vec::new());
        let bytes = packet.encode();
        assert!(matches!(
            Packet::decode(&bytes[..bytes.len() - 4]),
            Err(NcpError::Truncated { .. })
        ));
    }

    #[test]
    fn embedded_footer_bug_is_tolerated_with_warning() {
        let field = Field::new(id("A"), 1).with_param(id("P1"), ParamValue::U32(1));
        let packet = Packet::now(id("EXEC"), 1, [0; 4], vec![field.clone()]);
        let mut bytes = packet.encode();

        // Splice the canonical corrupt marker in the middle of the field
        // region (right after the one param), then widen the field's
        // and packet's declared sizes to account for the extra 8 bytes.
        let marker = [0u8, 0, 0, 0, 0xAA, 0xBB, 0xCC, 0xDD];
        let insert_at = HEADER_SIZE + 20; // just past the one param in field "A "
        bytes.splice(insert_at..insert_at, marker.iter().copied());

        let field_size_pos = HEADER_SIZE + 4;
        let (old_words, _) = read_size24_type(&bytes[field_size_pos..field_size_pos + 4]);
        write_size24_type(&mut bytes, field_size_pos, old_words + 2, 0);

        let total_pos = 8;
        let old_total = u32::from_le_bytes(bytes[total_pos..total_pos + 4].try_into().unwrap());
        bytes[total_pos..total_pos + 4].copy_from_slice(&(old_total + 2).to_le_bytes());

        let (decoded, warnings) = Packet::decode(&bytes).unwrap();
        assert_eq!(warnings.len(), 1);
        assert_eq!(decoded.field("A").unwrap().params.get("P1"), Some(&ParamValue::U32(1)));
    }

    #[test]
    fn body_bytes_expected_matches_encoded_length() {
        let field = Field::new(id("A"), 1).with_param(id("P1"), ParamValue::U32(1));
        let packet = Packet::now(id("EXEC"), 1, [0; 4], vec![field]);
        let bytes = packet.encode();
        let expected = Packet::body_bytes_expected(&bytes[..HEADER_SIZE]).unwrap();
        assert_eq!(expected, bytes.len() - HEADER_SIZE);
    }

    #[test]
    fn timestamp_roundtrips() {
        let packet = Packet::now(id("LINK"), 1, [0; 4], Vec::new());
        let bytes = packet.encode();
        let (decoded, _) = Packet::decode(&bytes).unwrap();
        assert_eq!(decoded.timestamp.unix_seconds, packet.timestamp.unix_seconds);
        assert_eq!(decoded.timestamp.unix_nanos, packet.timestamp.unix_nanos);
    }
}
