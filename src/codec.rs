//! NCP wire codec — `Decoder`/`Encoder` for `tokio_util::codec::Framed`.
//!
//! A thin adapter over the continuation-style decode contract in
//! [`crate::packet`]: once a full 32-byte header is buffered, it computes
//! `body_bytes_expected` and only runs the finisher once the complete
//! frame has arrived. This preserves the "exactly two reads per packet"
//! framing intent while fitting `tokio_util`'s buffered-stream `Decoder`
//! shape.

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use crate::error::NcpError;
use crate::packet::{HEADER_SIZE, Packet};

/// Stateless codec for NCP packets.
pub struct NcpCodec;

impl Decoder for NcpCodec {
    type Item = Packet;
    type Error = NcpError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < HEADER_SIZE {
            return Ok(None);
        }

        let body_bytes_expected = Packet::body_bytes_expected(&src[..HEADER_SIZE])?;
        let total = HEADER_SIZE + body_bytes_expected;

        if src.len() < total {
            src.reserve(total - src.len());
            return Ok(None);
        }

        let frame = src.split_to(total);
        let (packet, warnings) = Packet::decode(&frame)?;

        for warning in warnings {
            tracing::warn!(offset = warning.offset, "{warning}");
        }

        Ok(Some(packet))
    }
}

impl Encoder<Packet> for NcpCodec {
    type Error = NcpError;

    fn encode(&mut self, item: Packet, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.extend_from_slice(&item.encode());
        Ok(())
    }
}
