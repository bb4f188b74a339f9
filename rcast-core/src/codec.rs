//! Framing codec for the session channel.
//!
//! Each wire frame is:
//!
//! ```text
//! magic:       [u8; 4]  = "RCS0"
//! checksum:    u32      (first 4 bytes of blake3(payload), LE)
//! payload_len: u32      (LE)
//! payload:     [u8]     (bincode SessionMessage)
//! ```
//!
//! Integrity failures are hard errors: a corrupted stream cannot be
//! resynchronized, so the channel tears down and the session surfaces
//! a connection failure.

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::CastError;
use crate::message::SessionMessage;

/// Leading magic bytes of every wire frame.
pub const MAGIC: [u8; 4] = *b"RCS0";

/// Fixed header size: magic + checksum + payload length.
pub const HEADER_SIZE: usize = 12;

/// Upper bound on a single message payload. Sized for a worst-case
/// uncompressed 4K full-frame region.
pub const MAX_PAYLOAD_SIZE: usize = 64 * 1024 * 1024;

fn checksum(payload: &[u8]) -> u32 {
    let hash = blake3::hash(payload);
    u32::from_le_bytes(hash.as_bytes()[0..4].try_into().expect("blake3 is 32 bytes"))
}

/// Length-prefixed, checksummed codec over [`SessionMessage`].
#[derive(Debug, Default)]
pub struct CastCodec;

impl Decoder for CastCodec {
    type Item = SessionMessage;
    type Error = CastError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < HEADER_SIZE {
            return Ok(None);
        }
        if src[0..4] != MAGIC {
            return Err(CastError::InvalidMagic);
        }

        let declared =
            u32::from_le_bytes(src[4..8].try_into().expect("sliced 4 bytes"));
        let payload_len =
            u32::from_le_bytes(src[8..12].try_into().expect("sliced 4 bytes")) as usize;
        if payload_len > MAX_PAYLOAD_SIZE {
            return Err(CastError::FrameTooLarge {
                size: payload_len,
                max: MAX_PAYLOAD_SIZE,
            });
        }
        if src.len() < HEADER_SIZE + payload_len {
            src.reserve(HEADER_SIZE + payload_len - src.len());
            return Ok(None);
        }

        src.advance(HEADER_SIZE);
        let payload = src.split_to(payload_len);
        if checksum(&payload) != declared {
            return Err(CastError::ChecksumMismatch);
        }

        SessionMessage::from_bytes(&payload).map(Some)
    }
}

impl Encoder<SessionMessage> for CastCodec {
    type Error = CastError;

    fn encode(&mut self, item: SessionMessage, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let payload = item.to_bytes()?;
        if payload.len() > MAX_PAYLOAD_SIZE {
            return Err(CastError::FrameTooLarge {
                size: payload.len(),
                max: MAX_PAYLOAD_SIZE,
            });
        }

        dst.reserve(HEADER_SIZE + payload.len());
        dst.put_slice(&MAGIC);
        dst.put_u32_le(checksum(&payload));
        dst.put_u32_le(payload.len() as u32);
        dst.put_slice(&payload);
        Ok(())
    }
}

// ── Tests ────────────────────────────────────────────────────────
