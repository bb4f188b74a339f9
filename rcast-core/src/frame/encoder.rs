//! Region encoder with zstd compression.
//!
//! Serializes the cropped dirty-region sub-rectangle of a frame —
//! never the whole frame — into a compressed payload. The quality knob
//! (0..=100) maps monotonically onto the compression level: 0 is
//! maximum compression, 100 is the fastest, highest-fidelity setting.
//! Codec internals beyond that knob are outside this crate's contract.

use std::time::Instant;

use crate::error::CastError;
use crate::frame::buffer::PixelBuffer;
use crate::frame::diff::DirtyRegion;

const BYTES_PER_PIXEL: usize = 4;

// ── EncodedFrame ─────────────────────────────────────────────────

/// A compressed dirty region ready for transmission.
///
/// Created by [`FrameEncoder`], consumed immediately by the transport
/// send, then discarded.
#[derive(Debug, Clone)]
pub struct EncodedFrame {
    /// The region of the frame this payload covers.
    pub region: DirtyRegion,
    /// Compressed pixel payload (zstd over tightly packed rows).
    pub payload: Vec<u8>,
    /// Monotonic capture timestamp of the source frame.
    pub captured_at: Instant,
}

// ── FrameEncoder ─────────────────────────────────────────────────

/// Stateful encoder; tracks how many frames it has produced.
pub struct FrameEncoder {
    frame_count: u64,
}

impl FrameEncoder {
    pub fn new() -> Self {
        Self { frame_count: 0 }
    }

    /// Number of frames encoded so far.
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Compress the `region` sub-rectangle of `buffer` at `quality`.
    ///
    /// Fails with [`CastError::EncodingFailure`] if the region is
    /// degenerate or exceeds the frame; callers treat that as "nothing
    /// to send", not an error to surface.
    pub fn encode(
        &mut self,
        buffer: &PixelBuffer,
        region: &DirtyRegion,
        quality: u8,
    ) -> Result<Vec<u8>, CastError> {
        if region.is_empty() {
            return Err(CastError::EncodingFailure(
                "degenerate region: zero width or height".into(),
            ));
        }
        if region.right() > buffer.width || region.bottom() > buffer.height {
            return Err(CastError::EncodingFailure(format!(
                "region {}x{}+{}+{} exceeds {}x{} frame",
                region.width, region.height, region.left, region.top, buffer.width, buffer.height,
            )));
        }
        if buffer.pixels.len() != buffer.byte_len() {
            return Err(CastError::EncodingFailure(
                "pixel buffer length does not match its stride".into(),
            ));
        }

        // Crop the region rows into a tightly packed scratch buffer.
        let row_bytes = region.width as usize * BYTES_PER_PIXEL;
        let mut raw = Vec::with_capacity(row_bytes * region.height as usize);
        let left = region.left as usize * BYTES_PER_PIXEL;
        for y in region.top..region.bottom() {
            let row = buffer.row(y);
            raw.extend_from_slice(&row[left..left + row_bytes]);
        }

        let compressed = zstd::encode_all(raw.as_slice(), compression_level(quality))
            .map_err(|e| CastError::EncodingFailure(format!("zstd encode failed: {e}")))?;

        self.frame_count += 1;
        Ok(compressed)
    }
}

impl Default for FrameEncoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Map the 0..=100 quality knob onto a zstd level.
///
/// Monotonic: quality 0 → level 19 (max compression), quality 100 →
/// level 1 (fastest, highest throughput).
pub fn compression_level(quality: u8) -> i32 {
    let q = quality.min(100) as i32;
    19 - q * 18 / 100
}

/// Decompress a region payload back into tightly packed rows of
/// `region.width * 4` bytes.
///
/// The read is bounded by the region's pixel count: a payload claiming
/// to expand past it is rejected at the first excess byte, so a corrupt
/// or hostile peer cannot force an oversized allocation.
pub fn decode(payload: &[u8], region: &DirtyRegion) -> Result<Vec<u8>, CastError> {
    use std::io::Read;

    let expected = region.area() as usize * BYTES_PER_PIXEL;
    let decoder = zstd::stream::read::Decoder::new(payload)
        .map_err(|e| CastError::EncodingFailure(format!("zstd decode failed: {e}")))?;

    let mut raw = Vec::with_capacity(expected);
    decoder
        .take(expected as u64 + 1)
        .read_to_end(&mut raw)
        .map_err(|e| CastError::EncodingFailure(format!("zstd decode failed: {e}")))?;
    if raw.len() != expected {
        return Err(CastError::EncodingFailure(format!(
            "decoded {} bytes or more, region expects {expected}",
            raw.len(),
        )));
    }
    Ok(raw)
}

// ── Tests ────────────────────────────────────────────────────────
