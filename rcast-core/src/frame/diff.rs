//! Bounding-box frame diffing between consecutive captures.
//!
//! Compares two equal-size frames channel-by-channel and produces the
//! smallest rectangle that must be retransmitted, padded by a fixed
//! margin to absorb anti-aliasing artifacts around the true change.
//! One scan routine serves both the box-only and the merged-copy paths
//! so the two cannot drift apart.
//!
//! The scan is the dominant cost centre: a single linear pass over
//! `width * height` pixels with bounds-checked row slices and no
//! per-pixel allocation.

use crate::error::CastError;
use crate::frame::buffer::PixelBuffer;

/// Margin added on all sides of the raw bounding box, in pixels.
///
/// Absorbs sub-pixel rendering and anti-aliasing artifacts adjacent to
/// the detected change. Deliberate design constant, not a tunable.
pub const DIFF_PADDING: u32 = 20;

const BYTES_PER_PIXEL: usize = 4;

// ── DirtyRegion ──────────────────────────────────────────────────

/// The rectangular subset of a frame believed to differ from the
/// previously transmitted frame. Produced fresh each capture cycle and
/// never mutated after creation.
///
/// Invariant: `left + width <= frame.width` and
/// `top + height <= frame.height`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirtyRegion {
    /// Left edge in pixels.
    pub left: u32,
    /// Top edge in pixels.
    pub top: u32,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl DirtyRegion {
    /// The explicit "no change" region.
    pub const EMPTY: Self = Self {
        left: 0,
        top: 0,
        width: 0,
        height: 0,
    };

    /// A region spanning the entire frame.
    pub const fn full_frame(width: u32, height: u32) -> Self {
        Self {
            left: 0,
            top: 0,
            width,
            height,
        }
    }

    /// Whether this region carries no pixels.
    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Whether this region covers the whole of a `width x height` frame.
    pub const fn covers(&self, width: u32, height: u32) -> bool {
        self.left == 0 && self.top == 0 && self.width == width && self.height == height
    }

    /// Exclusive right edge.
    pub const fn right(&self) -> u32 {
        self.left + self.width
    }

    /// Exclusive bottom edge.
    pub const fn bottom(&self) -> u32 {
        self.top + self.height
    }

    /// Region area in pixels.
    pub const fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

// ── Public operations ────────────────────────────────────────────

/// Compute the padded bounding box of all pixels that differ between
/// `current` and `previous`.
///
/// With `full_frame_forced` the full-frame rectangle is returned
/// immediately without touching pixel data (first frame of a session,
/// or after a resolution change). Otherwise both frames must share
/// dimensions and be 32 bpp with alpha; violations are typed errors the
/// caller recovers from by forcing a full-frame retransmit. No
/// detectable change is not an error: it yields [`DirtyRegion::EMPTY`].
pub fn compare(
    current: &PixelBuffer,
    previous: &PixelBuffer,
    full_frame_forced: bool,
) -> Result<DirtyRegion, CastError> {
    if full_frame_forced {
        return Ok(DirtyRegion::full_frame(current.width, current.height));
    }
    check_preconditions(current, previous)?;

    match scan(current, previous, None) {
        Some(bounds) => Ok(pad_and_clamp(bounds, current.width, current.height)),
        None => Ok(DirtyRegion::EMPTY),
    }
}

/// Single-pass variant that also produces the merged delta buffer.
///
/// The merged buffer has the dimensions and layout of `previous`;
/// unchanged pixels keep their prior value, changed pixels are copied
/// from `current`. Full-frame mode returns a direct copy of `current`.
pub fn compare_merged(
    current: &PixelBuffer,
    previous: &PixelBuffer,
    full_frame_forced: bool,
) -> Result<(DirtyRegion, PixelBuffer), CastError> {
    if full_frame_forced {
        return Ok((
            DirtyRegion::full_frame(current.width, current.height),
            current.clone(),
        ));
    }
    check_preconditions(current, previous)?;

    let mut merged = previous.clone();
    match scan(current, previous, Some(&mut merged)) {
        Some(bounds) => Ok((
            pad_and_clamp(bounds, current.width, current.height),
            merged,
        )),
        None => Ok((DirtyRegion::EMPTY, merged)),
    }
}

/// Produce a merged delta buffer for an already-computed `region`.
///
/// Pixels outside the region, and unchanged pixels inside it, keep the
/// value from `previous`; only changed pixels are copied from
/// `current`. A region covering the full frame returns a direct copy
/// of `current`.
pub fn merge_delta(
    current: &PixelBuffer,
    previous: &PixelBuffer,
    region: &DirtyRegion,
) -> Result<PixelBuffer, CastError> {
    if region.covers(current.width, current.height) {
        return Ok(current.clone());
    }
    check_preconditions(current, previous)?;

    let mut merged = previous.clone();
    let right = region.right().min(current.width);
    let bottom = region.bottom().min(current.height);

    for y in region.top..bottom {
        let cur = current.row(y);
        let prev = previous.row(y);
        let merged_offset = merged.row_offset(y);
        for x in region.left..right {
            let o = x as usize * BYTES_PER_PIXEL;
            if cur[o..o + BYTES_PER_PIXEL] != prev[o..o + BYTES_PER_PIXEL] {
                let m = merged_offset + o;
                merged.pixels[m..m + BYTES_PER_PIXEL]
                    .copy_from_slice(&cur[o..o + BYTES_PER_PIXEL]);
            }
        }
    }
    Ok(merged)
}

// ── Internal ─────────────────────────────────────────────────────

/// Inclusive raw bounding box of differing pixels.
#[derive(Debug, Clone, Copy)]
struct RawBounds {
    left: u32,
    top: u32,
    right: u32,
    bottom: u32,
}

fn check_preconditions(current: &PixelBuffer, previous: &PixelBuffer) -> Result<(), CastError> {
    if current.width != previous.width || current.height != previous.height {
        return Err(CastError::DimensionMismatch {
            current_width: current.width,
            current_height: current.height,
            previous_width: previous.width,
            previous_height: previous.height,
        });
    }
    for buf in [current, previous] {
        if !buf.format.has_alpha() || buf.format.bytes_per_pixel() != BYTES_PER_PIXEL {
            return Err(CastError::UnsupportedPixelFormat(buf.format));
        }
        if buf.pixels.len() != buf.byte_len() {
            return Err(CastError::InvalidBufferLength {
                expected: buf.byte_len(),
                actual: buf.pixels.len(),
            });
        }
    }
    Ok(())
}

/// One linear pass over every pixel, comparing all four channels.
///
/// Tracks the min/max row and column where any channel differs and,
/// when `merged` is given, copies each differing pixel from `current`
/// into it. Returns `None` when the frames are identical.
fn scan(
    current: &PixelBuffer,
    previous: &PixelBuffer,
    mut merged: Option<&mut PixelBuffer>,
) -> Option<RawBounds> {
    let mut bounds: Option<RawBounds> = None;

    for y in 0..current.height {
        let cur = current.row(y);
        let prev = previous.row(y);

        // Whole-row slice compare first; most desktop rows are static.
        if cur == prev {
            continue;
        }

        for x in 0..current.width {
            let o = x as usize * BYTES_PER_PIXEL;
            if cur[o..o + BYTES_PER_PIXEL] == prev[o..o + BYTES_PER_PIXEL] {
                continue;
            }

            bounds = Some(match bounds {
                None => RawBounds {
                    left: x,
                    top: y,
                    right: x,
                    bottom: y,
                },
                Some(b) => RawBounds {
                    left: b.left.min(x),
                    top: b.top.min(y),
                    right: b.right.max(x),
                    bottom: b.bottom.max(y),
                },
            });

            if let Some(m) = merged.as_deref_mut() {
                let dst = m.row_offset(y) + o;
                m.pixels[dst..dst + BYTES_PER_PIXEL]
                    .copy_from_slice(&cur[o..o + BYTES_PER_PIXEL]);
            }
        }
    }

    bounds
}

/// Grow the raw box by [`DIFF_PADDING`] on all sides, clamped to the
/// frame bounds.
fn pad_and_clamp(bounds: RawBounds, width: u32, height: u32) -> DirtyRegion {
    let left = bounds.left.saturating_sub(DIFF_PADDING);
    let top = bounds.top.saturating_sub(DIFF_PADDING);
    let right = (bounds.right + 1 + DIFF_PADDING).min(width);
    let bottom = (bounds.bottom + 1 + DIFF_PADDING).min(height);

    DirtyRegion {
        left,
        top,
        width: right - left,
        height: bottom - top,
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::buffer::PixelFormat;

    const BLACK: [u8; 4] = [0, 0, 0, 255];
    const WHITE: [u8; 4] = [255, 255, 255, 255];

    #[test]
    fn identical_buffers_are_empty() {
        let a = PixelBuffer::filled(4, 4, BLACK);
        let b = PixelBuffer::filled(4, 4, BLACK);
        let region = compare(&a, &b, false).unwrap();
        assert!(region.is_empty());
        assert_eq!(region, DirtyRegion::EMPTY);
    }

    #[test]
    fn single_pixel_change_pads_to_full_small_frame() {
        // 4x4 frames, only (2,2) differs. The raw box is (2,2,1,1);
        // the 20 px padding exceeds the frame, so the result clamps
        // to (0,0,4,4).
        let prev = PixelBuffer::filled(4, 4, BLACK);
        let mut cur = prev.clone();
        cur.set_pixel(2, 2, WHITE);

        let region = compare(&cur, &prev, false).unwrap();
        assert_eq!(region, DirtyRegion::full_frame(4, 4));
    }

    #[test]
    fn padded_box_contains_all_differing_pixels() {
        let prev = PixelBuffer::filled(100, 100, BLACK);
        let mut cur = prev.clone();
        cur.set_pixel(30, 40, WHITE);
        cur.set_pixel(60, 50, WHITE);

        let region = compare(&cur, &prev, false).unwrap();
        // Raw box (30,40)..=(60,50), padded by 20 on each side.
        assert_eq!(region.left, 10);
        assert_eq!(region.top, 20);
        assert_eq!(region.right(), 81);
        assert_eq!(region.bottom(), 71);

        // Removing the padding recovers exactly the raw box.
        assert_eq!(region.left + DIFF_PADDING, 30);
        assert_eq!(region.top + DIFF_PADDING, 40);
        assert_eq!(region.right() - DIFF_PADDING - 1, 60);
        assert_eq!(region.bottom() - DIFF_PADDING - 1, 50);
    }

    #[test]
    fn padded_box_clamps_at_frame_edges() {
        let prev = PixelBuffer::filled(64, 64, BLACK);
        let mut cur = prev.clone();
        cur.set_pixel(0, 0, WHITE);
        cur.set_pixel(63, 63, WHITE);

        let region = compare(&cur, &prev, false).unwrap();
        assert_eq!(region, DirtyRegion::full_frame(64, 64));
    }

    #[test]
    fn last_pixel_is_not_skipped() {
        // A change confined to the very last pixel of the frame must
        // still be detected.
        let prev = PixelBuffer::filled(50, 50, BLACK);
        let mut cur = prev.clone();
        cur.set_pixel(49, 49, WHITE);

        let region = compare(&cur, &prev, false).unwrap();
        assert!(!region.is_empty());
        assert_eq!(region.left, 29);
        assert_eq!(region.top, 29);
        assert_eq!(region.right(), 50);
        assert_eq!(region.bottom(), 50);
    }

    #[test]
    fn alpha_only_change_is_detected() {
        let prev = PixelBuffer::filled(50, 50, [10, 20, 30, 255]);
        let mut cur = prev.clone();
        cur.set_pixel(25, 25, [10, 20, 30, 128]);

        let region = compare(&cur, &prev, false).unwrap();
        assert!(!region.is_empty());
    }

    #[test]
    fn dimension_mismatch_is_typed_error() {
        let a = PixelBuffer::filled(4, 4, BLACK);
        let b = PixelBuffer::filled(4, 8, BLACK);
        assert!(matches!(
            compare(&a, &b, false),
            Err(CastError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn rgb_without_alpha_is_rejected() {
        let a = PixelBuffer::filled(4, 4, BLACK);
        let b = PixelBuffer::new(4, 4, 12, PixelFormat::Rgb8, vec![0; 48]).unwrap();
        assert!(matches!(
            compare(&a, &b, false),
            Err(CastError::UnsupportedPixelFormat(PixelFormat::Rgb8))
        ));
    }

    #[test]
    fn forced_full_frame_ignores_pixels() {
        let a = PixelBuffer::filled(8, 8, BLACK);
        let b = PixelBuffer::filled(8, 8, BLACK);
        let region = compare(&a, &b, true).unwrap();
        assert_eq!(region, DirtyRegion::full_frame(8, 8));

        // Even with mismatched dimensions: pixel data is never touched.
        let c = PixelBuffer::filled(2, 2, WHITE);
        assert_eq!(
            compare(&a, &c, true).unwrap(),
            DirtyRegion::full_frame(8, 8)
        );
    }

    #[test]
    fn merge_delta_matches_current_inside_region_previous_outside() {
        let prev = PixelBuffer::filled(100, 100, BLACK);
        let mut cur = prev.clone();
        for y in 40..45 {
            for x in 30..35 {
                cur.set_pixel(x, y, WHITE);
            }
        }

        let region = compare(&cur, &prev, false).unwrap();
        let merged = merge_delta(&cur, &prev, &region).unwrap();

        for y in 0..100 {
            for x in 0..100 {
                let inside = x >= region.left
                    && x < region.right()
                    && y >= region.top
                    && y < region.bottom();
                if inside {
                    assert_eq!(merged.pixel(x, y), cur.pixel(x, y));
                } else {
                    assert_eq!(merged.pixel(x, y), prev.pixel(x, y));
                }
            }
        }
    }

    #[test]
    fn merge_delta_full_frame_copies_current() {
        let prev = PixelBuffer::filled(8, 8, BLACK);
        let cur = PixelBuffer::filled(8, 8, WHITE);
        let merged =
            merge_delta(&cur, &prev, &DirtyRegion::full_frame(8, 8)).unwrap();
        assert_eq!(merged, cur);
    }

    #[test]
    fn compare_merged_is_one_pass_equivalent() {
        let prev = PixelBuffer::filled(100, 100, BLACK);
        let mut cur = prev.clone();
        cur.set_pixel(50, 50, WHITE);

        let region = compare(&cur, &prev, false).unwrap();
        let (merged_region, merged) = compare_merged(&cur, &prev, false).unwrap();
        assert_eq!(region, merged_region);
        assert_eq!(merged, merge_delta(&cur, &prev, &region).unwrap());
    }

    #[test]
    fn compare_merged_no_change_keeps_previous() {
        let prev = PixelBuffer::filled(16, 16, BLACK);
        let cur = prev.clone();
        let (region, merged) = compare_merged(&cur, &prev, false).unwrap();
        assert!(region.is_empty());
        assert_eq!(merged, prev);
    }

    #[test]
    fn bottom_up_strides_compare_in_image_space() {
        let mut top_down = PixelBuffer::filled(4, 4, BLACK);
        top_down.set_pixel(1, 0, WHITE);

        // Same image content stored bottom-up.
        let mut rows: Vec<u8> = Vec::new();
        for y in (0..4).rev() {
            rows.extend_from_slice(top_down.row(y));
        }
        let bottom_up = PixelBuffer::new(4, 4, -16, PixelFormat::Bgra8, rows).unwrap();

        let prev = PixelBuffer::filled(4, 4, BLACK);
        let a = compare(&top_down, &prev, false).unwrap();
        let b = compare(&bottom_up, &prev, false).unwrap();
        assert_eq!(a, b);
        assert!(!a.is_empty());
    }
}
