//! Raw pixel buffer model shared by the diff engine and the encoder.
//!
//! A [`PixelBuffer`] is the internal, uncompressed representation of one
//! captured frame. It is exclusively owned by whichever pipeline stage
//! currently holds it: capture source, then diff input, then discarded
//! after encode.

use crate::error::CastError;

// ── PixelFormat ──────────────────────────────────────────────────

/// Pixel layout for raw captured frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// 4 bytes per pixel: Blue, Green, Red, Alpha (GDI/DXGI default).
    Bgra8,
    /// 4 bytes per pixel: Red, Green, Blue, Alpha.
    Rgba8,
    /// 3 bytes per pixel: Red, Green, Blue. No alpha — rejected by the
    /// diff engine.
    Rgb8,
}

impl PixelFormat {
    /// Bytes consumed by a single pixel in this format.
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Bgra8 | PixelFormat::Rgba8 => 4,
            PixelFormat::Rgb8 => 3,
        }
    }

    /// Whether the format is 32 bpp with a (non-premultiplied) alpha
    /// channel, as the diff engine requires.
    pub const fn has_alpha(self) -> bool {
        matches!(self, PixelFormat::Bgra8 | PixelFormat::Rgba8)
    }
}

// ── PixelBuffer ──────────────────────────────────────────────────

/// A raw, uncompressed screen frame.
///
/// The `pixels` buffer holds `height` rows of `|stride|` bytes each.
/// `stride` is signed: a negative value means the rows are stored
/// bottom-up (row 0 of the image is the *last* row in memory), as GDI
/// device-independent bitmaps are. `|stride|` may exceed
/// `width * bytes_per_pixel` due to row-alignment padding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Signed row pitch in bytes.
    pub stride: i32,
    /// Pixel layout.
    pub format: PixelFormat,
    /// Raw pixel data — `|stride| * height` bytes.
    pub pixels: Vec<u8>,
}

impl PixelBuffer {
    /// Construct a buffer, validating the `pixels.len() == |stride| * height`
    /// invariant.
    pub fn new(
        width: u32,
        height: u32,
        stride: i32,
        format: PixelFormat,
        pixels: Vec<u8>,
    ) -> Result<Self, CastError> {
        let expected = stride.unsigned_abs() as usize * height as usize;
        if pixels.len() != expected {
            return Err(CastError::InvalidBufferLength {
                expected,
                actual: pixels.len(),
            });
        }
        Ok(Self {
            width,
            height,
            stride,
            format,
            pixels,
        })
    }

    /// A tightly packed top-down BGRA buffer filled with `fill`.
    pub fn filled(width: u32, height: u32, fill: [u8; 4]) -> Self {
        let mut pixels = Vec::with_capacity(width as usize * height as usize * 4);
        for _ in 0..width as usize * height as usize {
            pixels.extend_from_slice(&fill);
        }
        Self {
            width,
            height,
            stride: (width * 4) as i32,
            format: PixelFormat::Bgra8,
            pixels,
        }
    }

    /// Unsigned row pitch in bytes.
    pub fn pitch(&self) -> usize {
        self.stride.unsigned_abs() as usize
    }

    /// Byte offset of image row `y`, honouring bottom-up storage for
    /// negative strides.
    pub fn row_offset(&self, y: u32) -> usize {
        let row = if self.stride < 0 {
            (self.height - 1 - y) as usize
        } else {
            y as usize
        };
        row * self.pitch()
    }

    /// The visible bytes of image row `y` (padding excluded).
    pub fn row(&self, y: u32) -> &[u8] {
        let start = self.row_offset(y);
        let len = self.width as usize * self.format.bytes_per_pixel();
        &self.pixels[start..start + len]
    }

    /// Mutable visible bytes of image row `y`.
    pub fn row_mut(&mut self, y: u32) -> &mut [u8] {
        let start = self.row_offset(y);
        let len = self.width as usize * self.format.bytes_per_pixel();
        &mut self.pixels[start..start + len]
    }

    /// The pixel bytes at `(x, y)`.
    ///
    /// # Panics
    ///
    /// Panics if `(x, y)` is out of bounds.
    pub fn pixel(&self, x: u32, y: u32) -> &[u8] {
        let bpp = self.format.bytes_per_pixel();
        let offset = self.row_offset(y) + x as usize * bpp;
        &self.pixels[offset..offset + bpp]
    }

    /// Set the pixel bytes at `(x, y)` (test/helper convenience).
    pub fn set_pixel(&mut self, x: u32, y: u32, value: [u8; 4]) {
        let bpp = self.format.bytes_per_pixel();
        let offset = self.row_offset(y) + x as usize * bpp;
        self.pixels[offset..offset + bpp].copy_from_slice(&value[..bpp]);
    }

    /// Total byte size the raw bitmap occupies.
    pub fn byte_len(&self) -> usize {
        self.pitch() * self.height as usize
    }
}

// ── Tests ────────────────────────────────────────────────────────
