//! The frame pipeline: pixel buffers, diffing, encoding, and the
//! per-session capture loop.

pub mod buffer;
pub mod capture;
pub mod diff;
pub mod encoder;
pub mod quality;

pub use buffer::{PixelBuffer, PixelFormat};
pub use capture::CaptureLoop;
pub use diff::{DIFF_PADDING, DirtyRegion, compare, compare_merged, merge_delta};
pub use encoder::{EncodedFrame, FrameEncoder, decode};
pub use quality::{LatencyController, MAX_QUALITY_LEVEL};
