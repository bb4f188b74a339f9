//! Collaborator seams for the OS-specific ends of the pipeline.
//!
//! Screen sampling and input injection are platform concerns consumed
//! through these traits; the session drivers never touch an OS API
//! directly.

use async_trait::async_trait;

use crate::error::CastError;
use crate::frame::buffer::PixelBuffer;
use crate::message::{CursorInfo, InputEvent};

/// Yields raw frames of the currently selected screen on demand.
#[async_trait]
pub trait CaptureSource: Send {
    /// Available screens: `(primary_index, count)`.
    fn screen_layout(&self) -> (u32, u32);

    /// Dimensions of the currently selected screen.
    fn screen_size(&self) -> (u32, u32);

    /// Switch capture to screen `index`; returns its dimensions.
    fn select_screen(&mut self, index: u32) -> Result<(u32, u32), CastError>;

    /// Capture the next frame of the selected screen.
    async fn next_frame(&mut self) -> Result<PixelBuffer, CastError>;

    /// Cursor update since the last poll, if the shape changed.
    fn poll_cursor(&mut self) -> Option<CursorInfo> {
        None
    }
}

/// Replays viewer input into the host OS input stream.
#[async_trait]
pub trait InputSink: Send {
    async fn inject(&mut self, event: InputEvent) -> Result<(), CastError>;
}
