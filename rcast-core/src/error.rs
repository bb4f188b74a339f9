//! Domain-specific error types for the rcast core.
//!
//! All fallible operations return `Result<T, CastError>`.
//! No panics on invalid input — every error is typed and recoverable.
//! Diff-precondition errors (`DimensionMismatch`, `UnsupportedPixelFormat`)
//! are recovered locally by forcing a full-frame retransmit and must never
//! surface to the user.

use thiserror::Error;

use crate::frame::buffer::PixelFormat;

/// The canonical error type for the rcast core.
#[derive(Debug, Error)]
pub enum CastError {
    // ── Diff preconditions ───────────────────────────────────────
    /// The two frames being compared do not share the same dimensions.
    #[error("frames are not of equal dimensions: {current_width}x{current_height} vs {previous_width}x{previous_height}")]
    DimensionMismatch {
        current_width: u32,
        current_height: u32,
        previous_width: u32,
        previous_height: u32,
    },

    /// The diff engine requires 32 bits per pixel with an alpha channel.
    #[error("unsupported pixel format {0:?}: frames must be 32 bpp with alpha")]
    UnsupportedPixelFormat(PixelFormat),

    /// A buffer's byte length does not match `|stride| * height`.
    #[error("pixel buffer length {actual} does not match |stride| * height = {expected}")]
    InvalidBufferLength { expected: usize, actual: usize },

    // ── Encoding ─────────────────────────────────────────────────
    /// The region to encode is degenerate or compression failed.
    /// Callers treat a degenerate region as "nothing to send".
    #[error("encoding failure: {0}")]
    EncodingFailure(String),

    // ── Channel / transport ──────────────────────────────────────
    /// The TCP/IO layer reported an error.
    #[error("channel failure: {0}")]
    Connection(#[from] std::io::Error),

    /// An mpsc channel was closed unexpectedly.
    #[error("channel closed")]
    ChannelClosed,

    /// Received bytes that do not start with the rcast magic sequence.
    #[error("invalid magic bytes: expected RCS0")]
    InvalidMagic,

    /// The message payload failed checksum verification.
    #[error("checksum mismatch")]
    ChecksumMismatch,

    /// A wire frame exceeded the codec limit.
    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: usize, max: usize },

    /// Encoding or decoding of a message payload failed.
    #[error("encoding error: {0}")]
    Encoding(String),

    // ── Session ──────────────────────────────────────────────────
    /// The requested session id is unknown to the host.
    #[error("session id not found")]
    SessionNotFound,

    /// The host denied the screen-cast request.
    #[error("connection denied by host")]
    ConnectionDenied,

    /// A session state transition was requested from the wrong state.
    #[error("invalid session transition: {0}")]
    InvalidTransition(&'static str),
}

// ── Convenient From implementations ──────────────────────────────

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for CastError {
    fn from(_: tokio::sync::mpsc::error::SendError<T>) -> Self {
        CastError::ChannelClosed
    }
}

impl From<Box<bincode::ErrorKind>> for CastError {
    fn from(e: Box<bincode::ErrorKind>) -> Self {
        CastError::Encoding(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        let e = CastError::DimensionMismatch {
            current_width: 1920,
            current_height: 1080,
            previous_width: 1280,
            previous_height: 720,
        };
        assert!(e.to_string().contains("1920x1080"));
        assert!(e.to_string().contains("1280x720"));

        let e = CastError::FrameTooLarge {
            size: 1000,
            max: 500,
        };
        assert!(e.to_string().contains("1000"));
        assert!(e.to_string().contains("500"));
    }

    #[test]
    fn from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe broke");
        let e: CastError = io_err.into();
        assert!(matches!(e, CastError::Connection(_)));
    }

    #[test]
    fn from_mpsc_send() {
        let (tx, rx) = tokio::sync::mpsc::channel::<u8>(1);
        drop(rx);
        let send_err = tx.try_send(1).unwrap_err();
        if let tokio::sync::mpsc::error::TrySendError::Closed(_) = send_err {
            let e: CastError = tokio::sync::mpsc::error::SendError(1u8).into();
            assert!(matches!(e, CastError::ChannelClosed));
        }
    }
}
