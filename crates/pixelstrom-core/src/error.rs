//! Shared error type across pixelstrom crates.

use thiserror::Error;

use crate::protocol::paint::PAINT_RECORD_LEN;

/// Stable error codes (used in logs and metric labels).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Unknown discriminant, broken protobuf, or bad transport frame.
    Malformed,
    /// Snapshot declared a zero width or height.
    BadDimensions,
    /// Snapshot pixel payload does not match its dimensions.
    SizeMismatch,
    /// Paint batch length is not a multiple of the record size.
    Truncated,
    /// Store refused a snapshot with a zero dimension.
    InvalidDimensions,
    /// Store refused a snapshot whose buffer length is inconsistent.
    PixelLengthMismatch,
    /// Transport-level failure.
    Channel,
    /// Invalid configuration.
    Config,
    /// Internal error (invalid state transition, task failure).
    Internal,
}

impl ErrorCode {
    /// String representation used in logs and metric labels.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::Malformed => "MALFORMED",
            ErrorCode::BadDimensions => "BAD_DIMENSIONS",
            ErrorCode::SizeMismatch => "SIZE_MISMATCH",
            ErrorCode::Truncated => "TRUNCATED",
            ErrorCode::InvalidDimensions => "INVALID_DIMENSIONS",
            ErrorCode::PixelLengthMismatch => "PIXEL_LENGTH_MISMATCH",
            ErrorCode::Channel => "CHANNEL",
            ErrorCode::Config => "CONFIG",
            ErrorCode::Internal => "INTERNAL",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, ViewerError>;

/// Unified error type used by core and viewer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ViewerError {
    #[error("malformed message: {0}")]
    Malformed(String),
    #[error("bad snapshot dimensions {width}x{height}")]
    BadDimensions { width: u32, height: u32 },
    #[error("snapshot {width}x{height} carries {actual} pixel bytes")]
    SizeMismatch { width: u32, height: u32, actual: usize },
    #[error("paint batch of {len} bytes is not a multiple of {}", PAINT_RECORD_LEN)]
    Truncated { len: usize },
    #[error("invalid framebuffer dimensions {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },
    #[error("framebuffer {width}x{height} cannot hold {actual} pixel bytes")]
    PixelLengthMismatch { width: u32, height: u32, actual: usize },
    #[error("channel: {0}")]
    Channel(String),
    #[error("config: {0}")]
    Config(String),
    #[error("internal: {0}")]
    Internal(String),
}

impl ViewerError {
    /// Map to a stable code.
    pub fn code(&self) -> ErrorCode {
        match self {
            ViewerError::Malformed(_) => ErrorCode::Malformed,
            ViewerError::BadDimensions { .. } => ErrorCode::BadDimensions,
            ViewerError::SizeMismatch { .. } => ErrorCode::SizeMismatch,
            ViewerError::Truncated { .. } => ErrorCode::Truncated,
            ViewerError::InvalidDimensions { .. } => ErrorCode::InvalidDimensions,
            ViewerError::PixelLengthMismatch { .. } => ErrorCode::PixelLengthMismatch,
            ViewerError::Channel(_) => ErrorCode::Channel,
            ViewerError::Config(_) => ErrorCode::Config,
            ViewerError::Internal(_) => ErrorCode::Internal,
        }
    }

    /// Per-message decode failure: the message is dropped, the session goes on.
    pub fn is_decode(&self) -> bool {
        matches!(
            self.code(),
            ErrorCode::Malformed
                | ErrorCode::BadDimensions
                | ErrorCode::SizeMismatch
                | ErrorCode::Truncated
        )
    }

    /// Store rejected a snapshot and kept the previous framebuffer.
    pub fn is_store(&self) -> bool {
        matches!(
            self.code(),
            ErrorCode::InvalidDimensions | ErrorCode::PixelLengthMismatch
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_classify_errors() {
        let e = ViewerError::Truncated { len: 7 };
        assert_eq!(e.code().as_str(), "TRUNCATED");
        assert!(e.is_decode());
        assert!(!e.is_store());

        let e = ViewerError::InvalidDimensions { width: 0, height: 3 };
        assert!(e.is_store());
        assert!(!e.is_decode());

        assert!(!ViewerError::Channel("reset".into()).is_decode());
    }

    #[test]
    fn truncated_message_names_record_size() {
        let e = ViewerError::Truncated { len: 9 };
        assert_eq!(e.to_string(), "paint batch of 9 bytes is not a multiple of 8");
    }
}
