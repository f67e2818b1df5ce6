/// Invalid framing parameters.
///
/// These describe static misconfiguration and never depend on payload content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum EncodeError {
    /// Start and stop bytes are identical.
    #[error("start and stop bytes must differ")]
    InvalidStartStop,

    /// The escape byte collides with the start or stop byte.
    #[error("escape byte must differ from start and stop bytes")]
    InvalidEscape,
}

/// Errors that can occur while reading or writing frames over a stream.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The framing parameters are invalid.
    #[error("invalid framing parameters: {0}")]
    Encode(#[from] EncodeError),

    /// The payload would not fit under the receiver's frame cap.
    #[error("payload too large ({size} bytes with checksum, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stream ended (or stopped accepting bytes) mid-exchange.
    #[error("connection closed")]
    ConnectionClosed,
}

pub type Result<T> = std::result::Result<T, FrameError>;
