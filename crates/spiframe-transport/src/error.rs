use std::path::PathBuf;

/// Errors that can occur in transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to open the device node.
    #[error("failed to open SPI device {path}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to apply a device setting.
    #[error("failed to set {setting}: {source}")]
    Configure {
        setting: &'static str,
        source: std::io::Error,
    },

    /// The transfer ioctl failed.
    #[error("SPI transfer failed: {0}")]
    Transfer(#[from] std::io::Error),

    /// Transmit and receive buffers of a full-duplex exchange differ in length.
    #[error("full-duplex length mismatch (tx {tx} bytes, rx {rx} bytes)")]
    LengthMismatch { tx: usize, rx: usize },

    /// A transfer segment was rejected before reaching the kernel.
    #[error("invalid transfer segment {index}: {reason}")]
    InvalidSegment { index: usize, reason: &'static str },

    /// The request cannot be expressed by this transport.
    #[error("unsupported: {0}")]
    Unsupported(&'static str),
}

/// The `TransportError` stays reachable through `io::Error::get_ref`, so
/// callers above a `Read`/`Write` adapter can still tell a bus fault apart.
impl From<TransportError> for std::io::Error {
    fn from(err: TransportError) -> Self {
        let kind = match &err {
            TransportError::Open { source, .. }
            | TransportError::Configure { source, .. }
            | TransportError::Transfer(source) => source.kind(),
            _ => std::io::ErrorKind::InvalidInput,
        };
        std::io::Error::new(kind, err)
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;
