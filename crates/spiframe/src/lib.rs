//! Byte-stuffed, CRC-protected framing over SPI and other byte-serial links.
//!
//! # Crate Structure
//!
//! - [`transport`]: Full-duplex transport abstraction (Linux spidev, loopback)
//! - [`frame`]: Link-layer encoder, incremental decoder, stream reader/writer

/// Re-export transport types.
pub mod transport {
    pub use spiframe_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use spiframe_frame::*;
}
