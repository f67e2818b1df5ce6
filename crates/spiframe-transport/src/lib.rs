//! Full-duplex transport abstraction for spiframe.
//!
//! Provides the byte-moving layer the framing core sits on:
//! - [`FullDuplex`], the one capability the rest of the stack needs
//! - [`SpiDevice`], a Linux `spidev` binding (Linux only)
//! - [`Loopback`], an in-memory MOSI-to-MISO jumper for tests and dry runs
//!
//! [`DuplexStream`] turns any [`FullDuplex`] into `std::io::Read + Write` so
//! higher layers can treat an SPI bus like any other byte stream.

pub mod config;
pub mod error;
pub mod loopback;
pub mod traits;

#[cfg(target_os = "linux")]
pub mod spidev;

pub use config::{SpiConfig, SpiMode};
pub use error::{Result, TransportError};
pub use loopback::Loopback;
pub use traits::{DuplexStream, FullDuplex};

#[cfg(target_os = "linux")]
pub use spidev::{Segment, SpiDevice};
