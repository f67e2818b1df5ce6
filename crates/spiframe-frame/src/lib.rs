//! Byte-stuffed link-layer framing for byte-serial transports.
//!
//! Every payload travels as:
//! - a start byte (default `0x7E`)
//! - the payload, followed by an optional big-endian CRC16-CCITT, with any
//!   sentinel byte replaced by `escape, byte ^ 0x20`
//! - a stop byte (default `0x7F`)
//!
//! [`encode`] is a pure function. [`FrameDecoder`] is a byte-at-a-time state
//! machine that tolerates garbage, truncation and oversized frames, and is
//! ready for the next frame after every outcome. [`FrameReader`] and
//! [`FrameWriter`] drive them over any `Read`/`Write`.

pub mod codec;
pub mod crc;
pub mod decoder;
pub mod error;
pub mod reader;
pub mod writer;

#[cfg(feature = "async")]
pub mod async_codec;

pub use codec::{
    encode, encode_into, max_encoded_len, EncodedFrame, FrameConfig, FramingParameters,
    CRC_LEN, DEFAULT_ESCAPE_BYTE, DEFAULT_MAX_FRAME_BYTES, DEFAULT_START_BYTE, DEFAULT_STOP_BYTE,
    ESCAPE_XOR,
};
pub use crc::crc16_ccitt;
pub use decoder::{DecoderStats, DropReason, FrameDecoder, PushResult};
pub use error::{EncodeError, FrameError, Result};
pub use reader::{FrameEvent, FrameReader};
pub use writer::FrameWriter;

#[cfg(feature = "async")]
pub use async_codec::SpiFrameCodec;
