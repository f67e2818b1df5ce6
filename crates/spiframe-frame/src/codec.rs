use std::ops::Deref;

use bytes::{BufMut, Bytes, BytesMut};

use crate::crc::crc16_ccitt;
use crate::error::EncodeError;

/// Default start-of-frame sentinel.
pub const DEFAULT_START_BYTE: u8 = 0x7E;

/// Default end-of-frame sentinel.
pub const DEFAULT_STOP_BYTE: u8 = 0x7F;

/// Default escape sentinel.
pub const DEFAULT_ESCAPE_BYTE: u8 = 0x7D;

/// Value XORed into an escaped byte.
pub const ESCAPE_XOR: u8 = 0x20;

/// Length of the trailing checksum in bytes.
pub const CRC_LEN: usize = 2;

/// Default cap on de-stuffed bytes buffered for one frame.
pub const DEFAULT_MAX_FRAME_BYTES: usize = 2048;

/// Default number of raw bytes a reader pulls from its stream at once.
pub const DEFAULT_READ_CHUNK_SIZE: usize = 256;

/// Sentinel bytes and checksum policy of a link.
///
/// The three sentinels are always pairwise distinct: the only way to build a
/// value is [`FramingParameters::new`] (or `Default`), which checks that.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FramingParameters {
    start_byte: u8,
    stop_byte: u8,
    escape_byte: u8,
    crc_enabled: bool,
}

impl FramingParameters {
    /// Validate and build a parameter set.
    pub fn new(
        start_byte: u8,
        stop_byte: u8,
        escape_byte: u8,
        crc_enabled: bool,
    ) -> Result<Self, EncodeError> {
        let params = Self {
            start_byte,
            stop_byte,
            escape_byte,
            crc_enabled,
        };
        params.validate()?;
        Ok(params)
    }

    /// Check the sentinel invariant.
    pub fn validate(&self) -> Result<(), EncodeError> {
        if self.start_byte == self.stop_byte {
            return Err(EncodeError::InvalidStartStop);
        }
        if self.escape_byte == self.start_byte || self.escape_byte == self.stop_byte {
            return Err(EncodeError::InvalidEscape);
        }
        Ok(())
    }

    /// Same sentinels with the checksum switched on or off.
    pub fn with_crc(self, crc_enabled: bool) -> Self {
        Self {
            crc_enabled,
            ..self
        }
    }

    pub fn start_byte(&self) -> u8 {
        self.start_byte
    }

    pub fn stop_byte(&self) -> u8 {
        self.stop_byte
    }

    pub fn escape_byte(&self) -> u8 {
        self.escape_byte
    }

    pub fn crc_enabled(&self) -> bool {
        self.crc_enabled
    }

    /// Whether `byte` must be escaped on the wire.
    pub fn is_sentinel(&self, byte: u8) -> bool {
        byte == self.start_byte || byte == self.stop_byte || byte == self.escape_byte
    }

    pub(crate) fn trailer_len(&self) -> usize {
        if self.crc_enabled {
            CRC_LEN
        } else {
            0
        }
    }
}

impl Default for FramingParameters {
    fn default() -> Self {
        Self {
            start_byte: DEFAULT_START_BYTE,
            stop_byte: DEFAULT_STOP_BYTE,
            escape_byte: DEFAULT_ESCAPE_BYTE,
            crc_enabled: true,
        }
    }
}

/// Configuration shared by decoders, readers and writers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameConfig {
    /// Sentinels and checksum policy.
    pub params: FramingParameters,
    /// Cap on de-stuffed bytes (checksum included) buffered for one frame.
    /// Zero disables the cap. Default: 2048.
    pub max_frame_bytes: usize,
    /// Raw bytes a [`FrameReader`](crate::FrameReader) requests per read. Default: 256.
    pub read_chunk_size: usize,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            params: FramingParameters::default(),
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
            read_chunk_size: DEFAULT_READ_CHUNK_SIZE,
        }
    }
}

/// A complete wire frame: start, stuffed body, stop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedFrame(Bytes);

impl EncodedFrame {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Bytes {
        self.0
    }
}

impl Deref for EncodedFrame {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.0
    }
}

impl AsRef<[u8]> for EncodedFrame {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Worst-case wire size of a payload: every byte escaped, plus both sentinels.
pub fn max_encoded_len(payload_len: usize, crc_enabled: bool) -> usize {
    let body = payload_len + if crc_enabled { CRC_LEN } else { 0 };
    2 + 2 * body
}

/// Encode a payload into a new frame.
///
/// Wire format:
/// ```text
/// ┌───────┬──────────────────────────────────────┬──────┐
/// │ START │ stuffed(payload ‖ CRC16 big-endian)  │ STOP │
/// └───────┴──────────────────────────────────────┴──────┘
/// stuffed: b ∈ {START, STOP, ESC}  →  ESC, b ^ 0x20
/// ```
///
/// The checksum covers the unescaped payload and is itself stuffed.
pub fn encode(payload: &[u8], params: &FramingParameters) -> Result<EncodedFrame, EncodeError> {
    let mut dst = BytesMut::new();
    encode_into(payload, params, &mut dst)?;
    Ok(EncodedFrame(dst.freeze()))
}

/// Encode a payload, appending the frame to `dst`.
///
/// Nothing is written if the parameters are invalid.
pub fn encode_into(
    payload: &[u8],
    params: &FramingParameters,
    dst: &mut BytesMut,
) -> Result<(), EncodeError> {
    params.validate()?;

    // Typical payloads escape little; reserve for that and let BytesMut grow.
    dst.reserve(payload.len() + params.trailer_len() + 4);
    dst.put_u8(params.start_byte);
    for &byte in payload {
        put_escaped(dst, byte, params);
    }
    if params.crc_enabled {
        for byte in crc16_ccitt(payload).to_be_bytes() {
            put_escaped(dst, byte, params);
        }
    }
    dst.put_u8(params.stop_byte);
    Ok(())
}

pub(crate) fn put_escaped(dst: &mut BytesMut, byte: u8, params: &FramingParameters) {
    if params.is_sentinel(byte) {
        dst.put_u8(params.escape_byte);
        dst.put_u8(byte ^ ESCAPE_XOR);
    } else {
        dst.put_u8(byte);
    }
}
