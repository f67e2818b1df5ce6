//! `tokio_util::codec` adapter for use over async byte streams.

use bytes::{Buf, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::warn;

use crate::codec::{encode_into, FrameConfig};
use crate::decoder::{FrameDecoder, PushResult};
use crate::error::{FrameError, Result};

/// Frames payloads for `FramedRead`/`FramedWrite`.
///
/// Decoding yields checksum-valid payloads; dropped frames are logged and
/// skipped, matching [`FrameReader::read_frame`](crate::FrameReader::read_frame).
#[derive(Debug, Default)]
pub struct SpiFrameCodec {
    decoder: FrameDecoder,
}

impl SpiFrameCodec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: FrameConfig) -> Self {
        Self {
            decoder: FrameDecoder::with_config(config),
        }
    }

    /// The decoder state, including outcome counters.
    pub fn decoder(&self) -> &FrameDecoder {
        &self.decoder
    }
}

impl Decoder for SpiFrameCodec {
    type Item = Bytes;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Bytes>> {
        while src.has_remaining() {
            match self.decoder.push(src.get_u8()) {
                PushResult::Continue => {}
                PushResult::FrameReady(payload) => return Ok(Some(payload)),
                PushResult::FrameDropped(reason) => warn!(%reason, "skipping dropped frame"),
            }
        }
        Ok(None)
    }
}

impl Encoder<&[u8]> for SpiFrameCodec {
    type Error = FrameError;

    fn encode(&mut self, payload: &[u8], dst: &mut BytesMut) -> Result<()> {
        encode_into(payload, &self.decoder.config().params, dst)?;
        Ok(())
    }
}

impl Encoder<Bytes> for SpiFrameCodec {
    type Error = FrameError;

    fn encode(&mut self, payload: Bytes, dst: &mut BytesMut) -> Result<()> {
        Encoder::<&[u8]>::encode(self, payload.as_ref(), dst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_then_decode() {
        let mut codec = SpiFrameCodec::new();
        let mut buf = BytesMut::new();
        Encoder::<&[u8]>::encode(&mut codec, b"first", &mut buf).unwrap();
        Encoder::<Bytes>::encode(&mut codec, Bytes::from_static(b"second"), &mut buf).unwrap();

        assert_eq!(codec.decode(&mut buf).unwrap().as_deref(), Some(&b"first"[..]));
        assert_eq!(codec.decode(&mut buf).unwrap().as_deref(), Some(&b"second"[..]));
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
        assert!(buf.is_empty());
    }

    #[test]
    fn partial_frame_kept_across_calls() {
        let mut codec = SpiFrameCodec::new();
        let mut wire = BytesMut::new();
        Encoder::<&[u8]>::encode(&mut codec, b"split", &mut wire).unwrap();
        let tail = wire.split_off(3);

        assert_eq!(codec.decode(&mut wire).unwrap(), None);
        assert!(codec.decoder().is_in_frame());

        let mut rest = tail;
        assert_eq!(codec.decode(&mut rest).unwrap().as_deref(), Some(&b"split"[..]));
    }

    #[test]
    fn dropped_frames_skipped() {
        let mut codec = SpiFrameCodec::new();
        let mut buf = BytesMut::from(&[0x7E, 0x01, 0x7F][..]);
        Encoder::<&[u8]>::encode(&mut codec, b"ok", &mut buf).unwrap();

        assert_eq!(codec.decode(&mut buf).unwrap().as_deref(), Some(&b"ok"[..]));
        assert_eq!(codec.decoder().stats().too_short_for_crc, 1);
    }
}
