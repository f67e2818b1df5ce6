use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};
use tracing::{debug, trace};

use crate::codec::{FrameConfig, CRC_LEN, ESCAPE_XOR};
use crate::crc::crc16_ccitt;

/// Why an in-progress frame was discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DropReason {
    /// CRC is enabled but fewer than two bytes arrived before the stop byte.
    TooShortForCrc,
    /// The trailing checksum does not match the payload.
    CrcMismatch,
    /// The frame grew past `max_frame_bytes`.
    FrameTooLarge,
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DropReason::TooShortForCrc => "too short for crc",
            DropReason::CrcMismatch => "crc mismatch",
            DropReason::FrameTooLarge => "frame too large",
        })
    }
}

/// Outcome of feeding one byte to a [`FrameDecoder`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub enum PushResult {
    /// No frame completed on this byte.
    Continue,
    /// A complete frame arrived; the payload excludes the checksum.
    FrameReady(Bytes),
    /// The in-progress frame was discarded. The decoder is back to idle.
    FrameDropped(DropReason),
}

/// Running counts of decoder outcomes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecoderStats {
    pub frames_ready: u64,
    pub too_short_for_crc: u64,
    pub crc_mismatch: u64,
    pub frame_too_large: u64,
    /// Start bytes that arrived while a frame was already open.
    pub resyncs: u64,
}

impl DecoderStats {
    /// Total frames dropped for any reason.
    pub fn dropped(&self) -> u64 {
        self.too_short_for_crc + self.crc_mismatch + self.frame_too_large
    }

    fn record_drop(&mut self, reason: DropReason) {
        match reason {
            DropReason::TooShortForCrc => self.too_short_for_crc += 1,
            DropReason::CrcMismatch => self.crc_mismatch += 1,
            DropReason::FrameTooLarge => self.frame_too_large += 1,
        }
    }
}

/// Incremental frame decoder for one channel.
///
/// Bytes are pushed one at a time in arrival order; chunking does not
/// matter. Outside a frame everything but the start byte is ignored, and a
/// start byte always opens a fresh frame, so the decoder resynchronises on
/// its own after noise or truncation. Every terminal outcome leaves it idle
/// with an empty buffer.
#[derive(Debug)]
pub struct FrameDecoder {
    config: FrameConfig,
    in_frame: bool,
    escape_pending: bool,
    buf: BytesMut,
    stats: DecoderStats,
}

impl FrameDecoder {
    /// Decoder with default parameters and a 2048-byte cap.
    pub fn new() -> Self {
        Self::with_config(FrameConfig::default())
    }

    /// Decoder with explicit configuration.
    pub fn with_config(config: FrameConfig) -> Self {
        Self {
            config,
            in_frame: false,
            escape_pending: false,
            buf: BytesMut::new(),
            stats: DecoderStats::default(),
        }
    }

    /// Feed one byte.
    pub fn push(&mut self, byte: u8) -> PushResult {
        let params = self.config.params;

        if byte == params.start_byte() {
            if self.in_frame {
                trace!(discarded = self.buf.len(), "start byte inside frame, resyncing");
                self.stats.resyncs += 1;
            }
            self.buf.clear();
            self.escape_pending = false;
            self.in_frame = true;
            return PushResult::Continue;
        }

        if !self.in_frame {
            return PushResult::Continue;
        }

        if byte == params.stop_byte() {
            return self.finish_frame();
        }

        if self.escape_pending {
            self.escape_pending = false;
            return self.append(byte ^ ESCAPE_XOR);
        }

        if byte == params.escape_byte() {
            self.escape_pending = true;
            return PushResult::Continue;
        }

        self.append(byte)
    }

    /// Feed a run of bytes, collecting every non-`Continue` outcome in order.
    pub fn push_slice(&mut self, bytes: &[u8]) -> Vec<PushResult> {
        bytes
            .iter()
            .map(|&b| self.push(b))
            .filter(|r| !matches!(r, PushResult::Continue))
            .collect()
    }

    /// Abandon any partial frame and return to idle.
    pub fn reset(&mut self) {
        self.in_frame = false;
        self.escape_pending = false;
        self.buf.clear();
    }

    /// Whether a start byte has been seen without a closing stop byte.
    pub fn is_in_frame(&self) -> bool {
        self.in_frame
    }

    /// Whether the previous byte was an escape.
    pub fn is_escape_pending(&self) -> bool {
        self.escape_pending
    }

    /// De-stuffed bytes buffered for the open frame.
    pub fn buffered_len(&self) -> usize {
        self.buf.len()
    }

    pub fn config(&self) -> &FrameConfig {
        &self.config
    }

    pub fn stats(&self) -> DecoderStats {
        self.stats
    }

    fn append(&mut self, byte: u8) -> PushResult {
        let max = self.config.max_frame_bytes;
        if max != 0 && self.buf.len() >= max {
            return self.drop_frame(DropReason::FrameTooLarge);
        }
        self.buf.put_u8(byte);
        PushResult::Continue
    }

    fn finish_frame(&mut self) -> PushResult {
        if !self.config.params.crc_enabled() {
            return self.ready(self.buf.len());
        }

        if self.buf.len() < CRC_LEN {
            return self.drop_frame(DropReason::TooShortForCrc);
        }

        let payload_len = self.buf.len() - CRC_LEN;
        let received = u16::from_be_bytes([self.buf[payload_len], self.buf[payload_len + 1]]);
        let computed = crc16_ccitt(&self.buf[..payload_len]);
        if received != computed {
            debug!(received, computed, "checksum mismatch");
            return self.drop_frame(DropReason::CrcMismatch);
        }
        self.ready(payload_len)
    }

    fn ready(&mut self, payload_len: usize) -> PushResult {
        let payload = self.buf.split_to(payload_len).freeze();
        self.reset();
        self.stats.frames_ready += 1;
        trace!(len = payload.len(), "frame ready");
        PushResult::FrameReady(payload)
    }

    fn drop_frame(&mut self, reason: DropReason) -> PushResult {
        debug!(%reason, buffered = self.buf.len(), "dropping frame");
        self.reset();
        self.stats.record_drop(reason);
        PushResult::FrameDropped(reason)
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{encode, FramingParameters};

    fn no_crc() -> FrameConfig {
        FrameConfig {
            params: FramingParameters::default().with_crc(false),
            ..FrameConfig::default()
        }
    }

    fn ready(payload: &[u8]) -> PushResult {
        PushResult::FrameReady(Bytes::copy_from_slice(payload))
    }

    #[test]
    fn decodes_single_frame() {
        let mut decoder = FrameDecoder::new();
        let frame = encode(b"hello", &FramingParameters::default()).unwrap();

        let (last, head) = frame.split_last().unwrap();
        for &b in head {
            assert_eq!(decoder.push(b), PushResult::Continue);
        }
        assert_eq!(decoder.push(*last), ready(b"hello"));
        assert!(!decoder.is_in_frame());
        assert_eq!(decoder.stats().frames_ready, 1);
    }

    #[test]
    fn ignores_bytes_before_start() {
        let mut decoder = FrameDecoder::with_config(no_crc());
        let results = decoder.push_slice(&[0x01, 0x7F, 0x7D, 0x02, 0x7E, b'a', 0x7F]);
        assert_eq!(results, vec![ready(b"a")]);
    }

    #[test]
    fn start_byte_resynchronises_silently() {
        let mut decoder = FrameDecoder::new();
        let frame = encode(b"ok", &FramingParameters::default()).unwrap();

        let mut stream = vec![0x7E, b'x', b'y'];
        stream.extend_from_slice(&frame);

        assert_eq!(decoder.push_slice(&stream), vec![ready(b"ok")]);
        assert_eq!(decoder.stats().resyncs, 1);
        assert_eq!(decoder.stats().dropped(), 0);
    }

    #[test]
    fn double_start_yields_only_second_frame() {
        let mut decoder = FrameDecoder::with_config(no_crc());
        let results = decoder.push_slice(&[0x7E, 0x7E, 0x01, 0x02, 0x7F]);
        assert_eq!(results, vec![ready(&[0x01, 0x02])]);
    }

    #[test]
    fn unescapes_sentinels() {
        let mut decoder = FrameDecoder::with_config(no_crc());
        let results = decoder.push_slice(&[0x7E, 0x7D, 0x5E, 0x7D, 0x5F, 0x7D, 0x5D, 0x7F]);
        assert_eq!(results, vec![ready(&[0x7E, 0x7F, 0x7D])]);
    }

    #[test]
    fn escaped_crc_bytes_restored_before_split() {
        let mut decoder = FrameDecoder::new();
        let results = decoder.push_slice(&[0x7E, 0x39, 0xF3, 0x7D, 0x5D, 0x7D, 0x5E, 0x7F]);
        assert_eq!(results, vec![ready(&[0x39, 0xF3])]);
    }

    #[test]
    fn too_short_for_crc() {
        let mut decoder = FrameDecoder::new();
        assert_eq!(
            decoder.push_slice(&[0x7E, 0x7F]),
            vec![PushResult::FrameDropped(DropReason::TooShortForCrc)]
        );
        assert_eq!(
            decoder.push_slice(&[0x7E, 0x01, 0x7F]),
            vec![PushResult::FrameDropped(DropReason::TooShortForCrc)]
        );
        assert_eq!(decoder.stats().too_short_for_crc, 2);
    }

    #[test]
    fn crc_mismatch_detected() {
        let mut decoder = FrameDecoder::new();
        let mut stream = encode(b"hello", &FramingParameters::default())
            .unwrap()
            .to_vec();
        stream[1] ^= 0x01;

        assert_eq!(
            decoder.push_slice(&stream),
            vec![PushResult::FrameDropped(DropReason::CrcMismatch)]
        );
        assert_eq!(decoder.stats().crc_mismatch, 1);
    }

    #[test]
    fn empty_payload_without_crc() {
        let params = FramingParameters::default().with_crc(false);
        let frame = encode(&[], &params).unwrap();
        let mut decoder = FrameDecoder::with_config(no_crc());
        assert_eq!(decoder.push_slice(&frame), vec![ready(&[])]);
    }

    #[test]
    fn empty_payload_with_crc() {
        let frame = encode(&[], &FramingParameters::default()).unwrap();
        let mut decoder = FrameDecoder::new();
        assert_eq!(decoder.push_slice(&frame), vec![ready(&[])]);
    }

    #[test]
    fn oversized_frame_dropped() {
        let mut decoder = FrameDecoder::with_config(FrameConfig {
            max_frame_bytes: 4,
            ..no_crc()
        });
        let results = decoder.push_slice(&[0x7E, 1, 2, 3, 4, 5, 0x7F]);
        assert_eq!(
            results,
            vec![PushResult::FrameDropped(DropReason::FrameTooLarge)]
        );
        assert!(!decoder.is_in_frame());
        assert_eq!(decoder.buffered_len(), 0);
    }

    #[test]
    fn frame_at_cap_accepted() {
        let mut decoder = FrameDecoder::with_config(FrameConfig {
            max_frame_bytes: 4,
            ..no_crc()
        });
        assert_eq!(
            decoder.push_slice(&[0x7E, 1, 2, 3, 4, 0x7F]),
            vec![ready(&[1, 2, 3, 4])]
        );
    }

    #[test]
    fn cap_counts_checksum_bytes() {
        let params = FramingParameters::default();
        let frame = encode(&[1, 2, 3], &params).unwrap();
        let mut decoder = FrameDecoder::with_config(FrameConfig {
            params,
            max_frame_bytes: 4,
            ..FrameConfig::default()
        });
        assert_eq!(
            decoder.push_slice(&frame),
            vec![PushResult::FrameDropped(DropReason::FrameTooLarge)]
        );
    }

    #[test]
    fn escaped_byte_subject_to_cap() {
        let mut decoder = FrameDecoder::with_config(FrameConfig {
            max_frame_bytes: 2,
            ..no_crc()
        });
        let results = decoder.push_slice(&[0x7E, 1, 2, 0x7D]);
        assert!(results.is_empty());
        assert!(decoder.is_escape_pending());

        assert_eq!(
            decoder.push(0x5E),
            PushResult::FrameDropped(DropReason::FrameTooLarge)
        );
        assert!(!decoder.is_escape_pending());
    }

    #[test]
    fn zero_cap_is_unbounded() {
        let mut decoder = FrameDecoder::with_config(FrameConfig {
            max_frame_bytes: 0,
            ..no_crc()
        });
        let mut stream = vec![0x7E];
        stream.extend(std::iter::repeat(0x11).take(10_000));
        stream.push(0x7F);

        match decoder.push_slice(&stream).as_slice() {
            [PushResult::FrameReady(payload)] => assert_eq!(payload.len(), 10_000),
            other => panic!("unexpected results: {other:?}"),
        }
    }

    #[test]
    fn trailing_escape_stays_pending() {
        let mut decoder = FrameDecoder::with_config(no_crc());
        assert!(decoder.push_slice(&[0x7E, 0x41, 0x7D]).is_empty());
        assert!(decoder.is_escape_pending());
        assert!(decoder.is_in_frame());

        assert_eq!(decoder.push_slice(&[0x5E, 0x7F]), vec![ready(&[0x41, 0x7E])]);
    }

    #[test]
    fn stop_after_escape_terminates_frame() {
        let mut decoder = FrameDecoder::with_config(no_crc());
        assert_eq!(
            decoder.push_slice(&[0x7E, 0x41, 0x7D, 0x7F]),
            vec![ready(&[0x41])]
        );
        assert!(!decoder.is_escape_pending());
    }

    #[test]
    fn start_after_escape_resynchronises() {
        let mut decoder = FrameDecoder::with_config(no_crc());
        let results = decoder.push_slice(&[0x7E, 0x41, 0x7D, 0x7E, 0x42, 0x7F]);
        assert_eq!(results, vec![ready(&[0x42])]);
    }

    #[test]
    fn recovers_after_every_outcome() {
        let params = FramingParameters::default();
        let good = encode(b"next", &params).unwrap();
        let mut corrupt = encode(b"bad", &params).unwrap().to_vec();
        corrupt[2] ^= 0x80;

        let preludes: [&[u8]; 4] = [
            &[0x7E, 0x7F],
            &corrupt,
            &[0x7E, 1, 2, 3, 4, 5, 6, 7],
            &good,
        ];

        for prelude in preludes {
            let mut decoder = FrameDecoder::with_config(FrameConfig {
                params,
                max_frame_bytes: 6,
                ..FrameConfig::default()
            });
            let first = decoder.push_slice(prelude);
            assert_eq!(first.len(), 1, "prelude {prelude:02X?}");
            assert_eq!(decoder.buffered_len(), 0);
            assert!(!decoder.is_escape_pending());
            assert!(!decoder.is_in_frame());

            assert_eq!(decoder.push_slice(&good), vec![ready(b"next")]);
        }
    }

    #[test]
    fn every_single_bit_flip_in_body_detected() {
        let params = FramingParameters::default();
        let frame = encode(&[0x10, 0x20, 0x30, 0x40], &params).unwrap();
        let body = 1..frame.len() - 1;

        for idx in body {
            for bit in 0..8 {
                let mut corrupted = frame.to_vec();
                corrupted[idx] ^= 1 << bit;
                let flipped = corrupted[idx];
                if params.is_sentinel(flipped) {
                    // Flipping into a sentinel changes framing rather than content.
                    continue;
                }

                let mut decoder = FrameDecoder::new();
                let results = decoder.push_slice(&corrupted);
                assert_eq!(
                    results,
                    vec![PushResult::FrameDropped(DropReason::CrcMismatch)],
                    "byte {idx} bit {bit}"
                );
            }
        }
    }

    #[test]
    fn multiple_frames_in_one_slice() {
        let params = FramingParameters::default();
        let mut stream = Vec::new();
        for payload in [&b"one"[..], &b"two"[..], &b"three"[..]] {
            stream.extend_from_slice(&encode(payload, &params).unwrap());
            stream.push(0x00);
        }

        let mut decoder = FrameDecoder::new();
        assert_eq!(
            decoder.push_slice(&stream),
            vec![ready(b"one"), ready(b"two"), ready(b"three")]
        );
    }

    #[test]
    fn reset_discards_partial_frame() {
        let mut decoder = FrameDecoder::with_config(no_crc());
        assert!(decoder.push_slice(&[0x7E, 1, 2, 0x7D]).is_empty());
        decoder.reset();
        assert!(!decoder.is_in_frame());
        assert!(decoder.push_slice(&[3, 0x7F]).is_empty());
    }

    #[test]
    fn drop_reason_display() {
        assert_eq!(DropReason::TooShortForCrc.to_string(), "too short for crc");
        assert_eq!(DropReason::CrcMismatch.to_string(), "crc mismatch");
        assert_eq!(DropReason::FrameTooLarge.to_string(), "frame too large");
    }
}
