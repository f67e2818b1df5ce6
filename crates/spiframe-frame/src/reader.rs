use std::io::{ErrorKind, Read};

use bytes::{Buf, Bytes, BytesMut};
use tracing::warn;

use crate::codec::FrameConfig;
use crate::decoder::{DropReason, FrameDecoder, PushResult};
use crate::error::{FrameError, Result};

/// Something the decoder reported while reading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameEvent {
    /// A complete, checksum-valid payload.
    Frame(Bytes),
    /// A frame was discarded; the stream continues.
    Dropped(DropReason),
}

/// Reads frames from any `Read` stream.
///
/// Raw bytes are pulled in chunks and fed to a [`FrameDecoder`] one at a
/// time. Bytes after a completed frame stay buffered for the next call, so
/// several frames arriving in one chunk are all delivered.
pub struct FrameReader<T> {
    inner: T,
    decoder: FrameDecoder,
    pending: BytesMut,
    chunk: Vec<u8>,
}

impl<T: Read> FrameReader<T> {
    /// Create a new frame reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        let chunk = vec![0u8; config.read_chunk_size.max(1)];
        Self {
            inner,
            decoder: FrameDecoder::with_config(config),
            pending: BytesMut::new(),
            chunk,
        }
    }

    /// Read until the decoder completes or drops a frame (blocking).
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` when EOF is reached.
    pub fn next_event(&mut self) -> Result<FrameEvent> {
        let mut unlimited = usize::MAX;
        match self.advance(&mut unlimited)? {
            Some(event) => Ok(event),
            None => Err(FrameError::ConnectionClosed),
        }
    }

    /// Like [`next_event`](Self::next_event), but give up after `budget` raw
    /// bytes without an outcome.
    pub fn next_event_within(&mut self, budget: usize) -> Result<Option<FrameEvent>> {
        let mut remaining = budget;
        self.advance(&mut remaining)
    }

    /// Read the next complete frame, skipping dropped ones (blocking).
    pub fn read_frame(&mut self) -> Result<Bytes> {
        loop {
            match self.next_event()? {
                FrameEvent::Frame(payload) => return Ok(payload),
                FrameEvent::Dropped(reason) => warn!(%reason, "skipping dropped frame"),
            }
        }
    }

    /// Read the next complete frame, giving up after `budget` raw bytes.
    ///
    /// Streams that never reach EOF, like a polled SPI bus, need a bound.
    pub fn read_frame_within(&mut self, budget: usize) -> Result<Option<Bytes>> {
        let mut remaining = budget;
        loop {
            match self.advance(&mut remaining)? {
                Some(FrameEvent::Frame(payload)) => return Ok(Some(payload)),
                Some(FrameEvent::Dropped(reason)) => warn!(%reason, "skipping dropped frame"),
                None => return Ok(None),
            }
        }
    }

    /// The decoder driven by this reader.
    pub fn decoder(&self) -> &FrameDecoder {
        &self.decoder
    }

    /// Current frame reader configuration.
    pub fn config(&self) -> &FrameConfig {
        self.decoder.config()
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    fn advance(&mut self, budget: &mut usize) -> Result<Option<FrameEvent>> {
        loop {
            while *budget > 0 && !self.pending.is_empty() {
                *budget -= 1;
                match self.decoder.push(self.pending.get_u8()) {
                    PushResult::Continue => {}
                    PushResult::FrameReady(payload) => {
                        return Ok(Some(FrameEvent::Frame(payload)));
                    }
                    PushResult::FrameDropped(reason) => {
                        return Ok(Some(FrameEvent::Dropped(reason)));
                    }
                }
            }

            if *budget == 0 {
                return Ok(None);
            }
            self.fill(*budget)?;
        }
    }

    fn fill(&mut self, budget: usize) -> Result<()> {
        let want = self.chunk.len().min(budget);
        loop {
            match self.inner.read(&mut self.chunk[..want]) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => {
                    self.pending.extend_from_slice(&self.chunk[..n]);
                    return Ok(());
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }
}

impl<T> std::fmt::Debug for FrameReader<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameReader")
            .field("decoder", &self.decoder)
            .field("pending", &self.pending.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use spiframe_transport::{DuplexStream, Loopback};

    use super::*;
    use crate::codec::{encode, FramingParameters};
    use crate::writer::FrameWriter;

    fn wire(payload: &[u8]) -> Vec<u8> {
        encode(payload, &FramingParameters::default())
            .unwrap()
            .to_vec()
    }

    #[test]
    fn read_single_frame() {
        let mut reader = FrameReader::new(Cursor::new(wire(b"hello")));
        assert_eq!(reader.read_frame().unwrap().as_ref(), b"hello");
    }

    #[test]
    fn read_multiple_frames_from_one_chunk() {
        let stream = [wire(b"one"), wire(b"two"), wire(b"three")].concat();
        let mut reader = FrameReader::new(Cursor::new(stream));

        assert_eq!(reader.read_frame().unwrap().as_ref(), b"one");
        assert_eq!(reader.read_frame().unwrap().as_ref(), b"two");
        assert_eq!(reader.read_frame().unwrap().as_ref(), b"three");
        assert!(matches!(
            reader.read_frame().unwrap_err(),
            FrameError::ConnectionClosed
        ));
    }

    #[test]
    fn partial_read_handling() {
        let byte_reader = ByteByByteReader {
            bytes: wire(b"slow"),
            pos: 0,
        };
        let mut reader = FrameReader::new(byte_reader);
        assert_eq!(reader.read_frame().unwrap().as_ref(), b"slow");
    }

    #[test]
    fn garbage_prefix_ignored() {
        let mut stream = vec![0x00, 0x13, 0x7F, 0x7D];
        stream.extend_from_slice(&wire(b"clean"));
        let mut reader = FrameReader::new(Cursor::new(stream));
        assert_eq!(reader.read_frame().unwrap().as_ref(), b"clean");
    }

    #[test]
    fn next_event_reports_drops() {
        let mut stream = vec![0x7E, 0x01, 0x7F];
        stream.extend_from_slice(&wire(b"after"));
        let mut reader = FrameReader::new(Cursor::new(stream));

        assert_eq!(
            reader.next_event().unwrap(),
            FrameEvent::Dropped(DropReason::TooShortForCrc)
        );
        assert_eq!(
            reader.next_event().unwrap(),
            FrameEvent::Frame(Bytes::from_static(b"after"))
        );
    }

    #[test]
    fn read_frame_skips_drops() {
        let mut corrupt = wire(b"bad");
        corrupt[1] ^= 0x04;
        corrupt.extend_from_slice(&wire(b"good"));

        let mut reader = FrameReader::new(Cursor::new(corrupt));
        assert_eq!(reader.read_frame().unwrap().as_ref(), b"good");
        assert_eq!(reader.decoder().stats().crc_mismatch, 1);
    }

    #[test]
    fn connection_closed_cleanly() {
        let mut reader = FrameReader::new(Cursor::new(Vec::<u8>::new()));
        let err = reader.read_frame().unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[test]
    fn connection_closed_mid_frame() {
        let mut partial = wire(b"truncated");
        partial.truncate(5);
        let mut reader = FrameReader::new(Cursor::new(partial));
        let err = reader.read_frame().unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
        assert!(reader.decoder().is_in_frame());
    }

    #[test]
    fn budget_exhausted_without_frame() {
        let mut reader = FrameReader::new(Cursor::new(vec![0u8; 64]));
        assert_eq!(reader.read_frame_within(16).unwrap(), None);
        assert_eq!(reader.get_ref().position(), 16);
    }

    #[test]
    fn budget_spans_calls_and_keeps_leftovers() {
        let frame = wire(b"ab");
        let mut reader = FrameReader::new(Cursor::new(frame.clone()));

        assert_eq!(reader.read_frame_within(frame.len() - 1).unwrap(), None);
        assert_eq!(
            reader.read_frame_within(1).unwrap(),
            Some(Bytes::from_static(b"ab"))
        );
    }

    #[test]
    fn next_event_within_zero_budget() {
        let mut reader = FrameReader::new(Cursor::new(wire(b"x")));
        assert_eq!(reader.next_event_within(0).unwrap(), None);
        assert_eq!(reader.get_ref().position(), 0);
    }

    #[test]
    fn interrupted_read_retries() {
        let reader = InterruptedThenData {
            interrupted: false,
            inner: Cursor::new(wire(b"ok")),
        };
        let mut framed = FrameReader::new(reader);
        assert_eq!(framed.read_frame().unwrap().as_ref(), b"ok");
    }

    #[test]
    fn would_block_propagates_io_error() {
        struct WouldBlock;
        impl Read for WouldBlock {
            fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
                Err(std::io::Error::from(ErrorKind::WouldBlock))
            }
        }

        let mut framed = FrameReader::new(WouldBlock);
        let err = framed.read_frame().unwrap_err();
        assert!(matches!(err, FrameError::Io(e) if e.kind() == ErrorKind::WouldBlock));
    }

    #[test]
    fn roundtrip_over_spi_loopback() {
        let mut writer = FrameWriter::new(DuplexStream::new(Loopback::new()));
        writer.send(&[0x42, 0x01, 0x10, 0x00, 0x7E]).unwrap();

        // The echo of our own frame sits in the receive backlog.
        let mut reader = FrameReader::new(writer.into_inner());
        let payload = reader.read_frame_within(64).unwrap();
        assert_eq!(payload.as_deref(), Some(&[0x42, 0x01, 0x10, 0x00, 0x7E][..]));

        // Nothing more arrives; polling clocks idle bytes until the budget runs out.
        assert_eq!(reader.read_frame_within(32).unwrap(), None);
    }

    #[test]
    fn reply_scripted_on_miso() {
        let params = FramingParameters::default();
        let mut bus = Loopback::new();
        let mut miso = vec![0xFF; 3];
        miso.extend_from_slice(&encode(b"pong", &params).unwrap());
        bus.queue_miso(&miso);

        let mut reader = FrameReader::new(DuplexStream::new(bus));
        assert_eq!(
            reader.read_frame_within(64).unwrap(),
            Some(Bytes::from_static(b"pong"))
        );
    }

    #[derive(Debug)]
    struct ByteByByteReader {
        bytes: Vec<u8>,
        pos: usize,
    }

    impl Read for ByteByByteReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.pos >= self.bytes.len() || buf.is_empty() {
                return Ok(0);
            }
            buf[0] = self.bytes[self.pos];
            self.pos += 1;
            Ok(1)
        }
    }

    struct InterruptedThenData {
        interrupted: bool,
        inner: Cursor<Vec<u8>>,
    }

    impl Read for InterruptedThenData {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if !self.interrupted {
                self.interrupted = true;
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            self.inner.read(buf)
        }
    }
}
