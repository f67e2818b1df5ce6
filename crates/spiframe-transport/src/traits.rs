use std::io::{Read, Write};

use bytes::{Buf, BytesMut};

use crate::error::{Result, TransportError};

/// A synchronous full-duplex byte exchange.
///
/// Every transmitted byte position has a corresponding received byte. This
/// is the only capability the framing layer needs from a bus, so tests can
/// substitute an in-memory implementation for real hardware.
pub trait FullDuplex {
    /// Clock out `tx` while filling `rx` with the bytes received.
    ///
    /// `tx` and `rx` must have the same length.
    fn transfer(&mut self, tx: &[u8], rx: &mut [u8]) -> Result<()>;

    /// Transmit `tx` and return the bytes received during the exchange.
    fn exchange(&mut self, tx: &[u8]) -> Result<Vec<u8>> {
        let mut rx = vec![0u8; tx.len()];
        self.transfer(tx, &mut rx)?;
        Ok(rx)
    }
}

impl<T: FullDuplex + ?Sized> FullDuplex for &mut T {
    fn transfer(&mut self, tx: &[u8], rx: &mut [u8]) -> Result<()> {
        (**self).transfer(tx, rx)
    }
}

impl<T: FullDuplex + ?Sized> FullDuplex for Box<T> {
    fn transfer(&mut self, tx: &[u8], rx: &mut [u8]) -> Result<()> {
        (**self).transfer(tx, rx)
    }
}

pub(crate) fn check_lengths(tx: &[u8], rx: &[u8]) -> Result<()> {
    if tx.len() != rx.len() {
        return Err(TransportError::LengthMismatch {
            tx: tx.len(),
            rx: rx.len(),
        });
    }
    Ok(())
}

/// Adapts a [`FullDuplex`] transport to `Read + Write`.
///
/// Writes perform a transfer and keep whatever arrived on the receive line in
/// a backlog. Reads drain that backlog first; once it is empty they clock out
/// `fill_byte` to pull fresh bytes from the peer. No received byte is lost.
pub struct DuplexStream<T> {
    inner: T,
    backlog: BytesMut,
    fill_byte: u8,
}

impl<T: FullDuplex> DuplexStream<T> {
    /// Idle byte clocked out by reads. Must not collide with a framing sentinel.
    pub const DEFAULT_FILL_BYTE: u8 = 0x00;

    /// Wrap a transport.
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            backlog: BytesMut::new(),
            fill_byte: Self::DEFAULT_FILL_BYTE,
        }
    }

    /// Change the idle byte clocked out while reading.
    pub fn with_fill_byte(mut self, fill_byte: u8) -> Self {
        self.fill_byte = fill_byte;
        self
    }

    /// Bytes received during writes that have not been read yet.
    pub fn backlog_len(&self) -> usize {
        self.backlog.len()
    }

    /// Borrow the underlying transport.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying transport.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the stream and return the transport. Any backlog is discarded.
    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl<T: FullDuplex> Read for DuplexStream<T> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        if !self.backlog.is_empty() {
            let n = buf.len().min(self.backlog.len());
            buf[..n].copy_from_slice(&self.backlog[..n]);
            self.backlog.advance(n);
            return Ok(n);
        }

        let tx = vec![self.fill_byte; buf.len()];
        self.inner.transfer(&tx, buf)?;
        Ok(buf.len())
    }
}

impl<T: FullDuplex> Write for DuplexStream<T> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let rx = self.inner.exchange(buf)?;
        self.backlog.extend_from_slice(&rx);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<T> std::fmt::Debug for DuplexStream<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DuplexStream")
            .field("backlog", &self.backlog.len())
            .field("fill_byte", &self.fill_byte)
            .finish()
    }
}
