use std::collections::VecDeque;

use tracing::trace;

use crate::error::Result;
use crate::traits::{check_lengths, FullDuplex};

/// In-memory full-duplex transport with MOSI wired straight to MISO.
///
/// Each transmitted byte comes back on the receive side of the same
/// exchange. Bytes queued with [`Loopback::queue_miso`] are returned first,
/// which lets tests script what a peripheral would answer.
#[derive(Debug, Default)]
pub struct Loopback {
    scripted: VecDeque<u8>,
    transmitted: Vec<u8>,
}

impl Loopback {
    /// A loopback with nothing scripted.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue bytes the "peripheral" will send before echoing resumes.
    pub fn queue_miso(&mut self, bytes: &[u8]) {
        self.scripted.extend(bytes.iter().copied());
    }

    /// Every byte clocked out so far.
    pub fn transmitted(&self) -> &[u8] {
        &self.transmitted
    }

    /// Scripted bytes not yet delivered.
    pub fn pending_miso(&self) -> usize {
        self.scripted.len()
    }
}

impl FullDuplex for Loopback {
    fn transfer(&mut self, tx: &[u8], rx: &mut [u8]) -> Result<()> {
        check_lengths(tx, rx)?;
        for (out, &b) in rx.iter_mut().zip(tx) {
            *out = self.scripted.pop_front().unwrap_or(b);
        }
        self.transmitted.extend_from_slice(tx);
        trace!(len = tx.len(), "loopback transfer");
        Ok(())
    }
}
