use std::fs::{File, OpenOptions};
use std::os::fd::AsRawFd;

use tracing::{debug, info};

use crate::config::{SpiConfig, SpiMode};
use crate::error::{Result, TransportError};
use crate::traits::{check_lengths, FullDuplex};

// Request numbers from <linux/spi/spidev.h>, using the generic _IOC layout
// (dir:2 | size:14 | type:8 | nr:8) shared by x86, arm and riscv.
const IOC_WRITE: u64 = 1;
const SPI_IOC_MAGIC: u64 = b'k' as u64;

const fn iow(nr: u64, size: usize) -> u64 {
    (IOC_WRITE << 30) | ((size as u64) << 16) | (SPI_IOC_MAGIC << 8) | nr
}

const SPI_IOC_WR_MODE: u64 = iow(1, std::mem::size_of::<u8>());
const SPI_IOC_WR_BITS_PER_WORD: u64 = iow(3, std::mem::size_of::<u8>());
const SPI_IOC_WR_MAX_SPEED_HZ: u64 = iow(4, std::mem::size_of::<u32>());

/// Most segments one message can carry (bounded by the 14-bit ioctl size field).
pub const MAX_SEGMENTS: usize = ((1 << 14) - 1) / std::mem::size_of::<SpiIocTransfer>();

const fn spi_ioc_message(n: usize) -> u64 {
    iow(0, n * std::mem::size_of::<SpiIocTransfer>())
}

/// Mirror of `struct spi_ioc_transfer`.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
struct SpiIocTransfer {
    tx_buf: u64,
    rx_buf: u64,
    len: u32,
    speed_hz: u32,
    delay_usecs: u16,
    bits_per_word: u8,
    cs_change: u8,
    tx_nbits: u8,
    rx_nbits: u8,
    word_delay_usecs: u8,
    pad: u8,
}

/// One leg of a multi-segment transfer.
///
/// All segments passed to [`SpiDevice::transfer_segments`] run under a single
/// chip-select assertion unless a segment sets `cs_change`. Overrides left as
/// `None` fall back to the device configuration.
#[derive(Debug, Default)]
pub struct Segment<'a> {
    pub tx: Option<&'a [u8]>,
    pub rx: Option<&'a mut [u8]>,
    pub speed_hz: Option<u32>,
    pub delay_usecs: Option<u16>,
    pub bits_per_word: Option<u8>,
    pub cs_change: bool,
}

impl<'a> Segment<'a> {
    /// Transmit only; received bytes are discarded.
    pub fn write(tx: &'a [u8]) -> Self {
        Self {
            tx: Some(tx),
            ..Self::default()
        }
    }

    /// Receive only; the kernel clocks out zeros.
    pub fn read(rx: &'a mut [u8]) -> Self {
        Self {
            rx: Some(rx),
            ..Self::default()
        }
    }

    /// Transmit and receive simultaneously.
    pub fn duplex(tx: &'a [u8], rx: &'a mut [u8]) -> Self {
        Self {
            tx: Some(tx),
            rx: Some(rx),
            ..Self::default()
        }
    }

    fn len(&self) -> std::result::Result<usize, &'static str> {
        match (&self.tx, &self.rx) {
            (Some(tx), Some(rx)) if tx.len() != rx.len() => Err("tx and rx lengths differ"),
            (Some(tx), _) => Ok(tx.len()),
            (None, Some(rx)) => Ok(rx.len()),
            (None, None) => Err("segment has neither tx nor rx buffer"),
        }
    }
}

fn build_transfers(
    segments: &mut [Segment<'_>],
    config: &SpiConfig,
) -> Result<Vec<SpiIocTransfer>> {
    if segments.len() > MAX_SEGMENTS {
        return Err(TransportError::Unsupported(
            "too many segments for one SPI message",
        ));
    }

    let mut ops = Vec::with_capacity(segments.len());
    for (index, seg) in segments.iter_mut().enumerate() {
        let len = seg
            .len()
            .map_err(|reason| TransportError::InvalidSegment { index, reason })?;
        if len == 0 {
            return Err(TransportError::InvalidSegment {
                index,
                reason: "segment length must be non-zero",
            });
        }
        let len = u32::try_from(len).map_err(|_| TransportError::InvalidSegment {
            index,
            reason: "segment longer than u32::MAX",
        })?;

        ops.push(SpiIocTransfer {
            tx_buf: seg.tx.map_or(0, |tx| tx.as_ptr() as u64),
            rx_buf: seg.rx.as_mut().map_or(0, |rx| rx.as_mut_ptr() as u64),
            len,
            speed_hz: seg.speed_hz.unwrap_or(config.speed_hz),
            delay_usecs: seg.delay_usecs.unwrap_or(config.delay_usecs),
            bits_per_word: seg.bits_per_word.unwrap_or(config.bits_per_word),
            cs_change: u8::from(seg.cs_change || config.cs_change),
            ..SpiIocTransfer::default()
        });
    }
    Ok(ops)
}

/// A Linux `spidev` character device.
///
/// Opening applies mode, word size and clock speed. Setters only record the
/// new value; it is pushed to the kernel lazily before the next transfer.
/// The file descriptor is closed when the device is dropped.
pub struct SpiDevice {
    file: File,
    config: SpiConfig,
    dirty: bool,
}

impl SpiDevice {
    /// Open and configure the device described by `config`.
    pub fn open(config: SpiConfig) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&config.device)
            .map_err(|source| TransportError::Open {
                path: config.device.clone(),
                source,
            })?;

        let mut device = Self {
            file,
            config,
            dirty: true,
        };
        device.configure_device()?;

        info!(
            device = %device.config.device.display(),
            speed_hz = device.config.speed_hz,
            mode = device.config.mode.bits(),
            bits_per_word = device.config.bits_per_word,
            "opened SPI device"
        );
        Ok(device)
    }

    /// Full-duplex transfer of `tx.len()` bytes into `rx`.
    pub fn transfer(&mut self, tx: &[u8], rx: &mut [u8]) -> Result<()> {
        check_lengths(tx, rx)?;
        if tx.is_empty() {
            return Ok(());
        }
        let mut segments = [Segment::duplex(tx, rx)];
        self.transfer_segments(&mut segments)
    }

    /// Run several segments as one message under a single chip-select assertion.
    pub fn transfer_segments(&mut self, segments: &mut [Segment<'_>]) -> Result<()> {
        if segments.is_empty() {
            return Ok(());
        }
        self.ensure_configured()?;

        let mut ops = build_transfers(segments, &self.config)?;
        // SAFETY: `ops` holds `ops.len()` initialised `spi_ioc_transfer` structs whose
        // buffer pointers borrow from `segments`, which outlives this call. Each
        // buffer is at least `len` bytes, and rx buffers are exclusively borrowed.
        let rc = unsafe {
            libc::ioctl(
                self.file.as_raw_fd(),
                spi_ioc_message(ops.len()) as _,
                ops.as_mut_ptr(),
            )
        };
        if rc < 0 {
            return Err(TransportError::Transfer(std::io::Error::last_os_error()));
        }
        debug!(segments = ops.len(), "SPI transfer complete");
        Ok(())
    }

    /// Change the clock speed for subsequent transfers.
    pub fn set_speed(&mut self, hz: u32) {
        self.config.speed_hz = hz;
        self.dirty = true;
    }

    /// Change the clock mode for subsequent transfers.
    pub fn set_mode(&mut self, mode: SpiMode) {
        self.config.mode = mode;
        self.dirty = true;
    }

    /// Change the word size for subsequent transfers.
    pub fn set_bits_per_word(&mut self, bits: u8) {
        self.config.bits_per_word = bits;
        self.dirty = true;
    }

    /// Replace the whole configuration and apply it immediately.
    ///
    /// The device node is not reopened; `config.device` is recorded only.
    pub fn reconfigure(&mut self, config: SpiConfig) -> Result<()> {
        self.config = config;
        self.dirty = true;
        self.configure_device()
    }

    /// Current configuration.
    pub fn config(&self) -> &SpiConfig {
        &self.config
    }

    fn ensure_configured(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }
        self.configure_device()
    }

    fn configure_device(&mut self) -> Result<()> {
        let fd = self.file.as_raw_fd();
        let mode = self.config.mode.bits();
        write_setting(fd, SPI_IOC_WR_MODE, &mode, "SPI mode")?;
        write_setting(
            fd,
            SPI_IOC_WR_BITS_PER_WORD,
            &self.config.bits_per_word,
            "bits per word",
        )?;
        write_setting(
            fd,
            SPI_IOC_WR_MAX_SPEED_HZ,
            &self.config.speed_hz,
            "max speed",
        )?;
        self.dirty = false;
        debug!(device = %self.config.device.display(), "applied SPI configuration");
        Ok(())
    }
}

fn write_setting<V>(
    fd: std::os::fd::RawFd,
    request: u64,
    value: &V,
    setting: &'static str,
) -> Result<()> {
    // SAFETY: `value` points to a live, correctly sized value for `request`, and
    // the spidev write ioctls only read through the pointer.
    let rc = unsafe { libc::ioctl(fd, request as _, value as *const V) };
    if rc < 0 {
        return Err(TransportError::Configure {
            setting,
            source: std::io::Error::last_os_error(),
        });
    }
    Ok(())
}

impl FullDuplex for SpiDevice {
    fn transfer(&mut self, tx: &[u8], rx: &mut [u8]) -> Result<()> {
        SpiDevice::transfer(self, tx, rx)
    }
}

impl std::fmt::Debug for SpiDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpiDevice")
            .field("device", &self.config.device)
            .field("fd", &self.file.as_raw_fd())
            .field("dirty", &self.dirty)
            .finish()
    }
}
