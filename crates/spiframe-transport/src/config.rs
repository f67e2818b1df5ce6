use std::path::PathBuf;

/// Default SPI clock: 1 MHz.
pub const DEFAULT_SPEED_HZ: u32 = 1_000_000;

/// SPI clock mode (CPOL | CPHA).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum SpiMode {
    /// CPOL=0, CPHA=0
    #[default]
    Mode0 = 0,
    /// CPOL=0, CPHA=1
    Mode1 = 1,
    /// CPOL=1, CPHA=0
    Mode2 = 2,
    /// CPOL=1, CPHA=1
    Mode3 = 3,
}

impl SpiMode {
    /// Build a mode from its numeric value (0-3).
    pub fn from_bits(bits: u8) -> Option<Self> {
        match bits {
            0 => Some(Self::Mode0),
            1 => Some(Self::Mode1),
            2 => Some(Self::Mode2),
            3 => Some(Self::Mode3),
            _ => None,
        }
    }

    /// Raw value as written to `SPI_IOC_WR_MODE`.
    pub fn bits(self) -> u8 {
        self as u8
    }
}

/// Configuration for an SPI device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpiConfig {
    /// Device node, e.g. `/dev/spidev0.0`.
    pub device: PathBuf,
    /// Maximum clock speed in Hz. Default: 1 MHz.
    pub speed_hz: u32,
    /// Clock polarity/phase.
    pub mode: SpiMode,
    /// Word size. Default: 8.
    pub bits_per_word: u8,
    /// Delay after each transfer before chip select changes.
    pub delay_usecs: u16,
    /// Deselect the device between transfers.
    pub cs_change: bool,
}

impl SpiConfig {
    /// Configuration for `device` with default bus settings.
    pub fn new(device: impl Into<PathBuf>) -> Self {
        Self {
            device: device.into(),
            ..Self::default()
        }
    }
}

impl Default for SpiConfig {
    fn default() -> Self {
        Self {
            device: PathBuf::from("/dev/spidev0.0"),
            speed_hz: DEFAULT_SPEED_HZ,
            mode: SpiMode::Mode0,
            bits_per_word: 8,
            delay_usecs: 0,
            cs_change: false,
        }
    }
}
