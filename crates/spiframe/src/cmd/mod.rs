use std::fs;
use std::io::Read;
use std::path::PathBuf;

use clap::{Args, Subcommand};
use spiframe_frame::{FrameConfig, FramingParameters, DEFAULT_MAX_FRAME_BYTES};
use spiframe_transport::config::DEFAULT_SPEED_HZ;
use spiframe_transport::{FullDuplex, Loopback};

use crate::exit::{encode_error, io_error, CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod decode;
pub mod encode;
pub mod listen;
pub mod transfer;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Encode a payload and print the wire frame.
    Encode(EncodeArgs),
    /// Decode a captured byte stream and print every frame.
    Decode(DecodeArgs),
    /// Send one frame over SPI and wait for a reply frame.
    Transfer(TransferArgs),
    /// Poll an SPI device and print received frames.
    Listen(ListenArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Encode(args) => encode::run(args, format),
        Command::Decode(args) => decode::run(args, format),
        Command::Transfer(args) => transfer::run(args, format),
        Command::Listen(args) => listen::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug, Clone)]
pub struct FramingArgs {
    /// Start-of-frame byte (decimal or 0x-prefixed hex).
    #[arg(long, value_parser = parse_byte, default_value = "0x7E")]
    pub start: u8,
    /// End-of-frame byte.
    #[arg(long, value_parser = parse_byte, default_value = "0x7F")]
    pub stop: u8,
    /// Escape byte.
    #[arg(long, value_parser = parse_byte, default_value = "0x7D")]
    pub escape: u8,
    /// Omit the CRC16 trailer.
    #[arg(long)]
    pub no_crc: bool,
    /// Maximum de-stuffed bytes per frame, checksum included (0 = unlimited).
    #[arg(long, default_value_t = DEFAULT_MAX_FRAME_BYTES)]
    pub max_frame_bytes: usize,
}

impl FramingArgs {
    pub fn to_config(&self) -> CliResult<FrameConfig> {
        let params = FramingParameters::new(self.start, self.stop, self.escape, !self.no_crc)
            .map_err(|err| encode_error("invalid framing parameters", err))?;
        Ok(FrameConfig {
            params,
            max_frame_bytes: self.max_frame_bytes,
            ..FrameConfig::default()
        })
    }
}

#[derive(Args, Debug)]
pub struct PayloadArgs {
    /// Payload as a UTF-8 string.
    #[arg(long, conflicts_with_all = ["hex", "file"])]
    pub data: Option<String>,
    /// Payload as hex bytes (e.g. "42 01 10 00 7e").
    #[arg(long, conflicts_with_all = ["data", "file"])]
    pub hex: Option<String>,
    /// Read payload from file.
    #[arg(long, conflicts_with_all = ["data", "hex"])]
    pub file: Option<PathBuf>,
}

impl PayloadArgs {
    /// The selected payload; empty when none is given.
    pub fn resolve(&self) -> CliResult<Vec<u8>> {
        if let Some(data) = &self.data {
            return Ok(data.as_bytes().to_vec());
        }
        if let Some(hex) = &self.hex {
            return parse_hex(hex);
        }
        if let Some(path) = &self.file {
            return fs::read(path)
                .map_err(|err| io_error(&format!("failed reading {}", path.display()), err));
        }
        Ok(Vec::new())
    }
}

#[derive(Args, Debug)]
pub struct BusArgs {
    /// SPI device node (e.g. /dev/spidev0.0).
    #[arg(env = "SPIFRAME_DEVICE", required_unless_present = "loopback")]
    pub device: Option<PathBuf>,
    /// Use an in-memory loopback (MOSI wired to MISO) instead of hardware.
    /// Takes precedence over any device, including one from the environment.
    #[arg(long)]
    pub loopback: bool,
    /// Clock speed in Hz.
    #[arg(long, env = "SPIFRAME_SPEED_HZ", default_value_t = DEFAULT_SPEED_HZ)]
    pub speed: u32,
    /// SPI mode (0-3).
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=3), default_value_t = 0)]
    pub mode: u8,
    /// Bits per word.
    #[arg(long, default_value_t = 8)]
    pub bits: u8,
    /// Idle byte clocked out while polling for received data.
    #[arg(long, value_parser = parse_byte, default_value = "0x00")]
    pub fill: u8,
}

impl BusArgs {
    /// Open the selected bus; `--loopback` wins over a device.
    pub fn open(&self) -> CliResult<Box<dyn FullDuplex>> {
        if self.loopback {
            tracing::info!("using in-memory loopback bus");
            return Ok(Box::new(Loopback::new()));
        }
        let device = self
            .device
            .clone()
            .ok_or_else(|| CliError::new(USAGE, "no SPI device given"))?;
        open_device(device, self)
    }

    /// Reject an idle byte that the decoder would treat as framing.
    pub fn check_fill(&self, config: &FrameConfig) -> CliResult<()> {
        if config.params.is_sentinel(self.fill) {
            return Err(CliError::new(
                USAGE,
                format!("--fill 0x{:02x} collides with a framing sentinel", self.fill),
            ));
        }
        Ok(())
    }
}

#[cfg(target_os = "linux")]
fn open_device(device: PathBuf, args: &BusArgs) -> CliResult<Box<dyn FullDuplex>> {
    use spiframe_transport::{SpiConfig, SpiDevice, SpiMode};

    let mode = SpiMode::from_bits(args.mode)
        .ok_or_else(|| CliError::new(USAGE, format!("invalid SPI mode: {}", args.mode)))?;
    let config = SpiConfig {
        speed_hz: args.speed,
        mode,
        bits_per_word: args.bits,
        ..SpiConfig::new(device)
    };
    let spi = SpiDevice::open(config)
        .map_err(|err| crate::exit::transport_error("open failed", err))?;
    Ok(Box::new(spi))
}

#[cfg(not(target_os = "linux"))]
fn open_device(_device: PathBuf, _args: &BusArgs) -> CliResult<Box<dyn FullDuplex>> {
    Err(CliError::new(
        USAGE,
        "SPI devices are only supported on Linux; use --loopback",
    ))
}

#[derive(Args, Debug)]
pub struct EncodeArgs {
    #[command(flatten)]
    pub payload: PayloadArgs,
    #[command(flatten)]
    pub framing: FramingArgs,
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Raw stream as hex bytes.
    #[arg(long, conflicts_with = "file")]
    pub hex: Option<String>,
    /// Read the raw stream from a file ("-" for stdin).
    #[arg(long, conflicts_with = "hex")]
    pub file: Option<PathBuf>,
    /// Print decoder counters after the stream.
    #[arg(long)]
    pub summary: bool,
    #[command(flatten)]
    pub framing: FramingArgs,
}

impl DecodeArgs {
    pub fn stream(&self) -> CliResult<Vec<u8>> {
        if let Some(hex) = &self.hex {
            return parse_hex(hex);
        }
        match &self.file {
            Some(path) if path.as_os_str() != "-" => fs::read(path)
                .map_err(|err| io_error(&format!("failed reading {}", path.display()), err)),
            _ => {
                let mut buf = Vec::new();
                std::io::stdin()
                    .read_to_end(&mut buf)
                    .map_err(|err| io_error("failed reading stdin", err))?;
                Ok(buf)
            }
        }
    }
}

#[derive(Args, Debug)]
pub struct TransferArgs {
    #[command(flatten)]
    pub bus: BusArgs,
    #[command(flatten)]
    pub payload: PayloadArgs,
    #[command(flatten)]
    pub framing: FramingArgs,
    /// Extra bytes to clock while waiting for a reply frame.
    #[arg(long, default_value_t = 256)]
    pub poll_bytes: usize,
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    #[command(flatten)]
    pub bus: BusArgs,
    #[command(flatten)]
    pub framing: FramingArgs,
    /// Exit after receiving N frames.
    #[arg(long)]
    pub count: Option<usize>,
    /// Bytes clocked per poll.
    #[arg(long, default_value_t = 64)]
    pub poll_bytes: usize,
    /// Also print dropped frames.
    #[arg(long)]
    pub show_drops: bool,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Parse a byte given as decimal or `0x`-prefixed hex.
pub fn parse_byte(input: &str) -> Result<u8, String> {
    let input = input.trim();
    let parsed = match input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
    {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => input.parse::<u8>(),
    };
    parsed.map_err(|_| format!("invalid byte value: {input}"))
}

/// Parse hex bytes separated by whitespace, commas or colons. Each token may
/// carry a `0x` prefix; unseparated runs ("7e4201") are split into pairs.
pub fn parse_hex(input: &str) -> CliResult<Vec<u8>> {
    let mut digits = String::with_capacity(input.len());
    for token in input.split(|c: char| c.is_whitespace() || c == ',' || c == ':') {
        let token = token
            .strip_prefix("0x")
            .or_else(|| token.strip_prefix("0X"))
            .unwrap_or(token);
        digits.push_str(token);
    }

    if !digits.is_ascii() || digits.len() % 2 != 0 {
        return Err(CliError::new(
            USAGE,
            format!("invalid hex input: {}", input.trim()),
        ));
    }

    (0..digits.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&digits[i..i + 2], 16))
        .collect::<Result<Vec<u8>, _>>()
        .map_err(|err| CliError::new(USAGE, format!("invalid hex input: {err}")))
}
