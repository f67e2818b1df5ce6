use std::io::{IsTerminal, Write};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use spiframe_frame::{DecoderStats, DropReason, EncodedFrame};

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum Event<'a> {
    Encoded {
        payload_size: usize,
        frame_size: usize,
        frame_hex: String,
    },
    Frame {
        index: usize,
        payload_size: usize,
        payload_hex: String,
        payload: String,
    },
    Dropped {
        reason: &'a str,
    },
    Summary {
        frames: u64,
        dropped: u64,
        too_short_for_crc: u64,
        crc_mismatch: u64,
        frame_too_large: u64,
        resyncs: u64,
    },
}

fn print_json(event: &Event<'_>) {
    println!(
        "{}",
        serde_json::to_string(event).unwrap_or_else(|_| "{}".to_string())
    );
}

fn print_table(header: Vec<&str>, row: Vec<String>) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header)
        .add_row(row);
    println!("{table}");
}

pub fn print_encoded(frame: &EncodedFrame, payload_size: usize, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&Event::Encoded {
            payload_size,
            frame_size: frame.len(),
            frame_hex: hex_string(frame),
        }),
        OutputFormat::Table => print_table(
            vec!["PAYLOAD SIZE", "FRAME SIZE", "FRAME"],
            vec![
                payload_size.to_string(),
                frame.len().to_string(),
                hex_string(frame),
            ],
        ),
        OutputFormat::Pretty => {
            println!("sent frame ({} bytes): {}", frame.len(), hex_string(frame));
        }
        OutputFormat::Raw => print_raw(frame),
    }
}

pub fn print_frame(payload: &[u8], index: usize, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&Event::Frame {
            index,
            payload_size: payload.len(),
            payload_hex: hex_string(payload),
            payload: payload_preview(payload),
        }),
        OutputFormat::Table => print_table(
            vec!["#", "SIZE", "HEX", "PAYLOAD"],
            vec![
                index.to_string(),
                payload.len().to_string(),
                hex_string(payload),
                payload_preview(payload),
            ],
        ),
        OutputFormat::Pretty => {
            println!(
                "frame #{index} ({} bytes): {}",
                payload.len(),
                hex_string(payload)
            );
        }
        OutputFormat::Raw => print_raw(payload),
    }
}

pub fn print_drop(reason: DropReason, format: OutputFormat) {
    let reason = reason.to_string();
    match format {
        OutputFormat::Json => print_json(&Event::Dropped { reason: &reason }),
        OutputFormat::Table => print_table(vec!["DROPPED"], vec![reason]),
        OutputFormat::Pretty => println!("dropped frame: {reason}"),
        // Raw output carries payload bytes only.
        OutputFormat::Raw => {}
    }
}

pub fn print_summary(stats: &DecoderStats, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&Event::Summary {
            frames: stats.frames_ready,
            dropped: stats.dropped(),
            too_short_for_crc: stats.too_short_for_crc,
            crc_mismatch: stats.crc_mismatch,
            frame_too_large: stats.frame_too_large,
            resyncs: stats.resyncs,
        }),
        OutputFormat::Table => print_table(
            vec!["FRAMES", "TOO SHORT", "CRC MISMATCH", "TOO LARGE", "RESYNCS"],
            vec![
                stats.frames_ready.to_string(),
                stats.too_short_for_crc.to_string(),
                stats.crc_mismatch.to_string(),
                stats.frame_too_large.to_string(),
                stats.resyncs.to_string(),
            ],
        ),
        OutputFormat::Pretty => println!(
            "frames={} dropped={} resyncs={}",
            stats.frames_ready,
            stats.dropped(),
            stats.resyncs
        ),
        OutputFormat::Raw => {}
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

pub fn hex_string(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(" ")
}

fn payload_preview(payload: &[u8]) -> String {
    match std::str::from_utf8(payload) {
        Ok(text) => text.to_string(),
        Err(_) => format!("<binary {} bytes>", payload.len()),
    }
}
