use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use spiframe_frame::{FrameEvent, FrameReader};
use spiframe_transport::DuplexStream;

use crate::cmd::ListenArgs;
use crate::exit::{frame_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_drop, print_frame, print_summary, OutputFormat};

pub fn run(args: ListenArgs, format: OutputFormat) -> CliResult<i32> {
    if args.poll_bytes == 0 {
        return Err(CliError::new(USAGE, "--poll-bytes must be greater than zero"));
    }
    let config = args.framing.to_config()?;
    args.bus.check_fill(&config)?;

    let bus = args.bus.open()?;
    let stream = DuplexStream::new(bus).with_fill_byte(args.bus.fill);
    let mut reader = FrameReader::with_config(stream, config);

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let mut printed = 0usize;
    while running.load(Ordering::SeqCst) {
        if args.count.is_some_and(|count| printed >= count) {
            break;
        }
        let event = reader
            .next_event_within(args.poll_bytes)
            .map_err(|err| frame_error("receive failed", err))?;

        match event {
            Some(FrameEvent::Frame(payload)) => {
                print_frame(&payload, printed, format);
                printed = printed.saturating_add(1);
            }
            Some(FrameEvent::Dropped(reason)) => {
                tracing::debug!(%reason, "frame dropped");
                if args.show_drops {
                    print_drop(reason, format);
                }
            }
            None => {}
        }
    }

    let stats = reader.decoder().stats();
    tracing::info!(
        frames = stats.frames_ready,
        dropped = stats.dropped(),
        "listener stopped"
    );
    if args.show_drops {
        print_summary(&stats, format);
    }

    Ok(SUCCESS)
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| {
        CliError::new(
            crate::exit::INTERNAL,
            format!("signal handler setup failed: {err}"),
        )
    })
}
