use spiframe_frame::{FrameDecoder, PushResult};

use crate::cmd::DecodeArgs;
use crate::exit::{CliResult, SUCCESS};
use crate::output::{print_drop, print_frame, print_summary, OutputFormat};

pub fn run(args: DecodeArgs, format: OutputFormat) -> CliResult<i32> {
    let config = args.framing.to_config()?;
    let stream = args.stream()?;

    let mut decoder = FrameDecoder::with_config(config);
    let mut index = 0usize;
    for result in decoder.push_slice(&stream) {
        match result {
            PushResult::FrameReady(payload) => {
                print_frame(&payload, index, format);
                index += 1;
            }
            PushResult::FrameDropped(reason) => print_drop(reason, format),
            PushResult::Continue => {}
        }
    }

    if decoder.is_in_frame() {
        tracing::warn!(
            buffered = decoder.buffered_len(),
            "stream ended inside an unterminated frame"
        );
    }

    let stats = decoder.stats();
    tracing::info!(
        frames = stats.frames_ready,
        dropped = stats.dropped(),
        resyncs = stats.resyncs,
        "decode complete"
    );
    if args.summary {
        print_summary(&stats, format);
    }

    Ok(SUCCESS)
}
