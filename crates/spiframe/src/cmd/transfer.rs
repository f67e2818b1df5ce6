use spiframe_frame::{encode, FrameReader, FrameWriter};
use spiframe_transport::DuplexStream;

use crate::cmd::TransferArgs;
use crate::exit::{encode_error, frame_error, CliResult, FAILURE, SUCCESS};
use crate::output::{print_encoded, print_frame, OutputFormat};

pub fn run(args: TransferArgs, format: OutputFormat) -> CliResult<i32> {
    let config = args.framing.to_config()?;
    args.bus.check_fill(&config)?;
    let payload = args.payload.resolve()?;
    let frame =
        encode(&payload, &config.params).map_err(|err| encode_error("encode failed", err))?;

    let bus = args.bus.open()?;
    let stream = DuplexStream::new(bus).with_fill_byte(args.bus.fill);
    let mut writer = FrameWriter::with_config(stream, config.clone());
    writer
        .send(&payload)
        .map_err(|err| frame_error("send failed", err))?;
    print_encoded(&frame, payload.len(), format);

    // Bytes clocked in while sending are already buffered; count them too.
    let budget = frame.len().saturating_add(args.poll_bytes);
    let mut reader = FrameReader::with_config(writer.into_inner(), config);
    let received = reader
        .read_frame_within(budget)
        .map_err(|err| frame_error("receive failed", err))?;

    match received {
        Some(payload) => {
            print_frame(&payload, 0, format);
            Ok(SUCCESS)
        }
        None => {
            let stats = reader.decoder().stats();
            tracing::warn!(
                budget,
                dropped = stats.dropped(),
                "no complete frame received in polling window"
            );
            Ok(FAILURE)
        }
    }
}
