use spiframe_frame::encode;

use crate::cmd::EncodeArgs;
use crate::exit::{encode_error, CliResult, SUCCESS};
use crate::output::{print_encoded, OutputFormat};

pub fn run(args: EncodeArgs, format: OutputFormat) -> CliResult<i32> {
    let config = args.framing.to_config()?;
    let payload = args.payload.resolve()?;

    let frame = encode(&payload, &config.params).map_err(|err| encode_error("encode failed", err))?;
    tracing::debug!(payload = payload.len(), frame = frame.len(), "encoded frame");
    print_encoded(&frame, payload.len(), format);

    Ok(SUCCESS)
}
