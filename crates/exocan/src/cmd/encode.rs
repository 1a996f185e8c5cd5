use exocan_frame::encode_message;

use crate::cmd::EncodeArgs;
use crate::exit::{frame_error, CliResult, SUCCESS};
use crate::output::{print_frame, OutputFormat};

pub fn run(args: EncodeArgs, format: OutputFormat) -> CliResult<i32> {
    let message = args.message.message()?;
    let frame = encode_message(&message, args.message.payload_policy())
        .map_err(|err| frame_error("encode failed", err))?;
    if message.data.len() > frame.data_len() {
        tracing::warn!(
            len = message.data.len(),
            kept = frame.data_len(),
            "payload truncated"
        );
    }
    print_frame(&frame, format);
    Ok(SUCCESS)
}
