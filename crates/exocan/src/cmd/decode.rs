use std::fs::File;
use std::io::{Cursor, Read};

use exocan_frame::{FrameError, FrameReader};

use crate::cmd::{parse_hex, DecodeArgs};
use crate::exit::{frame_error, io_error, CliError, CliResult, DATA_INVALID, SUCCESS};
use crate::output::{print_message, OutputFormat};

pub fn run(args: DecodeArgs, format: OutputFormat) -> CliResult<i32> {
    let (source, input): (String, Box<dyn Read>) = match (&args.hex, &args.input) {
        (Some(text), _) => {
            let bytes = parse_hex(text)?;
            ("hex".to_string(), Box::new(Cursor::new(bytes)) as Box<dyn Read>)
        }
        (None, Some(path)) if path.as_os_str() != "-" => {
            let file = File::open(path)
                .map_err(|err| io_error(&format!("failed opening {}", path.display()), err))?;
            (path.display().to_string(), Box::new(file) as Box<dyn Read>)
        }
        (None, _) => {
            let stdin = std::io::stdin().lock();
            ("stdin".to_string(), Box::new(stdin) as Box<dyn Read>)
        }
    };

    let mut reader = FrameReader::new(input);
    let mut decoded = 0usize;
    loop {
        match reader.read_message() {
            Ok(message) => {
                print_message(&message, &source, format);
                decoded += 1;
            }
            Err(FrameError::ConnectionClosed) => break,
            Err(err) => return Err(frame_error("decode failed", err)),
        }
    }

    let stats = reader.stats();
    tracing::info!(
        frames = stats.frames,
        rejected = stats.rejected,
        bytes_shed = stats.bytes_shed,
        "capture decoded"
    );

    if decoded == 0 && stats.bytes_in > 0 {
        return Err(CliError::new(
            DATA_INVALID,
            format!("no valid frames in {} bytes of {source}", stats.bytes_in),
        ));
    }
    Ok(SUCCESS)
}
