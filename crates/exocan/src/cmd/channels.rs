use exocan_bus::ExoBus;

use crate::cmd::ChannelsArgs;
use crate::exit::{CliResult, SUCCESS};
use crate::output::{print_channels, OutputFormat};

pub fn run(_args: ChannelsArgs, format: OutputFormat) -> CliResult<i32> {
    let channels = ExoBus::detect_available_channels();
    tracing::debug!(count = channels.len(), "enumerated channels");
    print_channels(&channels, format);
    Ok(SUCCESS)
}
