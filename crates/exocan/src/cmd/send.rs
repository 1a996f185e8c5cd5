use exocan_bus::ExoBus;

use crate::cmd::{parse_duration, SendArgs};
use crate::exit::{bus_error, CliError, CliResult, SUCCESS, TIMEOUT};
use crate::output::{print_message, OutputFormat};

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let message = args.message.message()?;
    let wait_timeout = parse_duration(&args.wait_timeout)?;

    let config = args
        .bus
        .config()
        .with_payload_policy(args.message.payload_policy());
    let bus = ExoBus::open(config).map_err(|err| bus_error("open failed", err))?;

    bus.send(&message, Some(wait_timeout))
        .map_err(|err| bus_error("send failed", err))?;
    tracing::info!(%message, channel = bus.channel_info(), "sent");

    if args.wait {
        let reply = bus
            .recv(Some(wait_timeout))
            .map_err(|err| bus_error("receive failed", err))?
            .ok_or_else(|| {
                CliError::new(TIMEOUT, format!("no reply within {}", args.wait_timeout))
            })?;
        print_message(&reply, &args.bus.channel, format);
    }

    bus.shutdown().map_err(|err| bus_error("close failed", err))?;
    Ok(SUCCESS)
}
