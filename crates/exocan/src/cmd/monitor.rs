use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use exocan_bus::ExoBus;

use crate::cmd::{parse_duration, parse_id, MonitorArgs};
use crate::exit::{bus_error, CliError, CliResult, INTERNAL, SUCCESS, TIMEOUT, TRANSPORT_ERROR};
use crate::output::{print_message, OutputFormat};

/// How often the receive loop rechecks Ctrl-C and the idle timeout.
const POLL_INTERVAL: Duration = Duration::from_millis(200);

pub fn run(args: MonitorArgs, format: OutputFormat) -> CliResult<i32> {
    let ids = args
        .ids
        .as_deref()
        .map(|ids| ids.iter().map(|id| parse_id(id)).collect::<CliResult<Vec<u16>>>())
        .transpose()?;
    let idle_timeout = args.idle_timeout.as_deref().map(parse_duration).transpose()?;

    let bus = ExoBus::open(args.bus.config()).map_err(|err| bus_error("open failed", err))?;
    tracing::info!(channel = bus.channel_info(), "monitoring");

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let mut printed = 0usize;
    let mut last_activity = Instant::now();
    let mut outcome = Ok(SUCCESS);

    while running.load(Ordering::SeqCst) {
        let message = match bus.recv(Some(POLL_INTERVAL)) {
            Ok(Some(message)) => message,
            Ok(None) => {
                if !bus.is_open() {
                    outcome = Err(CliError::new(TRANSPORT_ERROR, "channel closed"));
                    break;
                }
                if let Some(limit) = idle_timeout {
                    if last_activity.elapsed() >= limit {
                        outcome = Err(CliError::new(
                            TIMEOUT,
                            format!("no messages for {}ms", limit.as_millis()),
                        ));
                        break;
                    }
                }
                continue;
            }
            Err(err) => {
                outcome = Err(bus_error("receive failed", err));
                break;
            }
        };
        last_activity = Instant::now();

        if let Some(ids) = &ids {
            if !ids.contains(&message.id) {
                continue;
            }
        }

        print_message(&message, &args.bus.channel, format);
        printed = printed.saturating_add(1);

        if args.count.is_some_and(|count| printed >= count) {
            break;
        }
    }

    let stats = bus.stats();
    tracing::info!(
        printed,
        frames = stats.frames,
        rejected = stats.rejected,
        bytes_shed = stats.bytes_shed,
        "monitor stopped"
    );
    if let Err(err) = bus.shutdown() {
        tracing::debug!(error = %err, "error closing channel");
    }
    outcome
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
