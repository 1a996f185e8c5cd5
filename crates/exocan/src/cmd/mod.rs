use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand};
use exocan_bus::{BusConfig, DEFAULT_BAUDRATE};
use exocan_frame::{Message, PayloadPolicy, MAX_ID};

use crate::exit::{CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod channels;
pub mod decode;
pub mod encode;
pub mod monitor;
pub mod send;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List channels that can be opened on this machine.
    Channels(ChannelsArgs),
    /// Print messages received on a channel.
    Monitor(MonitorArgs),
    /// Send a single message.
    Send(SendArgs),
    /// Encode a message into a wire frame without opening a channel.
    Encode(EncodeArgs),
    /// Decode a capture of raw wire bytes.
    Decode(DecodeArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Channels(args) => channels::run(args, format),
        Command::Monitor(args) => monitor::run(args, format),
        Command::Send(args) => send::run(args, format),
        Command::Encode(args) => encode::run(args, format),
        Command::Decode(args) => decode::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

/// Options shared by commands that open a bus.
#[derive(Args, Debug)]
pub struct BusArgs {
    /// Channel to open (`/dev/ttyUSB0`, `serial:///dev/ttyUSB0`, `tcp://host:port`).
    #[arg(env = "EXOCAN_CHANNEL")]
    pub channel: String,
    /// Serial baud rate.
    #[arg(long, env = "EXOCAN_BAUDRATE", default_value_t = DEFAULT_BAUDRATE)]
    pub baudrate: u32,
    /// Enable RTS/CTS hardware flow control.
    #[arg(long)]
    pub rtscts: bool,
    /// Mirror every frame to this UDP address (e.g. 127.0.0.1:9999).
    #[arg(long, env = "EXOCAN_MIRROR", value_name = "ADDR")]
    pub mirror: Option<SocketAddr>,
}

impl BusArgs {
    pub fn config(&self) -> BusConfig {
        BusConfig::new(self.channel.clone())
            .with_baudrate(self.baudrate)
            .with_rtscts(self.rtscts)
            .with_mirror(self.mirror)
    }
}

/// Message fields given on the command line.
#[derive(Args, Debug)]
pub struct MessageArgs {
    /// Identifier, decimal or 0x-prefixed hex (max 0x7FF).
    #[arg(long)]
    pub id: String,
    /// Payload as hex (`0102ff`, `01 02 ff` or `01:02:ff`).
    #[arg(long, default_value = "")]
    pub data: String,
    /// Mark as a remote frame.
    #[arg(long)]
    pub remote: bool,
    /// Mark as an extended frame.
    #[arg(long)]
    pub extended: bool,
    /// Keep the first 8 bytes of a longer payload instead of failing.
    #[arg(long)]
    pub truncate: bool,
}

impl MessageArgs {
    pub fn message(&self) -> CliResult<Message> {
        Ok(Message::new(parse_id(&self.id)?, parse_hex(&self.data)?)
            .with_remote(self.remote)
            .with_extended(self.extended))
    }

    pub fn payload_policy(&self) -> PayloadPolicy {
        if self.truncate {
            PayloadPolicy::Truncate
        } else {
            PayloadPolicy::Reject
        }
    }
}

#[derive(Args, Debug, Default)]
pub struct ChannelsArgs {}

#[derive(Args, Debug)]
pub struct MonitorArgs {
    #[command(flatten)]
    pub bus: BusArgs,
    /// Only print these identifiers (comma-separated).
    #[arg(long, value_delimiter = ',')]
    pub ids: Option<Vec<String>>,
    /// Exit after printing N messages.
    #[arg(long)]
    pub count: Option<usize>,
    /// Fail with exit code 124 when nothing arrives for this long (e.g. 5s, 500ms).
    #[arg(long)]
    pub idle_timeout: Option<String>,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    #[command(flatten)]
    pub bus: BusArgs,
    #[command(flatten)]
    pub message: MessageArgs,
    /// Wait for one message after sending and print it.
    #[arg(long)]
    pub wait: bool,
    /// Maximum time to wait for a reply when --wait is set (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub wait_timeout: String,
}

#[derive(Args, Debug)]
pub struct EncodeArgs {
    #[command(flatten)]
    pub message: MessageArgs,
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Capture file of raw wire bytes. Reads stdin when omitted or `-`.
    #[arg(conflicts_with = "hex")]
    pub input: Option<PathBuf>,
    /// Decode hex text given inline instead of a capture file.
    #[arg(long)]
    pub hex: Option<String>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Parse an identifier: decimal or `0x` hex, at most 11 bits.
pub fn parse_id(input: &str) -> CliResult<u16> {
    let input = input.trim();
    let parsed = match input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
    {
        Some(digits) => u16::from_str_radix(digits, 16),
        None => input.parse::<u16>(),
    };
    let id = parsed.map_err(|_| CliError::new(USAGE, format!("invalid identifier: {input}")))?;
    if id > MAX_ID {
        return Err(CliError::new(
            crate::exit::DATA_INVALID,
            format!("identifier 0x{id:x} exceeds 0x{MAX_ID:x}"),
        ));
    }
    Ok(id)
}

/// Parse hex bytes, ignoring whitespace, `:` and `-` separators.
pub fn parse_hex(input: &str) -> CliResult<Vec<u8>> {
    let digits: String = input
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ':' && *c != '-')
        .collect();
    if !digits.is_ascii() {
        return Err(CliError::new(USAGE, format!("invalid hex input: {input}")));
    }
    if digits.len() % 2 != 0 {
        return Err(CliError::new(
            USAGE,
            format!("hex input has an odd number of digits: {input}"),
        ));
    }

    (0..digits.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&digits[i..i + 2], 16)
                .map_err(|_| CliError::new(USAGE, format!("invalid hex input: {input}")))
        })
        .collect()
}

/// Parse `500ms`, `2s` or a bare number of seconds.
pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;
    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exit::DATA_INVALID;

    #[test]
    fn parse_id_accepts_decimal_and_hex() {
        assert_eq!(parse_id("291").unwrap(), 0x123);
        assert_eq!(parse_id("0x622").unwrap(), 0x622);
        assert_eq!(parse_id("0X7FF").unwrap(), 0x7FF);
    }

    #[test]
    fn parse_id_rejects_out_of_range_and_garbage() {
        assert_eq!(parse_id("0x800").unwrap_err().code, DATA_INVALID);
        assert_eq!(parse_id("abc").unwrap_err().code, USAGE);
        assert_eq!(parse_id("70000").unwrap_err().code, USAGE);
    }

    #[test]
    fn parse_hex_separators() {
        assert_eq!(parse_hex("0102ff").unwrap(), vec![1, 2, 0xFF]);
        assert_eq!(parse_hex("01 02 FF").unwrap(), vec![1, 2, 0xFF]);
        assert_eq!(parse_hex("01:02-ff").unwrap(), vec![1, 2, 0xFF]);
        assert!(parse_hex("").unwrap().is_empty());
    }

    #[test]
    fn parse_hex_rejects_bad_input() {
        assert_eq!(parse_hex("123").unwrap_err().code, USAGE);
        assert_eq!(parse_hex("zz").unwrap_err().code, USAGE);
    }

    #[test]
    fn parse_duration_seconds_and_millis() {
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
        assert_eq!(parse_duration("3").unwrap(), Duration::from_secs(3));
    }

    #[test]
    fn parse_duration_rejects_invalid_values() {
        assert!(parse_duration("0s").is_err());
        assert!(parse_duration("bad").is_err());
        assert!(parse_duration("").is_err());
    }
}
