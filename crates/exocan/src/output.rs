use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use exocan_frame::message::hex;
use exocan_frame::{encode_message, Message, PayloadPolicy, RawFrame};
use exocan_transport::ChannelInfo;
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct MessageOutput<'a> {
    kind: &'static str,
    source: &'a str,
    id: u16,
    id_hex: String,
    remote: bool,
    extended: bool,
    dlc: usize,
    data: String,
    timestamp: Option<String>,
}

#[derive(Serialize)]
struct FrameOutput {
    kind: &'static str,
    id: u16,
    id_hex: String,
    remote: bool,
    extended: bool,
    dlc: u8,
    data: String,
    crc: String,
    frame: String,
}

#[derive(Serialize)]
struct ChannelOutput<'a> {
    interface: &'a str,
    channel: &'a str,
}

/// Print one received or decoded message. `source` names where it came from.
pub fn print_message(message: &Message, source: &str, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = MessageOutput {
                kind: "message",
                source,
                id: message.id,
                id_hex: format!("0x{:03x}", message.id),
                remote: message.is_remote,
                extended: message.is_extended,
                dlc: message.dlc(),
                data: hex(&message.data),
                timestamp: message.timestamp.map(unix_seconds),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["TIME", "SOURCE", "ID", "FLAGS", "DLC", "DATA"])
                .add_row(vec![
                    message.timestamp.map(unix_seconds).unwrap_or_default(),
                    source.to_string(),
                    format!("0x{:03x}", message.id),
                    flags(message),
                    message.dlc().to_string(),
                    hex(&message.data),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => match message.timestamp {
            Some(ts) => println!("{} {source} {message}", unix_seconds(ts)),
            None => println!("{source} {message}"),
        },
        OutputFormat::Raw => {
            if let Ok(frame) = encode_message(message, PayloadPolicy::Truncate) {
                print_raw(frame.as_bytes());
            }
        }
    }
}

/// Print an encoded frame.
pub fn print_frame(frame: &RawFrame, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = FrameOutput {
                kind: "frame",
                id: frame.id(),
                id_hex: format!("0x{:03x}", frame.id()),
                remote: frame.is_remote(),
                extended: frame.is_extended(),
                dlc: frame.dlc(),
                data: hex(frame.payload()),
                crc: format!("0x{:04x}", frame.stored_crc()),
                frame: hex(frame.as_bytes()),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["ID", "DLC", "DATA", "CRC", "FRAME"])
                .add_row(vec![
                    format!("0x{:03x}", frame.id()),
                    frame.dlc().to_string(),
                    hex(frame.payload()),
                    format!("0x{:04x}", frame.stored_crc()),
                    frame.to_string(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => println!("{frame}"),
        OutputFormat::Raw => print_raw(frame.as_bytes()),
    }
}

pub fn print_channels(channels: &[ChannelInfo], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out: Vec<ChannelOutput<'_>> = channels
                .iter()
                .map(|c| ChannelOutput {
                    interface: c.interface,
                    channel: &c.channel,
                })
                .collect();
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "[]".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["INTERFACE", "CHANNEL"]);
            for c in channels {
                table.add_row(vec![c.interface.to_string(), c.channel.clone()]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty | OutputFormat::Raw => {
            for c in channels {
                println!("{}\t{}", c.interface, c.channel);
            }
        }
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn flags(message: &Message) -> String {
    match (message.is_remote, message.is_extended) {
        (false, false) => "-".to_string(),
        (true, false) => "rtr".to_string(),
        (false, true) => "ide".to_string(),
        (true, true) => "rtr,ide".to_string(),
    }
}

fn unix_seconds(ts: SystemTime) -> String {
    ts.duration_since(UNIX_EPOCH)
        .map(|d| format!("{}.{:03}", d.as_secs(), d.subsec_millis()))
        .unwrap_or_else(|_| "0.000".to_string())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn flags_cover_all_combinations() {
        let base = Message::new(1, Vec::new());
        assert_eq!(flags(&base), "-");
        assert_eq!(flags(&base.clone().with_remote(true)), "rtr");
        assert_eq!(flags(&base.clone().with_extended(true)), "ide");
        assert_eq!(
            flags(&base.with_remote(true).with_extended(true)),
            "rtr,ide"
        );
    }

    #[test]
    fn unix_seconds_keeps_millis() {
        let ts = UNIX_EPOCH + Duration::from_millis(1_700_000_000_042);
        assert_eq!(unix_seconds(ts), "1700000000.042");
    }
}
