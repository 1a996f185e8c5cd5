//! Channel strings and channel discovery.
//!
//! A channel names the link a bus runs on:
//! - `tcp://127.0.0.1:8082` or `socket://127.0.0.1:8082` for a TCP bridge
//! - `serial:///dev/ttyUSB0` or a bare device path (`/dev/ttyUSB0`, `COM3`)

use std::fmt;
use std::str::FromStr;

use tracing::warn;

#[cfg(feature = "serial")]
use crate::serial::{SerialConfig, SerialTransport};
use crate::error::{Result, TransportError};
use crate::tcp::{TcpConfig, TcpTransport};
use crate::traits::Transport;

/// Parsed channel string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelSpec {
    /// Serial device path.
    Serial(String),
    /// TCP `host:port`.
    Tcp(String),
}

impl ChannelSpec {
    /// Parse a channel string.
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();
        if input.is_empty() {
            return Err(TransportError::InvalidChannel(
                "channel must not be empty".to_string(),
            ));
        }

        for scheme in ["tcp://", "socket://"] {
            if let Some(addr) = input.strip_prefix(scheme) {
                if !addr.contains(':') {
                    return Err(TransportError::InvalidChannel(format!(
                        "{input}: expected host:port"
                    )));
                }
                return Ok(Self::Tcp(addr.to_string()));
            }
        }

        if let Some(path) = input.strip_prefix("serial://") {
            if path.is_empty() {
                return Err(TransportError::InvalidChannel(format!(
                    "{input}: missing device path"
                )));
            }
            return Ok(Self::Serial(path.to_string()));
        }

        if input.contains("://") {
            return Err(TransportError::InvalidChannel(format!(
                "{input}: unknown scheme"
            )));
        }

        Ok(Self::Serial(input.to_string()))
    }

    /// Human-readable description used as the bus channel info.
    pub fn describe(&self) -> String {
        match self {
            Self::Serial(path) => format!("ExoSerial interface: {path}"),
            Self::Tcp(addr) => format!("ExoSocket interface: {addr}"),
        }
    }
}

impl FromStr for ChannelSpec {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for ChannelSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Serial(path) => write!(f, "serial://{path}"),
            Self::Tcp(addr) => write!(f, "tcp://{addr}"),
        }
    }
}

/// Open the transport named by `spec`.
///
/// `baudrate`, `read_timeout` and `rtscts` apply to serial links; TCP links
/// take the read timeout and ignore the rest.
#[cfg_attr(not(feature = "serial"), allow(unused_variables))]
pub fn open_channel(
    spec: &ChannelSpec,
    baudrate: u32,
    read_timeout: std::time::Duration,
    rtscts: bool,
) -> Result<Box<dyn Transport>> {
    match spec {
        ChannelSpec::Tcp(addr) => {
            let config = TcpConfig {
                read_timeout: Some(read_timeout),
                ..TcpConfig::default()
            };
            Ok(Box::new(TcpTransport::connect_with_config(addr, &config)?))
        }
        #[cfg(feature = "serial")]
        ChannelSpec::Serial(path) => {
            let config = SerialConfig {
                baudrate,
                timeout: read_timeout,
                rtscts,
            };
            Ok(Box::new(SerialTransport::open_with_config(path, &config)?))
        }
        #[cfg(not(feature = "serial"))]
        ChannelSpec::Serial(path) => Err(TransportError::Unsupported(format!(
            "{path}: serial support not compiled in"
        ))),
    }
}

/// An available channel reported by [`detect_available_channels`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelInfo {
    /// Interface kind (`"serial"`).
    pub interface: &'static str,
    /// Channel string accepted by [`ChannelSpec::parse`].
    pub channel: String,
}

/// List channels that can be opened on this machine.
///
/// Only serial ports can be enumerated; TCP bridges must be named explicitly.
/// Enumeration failures are logged and yield an empty list.
pub fn detect_available_channels() -> Vec<ChannelInfo> {
    #[cfg(feature = "serial")]
    {
        match serialport::available_ports() {
            Ok(ports) => ports
                .into_iter()
                .map(|port| ChannelInfo {
                    interface: "serial",
                    channel: port.port_name,
                })
                .collect(),
            Err(err) => {
                warn!(error = %err, "serial port enumeration failed");
                Vec::new()
            }
        }
    }

    #[cfg(not(feature = "serial"))]
    {
        warn!("serial support not compiled in; no channels to enumerate");
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tcp_schemes() {
        assert_eq!(
            ChannelSpec::parse("tcp://127.0.0.1:8082").unwrap(),
            ChannelSpec::Tcp("127.0.0.1:8082".to_string())
        );
        assert_eq!(
            ChannelSpec::parse("socket://localhost:4000").unwrap(),
            ChannelSpec::Tcp("localhost:4000".to_string())
        );
    }

    #[test]
    fn parses_serial_paths() {
        assert_eq!(
            ChannelSpec::parse("/dev/ttyUSB0").unwrap(),
            ChannelSpec::Serial("/dev/ttyUSB0".to_string())
        );
        assert_eq!(
            ChannelSpec::parse("serial://COM3").unwrap(),
            ChannelSpec::Serial("COM3".to_string())
        );
    }

    #[test]
    fn rejects_bad_channels() {
        for input in ["", "   ", "tcp://nohost", "serial://", "udp://1.2.3.4:5"] {
            assert!(
                matches!(
                    ChannelSpec::parse(input),
                    Err(TransportError::InvalidChannel(_))
                ),
                "{input:?} should be rejected"
            );
        }
    }

    #[test]
    fn display_round_trips() {
        for input in ["tcp://127.0.0.1:8082", "serial:///dev/ttyS1"] {
            let spec: ChannelSpec = input.parse().unwrap();
            assert_eq!(spec.to_string(), input);
        }
    }

    #[test]
    fn describe_matches_interface_kind() {
        let serial = ChannelSpec::Serial("/dev/ttyS1".to_string());
        assert_eq!(serial.describe(), "ExoSerial interface: /dev/ttyS1");
        let tcp = ChannelSpec::Tcp("127.0.0.1:8082".to_string());
        assert_eq!(tcp.describe(), "ExoSocket interface: 127.0.0.1:8082");
    }

    #[test]
    fn open_tcp_channel() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let spec = ChannelSpec::Tcp(listener.local_addr().unwrap().to_string());
        let transport = open_channel(
            &spec,
            115_200,
            std::time::Duration::from_millis(50),
            false,
        )
        .unwrap();
        assert_eq!(transport.name(), "tcp");
        assert!(transport.is_open());
    }
}
