use std::io::{ErrorKind, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serialport::{ClearBuffer, FlowControl, SerialPort};
use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::traits::{fold_read_error, Transport};

/// Configuration for serial links.
#[derive(Debug, Clone)]
pub struct SerialConfig {
    /// Baud rate in bit/s. Some adapters ignore it.
    pub baudrate: u32,
    /// Read timeout; bounds how long a stop request can go unnoticed.
    pub timeout: Duration,
    /// Hardware RTS/CTS handshake.
    pub rtscts: bool,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            baudrate: 115_200,
            timeout: Duration::from_millis(100),
            rtscts: false,
        }
    }
}

/// Serial device transport (`/dev/ttyUSB0`, `COM3`, ...).
pub struct SerialTransport {
    /// `None` once closed; dropping the handle releases the device.
    port: Option<Box<dyn SerialPort>>,
    channel: String,
    open: Arc<AtomicBool>,
}

impl SerialTransport {
    /// Open a serial device with default configuration.
    pub fn open(channel: &str) -> Result<Self> {
        Self::open_with_config(channel, &SerialConfig::default())
    }

    /// Open a serial device with explicit configuration.
    pub fn open_with_config(channel: &str, config: &SerialConfig) -> Result<Self> {
        if channel.is_empty() {
            return Err(TransportError::InvalidChannel(
                "must specify a serial port".to_string(),
            ));
        }

        let flow = if config.rtscts {
            FlowControl::Hardware
        } else {
            FlowControl::None
        };
        let mut builder = serialport::new(channel, config.baudrate)
            .timeout(config.timeout)
            .flow_control(flow);
        #[cfg(unix)]
        {
            builder = builder
                .data_bits(serialport::DataBits::Eight)
                .stop_bits(serialport::StopBits::One)
                .parity(serialport::Parity::None);
        }

        let port = builder.open().map_err(|e| TransportError::Open {
            channel: channel.to_string(),
            message: e.to_string(),
        })?;

        info!(channel, baudrate = config.baudrate, "opened serial device");
        Ok(Self::from_port(port, channel))
    }

    /// Wrap an already opened port.
    pub fn from_port(port: Box<dyn SerialPort>, channel: &str) -> Self {
        Self {
            port: Some(port),
            channel: channel.to_string(),
            open: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Device path this transport was opened on.
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// The live port, or `Closed` once this transport or a clone was closed.
    fn port_mut(&mut self) -> Result<&mut Box<dyn SerialPort>> {
        if !self.open.load(Ordering::SeqCst) {
            self.port = None;
        }
        self.port.as_mut().ok_or(TransportError::Closed)
    }
}

fn serial_error(err: serialport::Error) -> TransportError {
    TransportError::Io(err.into())
}

impl Transport for SerialTransport {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        match self.port_mut()?.read(buf) {
            Ok(n) => Ok(n),
            Err(err) => {
                let folded = fold_read_error(err);
                if matches!(folded, Err(TransportError::Closed)) {
                    self.open.store(false, Ordering::SeqCst);
                }
                folded
            }
        }
    }

    fn write_all(&mut self, data: &[u8]) -> Result<()> {
        let port = self.port_mut()?;
        port.write_all(data)?;
        match port.flush() {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::Interrupted => Ok(()),
            Err(err) => Err(TransportError::Io(err)),
        }
    }

    fn is_open(&self) -> bool {
        self.port.is_some() && self.open.load(Ordering::SeqCst)
    }

    fn reset_buffers(&mut self) -> Result<()> {
        debug!(channel = %self.channel, "clearing serial input/output buffers");
        self.port_mut()?
            .clear(ClearBuffer::All)
            .map_err(serial_error)
    }

    fn try_clone_box(&self) -> Result<Box<dyn Transport>> {
        let port = self
            .port
            .as_ref()
            .filter(|_| self.open.load(Ordering::SeqCst))
            .ok_or(TransportError::Closed)?
            .try_clone()
            .map_err(serial_error)?;
        Ok(Box::new(Self {
            port: Some(port),
            channel: self.channel.clone(),
            open: Arc::clone(&self.open),
        }))
    }

    fn close(&mut self) -> Result<()> {
        if self.open.swap(false, Ordering::SeqCst) {
            debug!(channel = %self.channel, "closing serial transport");
        }
        self.port = None;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "serial"
    }
}

impl std::fmt::Debug for SerialTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialTransport")
            .field("channel", &self.channel)
            .field("open", &self.is_open())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_channel_rejected() {
        let result = SerialTransport::open("");
        assert!(matches!(result, Err(TransportError::InvalidChannel(_))));
    }

    #[test]
    fn test_missing_device_reports_open_error() {
        let result = SerialTransport::open("/dev/exocan-does-not-exist");
        match result {
            Err(TransportError::Open { channel, .. }) => {
                assert_eq!(channel, "/dev/exocan-does-not-exist");
            }
            other => panic!("expected open error, got {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_close_drops_port_handle() {
        let (master, _slave) = serialport::TTYPort::pair().expect("pty pair should open");
        let mut transport = SerialTransport::from_port(Box::new(master), "pty");
        let mut reader = transport.try_clone_box().expect("clone should succeed");

        transport.write_all(b"x").expect("write before close");
        transport.close().expect("close should succeed");

        assert!(transport.port.is_none());
        assert!(!transport.is_open());
        assert!(matches!(
            transport.write_all(b"x"),
            Err(TransportError::Closed)
        ));
        assert!(matches!(
            transport.try_clone_box(),
            Err(TransportError::Closed)
        ));

        let mut buf = [0u8; 4];
        assert!(!reader.is_open());
        assert!(matches!(reader.read(&mut buf), Err(TransportError::Closed)));
    }

    #[test]
    fn test_default_config_matches_device_defaults() {
        let cfg = SerialConfig::default();
        assert_eq!(cfg.baudrate, 115_200);
        assert_eq!(cfg.timeout, Duration::from_millis(100));
        assert!(!cfg.rtscts);
    }
}
