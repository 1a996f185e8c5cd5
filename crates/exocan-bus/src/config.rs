use std::net::SocketAddr;
use std::time::Duration;

use exocan_frame::PayloadPolicy;

use crate::queue::DEFAULT_QUEUE_CAPACITY;

/// Serial line rate used when none is configured.
pub const DEFAULT_BAUDRATE: u32 = 115_200;

/// Upper bound on a single transport read, and so on shutdown latency.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(100);

/// Configuration for [`ExoBus`](crate::ExoBus).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusConfig {
    /// Channel string, e.g. `/dev/ttyUSB0` or `tcp://127.0.0.1:8082`.
    pub channel: String,
    pub baudrate: u32,
    pub read_timeout: Duration,
    /// Hardware flow control on serial links.
    pub rtscts: bool,
    pub queue_capacity: usize,
    /// What `send` does with payloads longer than 8 bytes.
    pub payload_policy: PayloadPolicy,
    /// UDP address receiving a copy of every frame.
    pub mirror: Option<SocketAddr>,
}

impl BusConfig {
    /// Default configuration for `channel`.
    pub fn new(channel: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            ..Self::default()
        }
    }

    pub fn with_baudrate(mut self, baudrate: u32) -> Self {
        self.baudrate = baudrate;
        self
    }

    pub fn with_read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = read_timeout;
        self
    }

    pub fn with_rtscts(mut self, rtscts: bool) -> Self {
        self.rtscts = rtscts;
        self
    }

    pub fn with_queue_capacity(mut self, queue_capacity: usize) -> Self {
        self.queue_capacity = queue_capacity;
        self
    }

    pub fn with_payload_policy(mut self, payload_policy: PayloadPolicy) -> Self {
        self.payload_policy = payload_policy;
        self
    }

    pub fn with_mirror(mut self, mirror: Option<SocketAddr>) -> Self {
        self.mirror = mirror;
        self
    }
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            channel: String::new(),
            baudrate: DEFAULT_BAUDRATE,
            read_timeout: DEFAULT_READ_TIMEOUT,
            rtscts: false,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            payload_policy: PayloadPolicy::Reject,
            mirror: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = BusConfig::new("/dev/ttyUSB0");
        assert_eq!(cfg.channel, "/dev/ttyUSB0");
        assert_eq!(cfg.baudrate, 115_200);
        assert_eq!(cfg.read_timeout, Duration::from_millis(100));
        assert!(!cfg.rtscts);
        assert_eq!(cfg.queue_capacity, 5);
        assert_eq!(cfg.payload_policy, PayloadPolicy::Reject);
        assert!(cfg.mirror.is_none());
    }

    #[test]
    fn builders_override() {
        let mirror: SocketAddr = "127.0.0.1:9000".parse().expect("addr should parse");
        let cfg = BusConfig::new("tcp://127.0.0.1:8082")
            .with_baudrate(9_600)
            .with_read_timeout(Duration::from_millis(20))
            .with_rtscts(true)
            .with_queue_capacity(16)
            .with_payload_policy(PayloadPolicy::Truncate)
            .with_mirror(Some(mirror));

        assert_eq!(cfg.baudrate, 9_600);
        assert_eq!(cfg.read_timeout, Duration::from_millis(20));
        assert!(cfg.rtscts);
        assert_eq!(cfg.queue_capacity, 16);
        assert_eq!(cfg.payload_policy, PayloadPolicy::Truncate);
        assert_eq!(cfg.mirror, Some(mirror));
    }
}
