//! Bus adapter for exocan links.
//!
//! [`ExoBus`] owns one transport, a background thread that turns the raw
//! byte stream into validated frames, and a small bounded queue between
//! that thread and callers of [`ExoBus::recv`]. Corrupted or misaligned
//! bytes are resynchronized away inside the thread and never reach callers.

pub mod bus;
pub mod config;
pub mod error;
pub mod mirror;
pub mod queue;
pub mod synchronizer;

pub use bus::{ExoBus, MIN_WRITE_TIMEOUT};
pub use config::{BusConfig, DEFAULT_BAUDRATE, DEFAULT_READ_TIMEOUT};
pub use error::{BusError, Result};
pub use mirror::{DiagnosticMirror, TAG_REJECTED, TAG_RX, TAG_TX};
pub use queue::{DeliveryQueue, PushError, DEFAULT_QUEUE_CAPACITY};
pub use synchronizer::{BusStats, Synchronizer};

pub use exocan_transport::{detect_available_channels, ChannelInfo};
