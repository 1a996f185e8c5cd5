//! Byte-stream transports for the exocan wire protocol.
//!
//! Provides a single [`Transport`] abstraction over the links an exocan bus
//! can run on:
//! - Serial devices such as RS-485 adapters (feature `serial`)
//! - TCP sockets, typically a bridge or simulator on localhost
//!
//! This is the lowest layer of exocan. The frame synchronizer and the bus
//! adapter only ever see a [`Transport`].

pub mod channel;
pub mod error;
pub mod tcp;
pub mod traits;

#[cfg(feature = "serial")]
pub mod serial;

pub use channel::{detect_available_channels, open_channel, ChannelInfo, ChannelSpec};
pub use error::{Result, TransportError};
pub use tcp::{TcpConfig, TcpTransport};
pub use traits::Transport;

#[cfg(feature = "serial")]
pub use serial::{SerialConfig, SerialTransport};
