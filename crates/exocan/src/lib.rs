//! CAN-style messaging over serial and TCP links.
//!
//! exocan carries 11-bit-identifier messages with up to 8 data bytes as
//! fixed 13-byte frames guarded by a start marker and a CRC-16. A background
//! synchronizer recovers frame boundaries from the raw byte stream, so a
//! receiver survives line noise and joining a link mid-frame.
//!
//! # Crate Structure
//!
//! - [`transport`] — Serial and TCP links behind one `Transport` trait
//! - [`frame`] — Wire format, CRC, message model, stream synchronizer
//! - [`bus`] — `ExoBus`: background receive thread, bounded queue, send path
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use exocan::bus::{BusConfig, ExoBus};
//! use exocan::frame::Message;
//!
//! let bus = ExoBus::open(BusConfig::new("tcp://127.0.0.1:8082"))?;
//! bus.send(&Message::new(0x123, vec![0x01, 0x02]), None)?;
//! if let Some(message) = bus.recv(Some(Duration::from_secs(1)))? {
//!     println!("{message}");
//! }
//! # Ok::<(), exocan::bus::BusError>(())
//! ```

/// Re-export transport types.
pub mod transport {
    pub use exocan_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use exocan_frame::*;
}

/// Re-export bus types.
pub mod bus {
    pub use exocan_bus::*;
}

pub use exocan_bus::{BusConfig, BusError, ExoBus};
pub use exocan_frame::Message;
