use std::fmt;
use std::time::SystemTime;

use bytes::Bytes;

/// A logical CAN message carried by one wire frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// 11-bit arbitration identifier (`0..=0x7FF`).
    pub id: u16,
    /// Remote transmission request.
    pub is_remote: bool,
    /// Identifier extension flag. Carried as a flag only; the wire format has
    /// room for 11 identifier bits.
    pub is_extended: bool,
    /// Payload, at most 8 bytes.
    pub data: Bytes,
    /// Receive time. The wire format carries no timestamp; the bus fills this
    /// in when a frame is decoded.
    pub timestamp: Option<SystemTime>,
}

impl Message {
    /// Create a data frame.
    pub fn new(id: u16, data: impl Into<Bytes>) -> Self {
        Self {
            id,
            is_remote: false,
            is_extended: false,
            data: data.into(),
            timestamp: None,
        }
    }

    /// Set the remote transmission request flag.
    pub fn with_remote(mut self, is_remote: bool) -> Self {
        self.is_remote = is_remote;
        self
    }

    /// Set the identifier extension flag.
    pub fn with_extended(mut self, is_extended: bool) -> Self {
        self.is_extended = is_extended;
        self
    }

    /// Attach a timestamp.
    pub fn with_timestamp(mut self, timestamp: SystemTime) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Data length code this message encodes to.
    pub fn dlc(&self) -> usize {
        self.data.len()
    }

    /// Compact one-line summary, e.g. `id:0x622 dl:8 d:0022020000000000`.
    pub fn summary(&self) -> String {
        format!(
            "id:0x{:03x} dl:{} d:{}",
            self.id,
            self.dlc(),
            hex(self.data.as_ref())
        )
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.summary())?;
        if self.is_remote {
            f.write_str(" rtr")?;
        }
        if self.is_extended {
            f.write_str(" ide")?;
        }
        Ok(())
    }
}

/// Lowercase hex without separators.
pub fn hex(bytes: &[u8]) -> String {
    use fmt::Write;

    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(out, "{b:02x}");
    }
    out
}
