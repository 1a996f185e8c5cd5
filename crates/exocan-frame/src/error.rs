/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The identifier does not fit in 11 bits.
    #[error("invalid identifier 0x{0:X} (max 0x7FF)")]
    InvalidIdentifier(u16),

    /// The payload exceeds the 8 bytes a frame can carry.
    #[error("payload too long ({len} bytes, max {max})")]
    PayloadTooLong { len: usize, max: usize },

    /// Byte 0 does not carry the start-of-frame marker.
    #[error("missing start-of-frame marker (byte 0 = 0x{0:02X})")]
    MarkerMismatch(u8),

    /// The stored CRC does not match the CRC computed over bytes 0-10.
    #[error("checksum mismatch (computed 0x{expected:04X}, stored 0x{actual:04X})")]
    ChecksumMismatch { expected: u16, actual: u16 },

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stream ended before another valid frame was found.
    #[error("connection closed")]
    ConnectionClosed,
}

impl FrameError {
    /// True for errors that mean "these 13 bytes are not a frame".
    ///
    /// The synchronizer answers these by shedding one byte; they are never
    /// surfaced to bus callers.
    pub fn is_misalignment(&self) -> bool {
        matches!(self, Self::MarkerMismatch(_) | Self::ChecksumMismatch { .. })
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
