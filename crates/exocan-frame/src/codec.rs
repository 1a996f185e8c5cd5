use std::fmt;

use bytes::Bytes;
use tracing::debug;

use crate::crc::{crc16, crc16_le};
use crate::error::{FrameError, Result};
use crate::message::{hex, Message};

/// Every frame is exactly 13 bytes on the wire.
pub const FRAME_SIZE: usize = 13;

/// Bytes 0-10 are covered by the CRC.
pub const CRC_SPAN: usize = 11;

/// Start-of-frame marker `0b10101` in the top five bits of byte 0.
pub const SOF_MARKER: u8 = 0xA8;

/// Mask selecting the marker bits of byte 0.
pub const SOF_MASK: u8 = 0xF8;

/// Largest 11-bit identifier.
pub const MAX_ID: u16 = 0x7FF;

/// Payload capacity of one frame.
pub const MAX_DATA_LEN: usize = 8;

const REMOTE_BIT: u8 = 0x80;
const EXTENDED_BIT: u8 = 0x40;
const DLC_MASK: u8 = 0x0F;
const PAYLOAD_OFFSET: usize = 3;

/// What to do with payloads longer than [`MAX_DATA_LEN`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PayloadPolicy {
    /// Fail with [`FrameError::PayloadTooLong`].
    #[default]
    Reject,
    /// Keep the first 8 bytes and drop the rest without error.
    Truncate,
}

/// A 13-byte wire frame.
///
/// Holding a `RawFrame` does not imply it is valid; [`RawFrame::validate`]
/// checks marker and CRC. Frames produced by [`encode`] and by the
/// synchronizer are always valid.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawFrame([u8; FRAME_SIZE]);

impl RawFrame {
    /// Wrap 13 raw bytes without validation.
    pub const fn from_array(bytes: [u8; FRAME_SIZE]) -> Self {
        Self(bytes)
    }

    /// Wrap a slice of exactly 13 bytes without validation.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        <[u8; FRAME_SIZE]>::try_from(bytes).ok().map(Self)
    }

    /// The wire bytes.
    pub fn as_bytes(&self) -> &[u8; FRAME_SIZE] {
        &self.0
    }

    /// Whether byte 0 carries the start-of-frame marker.
    pub fn has_marker(&self) -> bool {
        self.0[0] & SOF_MASK == SOF_MARKER
    }

    /// CRC stored in bytes 11-12.
    pub fn stored_crc(&self) -> u16 {
        u16::from_le_bytes([self.0[11], self.0[12]])
    }

    /// CRC computed over bytes 0-10.
    pub fn computed_crc(&self) -> u16 {
        crc16(&self.0[..CRC_SPAN])
    }

    /// Check marker, then CRC.
    pub fn validate(&self) -> Result<()> {
        match self.rejection() {
            Some(reason) => Err(reason.into()),
            None => Ok(()),
        }
    }

    /// 11-bit identifier.
    pub fn id(&self) -> u16 {
        (u16::from(self.0[0] & 0x07) << 8) | u16::from(self.0[1])
    }

    /// Remote transmission request flag.
    pub fn is_remote(&self) -> bool {
        self.0[2] & REMOTE_BIT != 0
    }

    /// Identifier extension flag.
    pub fn is_extended(&self) -> bool {
        self.0[2] & EXTENDED_BIT != 0
    }

    /// Raw 4-bit data length code.
    pub fn dlc(&self) -> u8 {
        self.0[2] & DLC_MASK
    }

    /// Payload length. Codes 9-15 mean 8 bytes, as on classic CAN.
    pub fn data_len(&self) -> usize {
        usize::from(self.dlc()).min(MAX_DATA_LEN)
    }

    /// The meaningful payload bytes.
    pub fn payload(&self) -> &[u8] {
        &self.0[PAYLOAD_OFFSET..PAYLOAD_OFFSET + self.data_len()]
    }
}

impl From<RawFrame> for [u8; FRAME_SIZE] {
    fn from(frame: RawFrame) -> Self {
        frame.0
    }
}

impl AsRef<[u8]> for RawFrame {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for RawFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RawFrame({})", hex(&self.0))
    }
}

impl fmt::Display for RawFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex(&self.0))
    }
}

/// Encode a message into the wire format, rejecting oversized payloads.
///
/// Wire format:
/// ```text
/// ┌──────────────────┬──────────┬──────────────────────┬────────────┬───────────┐
/// │ byte 0           │ byte 1   │ byte 2               │ bytes 3-10 │ 11-12     │
/// │ 10101 | id[10:8] │ id[7:0]  │ RTR IDE 0 0 | DLC    │ payload    │ CRC16 LE  │
/// └──────────────────┴──────────┴──────────────────────┴────────────┴───────────┘
/// ```
pub fn encode(id: u16, is_remote: bool, is_extended: bool, payload: &[u8]) -> Result<RawFrame> {
    encode_with_policy(id, is_remote, is_extended, payload, PayloadPolicy::Reject)
}

/// Encode with an explicit oversized-payload policy.
pub fn encode_with_policy(
    id: u16,
    is_remote: bool,
    is_extended: bool,
    payload: &[u8],
    policy: PayloadPolicy,
) -> Result<RawFrame> {
    if id > MAX_ID {
        return Err(FrameError::InvalidIdentifier(id));
    }

    let payload = if payload.len() > MAX_DATA_LEN {
        match policy {
            PayloadPolicy::Reject => {
                return Err(FrameError::PayloadTooLong {
                    len: payload.len(),
                    max: MAX_DATA_LEN,
                })
            }
            PayloadPolicy::Truncate => {
                debug!(len = payload.len(), "truncating payload to 8 bytes");
                &payload[..MAX_DATA_LEN]
            }
        }
    } else {
        payload
    };

    let mut buf = [0u8; FRAME_SIZE];
    buf[0] = SOF_MARKER | ((id >> 8) as u8 & 0x07);
    buf[1] = (id & 0xFF) as u8;
    buf[2] = payload.len() as u8 & DLC_MASK;
    if is_remote {
        buf[2] |= REMOTE_BIT;
    }
    if is_extended {
        buf[2] |= EXTENDED_BIT;
    }
    buf[PAYLOAD_OFFSET..PAYLOAD_OFFSET + payload.len()].copy_from_slice(payload);

    let crc = crc16_le(&buf[..CRC_SPAN]);
    buf[CRC_SPAN..].copy_from_slice(&crc);

    Ok(RawFrame(buf))
}

/// Encode a [`Message`]; its timestamp is not transmitted.
pub fn encode_message(message: &Message, policy: PayloadPolicy) -> Result<RawFrame> {
    encode_with_policy(
        message.id,
        message.is_remote,
        message.is_extended,
        message.data.as_ref(),
        policy,
    )
}

/// Validate a frame and turn it back into a [`Message`].
///
/// Reserved bits are ignored. The returned message has no timestamp.
pub fn decode(frame: &RawFrame) -> Result<Message> {
    frame.validate()?;
    Ok(Message {
        id: frame.id(),
        is_remote: frame.is_remote(),
        is_extended: frame.is_extended(),
        data: Bytes::copy_from_slice(frame.payload()),
        timestamp: None,
    })
}

/// Configuration for the blocking frame reader and writer.
#[derive(Debug, Clone, Default)]
pub struct FrameConfig {
    /// Oversized payload handling on encode.
    pub payload_policy: PayloadPolicy,
    /// Read timeout for blocking operations.
    pub read_timeout: Option<std::time::Duration>,
    /// Write timeout for blocking operations.
    pub write_timeout: Option<std::time::Duration>,
}
