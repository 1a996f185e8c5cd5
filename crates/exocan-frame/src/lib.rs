//! Fixed-length, CRC-protected CAN frame codec for byte-stream links.
//!
//! Every message travels as exactly 13 bytes:
//! - a 5-bit start marker (`0b10101`) sharing byte 0 with the top of an
//!   11-bit identifier
//! - remote/extended flags and a data length code
//! - 8 payload bytes, zero padded
//! - a CRC-16 over the first 11 bytes, low byte first
//!
//! [`FrameSync`] recovers frame boundaries from an arbitrary byte stream by
//! shedding one byte at a time until a window validates.

pub mod codec;
pub mod crc;
pub mod error;
pub mod message;
pub mod reader;
pub mod sync;
pub mod writer;

#[cfg(feature = "async")]
pub mod async_codec;

pub use codec::{decode, encode, encode_message, FrameConfig, PayloadPolicy, RawFrame};
pub use codec::{FRAME_SIZE, MAX_DATA_LEN, MAX_ID, SOF_MARKER, SOF_MASK};
pub use crc::{crc16, crc16_le};
pub use error::{FrameError, Result};
pub use message::Message;
pub use reader::FrameReader;
pub use sync::{FrameSync, Rejection, SyncOutcome, SyncStats};
pub use writer::FrameWriter;

#[cfg(feature = "async")]
pub use async_codec::ExoCodec;
