//! CRC-16/IBM as used on the wire.
//!
//! Parameters (ARC variant): poly 0x8005 reflected, init 0x0000, no final
//! xor. The two checksum bytes travel low byte first.

use crc::{Crc, CRC_16_ARC};

const CRC16_IBM: Crc<u16> = Crc::<u16>::new(&CRC_16_ARC);

/// CRC-16/IBM over `bytes`.
pub fn crc16(bytes: &[u8]) -> u16 {
    CRC16_IBM.checksum(bytes)
}

/// CRC-16/IBM over `bytes` in wire order: `[low, high]`.
pub fn crc16_le(bytes: &[u8]) -> [u8; 2] {
    crc16(bytes).to_le_bytes()
}
