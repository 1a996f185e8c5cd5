//! Stream synchronizer: recovers frame boundaries from a raw byte stream.
//!
//! The synchronizer keeps a 13-byte window. Once the window is full it is
//! validated (marker, then CRC). A valid window is emitted and the window
//! restarts empty. An invalid window sheds exactly one byte from the front
//! and waits for one more byte before validating again, so a frame shifted
//! by any offset is found after at most 12 rejections and no valid frame
//! behind a corrupted byte is lost.
//!
//! `FrameSync` does no I/O. Drivers read at most [`FrameSync::wanted`] bytes
//! into [`FrameSync::spare_mut`], [`commit`](FrameSync::commit) them, then
//! [`poll`](FrameSync::poll).

use std::fmt;

use crate::codec::{RawFrame, FRAME_SIZE};
use crate::error::FrameError;

/// Why a full window was not a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// Byte 0 lacks the start marker.
    Marker { byte0: u8 },
    /// Marker present, CRC wrong.
    Checksum { expected: u16, actual: u16 },
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Marker { byte0 } => write!(f, "marker mismatch (0x{byte0:02x})"),
            Self::Checksum { expected, actual } => {
                write!(f, "crc mismatch (0x{expected:04x} != 0x{actual:04x})")
            }
        }
    }
}

impl From<Rejection> for FrameError {
    fn from(rejection: Rejection) -> Self {
        match rejection {
            Rejection::Marker { byte0 } => FrameError::MarkerMismatch(byte0),
            Rejection::Checksum { expected, actual } => {
                FrameError::ChecksumMismatch { expected, actual }
            }
        }
    }
}

/// Result of [`FrameSync::poll`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The window is not full yet.
    Incomplete,
    /// The window validated; the synchronizer is empty again.
    Frame(RawFrame),
    /// The window failed validation; its first byte was shed.
    Rejected { window: RawFrame, reason: Rejection },
}

/// Running counters kept by a [`FrameSync`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncStats {
    /// Bytes committed into the window.
    pub bytes_in: u64,
    /// Windows accepted as frames.
    pub frames: u64,
    /// Windows rejected.
    pub rejected: u64,
    /// Bytes discarded while resynchronizing.
    pub bytes_shed: u64,
}

/// Sans-IO frame synchronizer.
#[derive(Clone)]
pub struct FrameSync {
    buf: [u8; FRAME_SIZE],
    len: usize,
    consecutive_resyncs: u32,
    stats: SyncStats,
}

impl FrameSync {
    /// Create an empty synchronizer.
    pub fn new() -> Self {
        Self {
            buf: [0u8; FRAME_SIZE],
            len: 0,
            consecutive_resyncs: 0,
            stats: SyncStats::default(),
        }
    }

    /// Bytes needed to fill the window (`13 - buffered`).
    pub fn wanted(&self) -> usize {
        FRAME_SIZE - self.len
    }

    /// Bytes currently buffered.
    pub fn buffered(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    /// Free tail of the window; read directly into it, then [`commit`](Self::commit).
    pub fn spare_mut(&mut self) -> &mut [u8] {
        &mut self.buf[self.len..]
    }

    /// Mark `n` bytes written into [`spare_mut`](Self::spare_mut) as buffered.
    ///
    /// A zero-byte commit is a no-op. `n` is clamped to [`wanted`](Self::wanted).
    pub fn commit(&mut self, n: usize) {
        let n = n.min(self.wanted());
        self.len += n;
        self.stats.bytes_in += n as u64;
    }

    /// Copy as many bytes of `bytes` as fit into the window.
    ///
    /// Returns the number of bytes consumed.
    pub fn fill(&mut self, bytes: &[u8]) -> usize {
        let n = bytes.len().min(self.wanted());
        self.spare_mut()[..n].copy_from_slice(&bytes[..n]);
        self.commit(n);
        n
    }

    /// Validate the window if it is full.
    pub fn poll(&mut self) -> SyncOutcome {
        if self.len < FRAME_SIZE {
            return SyncOutcome::Incomplete;
        }

        let window = RawFrame::from_array(self.buf);
        match window.rejection() {
            None => {
                self.len = 0;
                self.consecutive_resyncs = 0;
                self.stats.frames += 1;
                SyncOutcome::Frame(window)
            }
            Some(reason) => {
                self.buf.copy_within(1.., 0);
                self.len = FRAME_SIZE - 1;
                self.consecutive_resyncs = self.consecutive_resyncs.saturating_add(1);
                self.stats.rejected += 1;
                self.stats.bytes_shed += 1;
                SyncOutcome::Rejected { window, reason }
            }
        }
    }

    /// Drop any buffered bytes. Counters are kept.
    pub fn reset(&mut self) {
        self.len = 0;
        self.consecutive_resyncs = 0;
    }

    /// Rejections since the last accepted frame.
    pub fn consecutive_resyncs(&self) -> u32 {
        self.consecutive_resyncs
    }

    /// Counters since creation.
    pub fn stats(&self) -> SyncStats {
        self.stats
    }
}

impl Default for FrameSync {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for FrameSync {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameSync")
            .field("buffered", &self.len)
            .field("consecutive_resyncs", &self.consecutive_resyncs)
            .field("stats", &self.stats)
            .finish()
    }
}

impl RawFrame {
    /// Why this window is not a valid frame, checking the marker before the
    /// CRC; `None` when it is valid. [`RawFrame::validate`] reports the same
    /// outcome as a [`FrameError`].
    pub fn rejection(&self) -> Option<Rejection> {
        if !self.has_marker() {
            return Some(Rejection::Marker {
                byte0: self.as_bytes()[0],
            });
        }
        let expected = self.computed_crc();
        let actual = self.stored_crc();
        if expected != actual {
            return Some(Rejection::Checksum { expected, actual });
        }
        None
    }
}
