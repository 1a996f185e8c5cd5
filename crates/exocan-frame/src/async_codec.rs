//! `tokio_util` codec for running the exocan protocol inside tokio.

use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::trace;

use crate::codec::{decode, encode_message, PayloadPolicy, FRAME_SIZE};
use crate::error::FrameError;
use crate::message::Message;
use crate::sync::{FrameSync, SyncOutcome, SyncStats};

/// Frame codec with the same one-byte resynchronization as [`FrameSync`].
#[derive(Debug, Default)]
pub struct ExoCodec {
    sync: FrameSync,
    payload_policy: PayloadPolicy,
}

impl ExoCodec {
    /// Codec rejecting oversized payloads on encode.
    pub fn new() -> Self {
        Self::default()
    }

    /// Codec with an explicit oversized-payload policy.
    pub fn with_payload_policy(payload_policy: PayloadPolicy) -> Self {
        Self {
            sync: FrameSync::new(),
            payload_policy,
        }
    }

    /// Synchronizer counters for the decoded stream.
    pub fn stats(&self) -> SyncStats {
        self.sync.stats()
    }
}

impl Decoder for ExoCodec {
    type Item = Message;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            match self.sync.poll() {
                SyncOutcome::Frame(frame) => return decode(&frame).map(Some),
                SyncOutcome::Rejected { window, reason } => {
                    trace!(%window, %reason, "skipping misaligned window");
                    continue;
                }
                SyncOutcome::Incomplete => {}
            }

            if src.is_empty() {
                return Ok(None);
            }
            let consumed = self.sync.fill(src);
            src.advance(consumed);
        }
    }
}

impl Encoder<Message> for ExoCodec {
    type Error = FrameError;

    fn encode(&mut self, item: Message, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let frame = encode_message(&item, self.payload_policy)?;
        dst.reserve(FRAME_SIZE);
        dst.extend_from_slice(frame.as_bytes());
        Ok(())
    }
}
