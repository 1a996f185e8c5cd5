//! Background thread turning a transport byte stream into validated frames.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use exocan_frame::{FrameSync, RawFrame, SyncOutcome};
use exocan_transport::Transport;
use tracing::{debug, trace, warn};

use crate::error::{BusError, Result};
use crate::mirror::DiagnosticMirror;
use crate::queue::DeliveryQueue;

/// Pause after a transport read error before trying again.
const ERROR_BACKOFF: Duration = Duration::from_millis(10);

/// Snapshot of synchronizer counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BusStats {
    /// Bytes read from the transport.
    pub bytes_in: u64,
    /// Frames accepted and queued.
    pub frames: u64,
    /// Windows that failed marker or CRC validation.
    pub rejected: u64,
    /// Bytes discarded while resynchronizing.
    pub bytes_shed: u64,
    /// Rejections since the last accepted frame.
    pub consecutive_resyncs: u32,
}

#[derive(Debug, Default)]
struct SharedStats {
    bytes_in: AtomicU64,
    frames: AtomicU64,
    rejected: AtomicU64,
    bytes_shed: AtomicU64,
    consecutive_resyncs: AtomicU32,
}

impl SharedStats {
    fn publish(&self, sync: &FrameSync) {
        let stats = sync.stats();
        self.bytes_in.store(stats.bytes_in, Ordering::Relaxed);
        self.frames.store(stats.frames, Ordering::Relaxed);
        self.rejected.store(stats.rejected, Ordering::Relaxed);
        self.bytes_shed.store(stats.bytes_shed, Ordering::Relaxed);
        self.consecutive_resyncs
            .store(sync.consecutive_resyncs(), Ordering::Relaxed);
    }

    fn snapshot(&self) -> BusStats {
        BusStats {
            bytes_in: self.bytes_in.load(Ordering::Relaxed),
            frames: self.frames.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            bytes_shed: self.bytes_shed.load(Ordering::Relaxed),
            consecutive_resyncs: self.consecutive_resyncs.load(Ordering::Relaxed),
        }
    }
}

/// Handle to the read-validate-resync thread.
///
/// The thread owns the transport reader and the accumulation window. It
/// stops when asked to, when the transport closes, or when the queue is
/// closed under it; in every case it closes the queue on the way out so
/// readers never wait on a dead producer.
#[derive(Debug)]
pub struct Synchronizer {
    running: Arc<AtomicBool>,
    stats: Arc<SharedStats>,
    handle: Option<JoinHandle<()>>,
}

impl Synchronizer {
    /// Start the thread reading from `transport` into `queue`.
    pub fn spawn(
        transport: Box<dyn Transport>,
        queue: Arc<DeliveryQueue<RawFrame>>,
        mirror: Option<Arc<DiagnosticMirror>>,
    ) -> Result<Self> {
        let running = Arc::new(AtomicBool::new(true));
        let stats = Arc::new(SharedStats::default());

        let worker = Worker {
            transport,
            queue,
            mirror,
            sync: FrameSync::new(),
            running: Arc::clone(&running),
            stats: Arc::clone(&stats),
        };

        let handle = thread::Builder::new()
            .name("exocan-sync".to_string())
            .spawn(move || worker.run())
            .map_err(BusError::Spawn)?;

        Ok(Self {
            running,
            stats,
            handle: Some(handle),
        })
    }

    /// Whether the thread is still reading.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
            && self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Counters as of the last processed read.
    pub fn stats(&self) -> BusStats {
        self.stats.snapshot()
    }

    /// Ask the thread to stop after its current read.
    pub fn request_stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Stop the thread and wait for it. Idempotent.
    ///
    /// A thread blocked on a full queue only returns once that queue is
    /// closed; close it first.
    pub fn stop(&mut self) {
        self.request_stop();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("synchronizer thread panicked");
            }
        }
    }
}

impl Drop for Synchronizer {
    fn drop(&mut self) {
        self.stop();
    }
}

struct Worker {
    transport: Box<dyn Transport>,
    queue: Arc<DeliveryQueue<RawFrame>>,
    mirror: Option<Arc<DiagnosticMirror>>,
    sync: FrameSync,
    running: Arc<AtomicBool>,
    stats: Arc<SharedStats>,
}

impl Worker {
    fn run(mut self) {
        debug!(transport = self.transport.name(), "synchronizer started");

        while self.running.load(Ordering::SeqCst) {
            if !self.transport.is_open() {
                debug!("transport no longer open");
                break;
            }

            match self.transport.read(self.sync.spare_mut()) {
                Ok(0) => continue,
                Ok(n) => self.sync.commit(n),
                Err(err) if err.is_closed() => {
                    debug!("transport closed");
                    break;
                }
                Err(err) => {
                    warn!(error = %err, "transport read failed");
                    thread::sleep(ERROR_BACKOFF);
                    continue;
                }
            }

            if !self.drain() {
                debug!("delivery queue closed");
                break;
            }
            self.stats.publish(&self.sync);
        }

        self.stats.publish(&self.sync);
        self.running.store(false, Ordering::SeqCst);
        self.queue.close();
        debug!(stats = ?self.sync.stats(), "synchronizer stopped");
    }

    /// Validate the window until it needs more bytes. `false` once the queue is closed.
    fn drain(&mut self) -> bool {
        loop {
            match self.sync.poll() {
                SyncOutcome::Incomplete => return true,
                SyncOutcome::Frame(frame) => {
                    self.stats.publish(&self.sync);
                    if let Some(mirror) = &self.mirror {
                        mirror.received(&frame);
                    }
                    if self.queue.push(frame).is_err() {
                        return false;
                    }
                }
                SyncOutcome::Rejected { window, reason } => {
                    trace!(
                        %window,
                        %reason,
                        consecutive = self.sync.consecutive_resyncs(),
                        "shed one byte"
                    );
                    if let Some(mirror) = &self.mirror {
                        mirror.rejected(&window);
                    }
                }
            }
        }
    }
}
