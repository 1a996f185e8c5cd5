use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime};

use exocan_frame::{decode, encode_message, Message, RawFrame};
use exocan_transport::{open_channel, ChannelInfo, ChannelSpec, Transport};
use tracing::{debug, info, trace};

use crate::config::BusConfig;
use crate::error::{BusError, Result};
use crate::mirror::DiagnosticMirror;
use crate::queue::DeliveryQueue;
use crate::synchronizer::{BusStats, Synchronizer};

/// Shortest write timeout handed to a transport. A zero send timeout means
/// "try once without waiting" and is raised to this.
pub const MIN_WRITE_TIMEOUT: Duration = Duration::from_millis(1);

/// A live exocan bus.
///
/// Owns a transport split into a reader (given to the background
/// synchronizer) and a writer (used by [`send`](Self::send)). All methods
/// take `&self`; an `ExoBus` can be shared between a sending and a
/// receiving thread behind an `Arc`.
pub struct ExoBus {
    channel_info: String,
    config: BusConfig,
    writer: Mutex<Box<dyn Transport>>,
    queue: Arc<DeliveryQueue<RawFrame>>,
    synchronizer: Mutex<Synchronizer>,
    mirror: Option<Arc<DiagnosticMirror>>,
    shut_down: AtomicBool,
}

impl ExoBus {
    /// Open the channel named in `config` and start receiving.
    pub fn open(config: BusConfig) -> Result<Self> {
        let spec = ChannelSpec::parse(&config.channel)?;
        let transport = open_channel(&spec, config.baudrate, config.read_timeout, config.rtscts)?;
        info!(channel = %spec, "opened exocan channel");
        Self::start(transport, spec.describe(), config)
    }

    /// Run a bus over an already opened transport.
    ///
    /// `config.channel` is only used for [`channel_info`](Self::channel_info).
    pub fn with_transport(transport: Box<dyn Transport>, config: BusConfig) -> Result<Self> {
        let channel_info = match ChannelSpec::parse(&config.channel) {
            Ok(spec) => spec.describe(),
            Err(_) => format!("{} interface", transport.name()),
        };
        Self::start(transport, channel_info, config)
    }

    fn start(
        mut transport: Box<dyn Transport>,
        channel_info: String,
        config: BusConfig,
    ) -> Result<Self> {
        transport.reset_buffers()?;
        let reader = transport.try_clone_box()?;

        let mirror = config
            .mirror
            .map(DiagnosticMirror::new)
            .transpose()?
            .map(Arc::new);

        let queue = Arc::new(DeliveryQueue::new(config.queue_capacity));
        let synchronizer = Synchronizer::spawn(reader, Arc::clone(&queue), mirror.clone())?;
        debug!(%channel_info, capacity = queue.capacity(), "bus started");

        Ok(Self {
            channel_info,
            config,
            writer: Mutex::new(transport),
            queue,
            synchronizer: Mutex::new(synchronizer),
            mirror,
            shut_down: AtomicBool::new(false),
        })
    }

    /// Encode `message` and write it to the transport.
    ///
    /// `timeout` bounds the write where the transport supports it; `None`
    /// may block until the link accepts the frame, and `Some(Duration::ZERO)`
    /// is a single attempt bounded by [`MIN_WRITE_TIMEOUT`]. Write failures
    /// are returned, not retried.
    pub fn send(&self, message: &Message, timeout: Option<Duration>) -> Result<()> {
        if self.shut_down.load(Ordering::SeqCst) {
            return Err(BusError::Shutdown);
        }

        let frame = encode_message(message, self.config.payload_policy)?;
        {
            let mut writer = lock(&self.writer);
            writer.set_write_timeout(timeout.map(|t| t.max(MIN_WRITE_TIMEOUT)))?;
            writer.write_all(frame.as_bytes())?;
        }

        if let Some(mirror) = &self.mirror {
            mirror.transmitted(&frame);
        }
        trace!(message = %message.summary(), "sent");
        Ok(())
    }

    /// Wait up to `timeout` for the next frame (`None` waits indefinitely).
    ///
    /// Returns the message, stamped with the time it was decoded, and
    /// whether hardware filtering was applied, which is never the case.
    /// Yields `(None, false)` on timeout and once the bus has stopped and
    /// every queued frame has been read.
    pub fn recv_internal(&self, timeout: Option<Duration>) -> Result<(Option<Message>, bool)> {
        let Some(frame) = self.queue.pop(timeout) else {
            return Ok((None, false));
        };
        let message = decode(&frame)?.with_timestamp(SystemTime::now());
        trace!(message = %message.summary(), "received");
        Ok((Some(message), false))
    }

    /// Wait up to `timeout` for the next message.
    pub fn recv(&self, timeout: Option<Duration>) -> Result<Option<Message>> {
        self.recv_internal(timeout).map(|(message, _)| message)
    }

    /// Stop the synchronizer and release the transport. Idempotent.
    pub fn shutdown(&self) -> Result<()> {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let mut synchronizer = lock(&self.synchronizer);
        synchronizer.request_stop();
        self.queue.close();
        let closed = lock(&self.writer).close();
        synchronizer.stop();

        info!(channel = %self.channel_info, "exocan bus shut down");
        closed.map_err(Into::into)
    }

    /// `"ExoSerial interface: …"` or `"ExoSocket interface: …"`.
    pub fn channel_info(&self) -> &str {
        &self.channel_info
    }

    /// Whether the bus is still receiving.
    pub fn is_open(&self) -> bool {
        !self.shut_down.load(Ordering::SeqCst) && lock(&self.synchronizer).is_running()
    }

    /// Synchronizer counters.
    pub fn stats(&self) -> BusStats {
        lock(&self.synchronizer).stats()
    }

    /// Frames waiting to be received.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Configuration the bus was started with.
    pub fn config(&self) -> &BusConfig {
        &self.config
    }

    /// Channels this host could open.
    pub fn detect_available_channels() -> Vec<ChannelInfo> {
        exocan_transport::detect_available_channels()
    }
}

impl Drop for ExoBus {
    fn drop(&mut self) {
        if let Err(err) = self.shutdown() {
            debug!(error = %err, "error while shutting down bus");
        }
    }
}

impl std::fmt::Debug for ExoBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExoBus")
            .field("channel_info", &self.channel_info)
            .field("pending", &self.queue.len())
            .field("shut_down", &self.shut_down.load(Ordering::SeqCst))
            .finish()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
