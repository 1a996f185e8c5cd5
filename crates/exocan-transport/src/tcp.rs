use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::traits::{fold_read_error, Transport};

/// Upper bound on bytes discarded by [`TcpTransport::reset_buffers`].
const MAX_DRAIN_BYTES: usize = 64 * 1024;

/// Configuration for TCP links.
#[derive(Debug, Clone)]
pub struct TcpConfig {
    /// Timeout for establishing the connection.
    pub connect_timeout: Duration,
    /// Read timeout; bounds how long a stop request can go unnoticed.
    pub read_timeout: Option<Duration>,
    /// Disable Nagle so 13-byte frames leave immediately.
    pub nodelay: bool,
}

impl Default for TcpConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            read_timeout: Some(Duration::from_millis(100)),
            nodelay: true,
        }
    }
}

/// TCP socket transport.
///
/// Used for serial-to-network bridges and bus simulators. Clones share an
/// open flag, so closing the writer half is visible to the reader half.
pub struct TcpTransport {
    stream: TcpStream,
    peer: SocketAddr,
    open: Arc<AtomicBool>,
}

impl TcpTransport {
    /// Connect to `addr` (`host:port`) with default configuration.
    pub fn connect(addr: &str) -> Result<Self> {
        Self::connect_with_config(addr, &TcpConfig::default())
    }

    /// Connect to `addr` (`host:port`) with explicit configuration.
    pub fn connect_with_config(addr: &str, config: &TcpConfig) -> Result<Self> {
        let candidates = addr
            .to_socket_addrs()
            .map_err(|e| TransportError::connect(addr, e))?;

        let mut last_err = None;
        for candidate in candidates {
            match TcpStream::connect_timeout(&candidate, config.connect_timeout) {
                Ok(stream) => {
                    info!(addr = %candidate, "connected to tcp bus bridge");
                    return Self::from_stream(stream, config);
                }
                Err(err) => {
                    debug!(addr = %candidate, error = %err, "tcp connect attempt failed");
                    last_err = Some(TransportError::connect_addr(candidate, err));
                }
            }
        }

        Err(last_err.unwrap_or_else(|| {
            TransportError::connect(
                addr,
                std::io::Error::new(ErrorKind::NotFound, "address resolved to no candidates"),
            )
        }))
    }

    /// Wrap an already connected stream.
    pub fn from_stream(stream: TcpStream, config: &TcpConfig) -> Result<Self> {
        stream.set_read_timeout(config.read_timeout)?;
        stream.set_nodelay(config.nodelay)?;
        let peer = stream.peer_addr()?;
        Ok(Self {
            stream,
            peer,
            open: Arc::new(AtomicBool::new(true)),
        })
    }

    /// Address of the remote end.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }
}

impl Transport for TcpTransport {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        if !self.is_open() {
            return Err(TransportError::Closed);
        }

        match self.stream.read(buf) {
            Ok(0) => {
                debug!(peer = %self.peer, "tcp peer closed the connection");
                self.open.store(false, Ordering::SeqCst);
                Err(TransportError::Closed)
            }
            Ok(n) => Ok(n),
            Err(_) if !self.is_open() => Err(TransportError::Closed),
            Err(err) => fold_read_error(err),
        }
    }

    fn write_all(&mut self, data: &[u8]) -> Result<()> {
        if !self.is_open() {
            return Err(TransportError::Closed);
        }
        self.stream.write_all(data)?;
        self.stream.flush()?;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    fn reset_buffers(&mut self) -> Result<()> {
        self.stream.set_nonblocking(true)?;
        let mut scratch = [0u8; 512];
        let mut drained = 0usize;
        let outcome = loop {
            if drained >= MAX_DRAIN_BYTES {
                break Ok(());
            }
            match self.stream.read(&mut scratch) {
                Ok(0) => break Ok(()),
                Ok(n) => drained += n,
                Err(err) if err.kind() == ErrorKind::WouldBlock => break Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => break Err(TransportError::Io(err)),
            }
        };
        self.stream.set_nonblocking(false)?;
        if drained > 0 {
            debug!(peer = %self.peer, drained, "discarded stale bytes");
        }
        outcome
    }

    fn set_write_timeout(&mut self, timeout: Option<Duration>) -> Result<()> {
        self.stream.set_write_timeout(timeout).map_err(Into::into)
    }

    fn try_clone_box(&self) -> Result<Box<dyn Transport>> {
        let stream = self.stream.try_clone()?;
        Ok(Box::new(Self {
            stream,
            peer: self.peer,
            open: Arc::clone(&self.open),
        }))
    }

    fn close(&mut self) -> Result<()> {
        if self.open.swap(false, Ordering::SeqCst) {
            debug!(peer = %self.peer, "closing tcp transport");
            match self.stream.shutdown(Shutdown::Both) {
                Ok(()) => {}
                Err(err) if err.kind() == ErrorKind::NotConnected => {}
                Err(err) => return Err(TransportError::Io(err)),
            }
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "tcp"
    }
}

impl std::fmt::Debug for TcpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpTransport")
            .field("peer", &self.peer)
            .field("open", &self.is_open())
            .finish()
    }
}
