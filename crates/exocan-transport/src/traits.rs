use std::io::ErrorKind;
use std::time::Duration;

use crate::error::{Result, TransportError};

/// A bidirectional byte link carrying exocan frames.
///
/// Reads are bounded by a transport-level timeout: when nothing arrives in
/// time `read` returns `Ok(0)` instead of an error, so a caller polling in a
/// loop can observe its own stop flag between reads. End of stream, a
/// vanished device, or a local [`close`](Transport::close) surface as
/// [`TransportError::Closed`].
pub trait Transport: Send {
    /// Read up to `buf.len()` bytes. `Ok(0)` means "nothing yet".
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Write every byte of `data` and flush.
    fn write_all(&mut self, data: &[u8]) -> Result<()>;

    /// Whether the link is still usable.
    fn is_open(&self) -> bool;

    /// Discard any stale bytes buffered before the bus started.
    fn reset_buffers(&mut self) -> Result<()> {
        Ok(())
    }

    /// Bound how long a single write may block. No-op where unsupported.
    fn set_write_timeout(&mut self, _timeout: Option<Duration>) -> Result<()> {
        Ok(())
    }

    /// Open a second handle onto the same link (reader/writer split).
    fn try_clone_box(&self) -> Result<Box<dyn Transport>>;

    /// Release the link. Every handle observes `is_open() == false` afterwards.
    fn close(&mut self) -> Result<()>;

    /// Transport name for diagnostics.
    fn name(&self) -> &'static str;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        (**self).read(buf)
    }

    fn write_all(&mut self, data: &[u8]) -> Result<()> {
        (**self).write_all(data)
    }

    fn is_open(&self) -> bool {
        (**self).is_open()
    }

    fn reset_buffers(&mut self) -> Result<()> {
        (**self).reset_buffers()
    }

    fn set_write_timeout(&mut self, timeout: Option<Duration>) -> Result<()> {
        (**self).set_write_timeout(timeout)
    }

    fn try_clone_box(&self) -> Result<Box<dyn Transport>> {
        (**self).try_clone_box()
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

/// Fold a raw `io::Error` from a read into the transport read contract.
///
/// Timeouts and interrupts become `Ok(0)`; errors meaning the peer is gone
/// become [`TransportError::Closed`].
pub(crate) fn fold_read_error(err: std::io::Error) -> Result<usize> {
    match err.kind() {
        ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted => Ok(0),
        ErrorKind::BrokenPipe
        | ErrorKind::ConnectionReset
        | ErrorKind::ConnectionAborted
        | ErrorKind::NotConnected
        | ErrorKind::UnexpectedEof => Err(TransportError::Closed),
        _ => Err(TransportError::Io(err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeouts_fold_to_empty_read() {
        for kind in [
            ErrorKind::WouldBlock,
            ErrorKind::TimedOut,
            ErrorKind::Interrupted,
        ] {
            let folded = fold_read_error(std::io::Error::from(kind));
            assert!(matches!(folded, Ok(0)), "{kind:?} should fold to Ok(0)");
        }
    }

    #[test]
    fn disconnects_fold_to_closed() {
        let folded = fold_read_error(std::io::Error::from(ErrorKind::ConnectionReset));
        assert!(matches!(folded, Err(TransportError::Closed)));
    }

    #[test]
    fn other_errors_propagate() {
        let folded = fold_read_error(std::io::Error::from(ErrorKind::PermissionDenied));
        assert!(matches!(folded, Err(TransportError::Io(e)) if e.kind() == ErrorKind::PermissionDenied));
    }
}
