use std::io::{ErrorKind, Read};
use std::net::TcpStream;

use tracing::trace;

use crate::codec::{decode, FrameConfig, RawFrame};
use crate::error::{FrameError, Result};
use crate::message::Message;
use crate::sync::{FrameSync, SyncOutcome, SyncStats};

/// Reads validated frames from any `Read` stream.
///
/// Misaligned or corrupted bytes are skipped one at a time; callers only
/// ever see frames whose marker and CRC check out. Useful for captures and
/// pipes. Live buses use the background synchronizer in `exocan-bus`.
pub struct FrameReader<T> {
    inner: T,
    sync: FrameSync,
    config: FrameConfig,
}

impl<T: Read> FrameReader<T> {
    /// Create a new frame reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            sync: FrameSync::new(),
            config,
        }
    }

    /// Read the next valid frame (blocking).
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` when EOF is reached.
    /// Bytes left in the window at EOF are discarded.
    pub fn read_frame(&mut self) -> Result<RawFrame> {
        loop {
            match self.sync.poll() {
                SyncOutcome::Frame(frame) => return Ok(frame),
                SyncOutcome::Rejected { window, reason } => {
                    trace!(%window, %reason, "skipping misaligned window");
                    continue;
                }
                SyncOutcome::Incomplete => {}
            }

            let read = match self.inner.read(self.sync.spare_mut()) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                return Err(FrameError::ConnectionClosed);
            }

            self.sync.commit(read);
        }
    }

    /// Read and decode the next valid frame.
    pub fn read_message(&mut self) -> Result<Message> {
        let frame = self.read_frame()?;
        decode(&frame)
    }

    /// Synchronizer counters for this stream.
    pub fn stats(&self) -> SyncStats {
        self.sync.stats()
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current frame reader configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl FrameReader<TcpStream> {
    /// Wrap a TCP stream, applying the configured read timeout to the socket.
    ///
    /// A read that times out surfaces as `FrameError::Io` with kind
    /// `WouldBlock` or `TimedOut`; the partial window is kept.
    pub fn from_tcp(stream: TcpStream, config: FrameConfig) -> Result<Self> {
        stream.set_read_timeout(config.read_timeout)?;
        Ok(Self::with_config(stream, config))
    }
}

impl<T: Read> Iterator for FrameReader<T> {
    type Item = Result<RawFrame>;

    /// Yields frames until EOF; other errors are yielded once.
    fn next(&mut self) -> Option<Self::Item> {
        match self.read_frame() {
            Ok(frame) => Some(Ok(frame)),
            Err(FrameError::ConnectionClosed) => None,
            Err(err) => Some(Err(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::codec::encode;

    fn wire_of(frames: &[RawFrame]) -> Vec<u8> {
        frames.iter().flat_map(|f| f.as_bytes().to_vec()).collect()
    }

    #[test]
    fn read_single_frame() {
        let frame = encode(0x101, false, false, b"hello").unwrap();

        let mut reader = FrameReader::new(Cursor::new(frame.as_bytes().to_vec()));
        let msg = reader.read_message().unwrap();

        assert_eq!(msg.id, 0x101);
        assert_eq!(msg.data.as_ref(), b"hello");
    }

    #[test]
    fn read_multiple_frames() {
        let sent = vec![
            encode(1, false, false, b"one").unwrap(),
            encode(2, false, false, b"two").unwrap(),
            encode(3, false, false, b"three").unwrap(),
        ];

        let reader = FrameReader::new(Cursor::new(wire_of(&sent)));
        let got: Vec<RawFrame> = reader.map(|r| r.unwrap()).collect();

        assert_eq!(got, sent);
    }

    #[test]
    fn skips_leading_garbage() {
        let sent = vec![
            encode(0x10, false, false, &[1; 8]).unwrap(),
            encode(0x11, false, false, &[2; 8]).unwrap(),
        ];
        let mut wire = vec![0xAA, 0xFF, 0x00, 0xAC, 0x13];
        wire.extend(wire_of(&sent));

        let mut reader = FrameReader::new(Cursor::new(wire));
        assert_eq!(reader.read_frame().unwrap(), sent[0]);
        assert_eq!(reader.read_frame().unwrap(), sent[1]);
        assert_eq!(reader.stats().bytes_shed, 5);
    }

    #[test]
    fn partial_read_handling() {
        let frame = encode(4, false, false, b"slow").unwrap();

        let byte_reader = ByteByByteReader {
            bytes: frame.as_bytes().to_vec(),
            pos: 0,
        };
        let mut reader = FrameReader::new(byte_reader);

        assert_eq!(reader.read_frame().unwrap(), frame);
    }

    #[test]
    fn connection_closed_cleanly() {
        let mut reader = FrameReader::new(Cursor::new(Vec::<u8>::new()));
        let err = reader.read_frame().unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[test]
    fn connection_closed_mid_frame() {
        let frame = encode(9, false, false, b"part").unwrap();
        let mut reader = FrameReader::new(Cursor::new(frame.as_bytes()[..7].to_vec()));
        let err = reader.read_frame().unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[test]
    fn corrupted_frame_never_surfaces() {
        let good = encode(0x55, false, false, &[7; 8]).unwrap();
        let mut bad = *good.as_bytes();
        bad[5] ^= 0x01;
        let next = encode(0x56, false, false, &[8; 8]).unwrap();

        let mut wire = bad.to_vec();
        wire.extend_from_slice(next.as_bytes());

        let got: Vec<RawFrame> = FrameReader::new(Cursor::new(wire))
            .map(|r| r.unwrap())
            .collect();
        assert_eq!(got, vec![next]);
    }

    #[derive(Debug)]
    struct ByteByByteReader {
        bytes: Vec<u8>,
        pos: usize,
    }

    impl Read for ByteByByteReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.pos >= self.bytes.len() || buf.is_empty() {
                return Ok(0);
            }

            buf[0] = self.bytes[self.pos];
            self.pos += 1;
            Ok(1)
        }
    }

    #[test]
    fn read_would_block_propagates_io_error() {
        let frame = encode(7, false, false, b"ok").unwrap();

        let reader = ErrThenData {
            kind: ErrorKind::WouldBlock,
            state: 0,
            bytes: frame.as_bytes().to_vec(),
            pos: 0,
        };
        let mut framed = FrameReader::new(reader);
        let err = framed.read_frame().unwrap_err();
        assert!(matches!(err, FrameError::Io(e) if e.kind() == ErrorKind::WouldBlock));
    }

    #[test]
    fn interrupted_read_retries() {
        let frame = encode(8, false, false, b"ok").unwrap();

        let reader = ErrThenData {
            kind: ErrorKind::Interrupted,
            state: 0,
            bytes: frame.as_bytes().to_vec(),
            pos: 0,
        };
        let mut framed = FrameReader::new(reader);
        assert_eq!(framed.read_frame().unwrap(), frame);
    }

    struct ErrThenData {
        kind: ErrorKind,
        state: u8,
        bytes: Vec<u8>,
        pos: usize,
    }

    impl Read for ErrThenData {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.state == 0 {
                self.state = 1;
                return Err(std::io::Error::from(self.kind));
            }
            if self.pos >= self.bytes.len() {
                return Ok(0);
            }
            let remaining = self.bytes.len() - self.pos;
            let n = remaining.min(buf.len());
            buf[..n].copy_from_slice(&self.bytes[self.pos..self.pos + n]);
            self.pos += n;
            Ok(n)
        }
    }

    #[test]
    #[cfg(unix)]
    fn roundtrip_over_pipe() {
        let (left, right) = std::os::unix::net::UnixStream::pair().unwrap();
        let mut writer = crate::writer::FrameWriter::new(left);
        let mut reader = FrameReader::new(right);

        let msg = Message::new(0x1AB, b"ping".to_vec());
        writer.send(&msg).unwrap();

        assert_eq!(reader.read_message().unwrap(), msg);
    }

    #[test]
    fn tcp_reader_honours_read_timeout() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let client = TcpStream::connect(listener.local_addr().unwrap()).unwrap();
        let (server, _) = listener.accept().unwrap();

        let config = FrameConfig {
            read_timeout: Some(std::time::Duration::from_millis(30)),
            ..FrameConfig::default()
        };
        let mut reader = FrameReader::from_tcp(server, config).unwrap();
        let mut writer = crate::writer::FrameWriter::from_tcp(client, FrameConfig::default()).unwrap();

        let err = reader.read_frame().unwrap_err();
        assert!(matches!(
            err,
            FrameError::Io(ref e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut)
        ));

        let msg = Message::new(0x0AB, b"late".to_vec());
        writer.send(&msg).unwrap();
        assert_eq!(reader.read_message().unwrap(), msg);
    }

    #[test]
    fn accessors_and_into_inner() {
        let cursor = Cursor::new(Vec::<u8>::new());
        let mut reader = FrameReader::new(cursor);

        let _ = reader.get_ref();
        let _ = reader.get_mut();
        assert!(reader.config().read_timeout.is_none());
        let _inner = reader.into_inner();
    }
}
