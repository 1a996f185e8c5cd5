//! Best-effort UDP copy of bus traffic for external tooling.
//!
//! Every datagram is one tag byte followed by the 13 frame bytes.

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket};

use exocan_frame::{RawFrame, FRAME_SIZE};
use tracing::{debug, trace};

use crate::error::{BusError, Result};

/// Tag for a frame written to the transport.
pub const TAG_TX: u8 = 0x0A;
/// Tag for a frame accepted by the synchronizer.
pub const TAG_RX: u8 = 0x0B;
/// Tag for a window rejected by the synchronizer.
pub const TAG_REJECTED: u8 = 0x0C;

/// Non-blocking UDP sender mirroring frames to `target`.
#[derive(Debug)]
pub struct DiagnosticMirror {
    socket: UdpSocket,
    target: SocketAddr,
}

impl DiagnosticMirror {
    /// Bind an ephemeral local socket of the same family as `target`.
    pub fn new(target: SocketAddr) -> Result<Self> {
        let local: SocketAddr = match target {
            SocketAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
            SocketAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
        };
        let socket = UdpSocket::bind(local)
            .and_then(|socket| socket.set_nonblocking(true).map(|()| socket))
            .map_err(|source| BusError::Mirror {
                addr: target,
                source,
            })?;
        debug!(%target, "diagnostic mirror enabled");
        Ok(Self { socket, target })
    }

    /// Where datagrams are sent.
    pub fn target(&self) -> SocketAddr {
        self.target
    }

    /// Mirror a frame the bus wrote, tagged [`TAG_TX`].
    pub fn transmitted(&self, frame: &RawFrame) {
        self.emit(TAG_TX, frame);
    }

    /// Mirror a frame the synchronizer accepted, tagged [`TAG_RX`].
    pub fn received(&self, frame: &RawFrame) {
        self.emit(TAG_RX, frame);
    }

    /// Mirror a window the synchronizer rejected, tagged [`TAG_REJECTED`].
    pub fn rejected(&self, window: &RawFrame) {
        self.emit(TAG_REJECTED, window);
    }

    fn emit(&self, tag: u8, frame: &RawFrame) {
        let mut packet = [0u8; FRAME_SIZE + 1];
        packet[0] = tag;
        packet[1..].copy_from_slice(frame.as_bytes());
        if let Err(err) = self.socket.send_to(&packet, self.target) {
            trace!(target_addr = %self.target, error = %err, "mirror send dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use exocan_frame::encode;

    use super::*;

    fn receiver() -> UdpSocket {
        let socket = UdpSocket::bind("127.0.0.1:0").expect("receiver should bind");
        socket
            .set_read_timeout(Some(Duration::from_secs(2)))
            .expect("read timeout should apply");
        socket
    }

    #[test]
    fn datagrams_carry_tag_and_frame() {
        let rx = receiver();
        let mirror = DiagnosticMirror::new(rx.local_addr().expect("local addr"))
            .expect("mirror should bind");
        let frame = encode(0x123, false, false, &[1, 2, 3]).expect("frame should encode");

        mirror.transmitted(&frame);
        mirror.received(&frame);
        mirror.rejected(&frame);

        let mut buf = [0u8; 64];
        for tag in [TAG_TX, TAG_RX, TAG_REJECTED] {
            let (n, _) = rx.recv_from(&mut buf).expect("datagram should arrive");
            assert_eq!(n, FRAME_SIZE + 1);
            assert_eq!(buf[0], tag);
            assert_eq!(&buf[1..n], frame.as_bytes());
        }
    }

    #[test]
    fn unreachable_target_is_silent() {
        let rx = receiver();
        let target = rx.local_addr().expect("local addr");
        drop(rx);

        let mirror = DiagnosticMirror::new(target).expect("mirror should bind");
        let frame = encode(1, false, false, &[]).expect("frame should encode");
        for _ in 0..4 {
            mirror.transmitted(&frame);
        }
        assert_eq!(mirror.target(), target);
    }
}
