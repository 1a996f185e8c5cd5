use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::time::{Duration, Instant};

use exocan_bus::{BusConfig, ExoBus};
use exocan_frame::{decode, encode, Message, RawFrame, FRAME_SIZE};

fn open_pair() -> (ExoBus, TcpStream) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("listener should bind");
    let addr = listener.local_addr().expect("listener addr");

    let config = BusConfig::new(format!("tcp://{addr}")).with_read_timeout(Duration::from_millis(20));
    let bus = ExoBus::open(config).expect("bus should connect");
    let (device, _) = listener.accept().expect("listener should accept");
    (bus, device)
}

#[test]
fn receives_frames_after_leading_junk() {
    let (bus, mut device) = open_pair();
    assert!(bus.channel_info().starts_with("ExoSocket interface: 127.0.0.1:"));

    let frames: Vec<RawFrame> = (0..5u16)
        .map(|i| encode(0x300 + i, false, false, &i.to_le_bytes()).expect("encode"))
        .collect();
    let mut wire = vec![0x33];
    for frame in &frames {
        wire.extend_from_slice(frame.as_bytes());
    }
    device.write_all(&wire).expect("device write");

    for i in 0..5u16 {
        let message = bus
            .recv(Some(Duration::from_secs(2)))
            .expect("recv should succeed")
            .expect("frame should arrive");
        assert_eq!(message.id, 0x300 + i);
        assert_eq!(message.data.as_ref(), &i.to_le_bytes());
    }

    let stats = bus.stats();
    assert_eq!(stats.frames, 5);
    assert_eq!(stats.bytes_shed, 1);
    assert_eq!(stats.bytes_in, 5 * FRAME_SIZE as u64 + 1);
}

#[test]
fn sent_frames_reach_the_device() {
    let (bus, mut device) = open_pair();
    device
        .set_read_timeout(Some(Duration::from_secs(2)))
        .expect("device read timeout");

    let message = Message::new(0x1F4, b"exo".to_vec()).with_remote(true);
    bus.send(&message, Some(Duration::from_secs(1)))
        .expect("send should succeed");

    let mut buf = [0u8; FRAME_SIZE];
    device.read_exact(&mut buf).expect("device should read a frame");
    let decoded = decode(&RawFrame::from_array(buf)).expect("frame should decode");
    assert_eq!(decoded, message);
}

#[test]
fn device_disconnect_stops_the_bus() {
    let (bus, device) = open_pair();
    drop(device);

    let deadline = Instant::now() + Duration::from_secs(2);
    while bus.is_open() && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(10));
    }
    assert!(!bus.is_open());
    assert!(bus.recv(None).expect("recv").is_none());
    bus.shutdown().expect("shutdown after disconnect should succeed");
}

#[test]
fn drop_releases_the_link() {
    let (bus, mut device) = open_pair();
    device
        .set_read_timeout(Some(Duration::from_secs(2)))
        .expect("device read timeout");
    drop(bus);

    let mut buf = [0u8; 1];
    let n = device.read(&mut buf).expect("device read after close");
    assert_eq!(n, 0, "bus side should have shut the socket down");
}
