//! Talks to a simulated device over TCP on localhost.
//!
//! The device answers every frame with the same payload on `id + 1`, and
//! prefixes each answer with a noise byte the bus has to resynchronize past.
//!
//! Run with:
//!   cargo run --example loopback

use std::io::{Read, Write};
use std::net::TcpListener;
use std::thread;
use std::time::Duration;

use exocan::frame::{decode, encode, RawFrame, FRAME_SIZE};
use exocan::{BusConfig, ExoBus, Message};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let listener = TcpListener::bind("127.0.0.1:0")?;
    let addr = listener.local_addr()?;

    let device = thread::spawn(move || -> std::io::Result<()> {
        let (mut stream, _) = listener.accept()?;
        let mut buf = [0u8; FRAME_SIZE];
        while stream.read_exact(&mut buf).is_ok() {
            let Ok(request) = decode(&RawFrame::from_array(buf)) else {
                continue;
            };
            let id = (request.id + 1) & exocan::frame::MAX_ID;
            if let Ok(reply) = encode(id, false, false, &request.data) {
                stream.write_all(&[0x55])?;
                stream.write_all(reply.as_bytes())?;
            }
        }
        Ok(())
    });

    let bus = ExoBus::open(BusConfig::new(format!("tcp://{addr}")))?;
    eprintln!("opened {}", bus.channel_info());

    for i in 0..4u8 {
        let request = Message::new(0x100 + u16::from(i) * 2, vec![i, i, i]);
        bus.send(&request, Some(Duration::from_secs(1)))?;
        match bus.recv(Some(Duration::from_secs(1)))? {
            Some(reply) => eprintln!("{request} -> {reply}"),
            None => eprintln!("{request} -> no reply"),
        }
    }

    eprintln!("stats: {:?}", bus.stats());
    bus.shutdown()?;
    device.join().map_err(|_| "device thread panicked")??;
    Ok(())
}
