//! Call-then-stream demo — negotiate a capture over a call, then move
//! the bulk frames in stream mode.
//!
//! Run with:
//!   cargo run --example capture-stream

use std::thread;
use std::time::Duration;

use bytes::Bytes;

use wirecall::transport::MemLink;
use wirecall::{Master, Slave, SlaveConfig};

const FRAMES: usize = 4;
const BUDGET: Duration = Duration::from_millis(200);

fn main() {
    let (master_link, slave_link) = MemLink::pair();

    let producer = thread::spawn(move || {
        let mut slave = Slave::with_config(slave_link, SlaveConfig::default());
        slave
            .register("begin_capture", |_| Bytes::from_static(b"ready"))
            .expect("registry has room");

        // Answer the call, then hand the link over to stream mode.
        while !slave.poll(BUDGET, BUDGET) {}

        let mut sequence = 0u8;
        slave.stream_writer(BUDGET, move || {
            if usize::from(sequence) < FRAMES {
                sequence += 1;
                Some(Bytes::from(vec![sequence; 16]))
            } else {
                None
            }
        })
    });

    let mut master = Master::new(master_link);
    let reply = master
        .call("begin_capture", &[], BUDGET, BUDGET)
        .expect("capture negotiation should succeed");
    eprintln!("slave answered: {}", String::from_utf8_lossy(reply));

    let mut received = 0usize;
    master
        .stream_reader(4, BUDGET, |body| {
            received += 1;
            eprintln!("frame {received}: {} bytes of {:#04x}", body.len(), body[0]);
            received < FRAMES
        })
        .expect("stream session should end cleanly");

    producer
        .join()
        .expect("producer thread should complete")
        .expect("writer should end cleanly");
}
