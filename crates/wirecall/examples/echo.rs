//! Minimal call demo — a slave thread answering over an in-memory link.
//!
//! Run with:
//!   cargo run --example echo

use std::thread;
use std::time::Duration;

use bytes::Bytes;

use wirecall::transport::MemLink;
use wirecall::{Master, Slave, SlaveConfig};

fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(tracing::level_filters::LevelFilter::DEBUG)
        .with_target(false)
        .init();

    let (master_link, slave_link) = MemLink::pair();

    let responder = thread::spawn(move || {
        let mut slave = Slave::with_config(slave_link, SlaveConfig::default());
        slave
            .register("echo", |args| Bytes::copy_from_slice(args))
            .expect("registry has room");
        slave
            .register("reverse", |args| {
                let mut bytes = args.to_vec();
                bytes.reverse();
                Bytes::from(bytes)
            })
            .expect("registry has room");

        // Serve two calls, then let the thread end.
        let mut served = 0;
        while served < 2 {
            if slave.poll(Duration::from_millis(100), Duration::from_millis(100)) {
                served += 1;
            }
        }
    });

    let budget = Duration::from_millis(100);
    let mut master = Master::new(master_link);

    let echoed = master
        .call("echo", b"over the wire", budget, budget)
        .expect("echo call should succeed");
    eprintln!("echo     -> {}", String::from_utf8_lossy(echoed));

    let reversed = master
        .call("reverse", b"over the wire", budget, budget)
        .expect("reverse call should succeed");
    eprintln!("reverse  -> {}", String::from_utf8_lossy(reversed));

    responder.join().expect("responder thread should complete");
}
