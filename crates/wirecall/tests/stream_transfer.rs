//! Stream-mode sessions: credit negotiation, flow control and the
//! call-then-stream handoff.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use bytes::Bytes;

use wirecall::frame::{PACKET_OVERHEAD, STREAM_DATA_MAGIC};
use wirecall::transport::{MemLink, Transport};
use wirecall::{stream_read, stream_write, Master, Slave, SlaveConfig, StreamError};

const BUDGET: Duration = Duration::from_millis(200);
const STREAM_HEADER_LEN: usize = PACKET_OVERHEAD + 4;

/// Watches a writer-side link and records the highest number of data
/// frames in flight without an acknowledgement.
struct WindowProbe<T> {
    inner: T,
    outstanding: usize,
    peak: Arc<AtomicUsize>,
}

impl<T> WindowProbe<T> {
    fn new(inner: T) -> (Self, Arc<AtomicUsize>) {
        let peak = Arc::new(AtomicUsize::new(0));
        (
            Self {
                inner,
                outstanding: 0,
                peak: Arc::clone(&peak),
            },
            peak,
        )
    }
}

impl<T: Transport> Transport for WindowProbe<T> {
    fn recv_exact(&mut self, buf: &mut [u8], timeout: Duration) -> bool {
        let ok = self.inner.recv_exact(buf, timeout);
        if ok && buf.len() == 1 {
            // One-byte reads in stream mode are acknowledgements.
            self.outstanding = self.outstanding.saturating_sub(1);
        }
        ok
    }

    fn send_all(&mut self, data: &[u8], timeout: Duration) -> bool {
        if data.len() == STREAM_HEADER_LEN && data[..2] == STREAM_DATA_MAGIC.to_le_bytes() {
            self.outstanding += 1;
            self.peak.fetch_max(self.outstanding, Ordering::SeqCst);
        }
        self.inner.send_all(data, timeout)
    }

    fn drain(&mut self) {
        self.inner.drain();
    }

    fn writer_queue_depth_max(&self) -> u32 {
        self.inner.writer_queue_depth_max()
    }
}

fn counted_payloads(n: usize) -> impl FnMut() -> Option<Bytes> {
    let mut sent = 0;
    move || {
        if sent < n {
            sent += 1;
            // Five bytes so a body can never look like a header frame.
            Some(Bytes::from(vec![sent as u8; 5]))
        } else {
            None
        }
    }
}

#[test]
fn half_duplex_writer_keeps_one_frame_in_flight() {
    let (reader_link, writer_link) = MemLink::pair();
    let (probe, peak) = WindowProbe::new(writer_link.half_duplex());

    let writer = thread::spawn(move || {
        let mut link = probe;
        // Endless source: the reader ends the session by withholding the
        // final acknowledgement.
        stream_write(&mut link, BUDGET, || Some(Bytes::from(vec![0x33; 5])))
    });

    let mut link = reader_link;
    let mut scratch = [0u8; 64];
    let mut frames = 0usize;
    let result = stream_read(&mut link, &mut scratch, 8, BUDGET, |_| {
        frames += 1;
        frames < 8
    });

    assert!(result.is_ok());
    // With one credit the writer cannot proceed past the unacknowledged
    // final frame and times out.
    let writer_result = writer.join().unwrap();
    assert!(matches!(writer_result, Err(StreamError::Timeout)));
    assert_eq!(frames, 8);
    // Depth 8 was requested, but the half-duplex cap negotiates it down
    // to a strict one-in-flight alternation.
    assert_eq!(peak.load(Ordering::SeqCst), 1);
}

#[test]
fn full_duplex_writer_respects_negotiated_window() {
    let (reader_link, writer_link) = MemLink::pair();
    let (probe, peak) = WindowProbe::new(writer_link);

    let writer = thread::spawn(move || {
        let mut link = probe;
        stream_write(&mut link, BUDGET, counted_payloads(24))
    });

    let depth = 6u32;
    let mut link = reader_link;
    let mut scratch = [0u8; 64];
    let mut frames = 0usize;
    let result = stream_read(&mut link, &mut scratch, depth, BUDGET, |_| {
        frames += 1;
        frames < 24
    });

    assert!(result.is_ok());
    assert!(writer.join().unwrap().is_ok());
    assert_eq!(frames, 24);

    let observed = peak.load(Ordering::SeqCst);
    assert!(observed <= depth as usize, "window exceeded: {observed}");
    assert!(observed >= 2, "window never opened: {observed}");
}

#[test]
fn reader_sees_bodies_in_emission_order() {
    let (reader_link, writer_link) = MemLink::pair();

    let writer = thread::spawn(move || {
        let mut link = writer_link;
        stream_write(&mut link, BUDGET, counted_payloads(5))
    });

    let mut link = reader_link;
    let mut scratch = [0u8; 16];
    let mut seen = Vec::new();
    let result = stream_read(&mut link, &mut scratch, 4, BUDGET, |body| {
        seen.push(body[0]);
        seen.len() < 5
    });

    assert!(result.is_ok());
    assert!(writer.join().unwrap().is_ok());
    assert_eq!(seen, [1, 2, 3, 4, 5]);
}

#[test]
fn abandoned_reader_times_the_writer_out() {
    let (reader_link, writer_link) = MemLink::pair();

    let writer = thread::spawn(move || {
        let mut link = writer_link;
        // Endless source; only the dead reader can end this session.
        stream_write(&mut link, BUDGET, || Some(Bytes::from_static(b"data!")))
    });

    {
        let mut link = reader_link;
        let mut scratch = [0u8; 16];
        let result = stream_read(&mut link, &mut scratch, 2, BUDGET, |_| false);
        assert!(result.is_ok());
        // Link drops here; no more acks will ever arrive.
    }

    let result = writer.join().unwrap();
    assert!(matches!(result, Err(StreamError::Timeout)));
}

#[test]
fn call_then_stream_handoff() {
    let (master_link, slave_link) = MemLink::pair();
    let handed_off = Arc::new(AtomicBool::new(false));
    let handed_off_flag = Arc::clone(&handed_off);

    let slave = thread::spawn(move || {
        let mut slave = Slave::with_config(slave_link, SlaveConfig::default());
        slave
            .register("begin_capture", |_| Bytes::from_static(b"ready"))
            .unwrap();

        // Serve calls until one completes, then hand the link over to
        // stream mode the way a responder would after agreeing to it.
        while !slave.poll(BUDGET, BUDGET) {}
        handed_off_flag.store(true, Ordering::SeqCst);
        slave.stream_writer(BUDGET, counted_payloads(3))
    });

    let mut master = Master::new(master_link);
    let reply = master.call("begin_capture", &[], BUDGET, BUDGET).unwrap();
    assert_eq!(reply, b"ready");

    let mut frames = 0usize;
    let result = master.stream_reader(4, BUDGET, |_| {
        frames += 1;
        frames < 3
    });

    assert!(result.is_ok());
    assert!(slave.join().unwrap().is_ok());
    assert!(handed_off.load(Ordering::SeqCst));
    assert_eq!(frames, 3);
}
