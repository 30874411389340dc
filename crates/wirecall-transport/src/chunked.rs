//! Fixed-size chunking wrapper.
//!
//! Buses with a bounded transaction size move frames as a sequence of
//! small transfers: 32 bytes per transaction on I²C, 8 bytes per packet
//! on CAN. This wrapper reproduces that segmentation over any inner
//! link, with an optional settle delay before each transfer to give a
//! slow peer time to get ready.

use std::thread;
use std::time::{Duration, Instant};

use crate::traits::Transport;

/// I²C-style transaction size.
pub const I2C_CHUNK: usize = 32;
/// CAN-style packet size.
pub const CAN_CHUNK: usize = 8;

/// Splits transfers into fixed-size chunks over an inner link.
pub struct Chunked<T> {
    inner: T,
    chunk: usize,
    settle: Duration,
}

impl<T: Transport> Chunked<T> {
    pub fn new(inner: T, chunk: usize) -> Self {
        Self {
            inner,
            chunk: chunk.max(1),
            settle: Duration::ZERO,
        }
    }

    /// Sleep this long before each chunk transfer.
    pub fn with_settle_delay(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    /// Consume the wrapper and return the inner link.
    pub fn into_inner(self) -> T {
        self.inner
    }

    fn settle(&self) {
        if !self.settle.is_zero() {
            thread::sleep(self.settle);
        }
    }
}

impl<T: Transport> Transport for Chunked<T> {
    fn recv_exact(&mut self, buf: &mut [u8], timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        for chunk in buf.chunks_mut(self.chunk) {
            self.settle();
            let remaining = deadline.saturating_duration_since(Instant::now());
            if !self.inner.recv_exact(chunk, remaining) {
                return false;
            }
        }
        true
    }

    fn send_all(&mut self, data: &[u8], timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        for chunk in data.chunks(self.chunk) {
            self.settle();
            let remaining = deadline.saturating_duration_since(Instant::now());
            if !self.inner.send_all(chunk, remaining) {
                return false;
            }
        }
        true
    }

    fn drain(&mut self) {
        self.inner.drain();
    }

    fn writer_queue_depth_max(&self) -> u32 {
        self.inner.writer_queue_depth_max()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mem::MemLink;

    const TICK: Duration = Duration::from_millis(100);

    #[test]
    fn chunked_send_arrives_whole() {
        let (left, mut right) = MemLink::pair();
        let mut chunked = Chunked::new(left, CAN_CHUNK);

        let payload: Vec<u8> = (0..50).collect();
        assert!(chunked.send_all(&payload, TICK));

        let mut buf = vec![0u8; 50];
        assert!(right.recv_exact(&mut buf, TICK));
        assert_eq!(buf, payload);
    }

    #[test]
    fn chunked_recv_reassembles() {
        let (mut left, right) = MemLink::pair();
        let mut chunked = Chunked::new(right, I2C_CHUNK);

        let payload: Vec<u8> = (0..100).collect();
        assert!(left.send_all(&payload, TICK));

        let mut buf = vec![0u8; 100];
        assert!(chunked.recv_exact(&mut buf, TICK));
        assert_eq!(buf, payload);
    }

    #[test]
    fn recv_fails_when_source_is_short() {
        let (mut left, right) = MemLink::pair();
        let mut chunked = Chunked::new(right, 8);

        assert!(left.send_all(&[1, 2, 3], TICK));
        let mut buf = [0u8; 16];
        assert!(!chunked.recv_exact(&mut buf, Duration::from_millis(20)));
    }

    #[test]
    fn zero_chunk_size_is_clamped() {
        let (left, _right) = MemLink::pair();
        let chunked = Chunked::new(left, 0);
        assert_eq!(chunked.chunk, 1);
    }
}
