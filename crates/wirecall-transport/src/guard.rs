//! Repeat-byte receive guard for half-duplex bus masters.
//!
//! On a shared bus the master clocks the transfer itself, so a slave
//! that is not yet driving the line yields a buffer full of the idle
//! level. Such a buffer can validate by accident (a CRC of repeated
//! bytes is itself repeatable), so a fully-received buffer composed of a
//! single repeated byte is rejected and a backoff equal to the receive
//! budget is applied before reporting failure.
//!
//! Single-byte reads are exempt: a one-byte acknowledgement is always
//! "all equal" and carries its own sequence check at the protocol layer.

use std::thread;
use std::time::Duration;

use tracing::trace;

use crate::traits::Transport;

/// Rejects all-same-byte receive buffers over an inner link.
pub struct RepeatGuard<T> {
    inner: T,
}

impl<T: Transport> RepeatGuard<T> {
    pub fn new(inner: T) -> Self {
        Self { inner }
    }

    /// Consume the wrapper and return the inner link.
    pub fn into_inner(self) -> T {
        self.inner
    }
}

fn all_same(data: &[u8]) -> bool {
    match data.split_first() {
        Some((first, rest)) if !rest.is_empty() => rest.iter().all(|byte| byte == first),
        _ => false,
    }
}

impl<T: Transport> Transport for RepeatGuard<T> {
    fn recv_exact(&mut self, buf: &mut [u8], timeout: Duration) -> bool {
        if !self.inner.recv_exact(buf, timeout) {
            return false;
        }
        if all_same(buf) {
            trace!(len = buf.len(), "rejecting repeat-byte frame");
            thread::sleep(timeout);
            return false;
        }
        true
    }

    fn send_all(&mut self, data: &[u8], timeout: Duration) -> bool {
        self.inner.send_all(data, timeout)
    }

    fn drain(&mut self) {
        self.inner.drain();
    }

    /// A guarded link is a half-duplex bus master: one frame in flight.
    fn writer_queue_depth_max(&self) -> u32 {
        1
    }
}
