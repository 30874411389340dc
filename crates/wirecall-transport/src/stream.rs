//! Adapter for OS byte streams.
//!
//! Wraps anything implementing `Read + Write` (a serial TTY handle, a
//! socket pair, a PTY) as a [`Transport`]. The underlying handle should
//! be configured with a short OS-level read timeout (a few milliseconds)
//! so that `WouldBlock`/`TimedOut` reads let the adapter poll its own
//! deadline; a handle that blocks indefinitely will stretch transport
//! timeouts to the OS call's duration.

use std::io::{ErrorKind, Read, Write};
use std::time::{Duration, Instant};

use tracing::trace;

use crate::traits::Transport;

/// [`Transport`] over any `Read + Write` byte stream.
pub struct StreamTransport<T> {
    inner: T,
    queue_depth_max: u32,
}

impl<T: Read + Write> StreamTransport<T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            queue_depth_max: 255,
        }
    }

    /// Mark the underlying device as half-duplex, capping the stream
    /// writer's credit window at one frame in flight.
    pub fn half_duplex(mut self) -> Self {
        self.queue_depth_max = 1;
        self
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the adapter and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl<T: Read + Write> Transport for StreamTransport<T> {
    fn recv_exact(&mut self, buf: &mut [u8], timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut filled = 0;

        while filled < buf.len() {
            match self.inner.read(&mut buf[filled..]) {
                Ok(0) => return false,
                Ok(n) => filled += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => {}
                Err(err)
                    if err.kind() == ErrorKind::WouldBlock
                        || err.kind() == ErrorKind::TimedOut => {}
                Err(err) => {
                    trace!(error = %err, "stream read failed");
                    return false;
                }
            }

            if filled < buf.len() && Instant::now() >= deadline {
                return false;
            }
        }

        true
    }

    fn send_all(&mut self, data: &[u8], timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut offset = 0;

        while offset < data.len() {
            match self.inner.write(&data[offset..]) {
                Ok(0) => return false,
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => {}
                Err(err)
                    if err.kind() == ErrorKind::WouldBlock
                        || err.kind() == ErrorKind::TimedOut => {}
                Err(err) => {
                    trace!(error = %err, "stream write failed");
                    return false;
                }
            }

            if offset < data.len() && Instant::now() >= deadline {
                return false;
            }
        }

        self.inner.flush().is_ok()
    }

    fn drain(&mut self) {
        // One pass over whatever is already buffered. Each read blocks at
        // most for the handle's OS-level timeout.
        let mut sink = [0u8; 256];
        loop {
            match self.inner.read(&mut sink) {
                Ok(n) if n > 0 => {}
                _ => return,
            }
        }
    }

    fn writer_queue_depth_max(&self) -> u32 {
        self.queue_depth_max
    }
}
