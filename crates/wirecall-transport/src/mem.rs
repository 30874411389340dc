//! In-memory paired link.
//!
//! Two connected endpoints backed by mutex/condvar byte queues: the
//! loopback transport used by tests, demos and same-process peers. Reads
//! block until enough bytes arrive or the timeout expires; writes always
//! succeed immediately.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use crate::traits::Transport;

#[derive(Default)]
struct Pipe {
    bytes: Mutex<VecDeque<u8>>,
    arrived: Condvar,
}

impl Pipe {
    fn push(&self, data: &[u8]) -> bool {
        let Ok(mut queue) = self.bytes.lock() else {
            return false;
        };
        queue.extend(data);
        self.arrived.notify_one();
        true
    }

    fn pop_exact(&self, buf: &mut [u8], timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let Ok(mut queue) = self.bytes.lock() else {
            return false;
        };

        let mut filled = 0;
        loop {
            while filled < buf.len() {
                match queue.pop_front() {
                    Some(byte) => {
                        buf[filled] = byte;
                        filled += 1;
                    }
                    None => break,
                }
            }
            if filled == buf.len() {
                return true;
            }

            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            queue = match self.arrived.wait_timeout(queue, deadline - now) {
                Ok((guard, _)) => guard,
                Err(_) => return false,
            };
        }
    }

    fn clear(&self) {
        if let Ok(mut queue) = self.bytes.lock() {
            queue.clear();
        }
    }
}

/// One endpoint of an in-memory byte link.
///
/// Created in connected pairs via [`MemLink::pair`]. Each endpoint reads
/// what the other wrote, in order, with no loss or corruption.
pub struct MemLink {
    rx: Arc<Pipe>,
    tx: Arc<Pipe>,
    queue_depth_max: u32,
}

impl MemLink {
    /// Create two connected endpoints.
    pub fn pair() -> (MemLink, MemLink) {
        let a = Arc::new(Pipe::default());
        let b = Arc::new(Pipe::default());
        (
            MemLink {
                rx: Arc::clone(&a),
                tx: Arc::clone(&b),
                queue_depth_max: 255,
            },
            MemLink {
                rx: b,
                tx: a,
                queue_depth_max: 255,
            },
        )
    }

    /// Mark this endpoint as half-duplex, capping the stream writer's
    /// credit window at one frame in flight.
    pub fn half_duplex(mut self) -> Self {
        self.queue_depth_max = 1;
        self
    }
}

impl Transport for MemLink {
    fn recv_exact(&mut self, buf: &mut [u8], timeout: Duration) -> bool {
        self.rx.pop_exact(buf, timeout)
    }

    fn send_all(&mut self, data: &[u8], _timeout: Duration) -> bool {
        self.tx.push(data)
    }

    fn drain(&mut self) {
        self.rx.clear();
    }

    fn writer_queue_depth_max(&self) -> u32 {
        self.queue_depth_max
    }
}
