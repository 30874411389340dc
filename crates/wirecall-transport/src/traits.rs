use std::time::Duration;

/// A byte-level link between two call peers.
///
/// The contract is minimal: exact-length reads and writes
/// under a millisecond-scale budget, plus the ability to discard stale
/// input. The protocol layers above never see partial transfers: an
/// operation either moves every requested byte within its timeout or
/// reports failure, and the retry loops re-issue the whole exchange.
///
/// Failures are reported as `false` rather than an error type: the call
/// state machines treat every transport failure identically (retry until
/// the budget expires), so there is nothing to dispatch on.
pub trait Transport {
    /// Read exactly `buf.len()` bytes within `timeout`.
    ///
    /// On failure the buffer may be partially overwritten; callers must
    /// not interpret its contents. Bytes consumed by a failed read are
    /// gone, and the next attempt starts with [`drain`](Transport::drain).
    fn recv_exact(&mut self, buf: &mut [u8], timeout: Duration) -> bool;

    /// Write all of `data` within `timeout`.
    fn send_all(&mut self, data: &[u8], timeout: Duration) -> bool;

    /// Discard any pending input bytes (partial frames from an aborted
    /// exchange).
    fn drain(&mut self);

    /// Advised cap on a stream writer's credit window. Half-duplex links
    /// return 1 so the writer never bursts into a bus it shares with its
    /// reader. Must be at least 1.
    fn writer_queue_depth_max(&self) -> u32 {
        255
    }
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn recv_exact(&mut self, buf: &mut [u8], timeout: Duration) -> bool {
        (**self).recv_exact(buf, timeout)
    }

    fn send_all(&mut self, data: &[u8], timeout: Duration) -> bool {
        (**self).send_all(data, timeout)
    }

    fn drain(&mut self) {
        (**self).drain()
    }

    fn writer_queue_depth_max(&self) -> u32 {
        (**self).writer_queue_depth_max()
    }
}

/// A link that discards all writes and never produces input.
///
/// Useful as a placeholder when a peer is not yet attached.
pub struct NullLink;

impl Transport for NullLink {
    fn recv_exact(&mut self, _buf: &mut [u8], timeout: Duration) -> bool {
        std::thread::sleep(timeout);
        false
    }

    fn send_all(&mut self, _data: &[u8], _timeout: Duration) -> bool {
        true
    }

    fn drain(&mut self) {}
}
