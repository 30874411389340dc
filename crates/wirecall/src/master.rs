//! Master side of a call: command dispatch and result retrieval.
//!
//! A call is two framed handshakes. First the command is pushed:
//!
//! ```text
//! master → slave   COMMAND_HEADER (hash, arg len)
//! master ← slave   COMMAND_HEADER ack (empty)
//! master → slave   COMMAND_DATA (arg bytes)
//! master ← slave   COMMAND_DATA ack (empty)
//! ```
//!
//! then the result is pulled:
//!
//! ```text
//! master → slave   RESULT_HEADER request (empty)
//! master ← slave   RESULT_HEADER (result len)
//! master → slave   RESULT_DATA request (empty)
//! master ← slave   RESULT_DATA (result bytes)
//! ```
//!
//! Headers go first so both sides are sized and ready before any bulk
//! transfer starts; a desynchronised peer costs a cheap header
//! retransmit, never a wasted long transfer. Each handshake retries its
//! whole sequence under the caller's budget with geometrically growing
//! short timeouts.

use std::time::Duration;

use bytes::Bytes;
use tracing::{debug, trace};

use wirecall_frame::{
    check_packet, encode_packet, packet, procedure_hash, COMMAND_DATA_MAGIC,
    COMMAND_HEADER_MAGIC, PACKET_OVERHEAD, RESULT_DATA_MAGIC, RESULT_HEADER_MAGIC,
};
use wirecall_transport::Transport;

use crate::error::{CallError, Result, StreamError};
use crate::retry::{Deadline, RetryTimers};
use crate::stream::{stream_read, stream_write};

/// Total size of a COMMAND_HEADER frame: magic + (hash, len) + CRC.
const COMMAND_HEADER_LEN: usize = PACKET_OVERHEAD + 8;
/// Total size of a RESULT_HEADER frame: magic + len + CRC.
const RESULT_HEADER_LEN: usize = PACKET_OVERHEAD + 4;

/// Construction-time master options.
#[derive(Debug, Clone)]
pub struct MasterConfig {
    /// Scratch buffer size; caps request and response payloads at four
    /// bytes less.
    pub scratch_capacity: usize,
    /// Treat a zero-length result as a failed call.
    pub fail_on_empty: bool,
}

impl Default for MasterConfig {
    fn default() -> Self {
        Self {
            scratch_capacity: 512,
            fail_on_empty: false,
        }
    }
}

/// The calling side of a link.
pub struct Master<T> {
    link: T,
    scratch: Vec<u8>,
    fail_on_empty: bool,
    // Empty frames sent to poll the slave for its result; built once.
    result_header_poll: Bytes,
    result_data_poll: Bytes,
}

impl<T: Transport> Master<T> {
    pub fn new(link: T) -> Self {
        Self::with_config(link, MasterConfig::default())
    }

    pub fn with_config(link: T, config: MasterConfig) -> Self {
        Self {
            link,
            scratch: vec![0; config.scratch_capacity],
            fail_on_empty: config.fail_on_empty,
            result_header_poll: packet(RESULT_HEADER_MAGIC, &[]),
            result_data_poll: packet(RESULT_DATA_MAGIC, &[]),
        }
    }

    /// Largest request or response payload this master can carry.
    pub fn max_payload(&self) -> usize {
        self.scratch.len().saturating_sub(PACKET_OVERHEAD)
    }

    /// Borrow the underlying transport.
    pub fn link_mut(&mut self) -> &mut T {
        &mut self.link
    }

    /// Invoke `name` on the peer and borrow the result bytes.
    ///
    /// The returned slice lives in the internal scratch buffer and is
    /// valid until the next operation on this master. `send_timeout` and
    /// `recv_timeout` budget the command and result handshakes
    /// respectively.
    pub fn call(
        &mut self,
        name: &str,
        args: &[u8],
        send_timeout: Duration,
        recv_timeout: Duration,
    ) -> Result<&[u8]> {
        let command = procedure_hash(name);
        self.put_command(command, args, send_timeout)?;
        let (offset, len) = self.get_result(recv_timeout)?;

        if self.fail_on_empty && len == 0 {
            return Err(CallError::EmptyResult);
        }

        debug!(command, len, "call completed");
        Ok(&self.scratch[offset..offset + len])
    }

    /// Invoke `name` on the peer, copying the result into `out`.
    ///
    /// Copies at most `out.len()` bytes and returns the copied length.
    /// On any failure `out` is zeroed in full, so callers never observe
    /// stale bytes in the response region.
    pub fn call_into(
        &mut self,
        name: &str,
        args: &[u8],
        out: &mut [u8],
        send_timeout: Duration,
        recv_timeout: Duration,
    ) -> Result<usize> {
        match self.call(name, args, send_timeout, recv_timeout) {
            Ok(result) => {
                let n = result.len().min(out.len());
                out[..n].copy_from_slice(&result[..n]);
                Ok(n)
            }
            Err(err) => {
                out.fill(0);
                Err(err)
            }
        }
    }

    /// Switch the link into stream-consumer mode after a call.
    ///
    /// Proposes `queue_depth` credits to the peer's writer and feeds each
    /// received body to `sink` until `sink` returns `false` or the
    /// session errors out.
    pub fn stream_reader(
        &mut self,
        queue_depth: u32,
        read_timeout: Duration,
        sink: impl FnMut(&[u8]) -> bool,
    ) -> std::result::Result<(), StreamError> {
        stream_read(&mut self.link, &mut self.scratch, queue_depth, read_timeout, sink)
    }

    /// Switch the link into stream-producer mode after a call.
    ///
    /// Waits for the peer's setup frame, then emits every payload yielded
    /// by `source` under credit flow control until `source` returns
    /// `None` or the session errors out.
    pub fn stream_writer(
        &mut self,
        write_timeout: Duration,
        source: impl FnMut() -> Option<Bytes>,
    ) -> std::result::Result<(), StreamError> {
        stream_write(&mut self.link, write_timeout, source)
    }

    fn put_command(&mut self, command: u32, args: &[u8], timeout: Duration) -> Result<()> {
        let mut info = [0u8; 8];
        info[..4].copy_from_slice(&command.to_le_bytes());
        info[4..].copy_from_slice(&(args.len() as u32).to_le_bytes());
        let header = packet(COMMAND_HEADER_MAGIC, &info);

        // The data frame is assembled once, up front; an oversized
        // request fails here before any bytes move.
        let frame_len = encode_packet(&mut self.scratch, COMMAND_DATA_MAGIC, args)
            .map_err(|_| CallError::SizeExceeded {
                len: args.len(),
                max: self.scratch.len().saturating_sub(PACKET_OVERHEAD),
            })?;

        let deadline = Deadline::after(timeout);
        let mut timers = RetryTimers::start();
        let mut header_ack = [0u8; PACKET_OVERHEAD];
        let mut data_ack = [0u8; PACKET_OVERHEAD];

        while !deadline.expired() {
            header_ack.fill(0);
            data_ack.fill(0);
            self.link.drain();

            self.link.send_all(&header, timers.put_short);
            if recv_packet(
                &mut self.link,
                COMMAND_HEADER_MAGIC,
                &mut header_ack,
                timers.get_short,
            ) {
                self.link
                    .send_all(&self.scratch[..frame_len], deadline.remaining());
                if recv_packet(
                    &mut self.link,
                    COMMAND_DATA_MAGIC,
                    &mut data_ack,
                    timers.get_short,
                ) {
                    trace!(command, len = args.len(), "command delivered");
                    return Ok(());
                }
            }

            timers.grow_geometric(timeout);
        }

        Err(CallError::Timeout(timeout))
    }

    fn get_result(&mut self, timeout: Duration) -> Result<(usize, usize)> {
        let deadline = Deadline::after(timeout);
        let mut timers = RetryTimers::start();
        let mut header = [0u8; RESULT_HEADER_LEN];

        while !deadline.expired() {
            header.fill(0);
            self.link.drain();

            self.link.send_all(&self.result_header_poll, timers.put_short);
            if self.link.recv_exact(&mut header, timers.get_short) {
                if let Some(result_len) = parse_length(&header) {
                    let frame_len = result_len + PACKET_OVERHEAD;
                    if self.scratch.len() < frame_len {
                        // The peer committed to a result we cannot hold;
                        // retrying will not shrink it.
                        return Err(CallError::SizeExceeded {
                            len: result_len,
                            max: self.scratch.len().saturating_sub(PACKET_OVERHEAD),
                        });
                    }

                    self.link.send_all(&self.result_data_poll, timers.put_short);
                    if self
                        .link
                        .recv_exact(&mut self.scratch[..frame_len], deadline.remaining())
                        && check_packet(&self.scratch[..frame_len], RESULT_DATA_MAGIC).is_ok()
                    {
                        return Ok((2, result_len));
                    }
                }
            }

            timers.grow_geometric(timeout);
        }

        Err(CallError::Timeout(timeout))
    }
}

/// Receive a frame of exactly `buf.len()` bytes and validate it.
fn recv_packet<T: Transport>(
    link: &mut T,
    magic: u16,
    buf: &mut [u8],
    timeout: Duration,
) -> bool {
    link.recv_exact(buf, timeout) && check_packet(buf, magic).is_ok()
}

/// Validate a RESULT_HEADER frame and extract the announced length.
fn parse_length(frame: &[u8]) -> Option<usize> {
    let payload = check_packet(frame, RESULT_HEADER_MAGIC).ok()?;
    let bytes: [u8; 4] = payload.try_into().ok()?;
    Some(u32::from_le_bytes(bytes) as usize)
}
