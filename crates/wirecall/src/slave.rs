//! Slave side of a call: command reception, dispatch, result transmit.
//!
//! The slave mirrors the master's two handshakes from the passive end:
//! it waits for a command header, sizes itself, acknowledges, collects
//! the argument bytes, dispatches to the registered handler, then holds
//! the result until the master polls for it. Its short timeouts grow
//! additively between attempts, keeping the passive side responsive to
//! a fresh request rather than sleeping through one.

use std::time::Duration;

use bytes::Bytes;
use tracing::{debug, trace};

use wirecall_frame::{
    check_packet, encode_packet, packet, procedure_hash, COMMAND_DATA_MAGIC,
    COMMAND_HEADER_MAGIC, PACKET_OVERHEAD, RESULT_DATA_MAGIC, RESULT_HEADER_MAGIC,
};
use wirecall_transport::Transport;

use crate::error::{RegistryError, StreamError};
use crate::registry::Registry;
use crate::retry::{Deadline, RetryTimers};
use crate::stream::{stream_read, stream_write};

/// Total size of a COMMAND_HEADER frame: magic + (hash, len) + CRC.
const COMMAND_HEADER_LEN: usize = PACKET_OVERHEAD + 8;

/// A one-shot or per-iteration hook.
pub type Hook = Box<dyn FnMut() + Send>;

/// Construction-time slave options.
#[derive(Debug, Clone)]
pub struct SlaveConfig {
    /// Scratch buffer size; caps request and response payloads at four
    /// bytes less.
    pub scratch_capacity: usize,
    /// Fixed capacity of the handler table.
    pub registry_capacity: usize,
}

impl Default for SlaveConfig {
    fn default() -> Self {
        Self {
            scratch_capacity: 512,
            registry_capacity: 16,
        }
    }
}

/// The responding side of a link.
pub struct Slave<T> {
    link: T,
    scratch: Vec<u8>,
    registry: Registry,
    schedule_hook: Option<Hook>,
    loop_hook: Option<Hook>,
    // Empty acknowledgement frames; built once, retransmitted verbatim.
    command_header_ack: Bytes,
    command_data_ack: Bytes,
}

impl<T: Transport> Slave<T> {
    pub fn new(link: T) -> Self {
        Self::with_config(link, SlaveConfig::default())
    }

    pub fn with_config(link: T, config: SlaveConfig) -> Self {
        Self {
            link,
            scratch: vec![0; config.scratch_capacity],
            registry: Registry::with_capacity(config.registry_capacity),
            schedule_hook: None,
            loop_hook: None,
            command_header_ack: packet(COMMAND_HEADER_MAGIC, &[]),
            command_data_ack: packet(COMMAND_DATA_MAGIC, &[]),
        }
    }

    /// Largest request or response payload this slave can carry.
    pub fn max_payload(&self) -> usize {
        self.scratch.len().saturating_sub(PACKET_OVERHEAD)
    }

    /// Borrow the underlying transport.
    pub fn link_mut(&mut self) -> &mut T {
        &mut self.link
    }

    /// Register `handler` as the body of procedure `name`.
    ///
    /// Registering a name twice replaces the previous handler; a new
    /// name only fails when the table is at capacity.
    pub fn register(
        &mut self,
        name: &str,
        handler: impl FnMut(&[u8]) -> Bytes + Send + 'static,
    ) -> Result<(), RegistryError> {
        self.registry.insert(procedure_hash(name), Box::new(handler))
    }

    /// Arm a hook that fires once, after the next result is delivered.
    ///
    /// The hook is disarmed after the next exchange whether or not the
    /// delivery succeeded; it fires only on success. Typical use is
    /// switching the link into a stream mode the just-answered call
    /// agreed on.
    pub fn schedule_once(&mut self, hook: impl FnMut() + Send + 'static) {
        self.schedule_hook = Some(Box::new(hook));
    }

    /// Install a hook invoked at the end of every serve iteration,
    /// whether or not a command arrived.
    pub fn on_loop(&mut self, hook: impl FnMut() + Send + 'static) {
        self.loop_hook = Some(Box::new(hook));
    }

    /// Serve forever.
    pub fn run(&mut self, send_timeout: Duration, recv_timeout: Duration) -> ! {
        loop {
            self.poll(send_timeout, recv_timeout);
        }
    }

    /// One serve iteration: receive a command, dispatch it, deliver the
    /// result, fire hooks. Returns `true` when a complete exchange
    /// finished.
    pub fn poll(&mut self, send_timeout: Duration, recv_timeout: Duration) -> bool {
        let mut served = false;

        if let Some((command, arg_len)) = self.get_command(recv_timeout) {
            let response = match self.registry.lookup(command) {
                Some(handler) => handler(&self.scratch[2..2 + arg_len]),
                None => {
                    // Unknown procedure: a successful exchange with an
                    // empty result, so the master is not left retrying.
                    trace!(command, "no handler registered");
                    Bytes::new()
                }
            };

            served = self.put_result(&response, send_timeout);
            let hook = self.schedule_hook.take();
            if served {
                debug!(command, len = response.len(), "result delivered");
                if let Some(mut hook) = hook {
                    hook();
                }
            }
        }

        if let Some(hook) = self.loop_hook.as_mut() {
            hook();
        }

        served
    }

    /// Switch the link into stream-consumer mode after a call.
    pub fn stream_reader(
        &mut self,
        queue_depth: u32,
        read_timeout: Duration,
        sink: impl FnMut(&[u8]) -> bool,
    ) -> Result<(), StreamError> {
        stream_read(&mut self.link, &mut self.scratch, queue_depth, read_timeout, sink)
    }

    /// Switch the link into stream-producer mode after a call.
    pub fn stream_writer(
        &mut self,
        write_timeout: Duration,
        source: impl FnMut() -> Option<Bytes>,
    ) -> Result<(), StreamError> {
        stream_write(&mut self.link, write_timeout, source)
    }

    fn get_command(&mut self, timeout: Duration) -> Option<(u32, usize)> {
        let deadline = Deadline::after(timeout);
        let mut timers = RetryTimers::start();
        let mut header = [0u8; COMMAND_HEADER_LEN];

        while !deadline.expired() {
            header.fill(0);
            self.link.drain();

            if self.link.recv_exact(&mut header, timers.get_short) {
                if let Some((command, arg_len)) = parse_command_header(&header) {
                    let frame_len = arg_len + PACKET_OVERHEAD;
                    if self.scratch.len() < frame_len {
                        // Cannot hold this request; give up now so the
                        // master's retries surface the failure quickly.
                        return None;
                    }

                    self.link.send_all(&self.command_header_ack, timers.put_short);
                    if self
                        .link
                        .recv_exact(&mut self.scratch[..frame_len], deadline.remaining())
                        && check_packet(&self.scratch[..frame_len], COMMAND_DATA_MAGIC).is_ok()
                    {
                        self.link.send_all(&self.command_data_ack, timers.put_short);
                        trace!(command, len = arg_len, "command accepted");
                        return Some((command, arg_len));
                    }
                }
            }

            timers.grow_additive(timeout);
        }

        None
    }

    fn put_result(&mut self, response: &[u8], timeout: Duration) -> bool {
        // Assemble the data frame up front; an oversized response cannot
        // be transmitted at all.
        let Ok(frame_len) = encode_packet(&mut self.scratch, RESULT_DATA_MAGIC, response) else {
            return false;
        };
        let header = packet(RESULT_HEADER_MAGIC, &(response.len() as u32).to_le_bytes());

        let deadline = Deadline::after(timeout);
        let mut timers = RetryTimers::start();
        let mut header_poll = [0u8; PACKET_OVERHEAD];
        let mut data_poll = [0u8; PACKET_OVERHEAD];

        while !deadline.expired() {
            header_poll.fill(0);
            data_poll.fill(0);
            self.link.drain();

            if recv_packet(
                &mut self.link,
                RESULT_HEADER_MAGIC,
                &mut header_poll,
                timers.get_short,
            ) {
                self.link.send_all(&header, timers.put_short);
                if recv_packet(
                    &mut self.link,
                    RESULT_DATA_MAGIC,
                    &mut data_poll,
                    timers.get_short,
                ) {
                    self.link
                        .send_all(&self.scratch[..frame_len], deadline.remaining());
                    return true;
                }
            }

            timers.grow_additive(timeout);
        }

        false
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

/// Validate a COMMAND_HEADER frame and extract `(hash, argument length)`.
fn parse_command_header(frame: &[u8]) -> Option<(u32, usize)> {
    let payload = check_packet(frame, COMMAND_HEADER_MAGIC).ok()?;
    if payload.len() != 8 {
        return None;
    }
    let command = u32::from_le_bytes([payload[0], payload[1], payload[2], payload[3]]);
    let arg_len = u32::from_le_bytes([payload[4], payload[5], payload[6], payload[7]]);
    Some((command, arg_len as usize))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use wirecall_transport::NullLink;

    const SHORT: Duration = Duration::from_millis(10);

    #[test]
    fn command_header_parsing() {
        let mut info = [0u8; 8];
        info[..4].copy_from_slice(&0x1234_5678u32.to_le_bytes());
        info[4..].copy_from_slice(&42u32.to_le_bytes());
        let frame = packet(COMMAND_HEADER_MAGIC, &info);

        assert_eq!(parse_command_header(&frame), Some((0x1234_5678, 42)));

        let mut corrupt = frame.to_vec();
        corrupt[5] ^= 0x10;
        assert_eq!(parse_command_header(&corrupt), None);

        let short = packet(COMMAND_HEADER_MAGIC, &[0u8; 4]);
        assert_eq!(parse_command_header(&short), None);
    }

    #[test]
    fn register_respects_capacity() {
        let mut slave = Slave::with_config(
            NullLink,
            SlaveConfig {
                registry_capacity: 1,
                ..SlaveConfig::default()
            },
        );

        slave.register("first", |_| Bytes::new()).unwrap();
        // Same name again: replacement, not growth.
        slave.register("first", |_| Bytes::from_static(b"v2")).unwrap();

        let err = slave.register("second", |_| Bytes::new()).unwrap_err();
        assert!(matches!(err, RegistryError::Full { capacity: 1 }));
    }

    #[test]
    fn quiet_link_polls_false_and_fires_loop_hook() {
        let mut slave = Slave::new(NullLink);
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ticks);
        slave.on_loop(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert!(!slave.poll(SHORT, SHORT));
        assert!(!slave.poll(SHORT, SHORT));
        assert_eq!(ticks.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn oversized_response_is_not_transmitted() {
        let mut slave = Slave::with_config(
            NullLink,
            SlaveConfig {
                scratch_capacity: 8,
                ..SlaveConfig::default()
            },
        );

        assert!(!slave.put_result(&[0u8; 16], SHORT));
    }
}
