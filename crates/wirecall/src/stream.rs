//! Post-call bulk streaming with credit flow control.
//!
//! After a call has established what both sides want, the link can leave
//! request/response mode and move bulk data in one direction. The
//! consumer initiates:
//!
//! ```text
//! reader → writer   STREAM_SETUP (queue depth)
//! writer → reader   STREAM_DATA header (body len), then len raw bytes
//! reader → writer   one acknowledgement byte per frame (LFSR sequence)
//! ```
//!
//! The writer spends one credit per frame and blocks for an ack byte
//! whenever its credits fall to half the negotiated window, so a window
//! of D tolerates transient one-sided stalls without stop-and-wait
//! overhead while never exceeding D unacknowledged frames. Ack bytes
//! follow a maximal-length 8-bit LFSR rather than a fixed value: a bus
//! stuck at one level or echoing the writer's own bytes fails the
//! sequence immediately.
//!
//! Bodies travel raw, without a trailing CRC: the framed header has
//! already sized the transfer, and stream consumers tolerate payload
//! noise better than they tolerate per-frame latency.

use std::time::Duration;

use bytes::Bytes;
use tracing::{debug, trace};

use wirecall_frame::{check_packet, packet, PACKET_OVERHEAD, STREAM_DATA_MAGIC, STREAM_SETUP_MAGIC};
use wirecall_transport::Transport;

use crate::error::StreamError;

/// Budget for the small control transfers: setup frame, data header,
/// acknowledgement byte.
const CONTROL_TIMEOUT: Duration = Duration::from_millis(1000);

/// Total size of a STREAM_SETUP or STREAM_DATA header frame.
const STREAM_HEADER_LEN: usize = PACKET_OVERHEAD + 4;

/// Advance the acknowledgement sequence.
///
/// Maximal-length 8-bit LFSR (taps 0xB8), initial state 255: every state
/// except zero appears once per 255-step period.
fn lfsr_next(state: u8) -> u8 {
    (state >> 1) ^ if state & 1 != 0 { 0xB8 } else { 0 }
}

/// Drive the consuming side of a stream.
///
/// Proposes `queue_depth` credits, then delivers each received body to
/// `sink` until `sink` returns `false` (clean stop) or the session
/// errors out. Bodies are staged in `scratch`; a body larger than
/// `scratch` terminates the stream.
pub fn stream_read<T, F>(
    link: &mut T,
    scratch: &mut [u8],
    queue_depth: u32,
    read_timeout: Duration,
    mut sink: F,
) -> Result<(), StreamError>
where
    T: Transport,
    F: FnMut(&[u8]) -> bool,
{
    let setup = packet(STREAM_SETUP_MAGIC, &queue_depth.to_le_bytes());
    if !link.send_all(&setup, CONTROL_TIMEOUT) {
        return Err(StreamError::SetupFailed);
    }
    debug!(queue_depth, "stream consumer started");

    let mut ack = 255u8;
    loop {
        let mut header = [0u8; STREAM_HEADER_LEN];
        if !link.recv_exact(&mut header, CONTROL_TIMEOUT) {
            return Err(StreamError::Timeout);
        }
        let len = parse_length(&header, STREAM_DATA_MAGIC).ok_or(StreamError::Protocol)?;

        if scratch.len() < len {
            return Err(StreamError::SizeExceeded {
                len,
                max: scratch.len(),
            });
        }
        if !link.recv_exact(&mut scratch[..len], read_timeout) {
            return Err(StreamError::Timeout);
        }
        trace!(len, "stream frame received");

        if !sink(&scratch[..len]) {
            return Ok(());
        }

        if !link.send_all(&[ack], CONTROL_TIMEOUT) {
            return Err(StreamError::Timeout);
        }
        ack = lfsr_next(ack);
    }
}

/// Drive the producing side of a stream.
///
/// Waits for the consumer's setup frame, clamps the proposed window to
/// the transport's cap, then emits every payload yielded by `source`
/// under credit flow control until `source` returns `None` (clean stop)
/// or the session errors out.
pub fn stream_write<T, F>(
    link: &mut T,
    write_timeout: Duration,
    mut source: F,
) -> Result<(), StreamError>
where
    T: Transport,
    F: FnMut() -> Option<Bytes>,
{
    let mut setup = [0u8; STREAM_HEADER_LEN];
    if !link.recv_exact(&mut setup, CONTROL_TIMEOUT) {
        return Err(StreamError::SetupFailed);
    }
    let requested = parse_length(&setup, STREAM_SETUP_MAGIC).ok_or(StreamError::SetupFailed)?;

    let queue_depth = (requested as u32).clamp(1, link.writer_queue_depth_max().max(1));
    let mut credits = queue_depth;
    let mut expected_ack = 255u8;
    debug!(requested, queue_depth, "stream producer started");

    loop {
        if credits <= queue_depth / 2 {
            let mut ack = [0u8; 1];
            if !link.recv_exact(&mut ack, CONTROL_TIMEOUT) {
                return Err(StreamError::Timeout);
            }
            if ack[0] != expected_ack {
                trace!(
                    got = ack[0],
                    expected = expected_ack,
                    "acknowledgement out of sequence"
                );
                return Err(StreamError::Protocol);
            }
            expected_ack = lfsr_next(expected_ack);
            credits += 1;
        }

        if credits > 0 {
            let Some(payload) = source() else {
                return Ok(());
            };
            let header = packet(STREAM_DATA_MAGIC, &(payload.len() as u32).to_le_bytes());
            if !link.send_all(&header, CONTROL_TIMEOUT) {
                return Err(StreamError::Timeout);
            }
            if !link.send_all(&payload, write_timeout) {
                return Err(StreamError::Timeout);
            }
            trace!(len = payload.len(), credits, "stream frame sent");
            credits -= 1;
        }
    }
}

/// Validate a stream control frame and extract its length payload.
fn parse_length(frame: &[u8], magic: u16) -> Option<usize> {
    let payload = check_packet(frame, magic).ok()?;
    let bytes: [u8; 4] = payload.try_into().ok()?;
    Some(u32::from_le_bytes(bytes) as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    use wirecall_transport::MemLink;

    #[test]
    fn ack_sequence_first_values() {
        let mut state = 255u8;
        let mut seen = Vec::new();
        for _ in 0..6 {
            seen.push(state);
            state = lfsr_next(state);
        }
        assert_eq!(seen, [255, 199, 219, 213, 210, 105]);
    }

    #[test]
    fn ack_sequence_is_maximal_length() {
        let mut state = 255u8;
        let mut period = 0usize;
        loop {
            state = lfsr_next(state);
            period += 1;
            if state == 255 {
                break;
            }
            assert_ne!(state, 0, "LFSR must never reach the all-zero state");
            assert!(period < 300, "sequence failed to cycle");
        }
        assert_eq!(period, 255);
    }

    #[test]
    fn setup_frame_roundtrip() {
        let frame = packet(STREAM_SETUP_MAGIC, &8u32.to_le_bytes());
        assert_eq!(frame.len(), STREAM_HEADER_LEN);
        assert_eq!(parse_length(&frame, STREAM_SETUP_MAGIC), Some(8));
        assert_eq!(parse_length(&frame, STREAM_DATA_MAGIC), None);
    }

    #[test]
    fn transfers_bodies_in_order() {
        let (reader_link, writer_link) = MemLink::pair();

        let writer = thread::spawn(move || {
            let mut link = writer_link;
            let mut remaining = vec![
                Bytes::from_static(b"first"),
                Bytes::from_static(b"second"),
                Bytes::from_static(b"third"),
            ];
            remaining.reverse();
            stream_write(&mut link, Duration::from_millis(200), move || {
                remaining.pop()
            })
        });

        let mut link = reader_link;
        let mut scratch = [0u8; 64];
        let mut received = Vec::new();
        let result = stream_read(
            &mut link,
            &mut scratch,
            4,
            Duration::from_millis(200),
            |body| {
                received.push(body.to_vec());
                received.len() < 3
            },
        );

        assert!(result.is_ok());
        assert!(writer.join().unwrap().is_ok());
        assert_eq!(received, [b"first".to_vec(), b"second".to_vec(), b"third".to_vec()]);
    }

    #[test]
    fn writer_rejects_wrong_ack_byte() {
        let (mut reader_link, writer_link) = MemLink::pair();

        let writer = thread::spawn(move || {
            let mut link = writer_link;
            stream_write(&mut link, Duration::from_millis(100), || {
                Some(Bytes::from_static(b"payload"))
            })
        });

        // Request a window of 2 so the writer needs an ack after the
        // first frame, then answer with a byte outside the sequence.
        let setup = packet(STREAM_SETUP_MAGIC, &2u32.to_le_bytes());
        assert!(reader_link.send_all(&setup, Duration::from_millis(100)));

        let mut header = [0u8; STREAM_HEADER_LEN];
        assert!(reader_link.recv_exact(&mut header, Duration::from_millis(500)));
        let len = parse_length(&header, STREAM_DATA_MAGIC).unwrap();
        let mut body = vec![0u8; len];
        assert!(reader_link.recv_exact(&mut body, Duration::from_millis(500)));

        assert!(reader_link.send_all(&[0x42], Duration::from_millis(100)));

        let result = writer.join().unwrap();
        assert!(matches!(result, Err(StreamError::Protocol)));
    }

    #[test]
    fn oversized_body_terminates_reader() {
        let (reader_link, mut writer_link) = MemLink::pair();

        let reader = thread::spawn(move || {
            let mut link = reader_link;
            let mut scratch = [0u8; 8];
            stream_read(&mut link, &mut scratch, 1, Duration::from_millis(100), |_| true)
        });

        let mut setup = [0u8; STREAM_HEADER_LEN];
        assert!(writer_link.recv_exact(&mut setup, Duration::from_millis(500)));

        let header = packet(STREAM_DATA_MAGIC, &64u32.to_le_bytes());
        assert!(writer_link.send_all(&header, Duration::from_millis(100)));

        let result = reader.join().unwrap();
        assert!(matches!(
            result,
            Err(StreamError::SizeExceeded { len: 64, max: 8 })
        ));
    }
}
