use bytes::{BufMut, Bytes, BytesMut};

use crate::crc::crc16;
use crate::error::{FrameError, Result};

/// Wire overhead of every packet: 2-byte magic + 2-byte CRC.
pub const PACKET_OVERHEAD: usize = 4;

// Packet magics. These are wire constants shared by both peers and must
// not change between releases.

/// Command header: master announces `(procedure hash, argument length)`.
pub const COMMAND_HEADER_MAGIC: u16 = 0x1209;
/// Command data: the argument bytes themselves.
pub const COMMAND_DATA_MAGIC: u16 = 0x8ADE;
/// Result header: slave announces the result length.
pub const RESULT_HEADER_MAGIC: u16 = 0x6CEB;
/// Result data: the result bytes themselves.
pub const RESULT_DATA_MAGIC: u16 = 0xF1A5;
/// Stream setup: the reading side proposes a credit window.
pub const STREAM_SETUP_MAGIC: u16 = 0xEDF6;
/// Stream data header: announces the length of the raw body that follows.
pub const STREAM_DATA_MAGIC: u16 = 0x542E;

/// Encode a packet in place.
///
/// Writes `magic_le ∥ payload ∥ crc16_le` into the front of `buf` and
/// returns the total frame length. The CRC covers the magic and the
/// payload. Fails with [`FrameError::BufferTooSmall`] when `buf` cannot
/// hold `payload.len() + 4` bytes; nothing is written in that case.
pub fn encode_packet(buf: &mut [u8], magic: u16, payload: &[u8]) -> Result<usize> {
    let total = payload.len() + PACKET_OVERHEAD;
    if buf.len() < total {
        return Err(FrameError::BufferTooSmall {
            needed: total,
            available: buf.len(),
        });
    }

    buf[..2].copy_from_slice(&magic.to_le_bytes());
    buf[2..2 + payload.len()].copy_from_slice(payload);
    let crc = crc16(&buf[..2 + payload.len()]);
    buf[2 + payload.len()..total].copy_from_slice(&crc.to_le_bytes());
    Ok(total)
}

/// Encode a small control packet into a freshly allocated buffer.
///
/// Used for the fixed-size header and acknowledgement frames that are
/// built once and retransmitted verbatim across retries.
pub fn packet(magic: u16, payload: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(payload.len() + PACKET_OVERHEAD);
    buf.put_u16_le(magic);
    buf.put_slice(payload);
    let crc = crc16(&buf);
    buf.put_u16_le(crc);
    buf.freeze()
}

/// Validate a received frame and return its payload.
///
/// The magic is checked first, then the CRC over magic and payload;
/// either mismatch alone rejects the frame. Callers treat a rejected
/// frame as absent and let their retry loop re-issue the exchange.
pub fn check_packet(frame: &[u8], magic: u16) -> Result<&[u8]> {
    if frame.len() < PACKET_OVERHEAD {
        return Err(FrameError::BufferTooSmall {
            needed: PACKET_OVERHEAD,
            available: frame.len(),
        });
    }

    let body = frame.len() - 2;
    let found = u16::from_le_bytes([frame[0], frame[1]]);
    if found != magic {
        return Err(FrameError::MagicMismatch {
            expected: magic,
            found,
        });
    }

    let found_crc = u16::from_le_bytes([frame[body], frame[body + 1]]);
    if found_crc != crc16(&frame[..body]) {
        return Err(FrameError::CrcMismatch);
    }

    Ok(&frame[2..body])
}
