//! Packet framing for the wirecall protocol.
//!
//! Every exchange on the wire is a fixed-layout packet:
//!
//! ```text
//! ┌────────────┬──────────────────┬────────────┐
//! │ Magic (2B) │ Payload (N B)    │ CRC-16 (2B)│
//! │ LE u16     │                  │ LE u16     │
//! └────────────┴──────────────────┴────────────┘
//! ```
//!
//! The magic identifies the protocol phase, the CRC covers magic and
//! payload, and all multi-byte integers are little-endian. Procedures
//! are addressed by a 32-bit hash of their name so that command headers
//! stay fixed-size regardless of name length.
//!
//! This crate is pure computation: no I/O, no timing. Transports and the
//! call state machines build on top of it.

pub mod codec;
pub mod crc;
pub mod error;
pub mod hash;

pub use codec::{
    check_packet, encode_packet, packet, COMMAND_DATA_MAGIC, COMMAND_HEADER_MAGIC,
    PACKET_OVERHEAD, RESULT_DATA_MAGIC, RESULT_HEADER_MAGIC, STREAM_DATA_MAGIC,
    STREAM_SETUP_MAGIC,
};
pub use crc::crc16;
pub use error::{FrameError, Result};
pub use hash::procedure_hash;
