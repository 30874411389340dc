//! Byte-level transports for the wirecall protocol.
//!
//! The protocol's only demand on a link is the [`Transport`] contract:
//! exact-length reads and writes under a timeout, plus a way to discard
//! stale input. This crate provides the host-side implementations:
//!
//! - [`MemLink`] — connected in-memory pair for tests, demos and
//!   same-process peers;
//! - [`StreamTransport`] — adapter over any `Read + Write` handle
//!   (serial TTYs, socket pairs);
//! - [`Chunked`] — fixed-size transfer segmentation (I²C- and CAN-style
//!   buses);
//! - [`RepeatGuard`] — half-duplex receive guard against reading the
//!   bus idle level as a frame.
//!
//! Device-specific byte I/O (termios setup, bus adapters) stays outside:
//! anything that can read and write bytes with a short OS timeout plugs
//! into [`StreamTransport`].

pub mod chunked;
pub mod guard;
pub mod mem;
pub mod stream;
pub mod traits;

pub use chunked::{Chunked, CAN_CHUNK, I2C_CHUNK};
pub use guard::RepeatGuard;
pub use mem::MemLink;
pub use stream::StreamTransport;
pub use traits::{NullLink, Transport};
