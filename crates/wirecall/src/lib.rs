//! Symmetric remote procedure calls over unreliable byte transports.
//!
//! wirecall moves named calls with opaque byte arguments between two
//! peers across links that only promise best-effort byte delivery —
//! UARTs, shared buses, socket pairs, loopback queues. The caller
//! ([`Master`]) drives a four-phase framed handshake; the responder
//! ([`Slave`]) dispatches into a registry of handlers and holds the
//! result until the caller polls for it. Every frame is CRC-checked,
//! every phase retries under an adaptive timeout budget, and after a
//! call both sides can switch the link into a credit-gated bulk stream.
//!
//! ```text
//! ┌─────────────┐   ┌──────────────┐   ┌───────────────────────┐
//! │  Transport   │──▶│ wirecall-    │──▶│ Master / Slave FSMs    │
//! │  (trait)     │   │ frame codec  │   │ → handler registry     │
//! └─────────────┘   └──────────────┘   └───────────────────────┘
//!        ▲                                        │
//!        │            ┌───────────────────────────┘
//!        │            ▼
//! ┌─────────────┐   ┌──────────────┐
//! │  Transport   │◀──│ stream       │   (post-call bulk mode)
//! │  (write)     │   │ writer/reader│
//! └─────────────┘   └──────────────┘
//! ```
//!
//! One call is in flight at a time; there is no pipelining, no session
//! state beyond the call in progress, and no marshalling — arguments
//! and results are byte slices.

pub mod error;
pub mod master;
pub mod registry;
mod retry;
pub mod slave;
pub mod stream;

pub use error::{CallError, RegistryError, Result, StreamError};
pub use master::{Master, MasterConfig};
pub use registry::{Handler, Registry};
pub use slave::{Hook, Slave, SlaveConfig};
pub use stream::{stream_read, stream_write};

pub use wirecall_frame as frame;
pub use wirecall_transport as transport;
