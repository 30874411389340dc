use std::time::Duration;

/// Errors surfaced by a master call.
///
/// Frame-level failures (bad magic, bad CRC, mistimed bytes) never
/// appear here: the retry loops absorb them until the budget runs out,
/// at which point the whole exchange reports [`CallError::Timeout`].
#[derive(Debug, thiserror::Error)]
pub enum CallError {
    /// The request or response cannot fit the scratch buffer.
    #[error("payload of {len} bytes exceeds link capacity of {max}")]
    SizeExceeded { len: usize, max: usize },

    /// The exchange did not complete within its total budget.
    #[error("exchange timed out after {0:?}")]
    Timeout(Duration),

    /// The peer answered with zero bytes and the master is configured to
    /// treat that as failure.
    #[error("peer returned an empty result")]
    EmptyResult,
}

pub type Result<T> = std::result::Result<T, CallError>;

/// Errors surfaced when registering a handler.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// The handler table has reached its fixed capacity.
    #[error("handler table full ({capacity} entries)")]
    Full { capacity: usize },
}

/// Errors that terminate a stream session.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    /// The setup frame was not delivered or was malformed.
    #[error("stream setup failed")]
    SetupFailed,

    /// A frame or acknowledgement violated the stream protocol.
    #[error("stream protocol violation")]
    Protocol,

    /// An announced body does not fit the scratch buffer.
    #[error("stream payload of {len} bytes exceeds buffer capacity of {max}")]
    SizeExceeded { len: usize, max: usize },

    /// The peer stopped producing or consuming in time.
    #[error("stream transfer timed out")]
    Timeout,
}
