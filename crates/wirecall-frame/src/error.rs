/// Errors that can occur during packet encoding/validation.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The frame carries a different magic than the phase expects.
    #[error("frame magic mismatch (expected {expected:#06x}, found {found:#06x})")]
    MagicMismatch { expected: u16, found: u16 },

    /// The trailing CRC does not match the frame contents.
    #[error("frame CRC mismatch")]
    CrcMismatch,

    /// The destination or source buffer cannot hold a complete frame.
    #[error("buffer too small ({available} bytes, need {needed})")]
    BufferTooSmall { needed: usize, available: usize },
}

pub type Result<T> = std::result::Result<T, FrameError>;
