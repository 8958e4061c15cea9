//! Error types for the DCC-EX protocol.

use thiserror::Error;

/// Reasons a buffer could not be split into a frame.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    /// No `<` was found in the buffer.
    #[error("no frame start found")]
    MissingStart,

    /// The buffer ended (or closed) straight after `<`.
    #[error("frame has no opcode")]
    MissingOpcode,

    /// The buffer ended before the closing `>`.
    #[error("frame is not terminated")]
    Unterminated,

    /// A quoted parameter was never closed.
    #[error("unterminated text parameter starting at offset {offset}")]
    UnterminatedText {
        /// Offset of the first character after the opening quote.
        offset: usize,
    },

    /// The frame carries more parameters than the tokenizer allows.
    #[error("too many parameters: max {max}")]
    TooManyParameters {
        /// Configured parameter cap.
        max: usize,
    },
}

/// Errors that can occur while driving a protocol session.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The byte channel failed to write.
    #[error("channel I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;
