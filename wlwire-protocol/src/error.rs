//! Decode and framing errors

/// Error raised while encoding or decoding wire data
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unexpected end of data: needed {needed} bytes, {remaining} remaining")]
    UnexpectedEof { needed: usize, remaining: usize },

    #[error("Invalid string length: {0}")]
    InvalidStringLen(u32),

    #[error("String is not NUL-terminated")]
    StringNotTerminated,

    #[error("String is not valid UTF-8")]
    InvalidUtf8,

    #[error("Invalid array length: {0}")]
    InvalidArrayLen(u32),

    #[error("No file descriptor left for argument")]
    MissingFd,

    #[error("Header too short: {0} bytes (need 8)")]
    HeaderTooShort(usize),

    #[error("Invalid message size in header: {0}")]
    InvalidMessageSize(usize),

    #[error("Message too large: {size} bytes (max {max})")]
    MessageTooLarge { size: usize, max: usize },
}
