/// Errors that can occur while encoding or decoding netstring frames.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The frame violates the netstring grammar.
    #[error("malformed frame: {0}")]
    Malformed(String),

    /// The declared or actual content size exceeds the limit.
    #[error("content size {size} exceeds limit {max}")]
    TooLarge { size: usize, max: usize },

    /// The stream ended before the declared content was complete.
    #[error("connection closed mid-frame ({got} of {expected} content bytes)")]
    Truncated { got: usize, expected: usize },

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection was closed cleanly at a frame boundary.
    #[error("connection closed")]
    ConnectionClosed,
}

pub type Result<T> = std::result::Result<T, FrameError>;
