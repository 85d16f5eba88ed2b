use x11rb::errors::{ConnectError, ConnectionError, ReplyError, ReplyOrIdError};

/// Errors that can occur while talking to the X server.
///
/// Only failures of the connection itself surface here; per-request X
/// protocol errors on the clipboard paths are absorbed by the adapter and
/// reported through `Option`/`bool` returns, per the session error policy.
#[derive(Debug, thiserror::Error)]
pub enum SelectionError {
    /// The standard X display environment variable is missing.
    #[error("DISPLAY environment variable is not set; an X11 display is required for clipboard access")]
    DisplayNotSet,

    /// Opening the display failed.
    #[error("failed to connect to X11 display: {0}")]
    Connect(#[from] ConnectError),

    /// The established connection broke.
    #[error("X11 connection error: {0}")]
    Connection(#[from] ConnectionError),

    /// The X server rejected a request during adapter setup.
    #[error("X11 request failed: {0:?}")]
    Request(x11rb::x11_utils::X11Error),

    /// The connection ran out of XIDs.
    #[error("X11 resource identifiers exhausted")]
    IdsExhausted,

    /// An I/O error occurred while waiting on the display connection.
    #[error("I/O error on X11 connection: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ReplyError> for SelectionError {
    fn from(err: ReplyError) -> Self {
        match err {
            ReplyError::ConnectionError(err) => SelectionError::Connection(err),
            ReplyError::X11Error(err) => SelectionError::Request(err),
        }
    }
}

impl From<ReplyOrIdError> for SelectionError {
    fn from(err: ReplyOrIdError) -> Self {
        match err {
            ReplyOrIdError::ConnectionError(err) => SelectionError::Connection(err),
            ReplyOrIdError::X11Error(err) => SelectionError::Request(err),
            ReplyOrIdError::IdsExhausted => SelectionError::IdsExhausted,
        }
    }
}

pub type Result<T> = std::result::Result<T, SelectionError>;
