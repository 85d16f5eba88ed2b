use pclipsync_frame::FrameError;
use pclipsync_x11::SelectionError;

/// Errors that terminate a synchronization session.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The peer violated the framing protocol.
    #[error("protocol error: {0}")]
    Frame(#[from] FrameError),

    /// The X connection failed in a way the session cannot survive.
    #[error("X11 session error: {0}")]
    X11(#[from] SelectionError),

    /// The peer channel failed outside the framing layer.
    #[error("peer I/O error: {0}")]
    PeerIo(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, EngineError>;
