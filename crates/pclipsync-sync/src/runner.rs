use std::io::ErrorKind;
use std::os::unix::io::{AsRawFd, RawFd};
use std::os::unix::net::UnixStream;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::debug;

use pclipsync_frame::{FrameError, FrameReader, FrameWriter};

use crate::engine::{Flow, Selections, SyncEngine};
use crate::error::Result;
use crate::poll;

/// Poll tick; bounds how long a pending shutdown request can go unnoticed.
pub const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Why a synchronization session ended without an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The peer channel reached EOF at a frame boundary.
    PeerClosed,
    /// The peer announced a clean shutdown with a goodbye frame.
    PeerGoodbye,
    /// A signal asked this process to stop.
    ShutdownRequested,
}

/// Drive one synchronization session until the peer goes away, a fatal
/// error occurs, or shutdown is requested.
///
/// Single-threaded and cooperative: the only suspension points are the
/// readiness poll below and the bounded conversion wait inside the
/// adapter's `read_text`.
pub fn run_sync_loop<S: Selections>(
    selections: S,
    x11_fd: RawFd,
    stream: UnixStream,
    shutdown: &AtomicBool,
) -> Result<Termination> {
    let reader_stream = stream.try_clone()?;
    let mut reader = FrameReader::new(reader_stream);
    let peer_fd = stream.as_raw_fd();
    let mut engine = SyncEngine::new(selections, FrameWriter::new(stream));

    loop {
        if shutdown.load(Ordering::SeqCst) {
            engine.send_goodbye();
            return Ok(Termination::ShutdownRequested);
        }

        // Selection events queued or deferred since the last tick. X
        // readiness needs no branch of its own below: whatever the poll
        // wakes us for is drained here on the next pass.
        engine.dispatch_x()?;

        let ready = poll::wait_readable(x11_fd, peer_fd, POLL_INTERVAL)?;
        if !ready.peer {
            continue;
        }

        match reader.fill() {
            Ok(0) => {
                if reader.buffered() == 0 {
                    debug!("peer closed the connection");
                    return Ok(Termination::PeerClosed);
                }
                return Err(reader.eof_error().into());
            }
            Ok(_) => {}
            Err(FrameError::Io(err)) if err.kind() == ErrorKind::WouldBlock => continue,
            Err(err) => return Err(err.into()),
        }

        while let Some(payload) = reader.try_next()? {
            if engine.handle_incoming(&payload)? == Flow::Goodbye {
                return Ok(Termination::PeerGoodbye);
            }
        }
    }
}
