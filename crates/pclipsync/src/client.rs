use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use pclipsync_sync::{run_sync_loop, Termination};
use pclipsync_transport::UnixDomainSocket;
use pclipsync_x11::SelectionAdapter;

use crate::exit::{selection_error, CliResult, SUCCESS};

/// Initial delay between connection attempts.
const INITIAL_WAIT: Duration = Duration::from_secs(1);

/// Maximum delay between connection attempts.
const MAX_WAIT: Duration = Duration::from_secs(60);

/// Exponential backoff multiplier.
const WAIT_MULTIPLIER: u32 = 2;

/// How often a backoff wait checks the shutdown flag.
const SHUTDOWN_CHECK_INTERVAL: Duration = Duration::from_millis(100);

/// Client mode: connect to the server's (typically SSH-forwarded) socket
/// and keep reconnecting with exponential backoff.
///
/// The display connection and owner window are created once and reused
/// across reconnects; each established connection runs a fresh engine, so
/// the echo-guard starts empty every time.
pub fn run(socket_path: &Path, shutdown: Arc<AtomicBool>) -> CliResult<i32> {
    let mut adapter =
        SelectionAdapter::open().map_err(|err| selection_error("X11 setup failed", err))?;
    adapter
        .subscribe_all()
        .map_err(|err| selection_error("X11 setup failed", err))?;

    let mut wait = INITIAL_WAIT;
    loop {
        if shutdown.load(Ordering::SeqCst) {
            return Ok(SUCCESS);
        }

        match UnixDomainSocket::connect(socket_path) {
            Ok(stream) => {
                debug!(path = %socket_path.display(), "connected to server");
                let x11_fd = adapter.display_fd();
                match run_sync_loop(&mut adapter, x11_fd, stream, &shutdown) {
                    Ok(Termination::ShutdownRequested) | Ok(Termination::PeerGoodbye) => {
                        return Ok(SUCCESS);
                    }
                    Ok(Termination::PeerClosed) => {
                        warn!("connection closed by peer, reconnecting");
                    }
                    Err(err) => {
                        warn!("connection lost: {err}, reconnecting");
                    }
                }
                wait = INITIAL_WAIT;
            }
            Err(err) => {
                warn!("connection failed: {err}, retrying in {}s", wait.as_secs());
            }
        }

        sleep_interruptibly(wait, &shutdown);
        wait = (wait * WAIT_MULTIPLIER).min(MAX_WAIT);
    }
}

/// Sleep for `total`, returning early once shutdown is requested.
fn sleep_interruptibly(total: Duration, shutdown: &AtomicBool) {
    let deadline = Instant::now() + total;
    loop {
        if shutdown.load(Ordering::SeqCst) {
            return;
        }
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return;
        }
        std::thread::sleep(remaining.min(SHUTDOWN_CHECK_INTERVAL));
    }
}
