use std::io::ErrorKind;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use pclipsync_sync::run_sync_loop;
use pclipsync_transport::{TransportError, UnixDomainSocket};
use pclipsync_x11::SelectionAdapter;

use crate::exit::{engine_error, selection_error, transport_error, CliResult, SUCCESS};

const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Server mode: listen on the socket path, accept exactly one peer, sync
/// until it disconnects. Exits 0 on a clean peer disconnect or a signal.
pub fn run(socket_path: &Path, shutdown: Arc<AtomicBool>) -> CliResult<i32> {
    let mut adapter =
        SelectionAdapter::open().map_err(|err| selection_error("X11 setup failed", err))?;
    adapter
        .subscribe_all()
        .map_err(|err| selection_error("X11 setup failed", err))?;

    let listener =
        UnixDomainSocket::bind(socket_path).map_err(|err| transport_error("bind failed", err))?;
    eprintln!("Listening on {}", socket_path.display());
    eprintln!(
        "Example SSH reverse forward: ssh -R /remote/path.sock:{} user@host",
        socket_path.display()
    );

    let Some(stream) = accept_one(&listener, &shutdown)? else {
        return Ok(SUCCESS);
    };
    debug!("peer connected");

    let x11_fd = adapter.display_fd();
    match run_sync_loop(&mut adapter, x11_fd, stream, &shutdown) {
        Ok(termination) => {
            debug!(?termination, "session ended");
            Ok(SUCCESS)
        }
        Err(err) => Err(engine_error("session failed", err)),
    }
    // The listener's Drop unlinks the socket path on every exit.
}

/// Wait for the single peer, checking the shutdown flag between accept
/// attempts. Returns `None` when shutdown was requested first.
fn accept_one(
    listener: &UnixDomainSocket,
    shutdown: &AtomicBool,
) -> CliResult<Option<std::os::unix::net::UnixStream>> {
    listener
        .set_nonblocking(true)
        .map_err(|err| transport_error("accept setup failed", err))?;

    loop {
        if shutdown.load(Ordering::SeqCst) {
            return Ok(None);
        }
        match listener.accept() {
            Ok(stream) => return Ok(Some(stream)),
            Err(TransportError::Accept(err)) if err.kind() == ErrorKind::WouldBlock => {
                std::thread::sleep(ACCEPT_POLL_INTERVAL);
            }
            Err(err) => return Err(transport_error("accept failed", err)),
        }
    }
}
