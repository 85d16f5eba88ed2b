//! Two-fd readiness wait for the event loop.

use std::io::ErrorKind;
use std::os::unix::io::RawFd;
use std::time::Duration;

/// Which of the loop's two sources became readable.
#[derive(Debug, Clone, Copy, Default)]
pub struct Readiness {
    pub x11: bool,
    pub peer: bool,
}

/// Wait until the X connection or the peer channel is readable, or until
/// `timeout` expires.
///
/// Hangups and error conditions count as readable so the subsequent read
/// observes the EOF or failure. Signal interruption reports nothing ready;
/// the caller's loop re-checks its shutdown flag.
pub fn wait_readable(x11_fd: RawFd, peer_fd: RawFd, timeout: Duration) -> std::io::Result<Readiness> {
    let mut fds = [
        libc::pollfd {
            fd: x11_fd,
            events: libc::POLLIN,
            revents: 0,
        },
        libc::pollfd {
            fd: peer_fd,
            events: libc::POLLIN,
            revents: 0,
        },
    ];
    let millis = timeout.as_millis().min(i32::MAX as u128) as libc::c_int;

    // SAFETY: `fds` is a valid, writable array of two pollfd structs for
    // the duration of the call.
    let rc = unsafe { libc::poll(fds.as_mut_ptr(), fds.len() as libc::nfds_t, millis) };
    if rc < 0 {
        let err = std::io::Error::last_os_error();
        if err.kind() == ErrorKind::Interrupted {
            return Ok(Readiness::default());
        }
        return Err(err);
    }

    let pending = libc::POLLIN | libc::POLLHUP | libc::POLLERR;
    Ok(Readiness {
        x11: fds[0].revents & pending != 0,
        peer: fds[1].revents & pending != 0,
    })
}
