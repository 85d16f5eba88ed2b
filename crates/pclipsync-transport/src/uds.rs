use std::io::ErrorKind;
use std::os::unix::fs::{FileTypeExt, MetadataExt};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{Result, TransportError};

/// Unix domain socket transport.
///
/// The listening side owns the socket file: it is created at bind time and
/// removed again on drop, but only while the path still names the inode we
/// created.
pub struct UnixDomainSocket {
    listener: UnixListener,
    path: PathBuf,
    created_inode: Option<(u64, u64)>,
}

impl UnixDomainSocket {
    /// Maximum socket path length.
    /// Unix `sockaddr_un.sun_path` is typically 108 bytes on Linux, 104 on macOS.
    #[cfg(target_os = "linux")]
    const MAX_PATH_LEN: usize = 108;
    #[cfg(not(target_os = "linux"))]
    const MAX_PATH_LEN: usize = 104;

    /// Bind and listen on a filesystem-path Unix domain socket.
    ///
    /// If the path already exists, a probe connection decides its fate: a
    /// successful connect means another server instance is live
    /// (`SocketBusy`); `ConnectionRefused` means the socket is stale, so the
    /// file is unlinked and the bind proceeds. Anything else aborts. The
    /// socket file mode follows the process umask.
    pub fn bind(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let path_bytes = path.as_os_str().len();
        if path_bytes >= Self::MAX_PATH_LEN {
            return Err(TransportError::PathTooLong {
                path,
                len: path_bytes,
                max: Self::MAX_PATH_LEN,
            });
        }

        if path.exists() {
            Self::clear_stale_socket(&path)?;
        }

        let listener = UnixListener::bind(&path).map_err(|e| TransportError::Bind {
            path: path.clone(),
            source: e,
        })?;

        let created_metadata =
            std::fs::symlink_metadata(&path).map_err(|e| TransportError::Bind {
                path: path.clone(),
                source: e,
            })?;
        let created_inode = Some((created_metadata.dev(), created_metadata.ino()));

        info!(?path, "listening on unix domain socket");

        Ok(Self {
            listener,
            path,
            created_inode,
        })
    }

    /// Probe an existing path and unlink it if it is a stale socket.
    ///
    /// Never removes non-socket files.
    fn clear_stale_socket(path: &Path) -> Result<()> {
        let metadata = std::fs::symlink_metadata(path).map_err(|e| TransportError::Bind {
            path: path.to_path_buf(),
            source: e,
        })?;
        if !metadata.file_type().is_socket() {
            return Err(TransportError::Bind {
                path: path.to_path_buf(),
                source: std::io::Error::new(
                    ErrorKind::AlreadyExists,
                    "existing path is not a unix socket",
                ),
            });
        }

        match UnixStream::connect(path) {
            Ok(_probe) => Err(TransportError::SocketBusy {
                path: path.to_path_buf(),
            }),
            Err(err) if err.kind() == ErrorKind::ConnectionRefused => {
                debug!(?path, "removing stale socket");
                std::fs::remove_file(path).map_err(|e| TransportError::Bind {
                    path: path.to_path_buf(),
                    source: e,
                })
            }
            Err(err) => Err(TransportError::Bind {
                path: path.to_path_buf(),
                source: err,
            }),
        }
    }

    /// Accept an incoming connection (blocking unless `set_nonblocking`).
    ///
    /// The accepted stream is always returned in blocking mode.
    pub fn accept(&self) -> Result<UnixStream> {
        let (stream, _addr) = self.listener.accept().map_err(TransportError::Accept)?;
        stream.set_nonblocking(false).map_err(TransportError::Accept)?;
        debug!("accepted peer connection");
        Ok(stream)
    }

    /// Toggle non-blocking mode on the listener so an accept wait can be
    /// interleaved with shutdown-flag checks.
    pub fn set_nonblocking(&self, nonblocking: bool) -> Result<()> {
        self.listener.set_nonblocking(nonblocking).map_err(Into::into)
    }

    /// Connect to a listening Unix domain socket (blocking).
    pub fn connect(path: impl AsRef<Path>) -> Result<UnixStream> {
        let path = path.as_ref();
        let stream = UnixStream::connect(path).map_err(|e| TransportError::Connect {
            path: path.to_path_buf(),
            source: e,
        })?;
        debug!(?path, "connected to unix domain socket");
        Ok(stream)
    }

    /// The path this socket is bound to.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for UnixDomainSocket {
    fn drop(&mut self) {
        if let Some((expected_dev, expected_ino)) = self.created_inode {
            if let Ok(metadata) = std::fs::symlink_metadata(&self.path) {
                if metadata.file_type().is_socket()
                    && metadata.dev() == expected_dev
                    && metadata.ino() == expected_ino
                {
                    debug!(path = ?self.path, "cleaning up socket file");
                    let _ = std::fs::remove_file(&self.path);
                } else {
                    debug!(
                        path = ?self.path,
                        "socket path identity changed; skipping cleanup"
                    );
                }
            }
        }
    }
}
