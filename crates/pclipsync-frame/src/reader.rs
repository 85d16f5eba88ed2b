use std::io::{ErrorKind, Read};

use bytes::{Bytes, BytesMut};

use crate::codec::{decode_frame, error_at_eof};
use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;
const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Reads complete netstring frames from any `Read` stream.
///
/// Handles partial reads internally. `read_frame` blocks until a full frame
/// is available; the `fill`/`try_next` pair supports a readiness-driven
/// caller that must never block on the stream.
pub struct FrameReader<R> {
    inner: R,
    buf: BytesMut,
}

impl<R: Read> FrameReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
        }
    }

    /// Read the next complete frame (blocking).
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` on EOF at a frame
    /// boundary; EOF inside a frame yields `Malformed` or `Truncated`.
    pub fn read_frame(&mut self) -> Result<Bytes> {
        loop {
            if let Some(payload) = decode_frame(&mut self.buf)? {
                return Ok(payload);
            }
            if self.fill()? == 0 {
                if self.buf.is_empty() {
                    return Err(FrameError::ConnectionClosed);
                }
                return Err(error_at_eof(&self.buf));
            }
        }
    }

    /// Perform a single read from the underlying stream into the buffer.
    ///
    /// Returns the number of bytes read; 0 means EOF. Callers driving a
    /// readiness loop should invoke this once per readable notification.
    pub fn fill(&mut self) -> Result<usize> {
        let mut chunk = [0u8; READ_CHUNK_SIZE];
        loop {
            match self.inner.read(&mut chunk) {
                Ok(n) => {
                    self.buf.extend_from_slice(&chunk[..n]);
                    return Ok(n);
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    /// Decode the next frame from already-buffered bytes, without reading.
    pub fn try_next(&mut self) -> Result<Option<Bytes>> {
        decode_frame(&mut self.buf)
    }

    /// Number of undecoded bytes currently buffered.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// The frame error describing an EOF with the current partial buffer.
    pub fn eof_error(&self) -> FrameError {
        error_at_eof(&self.buf)
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> R {
        self.inner
    }
}
