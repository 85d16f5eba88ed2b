//! Netstring framing for clipboard payloads.
//!
//! Every payload travels as one netstring:
//!
//! ```text
//! <decimal length, 1-8 ASCII digits> ":" <length bytes of payload> ","
//! ```
//!
//! `"12:Hello world!,"` carries the 12-byte payload `"Hello world!"`.
//! Content is capped at 10 MiB and the length header at 8 digits, so a
//! misbehaving peer cannot make us allocate unbounded memory.

pub mod codec;
pub mod error;
pub mod reader;
pub mod writer;

pub use codec::{decode_frame, encode_frame, error_at_eof, MAX_CONTENT_SIZE, MAX_LENGTH_DIGITS};
pub use error::{FrameError, Result};
pub use reader::FrameReader;
pub use writer::FrameWriter;
