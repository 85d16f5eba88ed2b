use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};

/// Maximum content size in bytes (10 MiB).
///
/// Prevents memory exhaustion from extremely large clipboard payloads.
pub const MAX_CONTENT_SIZE: usize = 10_485_760;

/// Maximum digits in the length field.
///
/// Enforced during parsing so a hostile header cannot claim a huge length.
pub const MAX_LENGTH_DIGITS: usize = 8;

/// Encode a payload as one netstring into `dst`.
///
/// Wire format: `"<len>:<payload>,"` with `<len>` in ASCII decimal.
pub fn encode_frame(payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    if payload.len() > MAX_CONTENT_SIZE {
        return Err(FrameError::TooLarge {
            size: payload.len(),
            max: MAX_CONTENT_SIZE,
        });
    }
    let header = payload.len().to_string();
    dst.reserve(header.len() + payload.len() + 2);
    dst.put_slice(header.as_bytes());
    dst.put_u8(b':');
    dst.put_slice(payload);
    dst.put_u8(b',');
    Ok(())
}

/// Decode one netstring from the front of `src`.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete frame yet.
/// On success, consumes the frame bytes from the buffer.
pub fn decode_frame(src: &mut BytesMut) -> Result<Option<Bytes>> {
    let Some(digits) = scan_header(src)? else {
        return Ok(None); // Need more data
    };

    let length = parse_length(&src[..digits]);
    if length > MAX_CONTENT_SIZE {
        return Err(FrameError::TooLarge {
            size: length,
            max: MAX_CONTENT_SIZE,
        });
    }

    let total = digits + 1 + length + 1;
    if src.len() < total {
        return Ok(None); // Need more data
    }

    let terminator = src[digits + 1 + length];
    if terminator != b',' {
        return Err(FrameError::Malformed(format!(
            "expected ',' terminator, found {:#04x}",
            terminator
        )));
    }

    src.advance(digits + 1);
    let payload = src.split_to(length).freeze();
    src.advance(1);

    Ok(Some(payload))
}

/// Classify an EOF that arrived while `buf` still holds a partial frame.
///
/// EOF inside the length field is a grammar violation; EOF after a complete
/// header means the declared content never fully arrived.
pub fn error_at_eof(buf: &[u8]) -> FrameError {
    match scan_header_bytes(buf) {
        Ok(Some(digits)) => {
            let expected = parse_length(&buf[..digits]);
            FrameError::Truncated {
                got: (buf.len() - digits - 1).min(expected),
                expected,
            }
        }
        Ok(None) => FrameError::Malformed("connection closed while reading length field".into()),
        Err(err) => err,
    }
}

/// Locate the length header in `buf`.
///
/// Returns `Ok(Some(n))` with the digit count once the `:` separator is
/// present, `Ok(None)` while the header is still incomplete.
fn scan_header(src: &BytesMut) -> Result<Option<usize>> {
    scan_header_bytes(src)
}

fn scan_header_bytes(src: &[u8]) -> Result<Option<usize>> {
    for (i, &byte) in src.iter().enumerate() {
        match byte {
            b'0'..=b'9' => {
                if i >= MAX_LENGTH_DIGITS {
                    return Err(FrameError::Malformed(format!(
                        "length field exceeds {MAX_LENGTH_DIGITS} digits"
                    )));
                }
            }
            b':' => {
                if i == 0 {
                    return Err(FrameError::Malformed("empty length field".into()));
                }
                return Ok(Some(i));
            }
            other => {
                return Err(FrameError::Malformed(format!(
                    "invalid byte {:#04x} in length field",
                    other
                )));
            }
        }
    }
    Ok(None)
}

/// Parse a validated run of ASCII digits. At most 8 digits, so no overflow.
fn parse_length(digits: &[u8]) -> usize {
    digits
        .iter()
        .fold(0usize, |acc, &b| acc * 10 + usize::from(b - b'0'))
}
