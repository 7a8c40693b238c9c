//! Length-prefixed framing over a byte stream.
//!
//! Every message is a 4-byte big-endian `u32` length followed by exactly that
//! many payload bytes. The functions here are generic over `Read`/`Write` so
//! they work on a `TcpStream`, a cloned read half, or an in-memory buffer.

use std::io::{self, Read, Write};

use super::error::ConnectionFault;

/// Size of the length prefix in bytes.
pub const LENGTH_PREFIX_LEN: usize = 4;

/// Default upper bound for a single frame (64 MiB).
pub const DEFAULT_MAX_FRAME_LEN: usize = 64 * 1024 * 1024;

/// Write one frame: length prefix then payload, in a single `write_all`.
///
/// The caller is responsible for holding whatever lock serialises writers on
/// this stream; the prefix and payload go out in one call so a frame is never
/// split across two lock acquisitions.
pub fn write_frame<W: Write>(writer: &mut W, payload: &[u8]) -> Result<(), ConnectionFault> {
    let len = u32::try_from(payload.len()).map_err(|_| ConnectionFault::FrameTooLarge {
        len: payload.len(),
        max: u32::MAX as usize,
    })?;

    let mut frame = Vec::with_capacity(LENGTH_PREFIX_LEN + payload.len());
    frame.extend_from_slice(&len.to_be_bytes());
    frame.extend_from_slice(payload);

    writer.write_all(&frame)?;
    writer.flush()?;
    Ok(())
}

/// Read one frame, blocking until it is complete.
///
/// Returns `Ok(None)` when the peer closed the stream, whether cleanly between
/// frames or in the middle of one (a short read). Any other I/O error is a
/// [`ConnectionFault`].
pub fn read_frame<R: Read>(
    reader: &mut R,
    max_len: usize,
) -> Result<Option<Vec<u8>>, ConnectionFault> {
    let mut prefix = [0u8; LENGTH_PREFIX_LEN];
    if !read_full(reader, &mut prefix)? {
        return Ok(None);
    }

    let len = u32::from_be_bytes(prefix) as usize;
    if len > max_len {
        return Err(ConnectionFault::FrameTooLarge { len, max: max_len });
    }

    let mut payload = vec![0u8; len];
    if !read_full(reader, &mut payload)? {
        tracing::debug!(expected = len, "Stream closed mid-frame");
        return Ok(None);
    }

    Ok(Some(payload))
}

/// Fill `buf` completely. Returns `false` if the stream hit EOF first.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<bool> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => return Ok(false),
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(true)
}
