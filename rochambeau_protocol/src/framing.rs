// Frames on both sockets (gameplay and matchmaking): a 4-byte big-endian
// payload length, then the payload. This module only moves bytes; JSON lives
// in `message.rs`.
//
// `read_frame` assembles a frame with `read_exact`, so it does not care how
// TCP segments the stream.
//
// Size limit: the largest legitimate payload is a `JoinRequest` carrying a
// 256-byte identifier, or a `DisplayName` of 64 four-byte characters, both
// well under 1 KiB of JSON. `MAX_FRAME_SIZE` is 64 KiB: enough slack for
// escaping and a verbose rejection reason, while a peer that sends a bogus
// prefix can make us allocate at most 64 KiB before the frame is refused.

use std::io::{self, Read, Write};

/// Largest payload either side accepts or sends.
pub const MAX_FRAME_SIZE: u32 = 64 * 1024;

/// Write a length-delimited frame: 4-byte big-endian length, then payload.
pub fn write_frame<W: Write>(writer: &mut W, payload: &[u8]) -> io::Result<()> {
    let len = payload.len();
    if len > MAX_FRAME_SIZE as usize {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("frame too large: {len} bytes (max {MAX_FRAME_SIZE})"),
        ));
    }
    #[expect(clippy::cast_possible_truncation)]
    let len_bytes = (len as u32).to_be_bytes();
    writer.write_all(&len_bytes)?;
    writer.write_all(payload)?;
    writer.flush()?;
    Ok(())
}

/// Read a length-delimited frame: 4-byte big-endian length, then payload.
///
/// Returns `UnexpectedEof` if the stream closes before or during a frame, and
/// `InvalidData` if the prefix exceeds `MAX_FRAME_SIZE`.
pub fn read_frame<R: Read>(reader: &mut R) -> io::Result<Vec<u8>> {
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf)?;
    let len = u32::from_be_bytes(len_buf);
    if len > MAX_FRAME_SIZE {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("frame too large: {len} bytes (max {MAX_FRAME_SIZE})"),
        ));
    }
    let mut buf = vec![0u8; len as usize];
    reader.read_exact(&mut buf)?;
    Ok(buf)
}
