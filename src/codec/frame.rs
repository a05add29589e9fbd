//! Frame layer of the wire protocol.
//!
//! Frame format:
//! ```text
//! ┌──────────┬──────────┬────────────────────────┐
//! │ len (4B) │ kind(1B) │   encoded payload      │
//! │ u32 BE   │ u8       │                        │
//! └──────────┴──────────┴────────────────────────┘
//! ```
//! Length = sizeof(kind byte) + sizeof(payload), NOT including the 4-byte prefix.

use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// Frame kind: handshake options (always JSON).
pub const FRAME_OPTIONS: u8 = 0x00;
/// Frame kind: request/response header.
pub const FRAME_HEADER: u8 = 0x01;
/// Frame kind: request/response body.
pub const FRAME_BODY: u8 = 0x02;

/// Human-readable frame kind for log and error messages.
pub fn kind_name(kind: u8) -> &'static str {
    match kind {
        FRAME_OPTIONS => "options",
        FRAME_HEADER => "header",
        FRAME_BODY => "body",
        _ => "unknown",
    }
}

/// Read one frame from the stream.
///
/// Returns `(kind, payload_bytes)`. Returns `None` on clean EOF, i.e. when the
/// stream ends exactly on a frame boundary; an EOF anywhere inside a frame,
/// including its length prefix, is `UnexpectedEof`. `max_frame_bytes` caps the maximum
/// accepted payload size.
pub async fn read_frame<R: AsyncReadExt + Unpin>(
    reader: &mut R,
    max_frame_bytes: u32,
) -> std::io::Result<Option<(u8, Vec<u8>)>> {
    // Read 4-byte length prefix. Only an EOF before its first byte is clean.
    let mut len_buf = [0u8; 4];
    let mut filled = 0;
    while filled < len_buf.len() {
        match reader.read(&mut len_buf[filled..]).await? {
            0 if filled == 0 => return Ok(None),
            0 => {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    format!("stream ended inside length prefix ({} of 4 bytes)", filled),
                ))
            }
            n => filled += n,
        }
    }

    let frame_len = u32::from_be_bytes(len_buf);
    if frame_len > max_frame_bytes.saturating_add(1) {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("Frame too large: {} bytes", frame_len),
        ));
    }
    if frame_len < 1 {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            "Frame too short: missing kind byte",
        ));
    }

    let kind = reader.read_u8().await?;
    let mut payload = vec![0u8; frame_len as usize - 1];
    reader.read_exact(&mut payload).await?;

    Ok(Some((kind, payload)))
}

/// Append one frame to `buf` without touching any stream.
pub fn encode_frame(buf: &mut Vec<u8>, kind: u8, payload: &[u8]) -> std::io::Result<()> {
    let frame_len = u32::try_from(payload.len() + 1).map_err(|_| {
        std::io::Error::new(std::io::ErrorKind::InvalidInput, "Frame exceeds u32 length")
    })?;
    buf.reserve(payload.len() + 5);
    buf.extend_from_slice(&frame_len.to_be_bytes());
    buf.push(kind);
    buf.extend_from_slice(payload);
    Ok(())
}

/// Write one frame to the stream.
pub async fn write_frame<W: AsyncWriteExt + Unpin>(
    writer: &mut W,
    kind: u8,
    payload: &[u8],
) -> std::io::Result<()> {
    let mut buf = Vec::with_capacity(payload.len() + 5);
    encode_frame(&mut buf, kind, payload)?;
    writer.write_all(&buf).await?;
    writer.flush().await?;
    Ok(())
}
