//! Length-framing over an async byte stream: `[enc_len][encoding][msg_len:u64-BE][msg]`.
//!
//! `enc_len=1, encoding=0x00` means "use default binary encoding" (the
//! hand-rolled format of `wire::message`), the only encoding this overlay
//! ever writes. A reader tolerates any other tag by still reading and
//! discarding the framed body rather than losing stream sync, and surfaces
//! it as `BadMessage` to the caller.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::WireError;

const ENCODING: &[u8] = &[0x00];

pub async fn write_frame<W: AsyncWrite + Unpin>(writer: &mut W, body: &[u8]) -> std::io::Result<()> {
    writer.write_u8(ENCODING.len() as u8).await?;
    writer.write_all(ENCODING).await?;
    writer.write_u64(body.len() as u64).await?;
    writer.write_all(body).await?;
    writer.flush().await
}

/// Reads one frame, rejecting bodies over `max_size` before allocating a
/// buffer for them (the §7 `MaxSize` guard against unbounded reads).
pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R, max_size: usize) -> Result<Vec<u8>, WireError> {
    let enc_len = reader.read_u8().await.map_err(|_| WireError::BadMessage("frame closed before encoding length"))? as usize;
    let mut encoding = vec![0u8; enc_len];
    reader
        .read_exact(&mut encoding)
        .await
        .map_err(|_| WireError::BadMessage("frame closed before encoding tag"))?;

    let msg_len = reader
        .read_u64()
        .await
        .map_err(|_| WireError::BadMessage("frame closed before message length"))? as usize;
    if msg_len > max_size {
        return Err(WireError::MaxSize(msg_len));
    }
    if encoding != ENCODING {
        // Drain the body to keep the stream in sync even though we can't decode it.
        let mut sink = vec![0u8; msg_len];
        reader
            .read_exact(&mut sink)
            .await
            .map_err(|_| WireError::BadMessage("frame closed before unsupported body"))?;
        return Err(WireError::BadMessage("unsupported frame encoding"));
    }

    let mut body = vec![0u8; msg_len];
    reader
        .read_exact(&mut body)
        .await
        .map_err(|_| WireError::BadMessage("frame closed before message body"))?;
    Ok(body)
}
