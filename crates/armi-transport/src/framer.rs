//! Outer length-prefix framer: `(u32 size, u32 flags)` big-endian followed by `size` bytes
//! of payload (an already-encoded request or reply frame from [`armi::wire::Codec`]).
//!
//! `flags` is reserved for future use and is always `0` on the wire today. Follows the same
//! bounded-buffer discipline as a line reader with a maximum line length: a frame larger than
//! the configured bound is rejected rather than silently accepted, and the caller tears the
//! channel down instead of trying to resynchronize the stream.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use armi::error::{Error, ErrorKind};

const HEADER_LEN: usize = 8;

/// Reads one frame, or `None` on a clean EOF between frames.
pub async fn read_frame<R: AsyncRead + Unpin>(
    reader: &mut R,
    max_frame_bytes: usize,
) -> Result<Option<Vec<u8>>, Error> {
    let mut header = [0u8; HEADER_LEN];
    if let Err(err) = reader.read_exact(&mut header).await {
        return if err.kind() == std::io::ErrorKind::UnexpectedEof {
            Ok(None)
        } else {
            Err(Error::Io(err))
        };
    }

    let size = u32::from_be_bytes(header[0..4].try_into().unwrap()) as usize;
    let _flags = u32::from_be_bytes(header[4..8].try_into().unwrap());

    if size > max_frame_bytes {
        return Err(Error::with_message(
            ErrorKind::TransportClosed,
            format!("frame of {size} bytes exceeds the {max_frame_bytes} byte bound"),
        ));
    }

    let mut payload = vec![0u8; size];
    reader.read_exact(&mut payload).await.map_err(Error::Io)?;
    Ok(Some(payload))
}

pub async fn write_frame<W: AsyncWrite + Unpin>(writer: &mut W, frame: &[u8]) -> Result<(), Error> {
    let mut header = [0u8; HEADER_LEN];
    header[0..4].copy_from_slice(&(frame.len() as u32).to_be_bytes());
    writer.write_all(&header).await.map_err(Error::Io)?;
    writer.write_all(frame).await.map_err(Error::Io)?;
    writer.flush().await.map_err(Error::Io)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn round_trips_a_frame() {
        let mut buf = Vec::new();
        write_frame(&mut buf, b"hello").await.unwrap();
        let mut cursor = std::io::Cursor::new(buf);
        let frame = read_frame(&mut cursor, 1024).await.unwrap().unwrap();
        assert_eq!(frame, b"hello");
    }

    #[tokio::test]
    async fn clean_eof_between_frames_yields_none() {
        let mut cursor = std::io::Cursor::new(Vec::<u8>::new());
        assert!(read_frame(&mut cursor, 1024).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn oversized_frame_is_rejected() {
        let mut buf = Vec::new();
        write_frame(&mut buf, &vec![0u8; 64]).await.unwrap();
        let mut cursor = std::io::Cursor::new(buf);
        let err = read_frame(&mut cursor, 16).await.unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::TransportClosed));
    }
}
