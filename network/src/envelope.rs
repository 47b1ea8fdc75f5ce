//! p2p envelope: `[type:1][len:4 BE][content]`.
//!
//! Streams carry one envelope per frame. Group messages carry the same
//! envelope, which the receiver strips before dispatch.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use shard_protocol::MAX_FRAME_SIZE;

use crate::NetworkError;

/// Type byte plus 4-byte length.
pub const ENVELOPE_HEADER_LEN: usize = 5;

/// The only envelope type in use: an opaque node frame.
pub const ENVELOPE_MESSAGE_TYPE: u8 = 0;

/// Prefix `content` with the envelope header.
pub fn wrap_envelope(content: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(ENVELOPE_HEADER_LEN + content.len());
    out.push(ENVELOPE_MESSAGE_TYPE);
    out.extend_from_slice(&(content.len() as u32).to_be_bytes());
    out.extend_from_slice(content);
    out
}

/// Strip the envelope header and return the content it declares.
pub fn unwrap_envelope(bytes: &[u8]) -> Result<&[u8], NetworkError> {
    if bytes.len() < ENVELOPE_HEADER_LEN {
        return Err(NetworkError::ShortEnvelope(bytes.len()));
    }
    let declared = u32::from_be_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]) as usize;
    let content = &bytes[ENVELOPE_HEADER_LEN..];
    if content.len() < declared {
        return Err(NetworkError::LengthMismatch {
            declared,
            actual: content.len(),
        });
    }
    Ok(&content[..declared])
}

/// Read one enveloped frame from a stream. Returns `Ok(None)` on clean EOF
/// before the header.
pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Option<Vec<u8>>, NetworkError> {
    let mut header = [0u8; ENVELOPE_HEADER_LEN];
    match reader.read_exact(&mut header).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }
    let len = u32::from_be_bytes([header[1], header[2], header[3], header[4]]) as usize;
    if len > MAX_FRAME_SIZE {
        return Err(NetworkError::FrameTooLarge(len));
    }
    let mut content = vec![0u8; len];
    reader.read_exact(&mut content).await?;
    Ok(Some(content))
}

/// Write one enveloped frame and flush.
pub async fn write_frame<W: AsyncWrite + Unpin>(writer: &mut W, content: &[u8]) -> Result<(), NetworkError> {
    writer.write_all(&wrap_envelope(content)).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_then_unwrap() {
        let wrapped = wrap_envelope(&[1, 5, 9]);
        assert_eq!(wrapped, vec![0, 0, 0, 0, 3, 1, 5, 9]);
        assert_eq!(unwrap_envelope(&wrapped).unwrap(), &[1, 5, 9]);
    }

    #[test]
    fn short_envelope_rejected() {
        assert!(matches!(unwrap_envelope(&[0, 0, 0]), Err(NetworkError::ShortEnvelope(3))));
    }

    #[test]
    fn truncated_content_rejected() {
        let mut wrapped = wrap_envelope(&[1, 2, 3, 4]);
        wrapped.pop();
        assert!(matches!(
            unwrap_envelope(&wrapped),
            Err(NetworkError::LengthMismatch { declared: 4, actual: 3 })
        ));
    }

    #[tokio::test]
    async fn stream_frames_read_until_eof() {
        let (mut client, mut server) = tokio::io::duplex(256);
        write_frame(&mut client, &[1, 6, 7]).await.unwrap();
        write_frame(&mut client, &[0, 2]).await.unwrap();
        drop(client);

        assert_eq!(read_frame(&mut server).await.unwrap(), Some(vec![1, 6, 7]));
        assert_eq!(read_frame(&mut server).await.unwrap(), Some(vec![0, 2]));
        assert_eq!(read_frame(&mut server).await.unwrap(), None);
    }

    #[tokio::test]
    async fn oversized_frame_rejected() {
        let (mut client, mut server) = tokio::io::duplex(64);
        let mut header = vec![ENVELOPE_MESSAGE_TYPE];
        header.extend_from_slice(&u32::MAX.to_be_bytes());
        client.write_all(&header).await.unwrap();
        assert!(matches!(
            read_frame(&mut server).await,
            Err(NetworkError::FrameTooLarge(_))
        ));
    }
}
