use std::io::ErrorKind;

use bytes::{BufMut, Bytes, BytesMut};
use prost::Message;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::codec::{CodecReader, CodecWriter, RequestHeader, ResponseHeader};
use crate::error::CodecError;

/// Largest frame accepted by default (16 MiB).
pub const DEFAULT_MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

const LEN_PREFIX: usize = 4;

/// Reads length-prefixed frames from the read half of a stream.
///
/// A message is two frames: `[u32 BE len][protobuf header]` then `[u32 BE len][body]`.
#[derive(Debug)]
pub struct FramedReader<R> {
    inner: R,
    max_frame_len: usize,
}

impl<R> FramedReader<R>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    /// Create a reader that accepts frames up to [`DEFAULT_MAX_FRAME_LEN`].
    pub fn new(inner: R) -> Self {
        Self::with_max_frame_len(inner, DEFAULT_MAX_FRAME_LEN)
    }

    /// Create a reader with a custom frame size limit.
    pub fn with_max_frame_len(inner: R, max_frame_len: usize) -> Self {
        Self {
            inner,
            max_frame_len,
        }
    }

    /// Read one request. Used by the serving side of a connection.
    pub async fn read_request(&mut self) -> Result<(RequestHeader, Bytes), CodecError> {
        let header = RequestHeader::decode(self.read_header_frame().await?)?;
        let body = self.read_frame().await?;
        Ok((header, body))
    }

    /// Read the frame that starts a message, reporting a clean EOF as [`CodecError::Closed`].
    async fn read_header_frame(&mut self) -> Result<Bytes, CodecError> {
        match self.inner.read_u32().await {
            Ok(len) => self.read_payload(len).await,
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => Err(CodecError::Closed),
            Err(e) => Err(e.into()),
        }
    }

    async fn read_frame(&mut self) -> Result<Bytes, CodecError> {
        let len = self.inner.read_u32().await?;
        self.read_payload(len).await
    }

    async fn read_payload(&mut self, len: u32) -> Result<Bytes, CodecError> {
        let len = len as usize;
        if len > self.max_frame_len {
            return Err(CodecError::FrameTooLarge {
                len,
                max: self.max_frame_len,
            });
        }

        let mut buf = BytesMut::zeroed(len);
        self.inner.read_exact(&mut buf).await?;
        Ok(buf.freeze())
    }
}

impl<R> CodecReader for FramedReader<R>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    async fn read_response_header(&mut self) -> Result<ResponseHeader, CodecError> {
        let frame = self.read_header_frame().await?;
        Ok(ResponseHeader::decode(frame)?)
    }

    async fn read_response_body(&mut self) -> Result<Bytes, CodecError> {
        self.read_frame().await
    }
}

/// Writes length-prefixed frames to the write half of a stream.
///
/// Each message is assembled in memory and written with a single `write_all`, so a header is
/// never separated from its body by another writer's bytes.
#[derive(Debug)]
pub struct FramedWriter<W> {
    inner: W,
}

impl<W> FramedWriter<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    /// Write one response. Used by the serving side of a connection.
    pub async fn write_response(
        &mut self,
        header: ResponseHeader,
        body: &[u8],
    ) -> Result<(), CodecError> {
        self.write_message(&header, body).await
    }

    async fn write_message<H: Message>(
        &mut self,
        header: &H,
        body: &[u8],
    ) -> Result<(), CodecError> {
        let header_len = frame_len(header.encoded_len())?;
        let body_len = frame_len(body.len())?;

        let mut buf = BytesMut::with_capacity(2 * LEN_PREFIX + header_len as usize + body.len());
        buf.put_u32(header_len);
        header.encode(&mut buf)?;
        buf.put_u32(body_len);
        buf.put_slice(body);

        self.inner.write_all(&buf).await?;
        self.inner.flush().await?;
        Ok(())
    }
}

impl<W> CodecWriter for FramedWriter<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    async fn write_request(
        &mut self,
        header: RequestHeader,
        body: &[u8],
    ) -> Result<(), CodecError> {
        self.write_message(&header, body).await
    }

    async fn shutdown(&mut self) -> Result<(), CodecError> {
        self.inner.shutdown().await?;
        Ok(())
    }
}

fn frame_len(len: usize) -> Result<u32, CodecError> {
    u32::try_from(len).map_err(|_| CodecError::FrameTooLarge {
        len,
        max: u32::MAX as usize,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    fn pair() -> (
        FramedWriter<tokio::io::DuplexStream>,
        FramedReader<tokio::io::DuplexStream>,
    ) {
        let (a, b) = duplex(64 * 1024);
        (FramedWriter::new(a), FramedReader::new(b))
    }

    #[tokio::test]
    async fn test_request_passes_through() {
        let (mut writer, mut reader) = pair();

        let header = RequestHeader {
            seq: 7,
            method: "Echo.Repeat".to_string(),
        };
        writer.write_request(header.clone(), b"payload").await.unwrap();

        let (read, body) = reader.read_request().await.unwrap();
        assert_eq!(read, header);
        assert_eq!(&body[..], b"payload");
    }

    #[tokio::test]
    async fn test_discarded_body_keeps_stream_aligned() {
        let (mut writer, mut reader) = pair();

        let failed = ResponseHeader {
            seq: 1,
            error: "boom".to_string(),
        };
        let ok = ResponseHeader {
            seq: 2,
            error: String::new(),
        };
        writer.write_response(failed, b"ignored").await.unwrap();
        writer.write_response(ok, b"kept").await.unwrap();

        let first = reader.read_response_header().await.unwrap();
        assert_eq!(first.remote_error(), Some("boom"));
        reader.discard_response_body().await.unwrap();

        let second = reader.read_response_header().await.unwrap();
        assert_eq!(second.seq, 2);
        assert_eq!(second.remote_error(), None);
        assert_eq!(&reader.read_response_body().await.unwrap()[..], b"kept");
    }

    #[tokio::test]
    async fn test_eof_at_boundary_is_closed() {
        let (writer, mut reader) = pair();
        drop(writer);

        let result = reader.read_response_header().await;
        assert!(matches!(result, Err(CodecError::Closed)));
    }

    #[tokio::test]
    async fn test_oversized_frame_rejected() {
        let (a, b) = duplex(1024);
        let mut writer = FramedWriter::new(a);
        let mut reader = FramedReader::with_max_frame_len(b, 4);

        let header = ResponseHeader {
            seq: 99,
            error: "long enough to exceed".to_string(),
        };
        writer.write_response(header, b"").await.unwrap();

        let result = reader.read_response_header().await;
        assert!(matches!(result, Err(CodecError::FrameTooLarge { max: 4, .. })));
    }
}
