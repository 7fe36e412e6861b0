//! Wire codec contract between the client core and the byte stream.
//!
//! The client never touches the stream directly. Requests go out through a [`CodecWriter`]
//! and responses come back through a [`CodecReader`]. Every message on the wire is one header
//! followed by exactly one body, and the reader must be able to skip a body it has no use for
//! so that the next header stays aligned.
//!
//! [`FramedReader`] and [`FramedWriter`] implement the contract over any tokio stream using
//! length-prefixed protobuf headers.

mod framed;

use std::future::Future;

use bytes::Bytes;

use crate::error::CodecError;

pub use framed::{DEFAULT_MAX_FRAME_LEN, FramedReader, FramedWriter};

/// Header written in front of every request body.
///
/// A new header is built for each call and handed to the writer by value.
#[derive(Clone, PartialEq, prost::Message)]
pub struct RequestHeader {
    /// Sequence number correlating the request with its response.
    #[prost(uint64, tag = "1")]
    pub seq: u64,

    /// Name of the remote operation, e.g. `Echo.Repeat`.
    #[prost(string, tag = "2")]
    pub method: String,
}

/// Header written in front of every response body.
#[derive(Clone, PartialEq, prost::Message)]
pub struct ResponseHeader {
    /// Sequence number of the request being answered.
    #[prost(uint64, tag = "1")]
    pub seq: u64,

    /// Remote error text. Empty on success.
    #[prost(string, tag = "2")]
    pub error: String,
}

impl ResponseHeader {
    /// The remote error carried by this header, if any.
    pub fn remote_error(&self) -> Option<&str> {
        (!self.error.is_empty()).then_some(self.error.as_str())
    }
}

/// The request side of a client connection.
pub trait CodecWriter: Send + 'static {
    /// Write one request (header then body) to the stream.
    fn write_request(
        &mut self,
        header: RequestHeader,
        body: &[u8],
    ) -> impl Future<Output = Result<(), CodecError>> + Send;

    /// Flush and close the write direction of the stream.
    fn shutdown(&mut self) -> impl Future<Output = Result<(), CodecError>> + Send;
}

/// The response side of a client connection.
pub trait CodecReader: Send + 'static {
    /// Read the next response header.
    ///
    /// An error here means the stream can no longer be trusted.
    fn read_response_header(
        &mut self,
    ) -> impl Future<Output = Result<ResponseHeader, CodecError>> + Send;

    /// Read the body that follows the last header.
    fn read_response_body(&mut self) -> impl Future<Output = Result<Bytes, CodecError>> + Send;

    /// Read the body that follows the last header and throw it away.
    fn discard_response_body(&mut self) -> impl Future<Output = Result<(), CodecError>> + Send {
        async move { self.read_response_body().await.map(drop) }
    }
}
