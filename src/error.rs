use std::sync::Arc;

use thiserror::Error;

/// Errors raised by a wire codec while framing, encoding or decoding messages.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The underlying stream failed.
    #[error("stream I/O error")]
    Io(#[from] std::io::Error),

    /// Failed to encode a protobuf header.
    #[error("protobuf encode error")]
    Encode(#[from] prost::EncodeError),

    /// Failed to decode a protobuf header.
    #[error("protobuf decode error")]
    Decode(#[from] prost::DecodeError),

    /// A frame announced a length above the configured limit.
    #[error("frame of {len} bytes exceeds the {max} byte limit")]
    FrameTooLarge { len: usize, max: usize },

    /// The peer closed the stream at a message boundary.
    #[error("stream closed by peer")]
    Closed,
}

/// The error slot of a single call.
///
/// Errors that originate from the shared stream are wrapped in an [`Arc`] so that one
/// terminating error can be handed to every call that was pending when the stream failed.
#[derive(Debug, Clone, Error)]
pub enum RpcError {
    /// The peer reported an application-level failure for this call.
    #[error("{0}")]
    Remote(String),

    /// Writing the request for this call failed.
    #[error("failed to send request")]
    Dispatch(#[source] Arc<CodecError>),

    /// The response body could not be decoded into the reply type.
    #[error("failed to decode reply")]
    Decode(#[from] prost::DecodeError),

    /// The response body could not be read off the stream.
    #[error("failed to read response body")]
    BodyRead(#[source] Arc<CodecError>),

    /// The connection failed while this call was pending.
    #[error("connection lost")]
    ConnectionLost(#[source] Arc<CodecError>),

    /// The connection had already failed when this call was submitted.
    #[error("client is shut down")]
    Shutdown,

    /// The client was closed by its owner.
    #[error("client is closed")]
    Closed,

    /// The caller canceled the call before it was sent.
    #[error("call canceled before dispatch")]
    Canceled,

    /// A completion channel was requested with no buffering.
    #[error("completion channel must be buffered")]
    UnbufferedCompletion,
}

/// Errors surfaced by a service registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The registry could not be queried.
    #[error("registry unavailable: {0}")]
    Unavailable(String),
}

/// Errors surfaced while resolving a service name to a single address.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The registry knows no address for the service.
    #[error("no address registered for service '{service}'")]
    NoAddress { service: String },

    /// The registry lookup itself failed.
    #[error("registry lookup failed")]
    Registry(#[from] RegistryError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_error_is_verbatim() {
        let err = RpcError::Remote("method not found".to_string());
        assert_eq!(err.to_string(), "method not found");
    }

    #[test]
    fn test_broadcast_error_shares_source() {
        let source = Arc::new(CodecError::Closed);
        let a = RpcError::ConnectionLost(Arc::clone(&source));
        let b = a.clone();

        match (a, b) {
            (RpcError::ConnectionLost(x), RpcError::ConnectionLost(y)) => {
                assert!(Arc::ptr_eq(&x, &y))
            }
            _ => panic!("expected connection lost"),
        }
    }
}
