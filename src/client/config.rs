use bon::Builder;

use crate::codec::DEFAULT_MAX_FRAME_LEN;

/// Configuration for an RPC [`Client`](crate::client::Client).
#[derive(Debug, Clone, Builder)]
pub struct ClientConfig {
    /// Buffer size of the completion channel created by
    /// [`Client::go_default`](crate::client::Client::go_default).
    ///
    /// Must be non-zero; an unbuffered completion channel is rejected when it is requested.
    #[builder(default = 10)]
    pub done_capacity: usize,

    /// Requests that may wait for the writer before submissions start waiting for room.
    #[builder(default = 64)]
    pub write_queue_capacity: usize,

    /// Largest response frame accepted from the peer.
    #[builder(default = DEFAULT_MAX_FRAME_LEN)]
    pub max_frame_len: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.done_capacity, 10);
        assert_eq!(config.write_queue_capacity, 64);
        assert_eq!(config.max_frame_len, DEFAULT_MAX_FRAME_LEN);
    }

    #[test]
    fn test_override() {
        let config = ClientConfig::builder().done_capacity(1).max_frame_len(128).build();
        assert_eq!(config.done_capacity, 1);
        assert_eq!(config.max_frame_len, 128);
    }
}
