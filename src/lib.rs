//! # seedrpc
//!
//! Client-side transport for a multiplexed RPC protocol.
//!
//! One bidirectional byte stream carries any number of concurrent calls. Requests are tagged
//! with a per-connection sequence number and responses may come back in any order; a
//! background task matches each response to its call and signals the caller.
//!
//! ```ignore
//! use seedrpc::client::{Client, ClientConfig};
//! use seedrpc::discovery::{RoundRobin, StaticRegistry, resolve_address};
//! use tokio_util::sync::CancellationToken;
//!
//! let registry = StaticRegistry::new();
//! registry.register("Echo", "10.0.0.1:9000");
//!
//! let addr = resolve_address(&registry, &mut RoundRobin::new(), "Echo").await?;
//! let client = Client::dial(&addr, ClientConfig::default()).await?;
//!
//! let reply: String = client
//!     .call(&CancellationToken::new(), "Echo.Repeat", &"hi".to_string())
//!     .await?;
//! assert_eq!(reply, "hi");
//! ```
//!
//! ## Wire format
//!
//! The bundled [`codec`] writes every message as two length-prefixed frames: a protobuf
//! header carrying the sequence number, then the protobuf-encoded body. Any other framing can
//! be plugged in through [`codec::CodecReader`] and [`codec::CodecWriter`].

pub mod client;
pub mod codec;
pub mod discovery;
mod error;

pub use client::{Call, Client, ClientConfig, ClientStats, Completions, Done, completion_channel};
pub use error::{CodecError, RegistryError, ResolveError, RpcError};
