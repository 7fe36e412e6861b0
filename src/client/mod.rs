//! Client side of a multiplexed RPC connection.
//!
//! A [`Client`] turns one bidirectional stream into any number of concurrently outstanding
//! calls. Each call gets a sequence number, is parked in a pending table, and is written to
//! the stream. A single background task reads responses, looks the call up by sequence number
//! and hands it back to its owner through a completion channel.
//!
//! # Example
//!
//! ```ignore
//! use seedrpc::client::{Client, ClientConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! let client = Client::dial("10.0.0.1:9000", ClientConfig::default()).await?;
//!
//! // Block until the reply arrives
//! let reply: String = client
//!     .call(&CancellationToken::new(), "Echo.Repeat", &"hi".to_string())
//!     .await?;
//!
//! // Or submit and collect the result later
//! let mut completions = client
//!     .go_default::<String, String>(&CancellationToken::new(), "Echo.Repeat", &"hi".to_string())
//!     .await?;
//! let call = completions.recv().await;
//! ```

mod call;
mod config;
mod demux;
mod pending;
mod writer;

use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex, MutexGuard};

use bytes::Bytes;
use prost::Message;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::{Notify, mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::codec::{CodecReader, CodecWriter, FramedReader, FramedWriter, RequestHeader};
use crate::error::{CodecError, RpcError};

use self::call::{Counters, Inflight, Outcome, PendingCall};
use self::pending::PendingTable;
use self::writer::WriteCommand;

pub use call::{Call, Completions, Done, completion_channel};
pub use config::ClientConfig;

/// Point-in-time view of a client's delivery counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ClientStats {
    /// Completions discarded because the owner's channel was full or gone.
    pub dropped_completions: u64,
    /// Responses whose sequence number matched no pending call.
    pub unmatched_responses: u64,
}

/// State shared between the dispatch path, the writer and the response loop.
pub(crate) struct Shared {
    table: Mutex<PendingTable>,
    counters: Arc<Counters>,
    close: Notify,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, PendingTable> {
        self.table.lock().expect("pending table lock poisoned")
    }
}

struct Inner {
    shared: Arc<Shared>,
    requests: mpsc::Sender<WriteCommand>,
    server_addr: String,
    config: ClientConfig,
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Ok(mut table) = self.shared.table.lock() {
            table.mark_closing();
        }
        self.shared.close.notify_one();
    }
}

/// A multiplexing RPC client bound to one connection.
///
/// Cloning is cheap and every clone submits over the same connection. The response loop
/// stops when the stream fails, when [`close`](Self::close) is called, or when the last clone
/// is dropped.
#[derive(Clone)]
pub struct Client {
    inner: Arc<Inner>,
}

impl Client {
    /// Create a client over an already open stream.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new<S>(stream: S, server_addr: impl Into<String>, config: ClientConfig) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (read_half, write_half) = tokio::io::split(stream);
        let reader = FramedReader::with_max_frame_len(read_half, config.max_frame_len);
        Self::with_codec(reader, FramedWriter::new(write_half), server_addr, config)
    }

    /// Open a TCP connection to `addr` and create a client over it.
    pub async fn dial(addr: &str, config: ClientConfig) -> Result<Self, CodecError> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        let (read_half, write_half) = stream.into_split();

        info!(server_addr = %addr, "Connected to RPC server");

        let reader = FramedReader::with_max_frame_len(read_half, config.max_frame_len);
        Ok(Self::with_codec(
            reader,
            FramedWriter::new(write_half),
            addr,
            config,
        ))
    }

    /// Create a client over an arbitrary codec and start its writer and response loop.
    ///
    /// Must be called from within a tokio runtime.
    pub fn with_codec<R, W>(
        reader: R,
        writer: W,
        server_addr: impl Into<String>,
        config: ClientConfig,
    ) -> Self
    where
        R: CodecReader,
        W: CodecWriter,
    {
        let shared = Arc::new(Shared {
            table: Mutex::new(PendingTable::new()),
            counters: Arc::new(Counters::default()),
            close: Notify::new(),
        });

        let (requests, commands) = mpsc::channel(config.write_queue_capacity.max(1));
        tokio::spawn(writer::run(Arc::clone(&shared), writer, commands));
        tokio::spawn(demux::run(Arc::clone(&shared), reader));

        Self {
            inner: Arc::new(Inner {
                shared,
                requests,
                server_addr: server_addr.into(),
                config,
            }),
        }
    }

    /// Submit a call whose completion is delivered to `done`.
    ///
    /// Returns once the request is registered and queued for writing. The outcome, including
    /// any send failure, arrives as a [`Call`] on the channel behind `done`, which may be shared
    /// with other calls.
    ///
    /// `cancel` is checked once before anything is sent. Canceling after that has no effect,
    /// and neither does dropping the returned future once the call is registered.
    pub async fn go<A, R>(
        &self,
        cancel: &CancellationToken,
        method: impl Into<String>,
        args: &A,
        done: &Done<R>,
    ) where
        A: Message,
        R: Message + Default + Send + 'static,
    {
        let call = Call::new(method.into(), Bytes::from(args.encode_to_vec()));
        let pending = Box::new(PendingCall::new(
            call,
            done.clone(),
            Arc::clone(&self.inner.shared.counters),
        ));

        if cancel.is_cancelled() {
            debug!(method = %pending.method(), "Call canceled before dispatch");
            pending.complete(Outcome::Failed(RpcError::Canceled));
            return;
        }

        self.send(pending).await;
    }

    /// Submit a call with a private completion channel of
    /// [`ClientConfig::done_capacity`] slots.
    ///
    /// Fails with [`RpcError::UnbufferedCompletion`] if the configured capacity is zero.
    pub async fn go_default<A, R>(
        &self,
        cancel: &CancellationToken,
        method: impl Into<String>,
        args: &A,
    ) -> Result<Completions<R>, RpcError>
    where
        A: Message,
        R: Message + Default + Send + 'static,
    {
        let (done, completions) = completion_channel(self.inner.config.done_capacity)?;
        self.go(cancel, method, args, &done).await;
        Ok(completions)
    }

    /// Submit a call and wait for its reply.
    pub async fn call<A, R>(
        &self,
        cancel: &CancellationToken,
        method: impl Into<String>,
        args: &A,
    ) -> Result<R, RpcError>
    where
        A: Message,
        R: Message + Default + Send + 'static,
    {
        let (done, mut completions) = completion_channel(1)?;
        self.go(cancel, method, args, &done).await;
        drop(done);

        match completions.recv().await {
            Some(call) => call.into_result(),
            // The call was dropped without completing, which only happens when the runtime
            // tears the background tasks down.
            None => Err(RpcError::Shutdown),
        }
    }

    /// Stop accepting calls, stop the response loop and close the write side of the stream.
    ///
    /// Calls still pending fail with [`RpcError::Closed`]. Calling this more than once is a
    /// no-op.
    pub async fn close(&self) {
        if !self.inner.shared.lock().mark_closing() {
            return;
        }

        info!(server_addr = %self.inner.server_addr, "Closing RPC client");

        self.inner.shared.close.notify_one();

        let (ack, flushed) = oneshot::channel();
        if self
            .inner
            .requests
            .send(WriteCommand::Shutdown(ack))
            .await
            .is_ok()
        {
            let _ = flushed.await;
        }
    }

    /// Register `call` under a fresh sequence number and queue its request.
    ///
    /// The only suspension point is waiting for room in the write queue, before anything is
    /// registered. Registration and enqueueing then happen together under the table lock.
    async fn send(&self, call: Box<dyn Inflight>) {
        let shared = &self.inner.shared;

        let Ok(permit) = self.inner.requests.reserve().await else {
            let err = shared.lock().refusal().unwrap_or(RpcError::Closed);
            debug!(method = %call.method(), error = %err, "Writer gone, refusing call");
            call.complete(Outcome::Failed(err));
            return;
        };

        let method = call.method().to_string();
        let body = call.args().clone();

        let registered = {
            let mut table = shared.lock();
            match table.refusal() {
                Some(err) => Err((err, call)),
                None => {
                    let seq = table.insert(call);
                    let header = RequestHeader {
                        seq,
                        method: method.clone(),
                    };
                    permit.send(WriteCommand::Request { header, body });
                    Ok(seq)
                }
            }
        };

        match registered {
            Ok(seq) => debug!(seq, method = %method, "Queued request"),
            Err((err, call)) => {
                debug!(method = %method, error = %err, "Refusing call");
                call.complete(Outcome::Failed(err));
            }
        }
    }

    /// The address this client was connected to.
    pub fn server_addr(&self) -> &str {
        &self.inner.server_addr
    }

    /// Number of calls registered but not yet completed.
    pub fn pending_count(&self) -> usize {
        self.inner.shared.lock().len()
    }

    /// Whether the response loop has stopped.
    pub fn is_shutdown(&self) -> bool {
        self.inner.shared.lock().is_shutdown()
    }

    /// Snapshot of the completions dropped and responses left unmatched so far.
    pub fn stats(&self) -> ClientStats {
        let counters = &self.inner.shared.counters;
        ClientStats {
            dropped_completions: counters.dropped_completions.load(Ordering::Relaxed),
            unmatched_responses: counters.unmatched_responses.load(Ordering::Relaxed),
        }
    }
}
