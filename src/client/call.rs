use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use prost::Message;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};

use crate::error::RpcError;

/// One RPC invocation.
///
/// A call is handed back to its owner through a completion channel once it has finished,
/// whether that is with a reply, a remote error, a send failure or a connection failure.
pub struct Call<R> {
    /// Name of the remote operation.
    pub method: String,

    /// Encoded arguments as they were written to the stream.
    pub args: Bytes,

    /// Sequence number assigned at dispatch. `None` if the call never reached the stream.
    pub seq: Option<u64>,

    /// Decoded reply. Only meaningful when `error` is `None`.
    pub reply: R,

    /// Why the call failed, if it did.
    pub error: Option<RpcError>,
}

impl<R: Default> Call<R> {
    pub(crate) fn new(method: String, args: Bytes) -> Self {
        Self {
            method,
            args,
            seq: None,
            reply: R::default(),
            error: None,
        }
    }
}

impl<R> Call<R> {
    /// Consume the call, returning the reply or the error that ended it.
    pub fn into_result(self) -> Result<R, RpcError> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.reply),
        }
    }
}

impl<R: fmt::Debug> fmt::Debug for Call<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Call")
            .field("method", &self.method)
            .field("args", &format_args!("<{} bytes>", self.args.len()))
            .field("seq", &self.seq)
            .field("reply", &self.reply)
            .field("error", &self.error)
            .finish()
    }
}

/// Sending side of a completion channel. Cheap to clone and may be shared between calls.
pub struct Done<R> {
    tx: mpsc::Sender<Call<R>>,
}

impl<R> Clone for Done<R> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<R> fmt::Debug for Done<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Done")
            .field("capacity", &self.tx.max_capacity())
            .finish()
    }
}

/// Receiving side of a completion channel.
#[derive(Debug)]
pub struct Completions<R> {
    rx: mpsc::Receiver<Call<R>>,
}

impl<R> Completions<R> {
    /// Wait for the next finished call.
    ///
    /// Returns `None` once every [`Done`] handle and every call holding one is gone.
    pub async fn recv(&mut self) -> Option<Call<R>> {
        self.rx.recv().await
    }

    /// Take a finished call if one is already waiting.
    pub fn try_recv(&mut self) -> Option<Call<R>> {
        self.rx.try_recv().ok()
    }
}

/// Create a completion channel that buffers up to `capacity` finished calls.
///
/// Completions are delivered without waiting: a call that finds the buffer full is dropped.
pub fn completion_channel<R>(capacity: usize) -> Result<(Done<R>, Completions<R>), RpcError> {
    if capacity == 0 {
        return Err(RpcError::UnbufferedCompletion);
    }

    let (tx, rx) = mpsc::channel(capacity);
    Ok((Done { tx }, Completions { rx }))
}

/// Counters shared by a client and every call it tracks.
#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub(crate) dropped_completions: AtomicU64,
    pub(crate) unmatched_responses: AtomicU64,
}

/// How an in-flight call ended.
pub(crate) enum Outcome {
    /// The peer answered with this body.
    Reply(Bytes),
    /// The call failed.
    Failed(RpcError),
}

/// A call with its reply type erased, as stored in the pending table.
pub(crate) trait Inflight: Send {
    fn method(&self) -> &str;

    fn args(&self) -> &Bytes;

    fn assign_seq(&mut self, seq: u64);

    /// Record the outcome and signal the owner. Never blocks.
    fn complete(self: Box<Self>, outcome: Outcome);
}

pub(crate) struct PendingCall<R> {
    call: Call<R>,
    done: Done<R>,
    counters: Arc<Counters>,
}

impl<R> PendingCall<R>
where
    R: Message + Default + Send + 'static,
{
    pub(crate) fn new(call: Call<R>, done: Done<R>, counters: Arc<Counters>) -> Self {
        Self {
            call,
            done,
            counters,
        }
    }

    fn signal(self) {
        let Self {
            call,
            done,
            counters,
        } = self;

        match done.tx.try_send(call) {
            Ok(()) => {}
            Err(TrySendError::Full(call)) => {
                counters.dropped_completions.fetch_add(1, Ordering::Relaxed);
                warn!(
                    seq = ?call.seq,
                    method = %call.method,
                    "Completion channel full, dropping result"
                );
            }
            Err(TrySendError::Closed(call)) => {
                counters.dropped_completions.fetch_add(1, Ordering::Relaxed);
                debug!(
                    seq = ?call.seq,
                    method = %call.method,
                    "Completion receiver gone, dropping result"
                );
            }
        }
    }
}

impl<R> Inflight for PendingCall<R>
where
    R: Message + Default + Send + 'static,
{
    fn method(&self) -> &str {
        &self.call.method
    }

    fn args(&self) -> &Bytes {
        &self.call.args
    }

    fn assign_seq(&mut self, seq: u64) {
        self.call.seq = Some(seq);
    }

    fn complete(mut self: Box<Self>, outcome: Outcome) {
        match outcome {
            Outcome::Reply(body) => match R::decode(body) {
                Ok(reply) => self.call.reply = reply,
                Err(e) => self.call.error = Some(RpcError::Decode(e)),
            },
            Outcome::Failed(err) => self.call.error = Some(err),
        }

        self.signal();
    }
}
