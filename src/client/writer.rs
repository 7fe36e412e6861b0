use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::client::Shared;
use crate::client::call::Outcome;
use crate::codec::{CodecWriter, RequestHeader};
use crate::error::RpcError;

/// Work for the task that owns the write side of the stream.
pub(crate) enum WriteCommand {
    /// Write one request already registered in the pending table.
    Request { header: RequestHeader, body: Bytes },
    /// Flush and close the write side, then stop.
    Shutdown(oneshot::Sender<()>),
}

/// Write queued requests one at a time until shut down or every sender is gone.
///
/// Callers only enqueue, so dropping a caller's future can never leave a frame half written.
pub(crate) async fn run<W: CodecWriter>(
    shared: Arc<Shared>,
    mut writer: W,
    mut commands: mpsc::Receiver<WriteCommand>,
) {
    while let Some(command) = commands.recv().await {
        match command {
            WriteCommand::Request { header, body } => {
                let seq = header.seq;
                if !shared.lock().contains(seq) {
                    debug!(seq, "Call finished before its request was written, skipping");
                    continue;
                }

                if let Err(e) = writer.write_request(header, &body).await {
                    warn!(seq, error = %e, "Failed to write request");
                    let removed = shared.lock().remove(seq);
                    if let Some(call) = removed {
                        call.complete(Outcome::Failed(RpcError::Dispatch(Arc::new(e))));
                    }
                }
            }
            WriteCommand::Shutdown(ack) => {
                if let Err(e) = writer.shutdown().await {
                    debug!(error = %e, "Failed to shut down write side");
                }
                let _ = ack.send(());
                break;
            }
        }
    }

    debug!("Request writer stopped");
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tokio::sync::Notify;

    use super::*;
    use crate::client::call::{Call, Counters, PendingCall, completion_channel};
    use crate::client::pending::PendingTable;
    use crate::error::CodecError;

    struct CountingWriter(Arc<AtomicUsize>);

    impl CodecWriter for CountingWriter {
        async fn write_request(
            &mut self,
            _header: RequestHeader,
            _body: &[u8],
        ) -> Result<(), CodecError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn shutdown(&mut self) -> Result<(), CodecError> {
            Ok(())
        }
    }

    fn request(seq: u64) -> WriteCommand {
        WriteCommand::Request {
            header: RequestHeader {
                seq,
                method: "Echo.Repeat".to_string(),
            },
            body: Bytes::new(),
        }
    }

    #[tokio::test]
    async fn test_request_for_finished_call_is_skipped() {
        let shared = Arc::new(Shared {
            table: Mutex::new(PendingTable::new()),
            counters: Arc::new(Counters::default()),
            close: Notify::new(),
        });
        let (done, _completions) = completion_channel::<String>(2).unwrap();
        let track = |shared: &Shared| {
            let call = Call::new("Echo.Repeat".to_string(), Bytes::new());
            let pending = PendingCall::new(call, done.clone(), Arc::clone(&shared.counters));
            shared.lock().insert(Box::new(pending))
        };

        let live = track(&shared);
        let finished = track(&shared);
        assert!(shared.lock().remove(finished).is_some());

        let (commands_tx, commands) = mpsc::channel(4);
        assert!(commands_tx.send(request(live)).await.is_ok());
        assert!(commands_tx.send(request(finished)).await.is_ok());
        let (ack, flushed) = oneshot::channel();
        assert!(commands_tx.send(WriteCommand::Shutdown(ack)).await.is_ok());

        let writes = Arc::new(AtomicUsize::new(0));
        run(Arc::clone(&shared), CountingWriter(Arc::clone(&writes)), commands).await;

        assert!(flushed.await.is_ok());
        assert_eq!(writes.load(Ordering::SeqCst), 1);
        assert_eq!(shared.lock().len(), 1);
    }
}
