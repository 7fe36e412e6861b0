use std::sync::Arc;
use std::sync::atomic::Ordering;

use tracing::{debug, info, warn};

use crate::client::Shared;
use crate::client::call::Outcome;
use crate::codec::CodecReader;
use crate::error::RpcError;

/// Route responses to their calls until the stream fails or the client is closed, then fail
/// whatever is still pending with the error that ended the loop.
pub(crate) async fn run<R: CodecReader>(shared: Arc<Shared>, mut reader: R) {
    let terminal = loop {
        let header = tokio::select! {
            biased;

            () = shared.close.notified() => {
                debug!("Client closed, stopping response loop");
                break RpcError::Closed;
            }

            result = reader.read_response_header() => match result {
                Ok(header) => header,
                Err(e) => {
                    info!(error = %e, "Failed to read response header");
                    break RpcError::ConnectionLost(Arc::new(e));
                }
            },
        };

        let seq = header.seq;
        let removed = shared.lock().remove(seq);
        let Some(call) = removed else {
            // Every header answers a request we sent; reaching this means the peer misbehaved.
            shared
                .counters
                .unmatched_responses
                .fetch_add(1, Ordering::Relaxed);
            warn!(seq, "Response for unknown sequence number");
            if let Err(e) = reader.discard_response_body().await {
                info!(seq, error = %e, "Failed to drain unmatched response body");
                break RpcError::ConnectionLost(Arc::new(e));
            }
            continue;
        };

        debug!(seq, method = %call.method(), "Completing call");

        // A body that was not fully consumed leaves the next header unaligned, so any failure
        // past this point ends the connection.
        if let Some(text) = header.remote_error() {
            let drained = reader.discard_response_body().await;
            call.complete(Outcome::Failed(RpcError::Remote(text.to_string())));
            if let Err(e) = drained {
                info!(seq, error = %e, "Failed to drain body of failed call");
                break RpcError::ConnectionLost(Arc::new(e));
            }
            continue;
        }

        match reader.read_response_body().await {
            Ok(body) => call.complete(Outcome::Reply(body)),
            Err(e) => {
                info!(seq, error = %e, "Failed to read response body");
                let source = Arc::new(e);
                call.complete(Outcome::Failed(RpcError::BodyRead(Arc::clone(&source))));
                break RpcError::ConnectionLost(source);
            }
        }
    };

    let stranded = shared.lock().shut_down();
    info!(
        pending = stranded.len(),
        error = %terminal,
        "Response loop stopped, failing pending calls"
    );

    for call in stranded {
        call.complete(Outcome::Failed(terminal.clone()));
    }
}
