use std::collections::HashMap;

use crate::client::call::Inflight;
use crate::error::RpcError;

/// Sequence allocation and the calls awaiting a response.
///
/// Always accessed under the client's single mutex, and never across I/O.
pub(crate) struct PendingTable {
    next_seq: u64,
    calls: HashMap<u64, Box<dyn Inflight>>,
    closing: bool,
    shutdown: bool,
}

impl PendingTable {
    pub(crate) fn new() -> Self {
        Self {
            next_seq: 0,
            calls: HashMap::new(),
            closing: false,
            shutdown: false,
        }
    }

    /// The error a new call must fail with, if the client no longer accepts work.
    pub(crate) fn refusal(&self) -> Option<RpcError> {
        if self.closing {
            Some(RpcError::Closed)
        } else if self.shutdown {
            Some(RpcError::Shutdown)
        } else {
            None
        }
    }

    /// Assign the next sequence number to `call` and track it.
    pub(crate) fn insert(&mut self, mut call: Box<dyn Inflight>) -> u64 {
        let seq = self.next_seq;
        self.next_seq = self.next_seq.wrapping_add(1);

        call.assign_seq(seq);
        let previous = self.calls.insert(seq, call);
        debug_assert!(previous.is_none(), "sequence number {seq} reused");
        seq
    }

    pub(crate) fn contains(&self, seq: u64) -> bool {
        self.calls.contains_key(&seq)
    }

    pub(crate) fn remove(&mut self, seq: u64) -> Option<Box<dyn Inflight>> {
        self.calls.remove(&seq)
    }

    pub(crate) fn mark_closing(&mut self) -> bool {
        !std::mem::replace(&mut self.closing, true)
    }

    /// Mark the connection dead and hand back every call still waiting on it.
    pub(crate) fn shut_down(&mut self) -> Vec<Box<dyn Inflight>> {
        self.shutdown = true;
        self.calls.drain().map(|(_, call)| call).collect()
    }

    pub(crate) fn is_shutdown(&self) -> bool {
        self.shutdown
    }

    pub(crate) fn len(&self) -> usize {
        self.calls.len()
    }
}
