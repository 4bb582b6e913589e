// Outbound side of the query pipeline.
//
// The transport frames and sends JSON-RPC requests; replies come back
// through the `ReplySink` handed over with each request, in any order.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::bail;
use msgsync_common::error::ClientError;
use msgsync_common::protocol::jsonrpc::{Request, Response};
use serde_json::Value;

use crate::query::QueryId;

/// Routes a reply back to the dispatcher that owns the query.
pub type ReplyRouter = Arc<dyn Fn(QueryId, Result<Value, ClientError>) + Send + Sync>;

pub trait Transport: Send + Sync {
    /// Hands `request` to the network. An error means the request was never
    /// sent and `reply` will not be used.
    fn send(&self, request: Request, reply: ReplySink) -> anyhow::Result<()>;
}

/// Single-use reply channel for one request.
pub struct ReplySink {
    query_id: QueryId,
    router: ReplyRouter,
}

impl ReplySink {
    pub fn new(query_id: QueryId, router: ReplyRouter) -> Self {
        Self { query_id, router }
    }

    pub fn query_id(&self) -> QueryId {
        self.query_id
    }

    pub fn deliver(self, result: Result<Value, ClientError>) {
        (self.router)(self.query_id, result);
    }

    pub fn deliver_response(self, response: Response) {
        self.deliver(response.into_result());
    }
}

impl fmt::Debug for ReplySink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReplySink").field("query_id", &self.query_id).finish_non_exhaustive()
    }
}

/// Keeps every request for inspection instead of sending it.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<(Request, ReplySink)>>,
    refusing: AtomicBool,
}

impl RecordingTransport {
    /// While refusing, `send` fails as if the network were unavailable.
    pub fn set_refusing(&self, refusing: bool) {
        self.refusing.store(refusing, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.sent.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn methods(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(request, _)| request.method.clone())
            .collect()
    }

    pub fn requests(&self) -> Vec<Request> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(request, _)| request.clone())
            .collect()
    }

    /// Removes and returns everything sent so far.
    pub fn take(&self) -> Vec<(Request, ReplySink)> {
        std::mem::take(&mut *self.sent.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl Transport for RecordingTransport {
    fn send(&self, request: Request, reply: ReplySink) -> anyhow::Result<()> {
        if self.refusing.load(Ordering::SeqCst) {
            bail!("transport refused `{}`", request.method);
        }
        self.sent.lock().unwrap_or_else(PoisonError::into_inner).push((request, reply));
        Ok(())
    }
}
