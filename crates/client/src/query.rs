// Query Dispatcher: one outbound request per query, one pending completion
// per request, replies correlated by id only.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use msgsync_common::error::ClientError;
use msgsync_common::protocol::jsonrpc::{Request, RequestId};
use msgsync_common::types::DialogId;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::collaborators::DialogAccessObserver;
use crate::transport::{ReplyRouter, ReplySink, Transport};

/// Correlation id of an in-flight query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueryId(u64);

impl QueryId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub const fn get(self) -> u64 {
        self.0
    }

    pub fn from_request_id(id: &RequestId) -> Option<Self> {
        id.as_number().and_then(|id| u64::try_from(id).ok()).map(Self)
    }

    pub fn to_request_id(self) -> RequestId {
        RequestId::Number(self.0 as i64)
    }
}

impl fmt::Display for QueryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "query {}", self.0)
    }
}

pub type Completion<M> = Box<dyn FnOnce(&mut M, Result<Value, ClientError>) + Send>;

/// A unit of remote work whose completion runs on the manager `M`.
pub struct Query<M> {
    method: &'static str,
    params: Value,
    dialog_id: Option<DialogId>,
    source: &'static str,
    completion: Completion<M>,
}

impl<M> Query<M> {
    pub fn new(
        method: &'static str,
        params: Value,
        source: &'static str,
        completion: impl FnOnce(&mut M, Result<Value, ClientError>) + Send + 'static,
    ) -> Self {
        Self { method, params, dialog_id: None, source, completion: Box::new(completion) }
    }

    /// Like [`Query::new`], decoding the reply payload as `T` first.
    pub fn expecting<T>(
        method: &'static str,
        params: Value,
        source: &'static str,
        completion: impl FnOnce(&mut M, Result<T, ClientError>) + Send + 'static,
    ) -> Self
    where
        T: DeserializeOwned,
    {
        Self::new(method, params, source, move |manager, result| {
            completion(manager, result.and_then(fetch_result::<T>));
        })
    }

    /// Attributes failures of this query to `dialog_id`.
    pub fn with_dialog(mut self, dialog_id: DialogId) -> Self {
        self.dialog_id = Some(dialog_id);
        self
    }

    pub fn method(&self) -> &'static str {
        self.method
    }
}

impl<M> fmt::Debug for Query<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("method", &self.method)
            .field("dialog_id", &self.dialog_id)
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

/// Decodes a reply payload. Malformed payloads are a 500-class error.
pub fn fetch_result<T: DeserializeOwned>(value: Value) -> Result<T, ClientError> {
    serde_json::from_value(value)
        .map_err(|error| ClientError::internal(format!("Failed to parse server response: {error}")))
}

/// Encodes wire parameters for a query.
pub fn encode_params<T: Serialize>(params: &T) -> Result<Value, ClientError> {
    serde_json::to_value(params)
        .map_err(|error| ClientError::internal(format!("Failed to encode request: {error}")))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryOutcome {
    Completed,
    Failed,
    /// Unknown id, duplicate delivery, or a reply after shutdown.
    Ignored,
}

pub struct PendingQuery<M> {
    method: &'static str,
    dialog_id: Option<DialogId>,
    source: &'static str,
    completion: Completion<M>,
}

enum Dispatch<M> {
    Sent(QueryId),
    Rejected(PendingQuery<M>, ClientError),
}

pub struct QueryDispatcher<M> {
    transport: Arc<dyn Transport>,
    router: ReplyRouter,
    next_id: u64,
    pending: HashMap<QueryId, PendingQuery<M>>,
    closed: bool,
}

impl<M> QueryDispatcher<M> {
    /// `router` must bring replies back to the manager owning this dispatcher.
    pub fn new(transport: Arc<dyn Transport>, router: ReplyRouter) -> Self {
        Self { transport, router, next_id: 1, pending: HashMap::new(), closed: false }
    }

    pub fn is_pending(&self, id: QueryId) -> bool {
        self.pending.contains_key(&id)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn dispatch(&mut self, query: Query<M>) -> Dispatch<M> {
        let Query { method, params, dialog_id, source, completion } = query;
        let pending = PendingQuery { method, dialog_id, source, completion };
        if self.closed {
            return Dispatch::Rejected(pending, ClientError::Shutdown);
        }

        let id = QueryId::new(self.next_id);
        self.next_id += 1;
        let request = Request::new(method, Some(params), id.to_request_id());
        self.pending.insert(id, pending);

        match self.transport.send(request, ReplySink::new(id, Arc::clone(&self.router))) {
            Ok(()) => {
                debug!(%id, method, source, "query sent");
                Dispatch::Sent(id)
            }
            Err(error) => {
                warn!(%id, method, source, error = %error, "transport refused query");
                let pending = self.pending.remove(&id);
                let error = ClientError::internal(format!("Failed to send request: {error:#}"));
                match pending {
                    Some(pending) => Dispatch::Rejected(pending, error),
                    None => Dispatch::Sent(id),
                }
            }
        }
    }

    fn take(&mut self, id: QueryId) -> Option<PendingQuery<M>> {
        if self.closed {
            return None;
        }
        self.pending.remove(&id)
    }

    fn close(&mut self) -> Vec<PendingQuery<M>> {
        self.closed = true;
        let mut cancelled: Vec<_> = self.pending.drain().collect();
        cancelled.sort_by_key(|(id, _)| *id);
        cancelled.into_iter().map(|(_, pending)| pending).collect()
    }
}

/// A manager that owns a [`QueryDispatcher`] and runs its completions.
pub trait QueryHost: Sized {
    fn dispatcher(&mut self) -> &mut QueryDispatcher<Self>;

    fn access_observer(&self) -> &dyn DialogAccessObserver;

    /// Sends `query`. Returns `None` when it was rejected locally; its
    /// completion has then already run with the error.
    fn send_query(&mut self, query: Query<Self>) -> Option<QueryId> {
        match self.dispatcher().dispatch(query) {
            Dispatch::Sent(id) => Some(id),
            Dispatch::Rejected(pending, error) => {
                fail_pending(self, pending, error);
                None
            }
        }
    }

    fn on_query_result(&mut self, id: QueryId, result: Result<Value, ClientError>) -> QueryOutcome {
        let Some(pending) = self.dispatcher().take(id) else {
            warn!(%id, "ignoring reply for unknown or finished query");
            return QueryOutcome::Ignored;
        };
        match result {
            Ok(value) => {
                debug!(%id, method = pending.method, "query completed");
                (pending.completion)(self, Ok(value));
                QueryOutcome::Completed
            }
            Err(error) => {
                debug!(%id, method = pending.method, error = %error, "query failed");
                fail_pending(self, pending, error);
                QueryOutcome::Failed
            }
        }
    }

    /// Closes the dispatcher and completes every pending query with the
    /// shutdown error. Returns how many were cancelled.
    fn cancel_queries(&mut self) -> usize {
        let cancelled = self.dispatcher().close();
        let count = cancelled.len();
        if count > 0 {
            info!(count, "cancelling pending queries");
        }
        for pending in cancelled {
            (pending.completion)(self, Err(ClientError::Shutdown));
        }
        count
    }
}

fn fail_pending<M: QueryHost>(host: &mut M, pending: PendingQuery<M>, error: ClientError) {
    if let Some(dialog_id) = pending.dialog_id.filter(|dialog_id| dialog_id.is_valid()) {
        if !error.is_shutdown() {
            host.access_observer().on_get_dialog_error(dialog_id, &error, pending.source);
        }
    }
    (pending.completion)(host, Err(error));
}
