// Single-use completion tokens.
//
// A `Promise` is consumed by resolving it, so it can be resolved at most
// once. Dropping an unresolved promise rejects it instead of leaving the
// caller waiting forever.

use std::fmt;

use msgsync_common::error::ClientError;
use tokio::sync::oneshot;

pub type PromiseResult<T> = Result<T, ClientError>;

enum Sink<T> {
    Channel(oneshot::Sender<PromiseResult<T>>),
    Callback(Box<dyn FnOnce(PromiseResult<T>) + Send>),
}

pub struct Promise<T> {
    sink: Option<Sink<T>>,
}

/// Receiving half of a channel-backed promise.
pub struct PromiseReceiver<T> {
    rx: oneshot::Receiver<PromiseResult<T>>,
}

pub fn lost_promise_error() -> ClientError {
    ClientError::internal("Lost promise")
}

impl<T> Promise<T> {
    pub fn new() -> (Self, PromiseReceiver<T>) {
        let (tx, rx) = oneshot::channel();
        (Self { sink: Some(Sink::Channel(tx)) }, PromiseReceiver { rx })
    }

    pub fn from_fn(callback: impl FnOnce(PromiseResult<T>) + Send + 'static) -> Self {
        Self { sink: Some(Sink::Callback(Box::new(callback))) }
    }

    pub fn set_value(mut self, value: T) {
        self.resolve(Ok(value));
    }

    pub fn set_error(mut self, error: ClientError) {
        self.resolve(Err(error));
    }

    pub fn set_result(mut self, result: PromiseResult<T>) {
        self.resolve(result);
    }

    fn resolve(&mut self, result: PromiseResult<T>) {
        match self.sink.take() {
            // The caller may have stopped waiting; that is not an error here.
            Some(Sink::Channel(tx)) => {
                let _ = tx.send(result);
            }
            Some(Sink::Callback(callback)) => callback(result),
            None => {}
        }
    }
}

impl<T> Drop for Promise<T> {
    fn drop(&mut self) {
        if self.sink.is_some() {
            self.resolve(Err(lost_promise_error()));
        }
    }
}

impl<T> fmt::Debug for Promise<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Promise").field("pending", &self.sink.is_some()).finish()
    }
}

impl<T> PromiseReceiver<T> {
    pub async fn wait(self) -> PromiseResult<T> {
        self.rx.await.unwrap_or_else(|_| Err(lost_promise_error()))
    }

    /// Non-blocking poll; `None` while the promise is still unresolved.
    pub fn try_take(&mut self) -> Option<PromiseResult<T>> {
        match self.rx.try_recv() {
            Ok(result) => Some(result),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(Err(lost_promise_error())),
        }
    }
}

impl<T> fmt::Debug for PromiseReceiver<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PromiseReceiver").finish_non_exhaustive()
    }
}

pub fn set_promises<T: Clone>(promises: Vec<Promise<T>>, value: &T) {
    for promise in promises {
        promise.set_value(value.clone());
    }
}

pub fn fail_promises<T>(promises: Vec<Promise<T>>, error: &ClientError) {
    for promise in promises {
        promise.set_error(error.clone());
    }
}
