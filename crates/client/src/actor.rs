// Runs a manager as a single task that owns all of its state.
//
// Callers, query replies and pushes all reach the manager as commands on
// one unbounded queue, so cache and registry mutation never needs a lock.

use std::fmt;
use std::sync::Arc;

use msgsync_common::error::ClientError;
use serde_json::Value;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::promise::{Promise, PromiseResult};
use crate::query::{QueryHost, QueryId};
use crate::transport::ReplyRouter;

/// A manager that can be driven by [`spawn_manager`].
pub trait Manager: QueryHost + Send + 'static {
    const NAME: &'static str;

    /// Cancels pending work and rejects every waiter with the shutdown
    /// error. Must be idempotent.
    fn close(&mut self);

    fn is_closed(&self) -> bool;
}

pub type Job<M> = Box<dyn FnOnce(Option<&mut M>) + Send>;

pub enum Command<M> {
    /// Runs against the manager, or with `None` once it has closed.
    Exec(Job<M>),
    QueryResult { id: QueryId, result: Result<Value, ClientError> },
    Shutdown,
}

impl<M: Manager> Command<M> {
    /// Applies the command in place; also used to drive a manager without a
    /// task.
    pub fn apply(self, manager: &mut M) {
        match self {
            Self::Exec(job) if manager.is_closed() => job(None),
            Self::Exec(job) => job(Some(manager)),
            Self::QueryResult { id, result } => {
                manager.on_query_result(id, result);
            }
            Self::Shutdown => manager.close(),
        }
    }
}

impl<M> fmt::Debug for Command<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exec(_) => f.write_str("Exec"),
            Self::QueryResult { id, .. } => write!(f, "QueryResult({id})"),
            Self::Shutdown => f.write_str("Shutdown"),
        }
    }
}

pub struct Mailbox<M> {
    tx: mpsc::UnboundedSender<Command<M>>,
}

impl<M> Clone for Mailbox<M> {
    fn clone(&self) -> Self {
        Self { tx: self.tx.clone() }
    }
}

impl<M> fmt::Debug for Mailbox<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mailbox").field("closed", &self.tx.is_closed()).finish()
    }
}

impl<M: Manager> Mailbox<M> {
    /// A mailbox and the queue it feeds.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Command<M>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Queues a command. Fails once the manager task has stopped.
    pub fn send(&self, command: Command<M>) -> Result<(), ClientError> {
        self.tx.send(command).map_err(|_| ClientError::Shutdown)
    }

    /// Queues `job` to run on the manager; nothing happens after shutdown.
    pub fn post(&self, job: impl FnOnce(&mut M) + Send + 'static) {
        let job: Job<M> = Box::new(move |manager| {
            if let Some(manager) = manager {
                job(manager);
            }
        });
        if self.send(Command::Exec(job)).is_err() {
            debug!(manager = M::NAME, "dropping job for stopped manager");
        }
    }

    /// Runs `call` on the manager and waits for it to resolve the promise.
    pub async fn call<T: Send + 'static>(
        &self,
        call: impl FnOnce(&mut M, Promise<T>) + Send + 'static,
    ) -> PromiseResult<T> {
        let (promise, receiver) = Promise::new();
        let job: Job<M> = Box::new(move |manager| match manager {
            Some(manager) => call(manager, promise),
            None => promise.set_error(ClientError::Shutdown),
        });
        self.send(Command::Exec(job))?;
        receiver.wait().await
    }

    /// Runs a synchronous read or write and returns its value.
    pub async fn with<T: Send + 'static>(
        &self,
        read: impl FnOnce(&mut M) -> T + Send + 'static,
    ) -> PromiseResult<T> {
        self.call(move |manager, promise| promise.set_value(read(manager))).await
    }

    /// Routes query replies back onto this queue.
    pub fn reply_router(&self) -> ReplyRouter {
        let tx = self.tx.clone();
        Arc::new(move |id, result| {
            if tx.send(Command::QueryResult { id, result }).is_err() {
                debug!(manager = M::NAME, %id, "dropping reply for stopped manager");
            }
        })
    }
}

pub struct ManagerHandle<M> {
    mailbox: Mailbox<M>,
    task: JoinHandle<()>,
}

impl<M: Manager> ManagerHandle<M> {
    pub fn mailbox(&self) -> &Mailbox<M> {
        &self.mailbox
    }

    /// Asks the manager to close and waits for its task to finish.
    pub async fn shutdown(self) {
        let _ = self.mailbox.send(Command::Shutdown);
        let _ = self.task.await;
    }

    /// Waits for the task to finish after an external shutdown signal.
    pub async fn join(self) {
        let _ = self.task.await;
    }
}

impl<M> fmt::Debug for ManagerHandle<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagerHandle").field("finished", &self.task.is_finished()).finish()
    }
}

/// Spawns the task that owns the manager built by `build`.
pub fn spawn_manager<M: Manager>(
    build: impl FnOnce(Mailbox<M>) -> M,
    shutdown: broadcast::Receiver<()>,
) -> ManagerHandle<M> {
    let (mailbox, rx) = Mailbox::channel();
    let manager = build(mailbox.clone());
    let task = tokio::spawn(run_manager(manager, rx, shutdown));
    ManagerHandle { mailbox, task }
}

async fn run_manager<M: Manager>(
    mut manager: M,
    mut rx: mpsc::UnboundedReceiver<Command<M>>,
    mut shutdown: broadcast::Receiver<()>,
) {
    info!(manager = M::NAME, "manager started");

    loop {
        tokio::select! {
            biased;

            _ = shutdown.recv() => {
                info!(manager = M::NAME, "shutdown signal received");
                break;
            }

            maybe_command = rx.recv() => {
                match maybe_command {
                    Some(command) => command.apply(&mut manager),
                    None => break,
                }
            }
        }

        if manager.is_closed() {
            break;
        }
    }

    manager.close();
    // Commands already queued still get their shutdown answer.
    rx.close();
    while let Some(command) = rx.recv().await {
        command.apply(&mut manager);
    }
    info!(manager = M::NAME, "manager stopped");
}
