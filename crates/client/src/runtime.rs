// Starts the managers of one client and stops them together.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::info;

use crate::actor::{spawn_manager, Mailbox, ManagerHandle};
use crate::collaborators::TranscriptionPushChannel;
use crate::config::ClientConfig;
use crate::managers::payments::PaymentsManager;
use crate::managers::video_notes::VideoNotesManager;
use crate::managers::Collaborators;

pub struct ClientRuntime {
    shutdown_tx: broadcast::Sender<()>,
    push_channel: Arc<dyn TranscriptionPushChannel>,
    video_notes: Option<ManagerHandle<VideoNotesManager>>,
    payments: Option<ManagerHandle<PaymentsManager>>,
    video_notes_mailbox: Mailbox<VideoNotesManager>,
    payments_mailbox: Mailbox<PaymentsManager>,
}

impl ClientRuntime {
    /// Spawns every manager on the current tokio runtime.
    pub fn start(config: &ClientConfig, collaborators: &Collaborators) -> Self {
        let (shutdown_tx, _) = broadcast::channel(4);
        let video_notes = spawn_manager(
            |mailbox| VideoNotesManager::new(config, collaborators, mailbox),
            shutdown_tx.subscribe(),
        );
        let payments =
            spawn_manager(|mailbox| PaymentsManager::new(collaborators, mailbox), shutdown_tx.subscribe());
        info!(is_bot = config.is_bot, "client runtime started");

        Self {
            shutdown_tx,
            push_channel: Arc::clone(&collaborators.push_channel),
            video_notes_mailbox: video_notes.mailbox().clone(),
            payments_mailbox: payments.mailbox().clone(),
            video_notes: Some(video_notes),
            payments: Some(payments),
        }
    }

    pub fn video_notes(&self) -> &Mailbox<VideoNotesManager> {
        &self.video_notes_mailbox
    }

    pub fn payments(&self) -> &Mailbox<PaymentsManager> {
        &self.payments_mailbox
    }

    /// Signals every manager to close and ends push subscriptions; does
    /// not wait.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
        self.push_channel.close();
    }

    /// Signals shutdown and waits until every manager has answered its
    /// queued commands.
    pub async fn wait(mut self) {
        self.shutdown();
        if let Some(video_notes) = self.video_notes.take() {
            video_notes.join().await;
        }
        if let Some(payments) = self.payments.take() {
            payments.join().await;
        }
        info!("client runtime stopped");
    }
}

impl Drop for ClientRuntime {
    fn drop(&mut self) {
        self.shutdown();
    }
}
