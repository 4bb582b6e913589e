// Push hub: routes server-initiated transcription pushes to the manager
// that subscribed for them.
//
// A push can overtake the reply that carries its transcription id, so pushes
// for ids nobody listens to yet are kept and replayed on subscription.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::Context;
use msgsync_common::error::ClientError;
use msgsync_common::protocol::jsonrpc::Push;
use msgsync_common::protocol::rpc_methods::UPDATE_TRANSCRIBED_AUDIO;
use msgsync_common::protocol::wire::UpdateTranscribedAudio;
use msgsync_common::types::TranscriptionId;
use tracing::{debug, info, warn};

use crate::collaborators::{PushCallback, TranscriptionPushChannel};

/// Pushes kept for transcriptions without a subscriber; the oldest is
/// dropped first.
const MAX_EARLY_PUSHES: usize = 256;

#[derive(Default)]
struct HubState {
    subscribers: HashMap<TranscriptionId, PushCallback>,
    early: VecDeque<UpdateTranscribedAudio>,
    closed: bool,
}

#[derive(Clone, Default)]
pub struct UpdatesHub {
    inner: Arc<Mutex<HubState>>,
}

impl UpdatesHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).subscribers.len()
    }

    pub fn early_push_count(&self) -> usize {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).early.len()
    }

    /// Delivers `update` to its subscriber. Returns `false` when nobody
    /// listens for that transcription yet; the push is then kept for a
    /// later subscription.
    pub fn on_update(&self, update: UpdateTranscribedAudio) -> bool {
        let transcription_id = TranscriptionId::new(update.transcription_id);
        let callback = {
            let mut state = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            if state.closed {
                debug!(%transcription_id, "dropping transcription push after close");
                return false;
            }
            let callback = if update.pending {
                state.subscribers.get(&transcription_id).cloned()
            } else {
                state.subscribers.remove(&transcription_id)
            };
            match callback {
                Some(callback) => callback,
                None => {
                    if state.early.len() >= MAX_EARLY_PUSHES {
                        if let Some(dropped) = state.early.pop_front() {
                            warn!(transcription_id = dropped.transcription_id, "dropping oldest unclaimed push");
                        }
                    }
                    debug!(%transcription_id, "keeping push until its transcription is subscribed");
                    state.early.push_back(update);
                    return false;
                }
            }
        };
        callback(Ok(update));
        true
    }

    /// Routes a JSON-RPC notification. Returns whether it was delivered.
    pub fn on_push(&self, push: Push) -> anyhow::Result<bool> {
        match push.method.as_str() {
            UPDATE_TRANSCRIBED_AUDIO => {
                let update: UpdateTranscribedAudio = serde_json::from_value(push.params)
                    .with_context(|| format!("invalid `{UPDATE_TRANSCRIBED_AUDIO}` params"))?;
                Ok(self.on_update(update))
            }
            other => {
                warn!(method = other, "ignoring unknown push");
                Ok(false)
            }
        }
    }

    /// Fails every subscriber with the shutdown error; later subscriptions
    /// fail immediately.
    pub fn close(&self) {
        let subscribers = {
            let mut state = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            state.closed = true;
            state.early.clear();
            std::mem::take(&mut state.subscribers)
        };
        if !subscribers.is_empty() {
            info!(count = subscribers.len(), "closing transcription subscriptions");
        }
        for callback in subscribers.into_values() {
            callback(Err(ClientError::Shutdown));
        }
    }
}

impl TranscriptionPushChannel for UpdatesHub {
    fn subscribe(&self, transcription_id: TranscriptionId, callback: PushCallback) {
        let mut state = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if state.closed {
            drop(state);
            callback(Err(ClientError::Shutdown));
            return;
        }
        let mut early = Vec::new();
        let mut finished = false;
        state.early.retain(|update| {
            if update.transcription_id != transcription_id.get() {
                return true;
            }
            if !finished {
                finished = !update.pending;
                early.push(update.clone());
            }
            false
        });
        if !finished && state.subscribers.insert(transcription_id, Arc::clone(&callback)).is_some() {
            warn!(%transcription_id, "replaced transcription subscriber");
        }
        drop(state);

        if !early.is_empty() {
            debug!(%transcription_id, count = early.len(), "replaying early transcription pushes");
        }
        for update in early {
            callback(Ok(update));
        }
    }

    fn unsubscribe(&self, transcription_id: TranscriptionId) {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).subscribers.remove(&transcription_id);
    }

    fn close(&self) {
        UpdatesHub::close(self);
    }
}

impl std::fmt::Debug for UpdatesHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("UpdatesHub")
            .field("subscribers", &state.subscribers.len())
            .field("early", &state.early.len())
            .field("closed", &state.closed)
            .finish()
    }
}
