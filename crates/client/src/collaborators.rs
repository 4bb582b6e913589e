// Services the core depends on but does not implement: the file subsystem,
// chat access, content observers, transcription pushes and the temporary
// payment password.

use std::sync::Arc;

use msgsync_common::error::ClientError;
use msgsync_common::protocol::wire::{InputPeer, UpdateTranscribedAudio};
use msgsync_common::types::{DialogId, FileId, MessageFullId, ServerMessageId, TranscriptionId};
use serde::{Deserialize, Serialize};

// ── File subsystem ─────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteFileLocation {
    pub id: i64,
    pub access_hash: i64,
    pub file_reference: Vec<u8>,
    /// Web files have no server document to reference.
    pub is_web: bool,
}

/// Snapshot of what the file subsystem knows about a handle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileView {
    pub file_id: FileId,
    pub size: i64,
    pub local_path: Option<String>,
    pub remote: Option<RemoteFileLocation>,
    pub url: Option<String>,
    pub is_encrypted: bool,
}

/// The file subsystem owns every file handle; the core only asks it to
/// duplicate, merge and describe them.
pub trait FileManager: Send + Sync {
    /// Mints an independent handle denoting the same content as `file_id`.
    fn dup_file_id(&self, file_id: FileId, source: &'static str) -> FileId;

    /// Declares that `new` and `old` denote the same remote file.
    fn merge(&self, new: FileId, old: FileId) -> Result<(), ClientError>;

    fn get_file_view(&self, file_id: FileId) -> FileView;
}

// ── Owners and chats ───────────────────────────────────────────────

/// Receives content-change notifications for owning contexts.
pub trait ContentObserver<C>: Send + Sync {
    /// Content changed in a way the owner should re-render.
    fn content_changed(&self, context: &C);

    /// Content reached its final state and should be persisted.
    fn content_finalized(&self, context: &C);
}

/// Told about failed queries that were sent on behalf of a chat.
pub trait DialogAccessObserver: Send + Sync {
    fn on_get_dialog_error(&self, dialog_id: DialogId, error: &ClientError, source: &str);
}

pub trait DialogResolver: Send + Sync {
    /// `None` when the chat can't be accessed.
    fn input_peer(&self, dialog_id: DialogId) -> Option<InputPeer>;

    fn invoice_message_id(&self, full_id: MessageFullId) -> Result<ServerMessageId, ClientError>;

    fn payment_successful_message_id(
        &self,
        full_id: MessageFullId,
    ) -> Result<ServerMessageId, ClientError>;
}

// ── Pushes ─────────────────────────────────────────────────────────

/// Receives every push for one transcription until a terminal push, an
/// unsubscribe, or shutdown (delivered as `ClientError::Shutdown`).
pub type PushCallback = Arc<dyn Fn(Result<UpdateTranscribedAudio, ClientError>) + Send + Sync>;

pub trait TranscriptionPushChannel: Send + Sync {
    fn subscribe(&self, transcription_id: TranscriptionId, callback: PushCallback);

    fn unsubscribe(&self, transcription_id: TranscriptionId);

    /// Fails every subscription with the shutdown error.
    fn close(&self);
}

// ── Payments ───────────────────────────────────────────────────────

pub trait TempPasswordSource: Send + Sync {
    fn temp_password(&self) -> Option<Vec<u8>>;
}

// ── In-memory implementations ──────────────────────────────────────

pub mod memory {
    use std::collections::{HashMap, HashSet};
    use std::sync::atomic::{AtomicI32, Ordering};
    use std::sync::{Mutex, PoisonError};

    use super::*;

    /// A file subsystem that keeps views in a map and records every merge.
    #[derive(Debug)]
    pub struct MemoryFileManager {
        next_id: AtomicI32,
        views: Mutex<HashMap<FileId, FileView>>,
        merges: Mutex<Vec<(FileId, FileId)>>,
        failing_merges: Mutex<HashSet<FileId>>,
    }

    impl Default for MemoryFileManager {
        fn default() -> Self {
            Self::starting_at(1_000)
        }
    }

    impl MemoryFileManager {
        /// Freshly minted handles start at `first_id`.
        pub fn starting_at(first_id: i32) -> Self {
            Self {
                next_id: AtomicI32::new(first_id),
                views: Mutex::new(HashMap::new()),
                merges: Mutex::new(Vec::new()),
                failing_merges: Mutex::new(HashSet::new()),
            }
        }

        pub fn insert_view(&self, view: FileView) {
            self.views.lock().unwrap_or_else(PoisonError::into_inner).insert(view.file_id, view);
        }

        /// Merges naming `file_id` on either side fail from now on.
        pub fn fail_merges_of(&self, file_id: FileId) {
            self.failing_merges.lock().unwrap_or_else(PoisonError::into_inner).insert(file_id);
        }

        pub fn merges(&self) -> Vec<(FileId, FileId)> {
            self.merges.lock().unwrap_or_else(PoisonError::into_inner).clone()
        }

        pub fn was_merged(&self, file_id: FileId) -> bool {
            self.merges().iter().any(|&(new, old)| new == file_id || old == file_id)
        }
    }

    impl FileManager for MemoryFileManager {
        fn dup_file_id(&self, file_id: FileId, _source: &'static str) -> FileId {
            if !file_id.is_valid() {
                return file_id;
            }
            let new_id = FileId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
            let mut views = self.views.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(view) = views.get(&file_id).cloned() {
                views.insert(new_id, FileView { file_id: new_id, ..view });
            }
            new_id
        }

        fn merge(&self, new: FileId, old: FileId) -> Result<(), ClientError> {
            let failing = self.failing_merges.lock().unwrap_or_else(PoisonError::into_inner);
            if failing.contains(&new) || failing.contains(&old) {
                return Err(ClientError::validation("Can't merge files"));
            }
            drop(failing);
            self.merges.lock().unwrap_or_else(PoisonError::into_inner).push((new, old));
            Ok(())
        }

        fn get_file_view(&self, file_id: FileId) -> FileView {
            self.views
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .get(&file_id)
                .cloned()
                .unwrap_or(FileView { file_id, ..FileView::default() })
        }
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum ContentEvent<C> {
        Changed(C),
        Finalized(C),
    }

    #[derive(Debug)]
    pub struct RecordingObserver<C> {
        events: Mutex<Vec<ContentEvent<C>>>,
    }

    impl<C> Default for RecordingObserver<C> {
        fn default() -> Self {
            Self { events: Mutex::new(Vec::new()) }
        }
    }

    impl<C: Clone> RecordingObserver<C> {
        pub fn events(&self) -> Vec<ContentEvent<C>> {
            self.events.lock().unwrap_or_else(PoisonError::into_inner).clone()
        }

        pub fn take(&self) -> Vec<ContentEvent<C>> {
            std::mem::take(&mut *self.events.lock().unwrap_or_else(PoisonError::into_inner))
        }
    }

    impl<C: Clone + Send> ContentObserver<C> for RecordingObserver<C> {
        fn content_changed(&self, context: &C) {
            self.events
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(ContentEvent::Changed(context.clone()));
        }

        fn content_finalized(&self, context: &C) {
            self.events
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(ContentEvent::Finalized(context.clone()));
        }
    }

    /// Records chat errors reported by the dispatcher.
    #[derive(Debug, Default)]
    pub struct RecordingAccessObserver {
        errors: Mutex<Vec<(DialogId, ClientError, String)>>,
    }

    impl RecordingAccessObserver {
        pub fn errors(&self) -> Vec<(DialogId, ClientError, String)> {
            self.errors.lock().unwrap_or_else(PoisonError::into_inner).clone()
        }
    }

    impl DialogAccessObserver for RecordingAccessObserver {
        fn on_get_dialog_error(&self, dialog_id: DialogId, error: &ClientError, source: &str) {
            self.errors.lock().unwrap_or_else(PoisonError::into_inner).push((
                dialog_id,
                error.clone(),
                source.to_string(),
            ));
        }
    }

    /// Chats are accessible unless listed as hidden; every message id is
    /// an invoice and a successful payment.
    #[derive(Debug, Default)]
    pub struct MemoryDialogs {
        hidden: Mutex<HashSet<DialogId>>,
    }

    impl MemoryDialogs {
        pub fn hide(&self, dialog_id: DialogId) {
            self.hidden.lock().unwrap_or_else(PoisonError::into_inner).insert(dialog_id);
        }
    }

    impl DialogResolver for MemoryDialogs {
        fn input_peer(&self, dialog_id: DialogId) -> Option<InputPeer> {
            let hidden = self.hidden.lock().unwrap_or_else(PoisonError::into_inner);
            if !dialog_id.is_valid() || hidden.contains(&dialog_id) {
                return None;
            }
            Some(InputPeer { peer_id: dialog_id.get(), access_hash: dialog_id.get() ^ 0x5f5f })
        }

        fn invoice_message_id(&self, full_id: MessageFullId) -> Result<ServerMessageId, ClientError> {
            server_message_id(full_id)
        }

        fn payment_successful_message_id(
            &self,
            full_id: MessageFullId,
        ) -> Result<ServerMessageId, ClientError> {
            server_message_id(full_id)
        }
    }

    fn server_message_id(full_id: MessageFullId) -> Result<ServerMessageId, ClientError> {
        if full_id.message_id.is_server() {
            Ok(full_id.message_id.server_message_id())
        } else {
            Err(ClientError::validation("Wrong message identifier specified"))
        }
    }

    #[derive(Debug, Default)]
    pub struct StaticTempPassword(pub Option<Vec<u8>>);

    impl TempPasswordSource for StaticTempPassword {
        fn temp_password(&self) -> Option<Vec<u8>> {
            self.0.clone()
        }
    }
}
