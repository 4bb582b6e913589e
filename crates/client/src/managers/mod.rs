// Managers: one per entity category, each the single owner of its cache,
// registry and dispatcher.

pub mod documents;
pub mod paid_media;
pub mod payments;
pub mod video_notes;

use std::fmt;
use std::sync::Arc;

use msgsync_common::types::MessageFullId;

use crate::collaborators::{
    ContentObserver, DialogAccessObserver, DialogResolver, FileManager, TempPasswordSource,
    TranscriptionPushChannel,
};
use crate::transport::Transport;

/// The external services a manager is built with.
#[derive(Clone)]
pub struct Collaborators {
    pub files: Arc<dyn FileManager>,
    pub transport: Arc<dyn Transport>,
    pub push_channel: Arc<dyn TranscriptionPushChannel>,
    pub content_observer: Arc<dyn ContentObserver<MessageFullId>>,
    pub access_observer: Arc<dyn DialogAccessObserver>,
    pub dialogs: Arc<dyn DialogResolver>,
    pub passwords: Arc<dyn TempPasswordSource>,
}

impl fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}
