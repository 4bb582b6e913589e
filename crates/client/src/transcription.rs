// Incremental Update Controller for speech transcription.
//
// A transcription is requested once, may report partial text any number of
// times, and ends in a final text or a failure. Every caller that asked in
// the meantime is answered when it ends.

use msgsync_common::error::ClientError;
use msgsync_common::protocol::wire::UpdateTranscribedAudio;
use msgsync_common::types::TranscriptionId;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::promise::{fail_promises, set_promises, Promise};
use crate::store::{Parser, Storer, StorageError};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TranscriptionPhase {
    #[default]
    None,
    Requested,
    Partial,
    Final,
    /// The last attempt failed; a new request starts over.
    Failed,
}

/// What owners of the transcribed content need to hear about.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TranscriptionEvent {
    #[default]
    Unchanged,
    Changed,
    Finalized,
}

/// Caller-facing state of a speech recognition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SpeechRecognitionResult {
    Pending { partial_text: String },
    Text { text: String },
    Error { error: ClientError },
}

#[derive(Debug, Default)]
pub struct TranscriptionInfo {
    phase: TranscriptionPhase,
    transcription_id: TranscriptionId,
    text: String,
    last_error: Option<ClientError>,
    waiters: Vec<Promise<String>>,
}

impl TranscriptionInfo {
    pub fn phase(&self) -> TranscriptionPhase {
        self.phase
    }

    pub fn is_final(&self) -> bool {
        self.phase == TranscriptionPhase::Final
    }

    pub fn transcription_id(&self) -> TranscriptionId {
        self.transcription_id
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn waiter_count(&self) -> usize {
        self.waiters.len()
    }

    /// Registers interest in the final text. Returns `true` when the caller
    /// must send a new transcription request.
    pub fn recognize_speech(&mut self, promise: Promise<String>) -> bool {
        match self.phase {
            TranscriptionPhase::Final => {
                promise.set_value(self.text.clone());
                false
            }
            TranscriptionPhase::Requested | TranscriptionPhase::Partial => {
                self.waiters.push(promise);
                false
            }
            TranscriptionPhase::None | TranscriptionPhase::Failed => {
                self.phase = TranscriptionPhase::Requested;
                self.last_error = None;
                self.waiters.push(promise);
                true
            }
        }
    }

    /// Applies a reply or a push for the running transcription.
    pub fn on_update(
        &mut self,
        update: Result<UpdateTranscribedAudio, ClientError>,
    ) -> TranscriptionEvent {
        if !matches!(self.phase, TranscriptionPhase::Requested | TranscriptionPhase::Partial) {
            debug!(phase = ?self.phase, "ignoring transcription update with nothing in flight");
            return TranscriptionEvent::Unchanged;
        }

        let update = match update {
            Ok(update) => update,
            Err(error) => {
                self.phase = TranscriptionPhase::Failed;
                self.last_error = Some(error.clone());
                fail_promises(std::mem::take(&mut self.waiters), &error);
                return TranscriptionEvent::Changed;
            }
        };

        let transcription_id = TranscriptionId::new(update.transcription_id);
        if self.transcription_id.is_valid() && self.transcription_id != transcription_id {
            warn!(
                expected = %self.transcription_id,
                received = %transcription_id,
                "ignoring update of another transcription"
            );
            return TranscriptionEvent::Unchanged;
        }
        self.transcription_id = transcription_id;

        if !update.pending {
            self.phase = TranscriptionPhase::Final;
            self.text = update.text;
            set_promises(std::mem::take(&mut self.waiters), &self.text);
            return TranscriptionEvent::Finalized;
        }

        let is_duplicate = self.phase == TranscriptionPhase::Partial && self.text == update.text;
        self.phase = TranscriptionPhase::Partial;
        self.text = update.text;
        if is_duplicate { TranscriptionEvent::Unchanged } else { TranscriptionEvent::Changed }
    }

    /// Copy for a duplicated entity; only finished transcriptions carry over.
    pub fn copy_if_final(&self) -> Self {
        if !self.is_final() {
            return Self::default();
        }
        Self {
            phase: TranscriptionPhase::Final,
            transcription_id: self.transcription_id,
            text: self.text.clone(),
            last_error: None,
            waiters: Vec::new(),
        }
    }

    /// Takes a newer observation into account. A final transcription is
    /// never replaced by a less complete one.
    pub fn update_from(&mut self, newer: Self) -> TranscriptionEvent {
        if self.is_final() || !newer.is_final() {
            // Waiters registered on a bare observation still need answers.
            self.adopt_waiters(newer);
            return TranscriptionEvent::Unchanged;
        }
        let waiters = std::mem::take(&mut self.waiters);
        *self = Self { waiters: Vec::new(), ..newer };
        set_promises(waiters, &self.text);
        TranscriptionEvent::Finalized
    }

    /// Folds the state of an entity that is being merged into this one.
    pub fn absorb(&mut self, mut older: Self) -> TranscriptionEvent {
        if self.is_final() {
            set_promises(std::mem::take(&mut older.waiters), &self.text);
            return TranscriptionEvent::Unchanged;
        }
        if older.is_final() {
            return self.update_from(older);
        }

        let adopt = matches!(self.phase, TranscriptionPhase::None | TranscriptionPhase::Failed)
            && matches!(older.phase, TranscriptionPhase::Requested | TranscriptionPhase::Partial);
        if !adopt {
            self.waiters.append(&mut older.waiters);
            return TranscriptionEvent::Unchanged;
        }
        self.waiters.append(&mut older.waiters);
        self.phase = older.phase;
        self.transcription_id = older.transcription_id;
        self.text = std::mem::take(&mut older.text);
        self.last_error = None;
        TranscriptionEvent::Changed
    }

    fn adopt_waiters(&mut self, mut other: Self) {
        if other.waiters.is_empty() {
            return;
        }
        if self.is_final() {
            set_promises(std::mem::take(&mut other.waiters), &self.text);
        } else {
            self.waiters.append(&mut other.waiters);
        }
    }

    /// Rejects every waiter; used when the client shuts down.
    pub fn fail_waiters(&mut self, error: &ClientError) -> usize {
        let waiters = std::mem::take(&mut self.waiters);
        let count = waiters.len();
        fail_promises(waiters, error);
        count
    }

    pub fn speech_recognition_result(&self) -> Option<SpeechRecognitionResult> {
        match self.phase {
            TranscriptionPhase::None => None,
            TranscriptionPhase::Requested | TranscriptionPhase::Partial => {
                Some(SpeechRecognitionResult::Pending { partial_text: self.text.clone() })
            }
            TranscriptionPhase::Final => Some(SpeechRecognitionResult::Text { text: self.text.clone() }),
            TranscriptionPhase::Failed => Some(SpeechRecognitionResult::Error {
                error: self
                    .last_error
                    .clone()
                    .unwrap_or_else(|| ClientError::internal("Transcription failed")),
            }),
        }
    }

    /// Only final transcriptions are persisted.
    pub fn is_storable(&self) -> bool {
        self.is_final()
    }

    pub fn store(&self, storer: &mut Storer) {
        storer.store_i64(self.transcription_id.get());
        storer.store_string(&self.text);
    }

    pub fn parse(parser: &mut Parser<'_>) -> Result<Self, StorageError> {
        let transcription_id = TranscriptionId::new(parser.parse_i64()?);
        let text = parser.parse_string()?;
        Ok(Self {
            phase: TranscriptionPhase::Final,
            transcription_id,
            text,
            last_error: None,
            waiters: Vec::new(),
        })
    }
}
