// Round video messages: cache, owner tracking and speech recognition.

use std::fmt;
use std::sync::Arc;

use msgsync_common::error::ClientError;
use msgsync_common::protocol::rpc_methods::{MESSAGES_RATE_TRANSCRIBED_AUDIO, MESSAGES_TRANSCRIBE_AUDIO};
use msgsync_common::protocol::wire::{
    DocumentAttribute, InputFile, InputMedia, RateTranscribedAudio, TranscribeAudio,
    UpdateTranscribedAudio,
};
use msgsync_common::types::{Dimensions, FileId, MessageFullId, PhotoSize, TranscriptionId};
use serde::Serialize;
use tracing::{debug, error, info};

use crate::actor::{Mailbox, Manager};
use crate::cache::{CachedEntity, EntityCache, Upsert};
use crate::collaborators::{
    ContentObserver, DialogAccessObserver, DialogResolver, FileManager, FileView, PushCallback,
    TranscriptionPushChannel,
};
use crate::config::ClientConfig;
use crate::managers::Collaborators;
use crate::promise::Promise;
use crate::query::{encode_params, Query, QueryDispatcher, QueryHost};
use crate::registry::{BackReferences, NotificationKind};
use crate::store::{Parser, StorageError, StorageVersion, Storer};
use crate::transcription::{
    SpeechRecognitionResult, TranscriptionEvent, TranscriptionInfo, TranscriptionPhase,
};

const VIDEO_NOTE_MIME_TYPE: &str = "video/mp4";

#[derive(Debug)]
pub struct VideoNote {
    pub file_id: FileId,
    pub duration: i32,
    pub dimensions: Dimensions,
    pub waveform: Vec<u8>,
    pub minithumbnail: Vec<u8>,
    pub thumbnail: Option<PhotoSize>,
    transcription: TranscriptionInfo,
}

impl VideoNote {
    pub fn new(file_id: FileId) -> Self {
        Self {
            file_id,
            duration: 0,
            dimensions: Dimensions::default(),
            waveform: Vec::new(),
            minithumbnail: Vec::new(),
            thumbnail: None,
            transcription: TranscriptionInfo::default(),
        }
    }

    pub fn transcription(&self) -> &TranscriptionInfo {
        &self.transcription
    }

    fn thumbnail_file_id(&self) -> FileId {
        self.thumbnail.as_ref().map(|thumbnail| thumbnail.file_id).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VideoNoteChange {
    /// Media fields changed.
    pub content: bool,
    pub transcription: TranscriptionEvent,
}

impl CachedEntity for VideoNote {
    type Change = VideoNoteChange;

    fn file_id(&self) -> FileId {
        self.file_id
    }

    fn update_from(&mut self, newer: Self) -> VideoNoteChange {
        let mut change = VideoNoteChange::default();
        if (self.duration, self.dimensions, &self.waveform)
            != (newer.duration, newer.dimensions, &newer.waveform)
        {
            debug!(
                file_id = %self.file_id,
                duration = newer.duration,
                dimensions = %newer.dimensions,
                "video note media changed"
            );
            self.duration = newer.duration;
            self.dimensions = newer.dimensions;
            self.waveform = newer.waveform;
            change.content = true;
        }
        if self.minithumbnail != newer.minithumbnail {
            debug!(file_id = %self.file_id, "video note minithumbnail changed");
            self.minithumbnail = newer.minithumbnail;
            change.content = true;
        }
        if self.thumbnail != newer.thumbnail {
            debug!(file_id = %self.file_id, "video note thumbnail changed");
            self.thumbnail = newer.thumbnail;
            change.content = true;
        }
        change.transcription = self.transcription.update_from(newer.transcription);
        change
    }

    fn duplicate(&self, new_id: FileId, files: &dyn FileManager) -> Self {
        let thumbnail = self.thumbnail.as_ref().map(|thumbnail| PhotoSize {
            file_id: files.dup_file_id(thumbnail.file_id, "dup_video_note"),
            ..thumbnail.clone()
        });
        Self {
            file_id: new_id,
            duration: self.duration,
            dimensions: self.dimensions,
            waveform: self.waveform.clone(),
            minithumbnail: self.minithumbnail.clone(),
            thumbnail,
            transcription: self.transcription.copy_if_final(),
        }
    }

    fn absorb(&mut self, older: Self, files: &dyn FileManager) -> VideoNoteChange {
        let mut change = VideoNoteChange::default();
        let ours = self.thumbnail_file_id();
        let theirs = older.thumbnail_file_id();
        if ours.is_valid() && theirs.is_valid() && ours != theirs {
            if let Err(merge_error) = files.merge(ours, theirs) {
                error!(file_id = %self.file_id, error = %merge_error, "failed to merge video note thumbnails");
            }
        } else if !ours.is_valid() && theirs.is_valid() {
            self.thumbnail = older.thumbnail;
            change.content = true;
        }
        change.transcription = self.transcription.absorb(older.transcription);
        change
    }

    fn take_in_flight(&mut self, older: Self) {
        let event = self.transcription.absorb(older.transcription);
        debug!(file_id = %self.file_id, ?event, "took over transcription of merged video note");
    }
}

/// Caller-facing snapshot of a video note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VideoNoteView {
    pub duration: i32,
    pub waveform: Vec<u8>,
    /// Side length of the square video; 0 when unknown.
    pub length: u16,
    pub minithumbnail: Option<Vec<u8>>,
    pub thumbnail: Option<PhotoSize>,
    pub speech_recognition_result: Option<SpeechRecognitionResult>,
    pub video: FileView,
}

pub struct VideoNotesManager {
    is_bot: bool,
    max_length: i32,
    suggested_length: i32,
    files: Arc<dyn FileManager>,
    dialogs: Arc<dyn DialogResolver>,
    push_channel: Arc<dyn TranscriptionPushChannel>,
    content_observer: Arc<dyn ContentObserver<MessageFullId>>,
    access_observer: Arc<dyn DialogAccessObserver>,
    mailbox: Mailbox<Self>,
    dispatcher: QueryDispatcher<Self>,
    video_notes: EntityCache<VideoNote>,
    messages: BackReferences<MessageFullId>,
    closed: bool,
}

impl VideoNotesManager {
    pub fn new(config: &ClientConfig, collaborators: &Collaborators, mailbox: Mailbox<Self>) -> Self {
        Self {
            is_bot: config.is_bot,
            max_length: config.max_video_note_length,
            suggested_length: config.suggested_video_note_length,
            files: Arc::clone(&collaborators.files),
            dialogs: Arc::clone(&collaborators.dialogs),
            push_channel: Arc::clone(&collaborators.push_channel),
            content_observer: Arc::clone(&collaborators.content_observer),
            access_observer: Arc::clone(&collaborators.access_observer),
            dispatcher: QueryDispatcher::new(Arc::clone(&collaborators.transport), mailbox.reply_router()),
            mailbox,
            video_notes: EntityCache::new("video note"),
            messages: BackReferences::new(),
            closed: false,
        }
    }

    // ── Cache ──────────────────────────────────────────────────────

    /// Builds a video note from remote data and stores it.
    #[allow(clippy::too_many_arguments)]
    pub fn create_video_note(
        &mut self,
        file_id: FileId,
        minithumbnail: Vec<u8>,
        thumbnail: Option<PhotoSize>,
        duration: i32,
        dimensions: Dimensions,
        waveform: Vec<u8>,
        replace: bool,
    ) -> FileId {
        let mut note = VideoNote::new(file_id);
        note.duration = duration.max(0);
        if dimensions.width == dimensions.height && i32::from(dimensions.width) <= self.max_length {
            note.dimensions = dimensions;
        } else {
            info!(%file_id, %dimensions, "receive wrong video note dimensions");
        }
        note.waveform = waveform;
        if !self.is_bot {
            note.minithumbnail = minithumbnail;
        }
        note.thumbnail = thumbnail.filter(|thumbnail| thumbnail.file_id.is_valid());
        self.on_get_video_note(note, replace)
    }

    pub fn on_get_video_note(&mut self, note: VideoNote, replace: bool) -> FileId {
        let (file_id, upsert) = self.video_notes.create_or_update(note, replace);
        match upsert {
            Upsert::Created => debug!(%file_id, "new video note"),
            Upsert::Kept => {}
            Upsert::Updated(change) => self.on_transcription_event(file_id, change.transcription),
        }
        file_id
    }

    pub fn get_video_note(&self, file_id: FileId) -> Option<&VideoNote> {
        self.video_notes.get(file_id)
    }

    pub fn get_video_note_object(&self, file_id: FileId) -> Option<VideoNoteView> {
        if !file_id.is_valid() {
            return None;
        }
        let note = self.video_notes.expect(file_id, "get_video_note_object");
        Some(VideoNoteView {
            duration: note.duration,
            waveform: note.waveform.clone(),
            length: note.dimensions.width,
            minithumbnail: (!note.minithumbnail.is_empty()).then(|| note.minithumbnail.clone()),
            thumbnail: note.thumbnail.clone(),
            speech_recognition_result: note.transcription.speech_recognition_result(),
            video: self.files.get_file_view(note.file_id),
        })
    }

    pub fn get_video_note_duration(&self, file_id: FileId) -> i32 {
        self.video_notes.expect(file_id, "get_video_note_duration").duration
    }

    pub fn get_thumbnail_file_id(&self, file_id: FileId) -> FileId {
        self.video_notes.expect(file_id, "get_thumbnail_file_id").thumbnail_file_id()
    }

    pub fn delete_video_note_thumbnail(&mut self, file_id: FileId) {
        if let Some(note) = self.video_notes.get_mut(file_id) {
            note.thumbnail = None;
        }
    }

    pub fn dup_video_note(&mut self, new_id: FileId, old_id: FileId) -> FileId {
        self.video_notes.duplicate(new_id, old_id, self.files.as_ref())
    }

    pub fn merge_video_notes(&mut self, new_id: FileId, old_id: FileId) {
        let messages = &mut self.messages;
        let change = self.video_notes.merge(new_id, old_id, self.files.as_ref(), |old, new| {
            messages.repoint(old, new);
        });
        if let Some(change) = change {
            let survivor = self.video_notes.resolve(new_id);
            self.on_transcription_event(survivor, change.transcription);
        }
    }

    // ── Owners ─────────────────────────────────────────────────────

    pub fn register_video_note(&mut self, file_id: FileId, full_id: MessageFullId, source: &str) {
        if self.is_bot {
            return;
        }
        self.messages.register(self.video_notes.resolve(file_id), full_id, source);
    }

    pub fn unregister_video_note(&mut self, file_id: FileId, full_id: MessageFullId, source: &str) {
        if self.is_bot {
            return;
        }
        self.messages.unregister(self.video_notes.resolve(file_id), full_id, source);
    }

    fn on_transcription_event(&self, file_id: FileId, event: TranscriptionEvent) {
        let kind = match event {
            TranscriptionEvent::Unchanged => return,
            TranscriptionEvent::Changed => NotificationKind::Changed,
            TranscriptionEvent::Finalized => NotificationKind::Finalized,
        };
        let notified = self.messages.notify(file_id, kind, self.content_observer.as_ref());
        debug!(%file_id, ?kind, notified, "video note transcription updated");
    }

    // ── Speech recognition ─────────────────────────────────────────

    /// Resolves `promise` with the final transcription of the video note
    /// attached to `full_id`.
    pub fn recognize_speech(&mut self, full_id: MessageFullId, promise: Promise<String>) {
        let Some(file_id) = self.messages.handle_of(&full_id) else {
            return promise.set_error(ClientError::validation("Message not found"));
        };
        let note = self.video_notes.expect_mut(file_id, "recognize_speech");
        if note.transcription.recognize_speech(promise) {
            self.on_transcription_event(file_id, TranscriptionEvent::Changed);
            self.send_transcribe_audio(file_id, full_id);
        }
    }

    fn send_transcribe_audio(&mut self, file_id: FileId, full_id: MessageFullId) {
        let Some(peer) = self.dialogs.input_peer(full_id.dialog_id) else {
            let error = ClientError::validation("Can't access the chat");
            return self.on_transcribed_audio_update(file_id, true, Err(error));
        };
        let params = TranscribeAudio { peer, msg_id: full_id.message_id.server_message_id().get() };
        let params = match encode_params(&params) {
            Ok(params) => params,
            Err(error) => return self.on_transcribed_audio_update(file_id, true, Err(error)),
        };
        let query = Query::expecting::<UpdateTranscribedAudio>(
            MESSAGES_TRANSCRIBE_AUDIO,
            params,
            "recognize_speech",
            move |manager: &mut Self, result| manager.on_transcribed_audio_update(file_id, true, result),
        );
        self.send_query(query.with_dialog(full_id.dialog_id));
    }

    /// Folds a transcription reply (`is_initial`) or push into the video note.
    pub fn on_transcribed_audio_update(
        &mut self,
        file_id: FileId,
        is_initial: bool,
        result: Result<UpdateTranscribedAudio, ClientError>,
    ) {
        if self.closed {
            return;
        }
        let file_id = self.video_notes.resolve(file_id);
        let pending_id = match &result {
            Ok(update) if update.pending => Some(TranscriptionId::new(update.transcription_id)),
            _ => None,
        };

        let note = self.video_notes.expect_mut(file_id, "on_transcribed_audio_update");
        let event = note.transcription.on_update(result);
        let still_partial = note.transcription.phase() == TranscriptionPhase::Partial;
        self.on_transcription_event(file_id, event);

        if let Some(transcription_id) = pending_id.filter(|_| is_initial && still_partial) {
            self.subscribe_to_pushes(file_id, transcription_id);
        }
    }

    fn subscribe_to_pushes(&self, file_id: FileId, transcription_id: TranscriptionId) {
        debug!(%file_id, %transcription_id, "subscribing to transcription pushes");
        let mailbox = self.mailbox.clone();
        let callback: PushCallback = Arc::new(move |update| {
            mailbox.post(move |manager: &mut Self| {
                manager.on_transcribed_audio_update(file_id, false, update);
            });
        });
        self.push_channel.subscribe(transcription_id, callback);
    }

    /// Sends feedback on a final transcription; anything else resolves
    /// immediately.
    pub fn rate_speech_recognition(&mut self, full_id: MessageFullId, is_good: bool, promise: Promise<()>) {
        let Some(file_id) = self.messages.handle_of(&full_id) else {
            return promise.set_error(ClientError::validation("Message not found"));
        };
        let transcription = &self.video_notes.expect(file_id, "rate_speech_recognition").transcription;
        if !transcription.is_final() {
            return promise.set_value(());
        }
        let transcription_id = transcription.transcription_id();

        let Some(peer) = self.dialogs.input_peer(full_id.dialog_id) else {
            return promise.set_error(ClientError::validation("Can't access the chat"));
        };
        let params = RateTranscribedAudio {
            peer,
            msg_id: full_id.message_id.server_message_id().get(),
            transcription_id: transcription_id.get(),
            good: is_good,
        };
        let params = match encode_params(&params) {
            Ok(params) => params,
            Err(error) => return promise.set_error(error),
        };
        let query = Query::new(
            MESSAGES_RATE_TRANSCRIBED_AUDIO,
            params,
            "rate_speech_recognition",
            move |_: &mut Self, result| promise.set_result(result.map(|_| ())),
        );
        self.send_query(query.with_dialog(full_id.dialog_id));
    }

    // ── Sending ────────────────────────────────────────────────────

    /// Media to attach when sending the video note. `None` when nothing can
    /// be sent yet, e.g. for end-to-end encrypted files.
    pub fn get_input_media(
        &self,
        file_id: FileId,
        input_file: Option<InputFile>,
        input_thumbnail: Option<InputFile>,
    ) -> Option<InputMedia> {
        let view = self.files.get_file_view(file_id);
        if view.is_encrypted {
            return None;
        }
        if let Some(remote) = view.remote.as_ref().filter(|remote| !remote.is_web) {
            if input_file.is_none() {
                return Some(InputMedia::Document {
                    id: remote.id,
                    access_hash: remote.access_hash,
                    file_reference: remote.file_reference.clone(),
                });
            }
        }
        if let Some(url) = view.url {
            return Some(InputMedia::DocumentExternal { url });
        }

        let file = input_file?;
        let note = self.video_notes.expect(file_id, "get_input_media");
        let side = |value: u16| if value == 0 { self.suggested_length } else { i32::from(value) };
        Some(InputMedia::UploadedDocument {
            nosound_video: true,
            file,
            thumb: input_thumbnail,
            mime_type: VIDEO_NOTE_MIME_TYPE.to_string(),
            attributes: vec![DocumentAttribute::Video {
                round_message: true,
                duration: note.duration,
                w: side(note.dimensions.width),
                h: side(note.dimensions.height),
            }],
        })
    }

    // ── Storage ────────────────────────────────────────────────────

    pub fn store_video_note(&self, file_id: FileId, storer: &mut Storer) {
        let note = self.video_notes.expect(file_id, "store_video_note");
        let version = storer.version();
        let has_minithumbnail =
            version >= StorageVersion::SupportMinithumbnails && !note.minithumbnail.is_empty();
        let has_transcription =
            version >= StorageVersion::SupportTranscription && note.transcription.is_storable();

        if version >= StorageVersion::SupportMinithumbnails {
            storer.store_bool(has_minithumbnail);
        }
        if version >= StorageVersion::SupportTranscription {
            storer.store_bool(has_transcription);
        }
        storer.store_i32(note.duration);
        storer.store_i32(i32::from(note.dimensions.width));
        storer.store_i32(i32::from(note.dimensions.height));
        storer.store_bytes(&note.waveform);
        if has_minithumbnail {
            storer.store_bytes(&note.minithumbnail);
        }
        storer.store_bool(note.thumbnail.is_some());
        if let Some(thumbnail) = &note.thumbnail {
            storer.store_photo_size(thumbnail);
        }
        storer.store_file_id(note.file_id);
        if has_transcription {
            note.transcription.store(storer);
        }
    }

    /// Reads a stored video note into the cache. A snapshot whose handle
    /// is no longer valid yields the empty handle.
    pub fn parse_video_note(&mut self, parser: &mut Parser<'_>) -> Result<FileId, StorageError> {
        let version = parser.version();
        let has_minithumbnail =
            version >= StorageVersion::SupportMinithumbnails && parser.parse_bool()?;
        let has_transcription = version >= StorageVersion::SupportTranscription && parser.parse_bool()?;

        let duration = parser.parse_i32()?;
        let width = parser.parse_i32()?;
        let height = parser.parse_i32()?;
        let waveform = parser.parse_bytes()?;
        let minithumbnail = if has_minithumbnail { parser.parse_bytes()? } else { Vec::new() };
        let thumbnail = if parser.parse_bool()? { Some(parser.parse_photo_size()?) } else { None };
        let file_id = parser.parse_file_id()?;
        let transcription =
            if has_transcription { TranscriptionInfo::parse(parser)? } else { TranscriptionInfo::default() };

        if !file_id.is_valid() {
            return Ok(FileId::default());
        }
        let note = VideoNote {
            file_id,
            duration,
            dimensions: Dimensions::new(width, height),
            waveform,
            minithumbnail,
            thumbnail,
            transcription,
        };
        Ok(self.on_get_video_note(note, false))
    }
}

impl QueryHost for VideoNotesManager {
    fn dispatcher(&mut self) -> &mut QueryDispatcher<Self> {
        &mut self.dispatcher
    }

    fn access_observer(&self) -> &dyn DialogAccessObserver {
        self.access_observer.as_ref()
    }
}

impl Manager for VideoNotesManager {
    const NAME: &'static str = "video_notes";

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.cancel_queries();
        let rejected: usize = self
            .video_notes
            .values_mut()
            .map(|note| note.transcription.fail_waiters(&ClientError::Shutdown))
            .sum();
        info!(rejected, "video notes manager closed");
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

impl fmt::Debug for VideoNotesManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VideoNotesManager")
            .field("video_notes", &self.video_notes)
            .field("messages", &self.messages)
            .field("pending_queries", &self.dispatcher.pending_count())
            .field("closed", &self.closed)
            .finish()
    }
}
