// Paid media attached to invoice messages: a blurred preview until the
// purchase, then the photo or video itself.
//
// A preview is refreshed by polling until the media arrives. Once a message
// holds real media, no later preview or empty observation may replace it.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use msgsync_common::types::{Dimensions, FileId, MessageFullId, PhotoSize};
use tracing::{debug, error, info};

use crate::cache::{CachedEntity, EntityCache, Upsert};
use crate::collaborators::{ContentObserver, FileManager};
use crate::store::{Parser, StorageError, Storer};

/// Newest paid media layout this client understands. Media stored as
/// unsupported by an older client is fetched again.
pub const EXTENDED_MEDIA_VERSION: i32 = 1;

/// Photo size class used as the thumbnail.
const THUMBNAIL_KIND: &str = "t";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Photo {
    pub minithumbnail: Vec<u8>,
    pub sizes: Vec<PhotoSize>,
}

impl Photo {
    fn thumbnail_file_id(&self) -> FileId {
        self.sizes.iter().find(|size| size.kind == THUMBNAIL_KIND).map(|size| size.file_id).unwrap_or_default()
    }

    /// Handle of the largest size.
    fn largest_file_id(&self) -> FileId {
        self.sizes
            .iter()
            .filter(|size| size.kind != THUMBNAIL_KIND)
            .max_by_key(|size| size.size)
            .map(|size| size.file_id)
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default)]
pub enum ExtendedMedia {
    #[default]
    Empty,
    Unsupported {
        version: i32,
    },
    Preview {
        duration: i32,
        dimensions: Dimensions,
        minithumbnail: Vec<u8>,
    },
    Photo(Photo),
    /// A video cached in [`PaidMediaManager`] under `file_id`.
    Video {
        file_id: FileId,
    },
}

impl ExtendedMedia {
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Whether the purchased content itself is present.
    pub fn is_media(&self) -> bool {
        !matches!(self, Self::Empty | Self::Preview { .. })
    }

    pub fn need_poll(&self) -> bool {
        matches!(self, Self::Preview { .. })
    }

    pub fn need_reget(&self) -> bool {
        matches!(self, Self::Unsupported { version } if *version < EXTENDED_MEDIA_VERSION)
    }

    /// Unsupported media compares equal whatever client version produced
    /// it; a different version still has to be taken.
    pub fn is_equal_but_different(&self, other: &Self) -> bool {
        matches!(
            (self, other),
            (Self::Unsupported { version: ours }, Self::Unsupported { version: theirs }) if ours != theirs
        )
    }

    fn type_code(&self) -> i32 {
        match self {
            Self::Empty => 0,
            Self::Unsupported { .. } => 1,
            Self::Preview { .. } => 2,
            Self::Photo(_) => 3,
            Self::Video { .. } => 4,
        }
    }
}

impl PartialEq for ExtendedMedia {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Empty, Self::Empty) | (Self::Unsupported { .. }, Self::Unsupported { .. }) => true,
            (
                Self::Preview { duration, dimensions, minithumbnail },
                Self::Preview { duration: other_duration, dimensions: other_dimensions, minithumbnail: other_mini },
            ) => duration == other_duration && dimensions == other_dimensions && minithumbnail == other_mini,
            (Self::Photo(photo), Self::Photo(other_photo)) => photo == other_photo,
            (Self::Video { file_id }, Self::Video { file_id: other_file_id }) => file_id == other_file_id,
            _ => false,
        }
    }
}

impl Eq for ExtendedMedia {}

/// Paid media of one message with its caption.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageExtendedMedia {
    pub media: ExtendedMedia,
    pub caption: String,
}

impl MessageExtendedMedia {
    pub fn new(media: ExtendedMedia, caption: impl Into<String>) -> Self {
        Self { media, caption: caption.into() }
    }

    /// Keeps the media of `old` when this observation carries less.
    pub fn update_from(&mut self, old: &Self) {
        if !self.media.is_media() && old.media.is_media() {
            *self = old.clone();
        }
    }

    /// Takes `newer` media from a poll or push, keeping the caption.
    /// Returns whether anything changed.
    pub fn update_to(&mut self, newer: ExtendedMedia) -> bool {
        if !newer.is_media() && self.media.is_media() {
            return false;
        }
        if self.media != newer || self.media.is_equal_but_different(&newer) {
            self.media = newer;
            return true;
        }
        false
    }
}

// ── Videos ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaidVideo {
    pub file_id: FileId,
    pub duration: i32,
    pub dimensions: Dimensions,
    pub minithumbnail: Vec<u8>,
    pub thumbnail: Option<PhotoSize>,
}

impl PaidVideo {
    fn thumbnail_file_id(&self) -> FileId {
        self.thumbnail.as_ref().map(|thumbnail| thumbnail.file_id).unwrap_or_default()
    }
}

impl CachedEntity for PaidVideo {
    type Change = bool;

    fn file_id(&self) -> FileId {
        self.file_id
    }

    fn update_from(&mut self, newer: Self) -> bool {
        if *self == newer {
            return false;
        }
        debug!(file_id = %self.file_id, duration = newer.duration, "paid video changed");
        *self = newer;
        true
    }

    fn duplicate(&self, new_id: FileId, files: &dyn FileManager) -> Self {
        let thumbnail = self.thumbnail.as_ref().map(|thumbnail| PhotoSize {
            file_id: files.dup_file_id(thumbnail.file_id, "dup_paid_video"),
            ..thumbnail.clone()
        });
        Self { file_id: new_id, thumbnail, ..self.clone() }
    }

    fn absorb(&mut self, older: Self, files: &dyn FileManager) -> bool {
        let ours = self.thumbnail_file_id();
        let theirs = older.thumbnail_file_id();
        if ours.is_valid() && theirs.is_valid() && ours != theirs {
            if let Err(merge_error) = files.merge(ours, theirs) {
                error!(file_id = %self.file_id, error = %merge_error, "failed to merge paid video thumbnails");
            }
            return false;
        }
        if !ours.is_valid() && theirs.is_valid() {
            self.thumbnail = older.thumbnail;
            return true;
        }
        false
    }
}

// ── Manager ────────────────────────────────────────────────────────

pub struct PaidMediaManager {
    files: Arc<dyn FileManager>,
    content_observer: Arc<dyn ContentObserver<MessageFullId>>,
    videos: EntityCache<PaidVideo>,
    messages: HashMap<MessageFullId, MessageExtendedMedia>,
}

impl PaidMediaManager {
    pub fn new(files: Arc<dyn FileManager>, content_observer: Arc<dyn ContentObserver<MessageFullId>>) -> Self {
        Self { files, content_observer, videos: EntityCache::new("paid video"), messages: HashMap::new() }
    }

    pub fn on_get_video(&mut self, video: PaidVideo, replace: bool) -> FileId {
        let (file_id, upsert) = self.videos.create_or_update(video, replace);
        if matches!(upsert, Upsert::Created) {
            debug!(%file_id, "new paid video");
        }
        file_id
    }

    pub fn get_video(&self, file_id: FileId) -> Option<&PaidVideo> {
        self.videos.get(file_id)
    }

    pub fn merge_videos(&mut self, new_id: FileId, old_id: FileId) {
        self.videos.merge(new_id, old_id, self.files.as_ref(), |_, _| {});
    }

    /// Stores the paid media seen in a message. Media already known for the
    /// message survives an observation that only carries a preview.
    pub fn on_get_extended_media(&mut self, full_id: MessageFullId, mut media: MessageExtendedMedia) {
        if let Some(old) = self.messages.get(&full_id) {
            media.update_from(old);
        }
        self.messages.insert(full_id, media);
    }

    /// Applies refreshed media for a message; owners are told when it
    /// changed.
    pub fn on_update_extended_media(&mut self, full_id: MessageFullId, newer: ExtendedMedia) -> bool {
        let Some(current) = self.messages.get_mut(&full_id) else {
            debug!(%full_id, "ignoring paid media update of unknown message");
            return false;
        };
        if !current.update_to(newer) {
            return false;
        }
        info!(%full_id, is_media = current.media.is_media(), "paid media updated");
        self.content_observer.content_changed(&full_id);
        true
    }

    pub fn get_extended_media(&self, full_id: MessageFullId) -> Option<&MessageExtendedMedia> {
        self.messages.get(&full_id)
    }

    /// Messages still showing a preview.
    pub fn messages_to_poll(&self) -> Vec<MessageFullId> {
        self.select_messages(ExtendedMedia::need_poll)
    }

    /// Messages whose media an older client could not read.
    pub fn messages_to_reget(&self) -> Vec<MessageFullId> {
        self.select_messages(ExtendedMedia::need_reget)
    }

    fn select_messages(&self, predicate: impl Fn(&ExtendedMedia) -> bool) -> Vec<MessageFullId> {
        let mut selected: Vec<MessageFullId> =
            self.messages.iter().filter(|(_, media)| predicate(&media.media)).map(|(full_id, _)| *full_id).collect();
        selected.sort_unstable();
        selected
    }

    pub fn get_duration(&self, full_id: MessageFullId) -> i32 {
        match self.messages.get(&full_id).map(|media| &media.media) {
            Some(ExtendedMedia::Preview { duration, .. }) => *duration,
            Some(ExtendedMedia::Video { file_id }) => self.videos.get(*file_id).map_or(0, |video| video.duration),
            _ => 0,
        }
    }

    /// Main content handle of the purchased media.
    pub fn get_any_file_id(&self, full_id: MessageFullId) -> FileId {
        match self.messages.get(&full_id).map(|media| &media.media) {
            Some(ExtendedMedia::Photo(photo)) => photo.largest_file_id(),
            Some(ExtendedMedia::Video { file_id }) => self.videos.resolve(*file_id),
            _ => FileId::default(),
        }
    }

    pub fn get_thumbnail_file_id(&self, full_id: MessageFullId) -> FileId {
        match self.messages.get(&full_id).map(|media| &media.media) {
            Some(ExtendedMedia::Photo(photo)) => photo.thumbnail_file_id(),
            Some(ExtendedMedia::Video { file_id }) => {
                self.videos.get(*file_id).map(PaidVideo::thumbnail_file_id).unwrap_or_default()
            }
            _ => FileId::default(),
        }
    }

    pub fn delete_thumbnail(&mut self, full_id: MessageFullId) {
        let Some(media) = self.messages.get_mut(&full_id) else {
            return;
        };
        match &mut media.media {
            ExtendedMedia::Photo(photo) => photo.sizes.retain(|size| size.kind != THUMBNAIL_KIND),
            ExtendedMedia::Video { file_id } => {
                if let Some(video) = self.videos.get_mut(*file_id) {
                    video.thumbnail = None;
                }
            }
            ExtendedMedia::Empty | ExtendedMedia::Unsupported { .. } | ExtendedMedia::Preview { .. } => {}
        }
    }

    // ── Storage ────────────────────────────────────────────────────

    pub fn store_extended_media(&self, full_id: MessageFullId, storer: &mut Storer) {
        let Some(media) = self.messages.get(&full_id) else {
            panic!("store_extended_media: no paid media for {full_id}");
        };
        let has_caption = !media.caption.is_empty();
        storer.store_bool(has_caption);
        storer.store_i32(media.media.type_code());
        match &media.media {
            ExtendedMedia::Empty => {}
            ExtendedMedia::Unsupported { version } => storer.store_i32(*version),
            ExtendedMedia::Preview { duration, dimensions, minithumbnail } => {
                storer.store_i32(*duration);
                storer.store_i32(i32::from(dimensions.width));
                storer.store_i32(i32::from(dimensions.height));
                storer.store_bytes(minithumbnail);
            }
            ExtendedMedia::Photo(photo) => {
                storer.store_bytes(&photo.minithumbnail);
                storer.store_i32(i32::try_from(photo.sizes.len()).unwrap_or(i32::MAX));
                for size in &photo.sizes {
                    storer.store_photo_size(size);
                }
            }
            ExtendedMedia::Video { file_id } => {
                let video = self.videos.expect(*file_id, "store_extended_media");
                storer.store_i32(video.duration);
                storer.store_i32(i32::from(video.dimensions.width));
                storer.store_i32(i32::from(video.dimensions.height));
                storer.store_bytes(&video.minithumbnail);
                storer.store_bool(video.thumbnail.is_some());
                if let Some(thumbnail) = &video.thumbnail {
                    storer.store_photo_size(thumbnail);
                }
                storer.store_file_id(video.file_id);
            }
        }
        if has_caption {
            storer.store_string(&media.caption);
        }
    }

    /// Reads stored paid media of `full_id`. A video whose handle is no
    /// longer valid becomes empty media.
    pub fn parse_extended_media(&mut self, full_id: MessageFullId, parser: &mut Parser<'_>) -> Result<(), StorageError> {
        let has_caption = parser.parse_bool()?;
        let media = match parser.parse_i32()? {
            0 => ExtendedMedia::Empty,
            1 => ExtendedMedia::Unsupported { version: parser.parse_i32()? },
            2 => {
                let duration = parser.parse_i32()?;
                let width = parser.parse_i32()?;
                let height = parser.parse_i32()?;
                let minithumbnail = parser.parse_bytes()?;
                ExtendedMedia::Preview { duration, dimensions: Dimensions::new(width, height), minithumbnail }
            }
            3 => {
                let minithumbnail = parser.parse_bytes()?;
                let count = parser.parse_i32()?;
                let count =
                    usize::try_from(count).map_err(|_| StorageError::InvalidValue { what: "length", value: i64::from(count) })?;
                let sizes = (0..count).map(|_| parser.parse_photo_size()).collect::<Result<_, _>>()?;
                ExtendedMedia::Photo(Photo { minithumbnail, sizes })
            }
            4 => {
                let duration = parser.parse_i32()?;
                let width = parser.parse_i32()?;
                let height = parser.parse_i32()?;
                let minithumbnail = parser.parse_bytes()?;
                let thumbnail = if parser.parse_bool()? { Some(parser.parse_photo_size()?) } else { None };
                let file_id = parser.parse_file_id()?;
                if file_id.is_valid() {
                    let video = PaidVideo {
                        file_id,
                        duration,
                        dimensions: Dimensions::new(width, height),
                        minithumbnail,
                        thumbnail,
                    };
                    ExtendedMedia::Video { file_id: self.on_get_video(video, false) }
                } else {
                    ExtendedMedia::Empty
                }
            }
            other => return Err(StorageError::InvalidValue { what: "paid media type", value: i64::from(other) }),
        };
        let caption = if has_caption { parser.parse_string()? } else { String::new() };
        self.on_get_extended_media(full_id, MessageExtendedMedia { media, caption });
        Ok(())
    }
}

impl fmt::Debug for PaidMediaManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PaidMediaManager")
            .field("videos", &self.videos)
            .field("messages", &self.messages.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use msgsync_common::types::{DialogId, MessageId, ServerMessageId};

    use super::*;
    use crate::collaborators::memory::{ContentEvent, MemoryFileManager, RecordingObserver};

    struct Fixture {
        manager: PaidMediaManager,
        files: Arc<MemoryFileManager>,
        observer: Arc<RecordingObserver<MessageFullId>>,
    }

    impl Fixture {
        fn new() -> Self {
            let files = Arc::new(MemoryFileManager::default());
            let observer = Arc::new(RecordingObserver::default());
            let manager = PaidMediaManager::new(files.clone(), observer.clone());
            Self { manager, files, observer }
        }
    }

    fn message(server_id: i32) -> MessageFullId {
        MessageFullId::new(DialogId::new(-300), MessageId::from_server(ServerMessageId::new(server_id)))
    }

    fn size(kind: &str, bytes: i32, id: i32) -> PhotoSize {
        PhotoSize { kind: kind.to_string(), dimensions: Dimensions::new(90, 90), size: bytes, file_id: FileId::new(id) }
    }

    fn preview() -> ExtendedMedia {
        ExtendedMedia::Preview { duration: 15, dimensions: Dimensions::new(640, 360), minithumbnail: vec![3] }
    }

    fn photo() -> ExtendedMedia {
        ExtendedMedia::Photo(Photo { minithumbnail: vec![1], sizes: vec![size("t", 100, 11), size("x", 9000, 12)] })
    }

    fn video(fixture: &mut Fixture, id: i32) -> ExtendedMedia {
        let file_id = fixture.manager.on_get_video(
            PaidVideo {
                file_id: FileId::new(id),
                duration: 42,
                dimensions: Dimensions::new(1280, 720),
                minithumbnail: vec![],
                thumbnail: Some(size("m", 400, id + 100)),
            },
            false,
        );
        ExtendedMedia::Video { file_id }
    }

    #[test]
    fn preview_is_polled_until_media_arrives() {
        let mut fixture = Fixture::new();
        fixture.manager.on_get_extended_media(message(1), MessageExtendedMedia::new(preview(), "Secret"));
        assert_eq!(fixture.manager.messages_to_poll(), vec![message(1)]);
        assert_eq!(fixture.manager.get_duration(message(1)), 15);

        assert!(!fixture.manager.on_update_extended_media(message(1), preview()));
        assert!(fixture.observer.take().is_empty());

        assert!(fixture.manager.on_update_extended_media(message(1), photo()));
        assert_eq!(fixture.observer.take(), vec![ContentEvent::Changed(message(1))]);
        assert!(fixture.manager.messages_to_poll().is_empty());
        let stored = fixture.manager.get_extended_media(message(1)).expect("known message");
        assert_eq!(stored.caption, "Secret");
        assert_eq!(fixture.manager.get_any_file_id(message(1)), FileId::new(12));
    }

    #[test]
    fn media_never_regresses_to_a_preview() {
        let mut fixture = Fixture::new();
        let media = video(&mut fixture, 5);
        fixture.manager.on_get_extended_media(message(2), MessageExtendedMedia::new(media.clone(), ""));

        assert!(!fixture.manager.on_update_extended_media(message(2), preview()));
        assert!(!fixture.manager.on_update_extended_media(message(2), ExtendedMedia::Empty));
        fixture.manager.on_get_extended_media(message(2), MessageExtendedMedia::new(preview(), "again"));

        assert_eq!(fixture.manager.get_extended_media(message(2)).map(|stored| &stored.media), Some(&media));
        assert_eq!(fixture.manager.get_duration(message(2)), 42);
        assert!(fixture.observer.take().is_empty());
        assert!(!fixture.manager.on_update_extended_media(message(99), photo()));
    }

    #[test]
    fn unsupported_media_from_an_older_client_is_refetched() {
        let mut fixture = Fixture::new();
        let old = ExtendedMedia::Unsupported { version: 0 };
        let current = ExtendedMedia::Unsupported { version: EXTENDED_MEDIA_VERSION };
        assert_eq!(old, current);
        assert!(old.is_equal_but_different(&current));
        assert!(old.need_reget());
        assert!(!current.need_reget());

        fixture.manager.on_get_extended_media(message(3), MessageExtendedMedia::new(old, ""));
        assert_eq!(fixture.manager.messages_to_reget(), vec![message(3)]);
        assert!(fixture.manager.on_update_extended_media(message(3), current.clone()));
        assert!(!fixture.manager.on_update_extended_media(message(3), current));
        assert!(fixture.manager.messages_to_reget().is_empty());
    }

    #[test]
    fn thumbnails_are_deleted_per_media_kind() {
        let mut fixture = Fixture::new();
        fixture.manager.on_get_extended_media(message(4), MessageExtendedMedia::new(photo(), ""));
        let media = video(&mut fixture, 6);
        fixture.manager.on_get_extended_media(message(5), MessageExtendedMedia::new(media, ""));
        assert_eq!(fixture.manager.get_thumbnail_file_id(message(4)), FileId::new(11));
        assert_eq!(fixture.manager.get_thumbnail_file_id(message(5)), FileId::new(106));

        fixture.manager.delete_thumbnail(message(4));
        fixture.manager.delete_thumbnail(message(5));
        assert!(!fixture.manager.get_thumbnail_file_id(message(4)).is_valid());
        assert!(!fixture.manager.get_thumbnail_file_id(message(5)).is_valid());
        assert_eq!(fixture.manager.get_any_file_id(message(4)), FileId::new(12));
    }

    #[test]
    fn merged_video_handle_still_reads_through_the_message() {
        let mut fixture = Fixture::new();
        let media = video(&mut fixture, 7);
        fixture.manager.on_get_extended_media(message(6), MessageExtendedMedia::new(media, ""));
        fixture.manager.on_get_video(
            PaidVideo { file_id: FileId::new(8), duration: 42, ..PaidVideo::default() },
            false,
        );

        fixture.manager.merge_videos(FileId::new(8), FileId::new(7));
        assert_eq!(fixture.manager.get_any_file_id(message(6)), FileId::new(8));
        assert_eq!(fixture.manager.get_thumbnail_file_id(message(6)), FileId::new(107));
        assert!(fixture.files.merges().contains(&(FileId::new(8), FileId::new(7))));
    }

    #[test]
    fn stored_media_parses_back() {
        let mut fixture = Fixture::new();
        fixture.manager.on_get_extended_media(message(7), MessageExtendedMedia::new(preview(), "Look"));
        let media = video(&mut fixture, 9);
        fixture.manager.on_get_extended_media(message(8), MessageExtendedMedia::new(media, ""));
        fixture.manager.on_get_extended_media(message(9), MessageExtendedMedia::new(photo(), "p"));

        let mut storer = Storer::new();
        for id in 7..=9 {
            fixture.manager.store_extended_media(message(id), &mut storer);
        }
        let bytes = storer.finish();

        let mut restored = Fixture::new();
        let mut parser = Parser::new(&bytes).expect("header should parse");
        for id in 7..=9 {
            restored.manager.parse_extended_media(message(id), &mut parser).expect("media should parse");
        }
        parser.finish().expect("nothing should be left");

        for id in 7..=9 {
            assert_eq!(
                restored.manager.get_extended_media(message(id)),
                fixture.manager.get_extended_media(message(id))
            );
        }
        assert_eq!(restored.manager.get_duration(message(8)), 42);
        assert_eq!(restored.manager.messages_to_poll(), vec![message(7)]);
    }

    #[test]
    fn unknown_stored_media_type_is_rejected() {
        let mut fixture = Fixture::new();
        let mut storer = Storer::new();
        storer.store_bool(false);
        storer.store_i32(17);
        let bytes = storer.finish();

        let mut parser = Parser::new(&bytes).expect("header should parse");
        assert_eq!(
            fixture.manager.parse_extended_media(message(1), &mut parser),
            Err(StorageError::InvalidValue { what: "paid media type", value: 17 })
        );
        assert!(fixture.manager.get_extended_media(message(1)).is_none());
    }
}
