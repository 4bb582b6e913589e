// General documents: file name, mime type and previews.

use std::fmt;
use std::sync::Arc;

use msgsync_common::types::{FileId, PhotoSize};
use serde::Serialize;
use tracing::{debug, error};

use crate::cache::{CachedEntity, EntityCache, Upsert};
use crate::collaborators::{FileManager, FileView};
use crate::store::{Parser, StorageError, StorageVersion, Storer};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeneralDocument {
    pub file_id: FileId,
    pub file_name: String,
    pub mime_type: String,
    pub minithumbnail: Vec<u8>,
    pub thumbnail: Option<PhotoSize>,
}

impl GeneralDocument {
    fn thumbnail_file_id(&self) -> FileId {
        self.thumbnail.as_ref().map(|thumbnail| thumbnail.file_id).unwrap_or_default()
    }
}

impl CachedEntity for GeneralDocument {
    /// Whether any field changed.
    type Change = bool;

    fn file_id(&self) -> FileId {
        self.file_id
    }

    fn update_from(&mut self, newer: Self) -> bool {
        let mut changed = false;
        if self.mime_type != newer.mime_type {
            debug!(file_id = %self.file_id, from = %self.mime_type, to = %newer.mime_type, "document mime type changed");
            self.mime_type = newer.mime_type;
            changed = true;
        }
        if self.file_name != newer.file_name {
            debug!(file_id = %self.file_id, "document file name changed");
            self.file_name = newer.file_name;
            changed = true;
        }
        if self.minithumbnail != newer.minithumbnail {
            self.minithumbnail = newer.minithumbnail;
            changed = true;
        }
        if self.thumbnail != newer.thumbnail {
            debug!(file_id = %self.file_id, "document thumbnail changed");
            self.thumbnail = newer.thumbnail;
            changed = true;
        }
        changed
    }

    fn duplicate(&self, new_id: FileId, files: &dyn FileManager) -> Self {
        let thumbnail = self.thumbnail.as_ref().map(|thumbnail| PhotoSize {
            file_id: files.dup_file_id(thumbnail.file_id, "dup_document"),
            ..thumbnail.clone()
        });
        Self { file_id: new_id, thumbnail, ..self.clone() }
    }

    fn absorb(&mut self, older: Self, files: &dyn FileManager) -> bool {
        let ours = self.thumbnail_file_id();
        let theirs = older.thumbnail_file_id();
        if ours.is_valid() && theirs.is_valid() && ours != theirs {
            if let Err(merge_error) = files.merge(ours, theirs) {
                error!(file_id = %self.file_id, error = %merge_error, "failed to merge document thumbnails");
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

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentView {
    pub file_name: String,
    pub mime_type: String,
    pub minithumbnail: Option<Vec<u8>>,
    pub thumbnail: Option<PhotoSize>,
    pub document: FileView,
}

/// Documents have no owners to notify and send no queries, so the cache
/// is driven synchronously by whoever owns this manager.
pub struct DocumentsManager {
    files: Arc<dyn FileManager>,
    documents: EntityCache<GeneralDocument>,
}

impl DocumentsManager {
    pub fn new(files: Arc<dyn FileManager>) -> Self {
        Self { files, documents: EntityCache::new("document") }
    }

    /// Stores `document`. An already known document keeps its fields
    /// unless `replace` is set, but always takes the newest minithumbnail.
    pub fn on_get_document(&mut self, document: GeneralDocument, replace: bool) -> FileId {
        let minithumbnail = document.minithumbnail.clone();
        let (file_id, upsert) = self.documents.create_or_update(document, replace);
        if matches!(upsert, Upsert::Kept) {
            if let Some(existing) = self.documents.get_mut(file_id) {
                if existing.minithumbnail != minithumbnail {
                    debug!(%file_id, "document minithumbnail refreshed");
                    existing.minithumbnail = minithumbnail;
                }
            }
        }
        file_id
    }

    pub fn get_document(&self, file_id: FileId) -> Option<&GeneralDocument> {
        self.documents.get(file_id)
    }

    pub fn get_document_object(&self, file_id: FileId) -> Option<DocumentView> {
        if !file_id.is_valid() {
            return None;
        }
        let document = self.documents.expect(file_id, "get_document_object");
        Some(DocumentView {
            file_name: document.file_name.clone(),
            mime_type: document.mime_type.clone(),
            minithumbnail: (!document.minithumbnail.is_empty()).then(|| document.minithumbnail.clone()),
            thumbnail: document.thumbnail.clone(),
            document: self.files.get_file_view(document.file_id),
        })
    }

    pub fn get_document_thumbnail_file_id(&self, file_id: FileId) -> FileId {
        self.documents.expect(file_id, "get_document_thumbnail_file_id").thumbnail_file_id()
    }

    pub fn delete_document_thumbnail(&mut self, file_id: FileId) {
        if let Some(document) = self.documents.get_mut(file_id) {
            document.thumbnail = None;
        }
    }

    pub fn dup_document(&mut self, new_id: FileId, old_id: FileId) -> FileId {
        self.documents.duplicate(new_id, old_id, self.files.as_ref())
    }

    pub fn merge_documents(&mut self, new_id: FileId, old_id: FileId) {
        self.documents.merge(new_id, old_id, self.files.as_ref(), |_, _| {});
    }

    pub fn store_document(&self, file_id: FileId, storer: &mut Storer) {
        let document = self.documents.expect(file_id, "store_document");
        storer.store_string(&document.file_name);
        storer.store_string(&document.mime_type);
        if storer.version() >= StorageVersion::SupportMinithumbnails {
            storer.store_bytes(&document.minithumbnail);
        }
        storer.store_bool(document.thumbnail.is_some());
        if let Some(thumbnail) = &document.thumbnail {
            storer.store_photo_size(thumbnail);
        }
        storer.store_file_id(document.file_id);
    }

    /// Reads a stored document into the cache. A snapshot whose handle is
    /// no longer valid yields the empty handle.
    pub fn parse_document(&mut self, parser: &mut Parser<'_>) -> Result<FileId, StorageError> {
        let file_name = parser.parse_string()?;
        let mime_type = parser.parse_string()?;
        let minithumbnail = if parser.version() >= StorageVersion::SupportMinithumbnails {
            parser.parse_bytes()?
        } else {
            Vec::new()
        };
        let thumbnail = if parser.parse_bool()? { Some(parser.parse_photo_size()?) } else { None };
        let file_id = parser.parse_file_id()?;
        if !file_id.is_valid() {
            return Ok(FileId::default());
        }
        let document = GeneralDocument { file_id, file_name, mime_type, minithumbnail, thumbnail };
        Ok(self.on_get_document(document, false))
    }
}

impl fmt::Debug for DocumentsManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentsManager").field("documents", &self.documents).finish()
    }
}
