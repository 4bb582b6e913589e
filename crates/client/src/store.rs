// Versioned binary snapshots of cached entities.
//
// Layout: a little-endian i32 format version, then the entity fields in
// declaration order. Strings and byte blobs carry a u32 length prefix.

use msgsync_common::types::{Dimensions, FileId, PhotoSize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(i32)]
pub enum StorageVersion {
    Initial = 1,
    SupportMinithumbnails = 2,
    SupportTranscription = 3,
}

impl StorageVersion {
    pub const CURRENT: Self = Self::SupportTranscription;

    fn from_i32(value: i32) -> Result<Self, StorageError> {
        match value {
            1 => Ok(Self::Initial),
            2 => Ok(Self::SupportMinithumbnails),
            3 => Ok(Self::SupportTranscription),
            _ => Err(StorageError::UnknownVersion(value)),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("snapshot truncated: needed {needed} bytes at offset {offset}")]
    Truncated { offset: usize, needed: usize },
    #[error("snapshot contains invalid UTF-8 at offset {0}")]
    InvalidUtf8(usize),
    #[error("unknown snapshot version {0}")]
    UnknownVersion(i32),
    #[error("{0} unread bytes after snapshot")]
    TrailingBytes(usize),
    #[error("invalid {what}: {value}")]
    InvalidValue { what: &'static str, value: i64 },
}

#[derive(Debug)]
pub struct Storer {
    buf: Vec<u8>,
    version: StorageVersion,
}

impl Default for Storer {
    fn default() -> Self {
        Self::new()
    }
}

impl Storer {
    /// Starts a snapshot in the current format.
    pub fn new() -> Self {
        Self::with_version(StorageVersion::CURRENT)
    }

    /// Starts a snapshot in an older format; callers must then only store
    /// the fields that format knows.
    pub fn with_version(version: StorageVersion) -> Self {
        let mut storer = Self { buf: Vec::new(), version };
        storer.store_i32(version as i32);
        storer
    }

    pub fn version(&self) -> StorageVersion {
        self.version
    }

    pub fn store_i32(&mut self, value: i32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn store_i64(&mut self, value: i64) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn store_bool(&mut self, value: bool) {
        self.buf.push(u8::from(value));
    }

    pub fn store_bytes(&mut self, value: &[u8]) {
        self.buf.extend_from_slice(&blob_len(value.len()).to_le_bytes());
        self.buf.extend_from_slice(value);
    }

    pub fn store_string(&mut self, value: &str) {
        self.store_bytes(value.as_bytes());
    }

    pub fn store_file_id(&mut self, file_id: FileId) {
        self.store_i32(file_id.get());
    }

    pub fn store_photo_size(&mut self, photo: &PhotoSize) {
        self.store_string(&photo.kind);
        self.store_i32(i32::from(photo.dimensions.width));
        self.store_i32(i32::from(photo.dimensions.height));
        self.store_i32(photo.size);
        self.store_file_id(photo.file_id);
    }

    pub fn finish(self) -> Vec<u8> {
        self.buf
    }
}

/// Length prefix of a blob. Blobs of 4 GiB or more cannot be framed.
fn blob_len(len: usize) -> u32 {
    match u32::try_from(len) {
        Ok(len) => len,
        Err(_) => panic!("blob of {len} bytes does not fit a snapshot length prefix"),
    }
}

#[derive(Debug)]
pub struct Parser<'a> {
    bytes: &'a [u8],
    offset: usize,
    version: StorageVersion,
}

impl<'a> Parser<'a> {
    /// Reads the version header.
    pub fn new(bytes: &'a [u8]) -> Result<Self, StorageError> {
        let mut parser = Self { bytes, offset: 0, version: StorageVersion::Initial };
        parser.version = StorageVersion::from_i32(parser.parse_i32()?)?;
        Ok(parser)
    }

    pub fn version(&self) -> StorageVersion {
        self.version
    }

    fn take(&mut self, needed: usize) -> Result<&'a [u8], StorageError> {
        let end = self
            .offset
            .checked_add(needed)
            .filter(|end| *end <= self.bytes.len())
            .ok_or(StorageError::Truncated { offset: self.offset, needed })?;
        let slice = &self.bytes[self.offset..end];
        self.offset = end;
        Ok(slice)
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N], StorageError> {
        let mut array = [0u8; N];
        array.copy_from_slice(self.take(N)?);
        Ok(array)
    }

    pub fn parse_i32(&mut self) -> Result<i32, StorageError> {
        Ok(i32::from_le_bytes(self.take_array()?))
    }

    pub fn parse_i64(&mut self) -> Result<i64, StorageError> {
        Ok(i64::from_le_bytes(self.take_array()?))
    }

    pub fn parse_bool(&mut self) -> Result<bool, StorageError> {
        match self.take_array::<1>()?[0] {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(StorageError::InvalidValue { what: "bool", value: i64::from(other) }),
        }
    }

    pub fn parse_bytes(&mut self) -> Result<Vec<u8>, StorageError> {
        let len = u32::from_le_bytes(self.take_array()?) as usize;
        Ok(self.take(len)?.to_vec())
    }

    pub fn parse_string(&mut self) -> Result<String, StorageError> {
        let start = self.offset;
        String::from_utf8(self.parse_bytes()?).map_err(|_| StorageError::InvalidUtf8(start))
    }

    pub fn parse_file_id(&mut self) -> Result<FileId, StorageError> {
        Ok(FileId::new(self.parse_i32()?))
    }

    pub fn parse_photo_size(&mut self) -> Result<PhotoSize, StorageError> {
        let kind = self.parse_string()?;
        let width = self.parse_i32()?;
        let height = self.parse_i32()?;
        let size = self.parse_i32()?;
        let file_id = self.parse_file_id()?;
        Ok(PhotoSize { kind, dimensions: Dimensions::new(width, height), size, file_id })
    }

    /// Fails when bytes are left over.
    pub fn finish(self) -> Result<(), StorageError> {
        match self.bytes.len() - self.offset {
            0 => Ok(()),
            rest => Err(StorageError::TrailingBytes(rest)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_starts_with_current_version() {
        let bytes = Storer::new().finish();
        assert_eq!(bytes, (StorageVersion::CURRENT as i32).to_le_bytes());
        let parser = Parser::new(&bytes).expect("header should parse");
        assert_eq!(parser.version(), StorageVersion::SupportTranscription);
        parser.finish().expect("nothing should be left");
    }

    #[test]
    fn fields_read_back_in_order() {
        let mut storer = Storer::new();
        storer.store_i32(-5);
        storer.store_bool(true);
        storer.store_string("clip.mp4");
        storer.store_photo_size(&PhotoSize {
            kind: "m".to_string(),
            dimensions: Dimensions::new(320, 320),
            size: 4096,
            file_id: FileId::new(12),
        });
        let bytes = storer.finish();

        let mut parser = Parser::new(&bytes).expect("header should parse");
        assert_eq!(parser.parse_i32(), Ok(-5));
        assert_eq!(parser.parse_bool(), Ok(true));
        assert_eq!(parser.parse_string().as_deref(), Ok("clip.mp4"));
        let photo = parser.parse_photo_size().expect("photo should parse");
        assert_eq!(photo.dimensions, Dimensions::new(320, 320));
        assert_eq!(photo.file_id, FileId::new(12));
        parser.finish().expect("nothing should be left");
    }

    #[test]
    fn truncated_and_unknown_snapshots_are_rejected() {
        assert_eq!(Parser::new(&[1, 0]).err(), Some(StorageError::Truncated { offset: 0, needed: 4 }));
        assert_eq!(Parser::new(&9i32.to_le_bytes()).err(), Some(StorageError::UnknownVersion(9)));

        let mut storer = Storer::new();
        storer.store_bytes(&[1, 2, 3]);
        let mut bytes = storer.finish();
        bytes.truncate(bytes.len() - 1);
        let mut parser = Parser::new(&bytes).expect("header should parse");
        assert!(matches!(parser.parse_bytes(), Err(StorageError::Truncated { .. })));
    }

    #[test]
    fn invalid_utf8_and_trailing_bytes_are_rejected() {
        let mut storer = Storer::new();
        storer.store_bytes(&[0xff, 0xfe]);
        storer.store_i32(1);
        let bytes = storer.finish();
        let mut parser = Parser::new(&bytes).expect("header should parse");
        assert_eq!(parser.parse_string(), Err(StorageError::InvalidUtf8(4)));
        assert_eq!(parser.finish(), Err(StorageError::TrailingBytes(4)));
    }

    #[test]
    fn blob_length_prefix_is_exact() {
        assert_eq!(blob_len(0), 0);
        assert_eq!(blob_len(u32::MAX as usize), u32::MAX);
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    #[should_panic(expected = "does not fit a snapshot length prefix")]
    fn oversized_blob_length_panics() {
        blob_len(u32::MAX as usize + 1);
    }
}
