// Core identifiers and value types shared by every msgsync crate.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque handle of a file-backed entity (video note, document, thumbnail).
///
/// Handles are minted by the file subsystem. Zero and negative values are
/// never issued and mark "no file".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileId(i32);

impl FileId {
    pub const fn new(id: i32) -> Self {
        Self(id)
    }

    pub const fn get(self) -> i32 {
        self.0
    }

    pub const fn is_valid(self) -> bool {
        self.0 > 0
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "file {}", self.0)
    }
}

/// Identifier of a chat on the remote service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DialogId(i64);

impl DialogId {
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    pub const fn get(self) -> i64 {
        self.0
    }

    pub const fn is_valid(self) -> bool {
        self.0 != 0
    }
}

impl fmt::Display for DialogId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "chat {}", self.0)
    }
}

/// Local message identifier.
///
/// Server-assigned identifiers occupy the bits above `SERVER_ID_SHIFT`;
/// the low bits are zero for messages known to the server. Locally
/// created and scheduled messages set low bits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(i64);

impl MessageId {
    pub const SERVER_ID_SHIFT: u32 = 20;
    const TYPE_MASK: i64 = (1 << Self::SERVER_ID_SHIFT) - 1;
    const SCHEDULED_MASK: i64 = 4;

    pub const fn new(raw: i64) -> Self {
        Self(raw)
    }

    pub const fn from_server(server_id: ServerMessageId) -> Self {
        Self((server_id.get() as i64) << Self::SERVER_ID_SHIFT)
    }

    pub const fn raw(self) -> i64 {
        self.0
    }

    pub const fn is_valid(self) -> bool {
        self.0 > 0
    }

    pub const fn is_scheduled(self) -> bool {
        self.0 > 0 && (self.0 & Self::SCHEDULED_MASK) != 0
    }

    pub const fn is_server(self) -> bool {
        self.0 > 0 && (self.0 & Self::TYPE_MASK) == 0
    }

    /// Server-side identifier; only meaningful when `is_server()`.
    pub const fn server_message_id(self) -> ServerMessageId {
        ServerMessageId((self.0 >> Self::SERVER_ID_SHIFT) as i32)
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "message {}", self.0)
    }
}

/// Message identifier as the server knows it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServerMessageId(i32);

impl ServerMessageId {
    pub const fn new(id: i32) -> Self {
        Self(id)
    }

    pub const fn get(self) -> i32 {
        self.0
    }

    pub const fn is_valid(self) -> bool {
        self.0 > 0
    }
}

/// A message coordinate: the owning context of attached media.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MessageFullId {
    pub dialog_id: DialogId,
    pub message_id: MessageId,
}

impl MessageFullId {
    pub const fn new(dialog_id: DialogId, message_id: MessageId) -> Self {
        Self { dialog_id, message_id }
    }
}

impl fmt::Display for MessageFullId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} in {}", self.message_id, self.dialog_id)
    }
}

/// Identifier of a user account (bots included).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(i64);

impl UserId {
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    pub const fn get(self) -> i64 {
        self.0
    }

    pub const fn is_valid(self) -> bool {
        self.0 > 0 && self.0 < (1 << 40)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "user {}", self.0)
    }
}

/// Server-assigned correlation id of a speech transcription.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TranscriptionId(i64);

impl TranscriptionId {
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    pub const fn get(self) -> i64 {
        self.0
    }

    pub const fn is_valid(self) -> bool {
        self.0 != 0
    }
}

impl fmt::Display for TranscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "transcription {}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u16,
    pub height: u16,
}

impl Dimensions {
    /// Builds dimensions from remote values; anything outside `1..=65535`
    /// on either axis yields empty dimensions.
    pub fn new(width: i32, height: i32) -> Self {
        let in_range = |value: i32| (1..=i32::from(u16::MAX)).contains(&value);
        if in_range(width) && in_range(height) {
            Self { width: width as u16, height: height as u16 }
        } else {
            Self::default()
        }
    }

    pub fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// A sized preview image stored as a separate file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoSize {
    /// Size class marker, e.g. `"s"`, `"m"`, `"x"`.
    pub kind: String,
    pub dimensions: Dimensions,
    pub size: i32,
    pub file_id: FileId,
}

impl fmt::Display for PhotoSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{} {} {} bytes, {}]", self.kind, self.dimensions, self.size, self.file_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_message_ids_round_trip_through_local_ids() {
        let message_id = MessageId::from_server(ServerMessageId::new(42));
        assert!(message_id.is_server());
        assert!(!message_id.is_scheduled());
        assert_eq!(message_id.server_message_id(), ServerMessageId::new(42));
    }

    #[test]
    fn local_and_scheduled_message_ids_are_not_server_ids() {
        let local = MessageId::new((7 << MessageId::SERVER_ID_SHIFT) + 1);
        assert!(!local.is_server());

        let scheduled = MessageId::new((7 << MessageId::SERVER_ID_SHIFT) + 4);
        assert!(scheduled.is_scheduled());
        assert!(!scheduled.is_server());
    }

    #[test]
    fn dimensions_reject_out_of_range_values() {
        assert_eq!(Dimensions::new(240, 240), Dimensions { width: 240, height: 240 });
        assert!(Dimensions::new(0, 100).is_empty());
        assert!(Dimensions::new(70_000, 100).is_empty());
    }

    #[test]
    fn file_id_validity() {
        assert!(!FileId::default().is_valid());
        assert!(FileId::new(3).is_valid());
        assert!(!FileId::new(-1).is_valid());
    }
}
