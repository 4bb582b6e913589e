// Cached emoji categories with a reload deadline.

use std::time::Duration;

use chrono::{DateTime, Utc};
use msgsync_common::protocol::wire;
use serde::Serialize;

use crate::store::{Parser, StorageError, Storer};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmojiGroup {
    title: String,
    icon_custom_emoji_id: i64,
    emojis: Vec<String>,
}

impl From<wire::EmojiGroup> for EmojiGroup {
    fn from(group: wire::EmojiGroup) -> Self {
        Self { title: group.title, icon_custom_emoji_id: group.icon_emoji_id, emojis: group.emoticons }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmojiCategory {
    pub name: String,
    pub icon_custom_emoji_id: i64,
    pub emojis: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmojiGroupList {
    used_language_codes: String,
    hash: i32,
    groups: Vec<EmojiGroup>,
    reload_after: Duration,
    next_reload_time: DateTime<Utc>,
}

impl EmojiGroupList {
    /// A freshly fetched list, due for reload `reload_after` from `now`.
    pub fn new(
        used_language_codes: String,
        hash: i32,
        groups: Vec<wire::EmojiGroup>,
        now: DateTime<Utc>,
        reload_after: Duration,
    ) -> Self {
        let mut list = Self {
            used_language_codes,
            hash,
            groups: groups.into_iter().map(EmojiGroup::from).collect(),
            reload_after,
            next_reload_time: now,
        };
        list.update_next_reload_time(now);
        list
    }

    pub fn used_language_codes(&self) -> &str {
        &self.used_language_codes
    }

    pub fn hash(&self) -> i32 {
        self.hash
    }

    pub fn next_reload_time(&self) -> DateTime<Utc> {
        self.next_reload_time
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.next_reload_time < now
    }

    /// Pushes the deadline out after the server confirmed the list is
    /// still current.
    pub fn update_next_reload_time(&mut self, now: DateTime<Utc>) {
        self.next_reload_time = chrono::Duration::from_std(self.reload_after)
            .ok()
            .and_then(|delta| now.checked_add_signed(delta))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
    }

    pub fn categories(&self) -> Vec<EmojiCategory> {
        self.groups
            .iter()
            .map(|group| EmojiCategory {
                name: group.title.clone(),
                icon_custom_emoji_id: group.icon_custom_emoji_id,
                emojis: group.emojis.clone(),
            })
            .collect()
    }

    // ── Storage ────────────────────────────────────────────────────

    pub fn store(&self, storer: &mut Storer) {
        storer.store_string(&self.used_language_codes);
        storer.store_i32(self.hash);
        store_len(storer, self.groups.len());
        for group in &self.groups {
            storer.store_string(&group.title);
            storer.store_i64(group.icon_custom_emoji_id);
            store_len(storer, group.emojis.len());
            for emoji in &group.emojis {
                storer.store_string(emoji);
            }
        }
    }

    /// Reads a stored list. The reload deadline is not stored, so a parsed
    /// list is expired until the server confirms it.
    pub fn parse(parser: &mut Parser<'_>, reload_after: Duration) -> Result<Self, StorageError> {
        let used_language_codes = parser.parse_string()?;
        let hash = parser.parse_i32()?;
        let group_count = parse_len(parser)?;
        let mut groups = Vec::with_capacity(group_count.min(64));
        for _ in 0..group_count {
            let title = parser.parse_string()?;
            let icon_custom_emoji_id = parser.parse_i64()?;
            let emoji_count = parse_len(parser)?;
            let emojis = (0..emoji_count).map(|_| parser.parse_string()).collect::<Result<_, _>>()?;
            groups.push(EmojiGroup { title, icon_custom_emoji_id, emojis });
        }
        Ok(Self {
            used_language_codes,
            hash,
            groups,
            reload_after,
            next_reload_time: DateTime::<Utc>::MIN_UTC,
        })
    }
}

fn store_len(storer: &mut Storer, len: usize) {
    storer.store_i32(i32::try_from(len).unwrap_or(i32::MAX));
}

fn parse_len(parser: &mut Parser<'_>) -> Result<usize, StorageError> {
    let len = parser.parse_i32()?;
    usize::try_from(len).map_err(|_| StorageError::InvalidValue { what: "length", value: i64::from(len) })
}
