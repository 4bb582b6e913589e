// Local configuration for an embedded msgsync client.
//
// Config file: `~/.msgsync/client.toml`

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root directory for msgsync state: `~/.msgsync/`.
pub fn global_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".msgsync"))
}

/// Path to the client config file: `~/.msgsync/client.toml`.
pub fn config_path() -> Option<PathBuf> {
    global_dir().map(|d| d.join("client.toml"))
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ClientConfig {
    /// Bot accounts never track message owners and drop minithumbnails.
    pub is_bot: bool,
    /// Side length sent for round videos whose dimensions are unknown.
    pub suggested_video_note_length: i32,
    /// Largest side length accepted for round video dimensions.
    pub max_video_note_length: i32,
    /// `tracing` filter used when `RUST_LOG` is unset.
    pub log_filter: String,
    pub emoji_groups_reload_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            is_bot: false,
            suggested_video_note_length: 384,
            max_video_note_length: 640,
            log_filter: "info".into(),
            emoji_groups_reload_secs: 3600,
        }
    }
}

impl ClientConfig {
    /// Load from `~/.msgsync/client.toml`. Returns defaults if the file
    /// doesn't exist or can't be parsed.
    pub fn load() -> Self {
        config_path().and_then(|p| Self::load_from(&p).ok()).unwrap_or_default()
    }

    /// Load from a specific path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        toml::from_str(&contents).map_err(ConfigError::Parse)
    }

    /// Save to a specific path (creates parent directories).
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(ConfigError::Io)?;
        }
        let contents = toml::to_string_pretty(self).map_err(ConfigError::Serialize)?;
        std::fs::write(path, contents).map_err(ConfigError::Io)
    }

    pub fn emoji_groups_reload_interval(&self) -> Duration {
        Duration::from_secs(self.emoji_groups_reload_secs)
    }
}

// ── Errors ─────────────────────────────────────────────────────────

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Serialize(toml::ser::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "config I/O error: {e}"),
            Self::Parse(e) => write!(f, "config parse error: {e}"),
            Self::Serialize(e) => write!(f, "config serialize error: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}
