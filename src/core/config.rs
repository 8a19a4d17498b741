//! Configuration for the chat client core.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::errors::{ChatError, ChatResult};

/// Top-level configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Where persisted blobs live.
    pub storage: StorageConfig,
    /// Simulated assistant behaviour.
    pub reply: ReplyConfig,
    /// Conversation limits.
    pub chat: ChatLimits,
}

impl ChatConfig {
    /// Load configuration from a JSON file, falling back to defaults when the
    /// file does not exist.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, is not valid JSON, or
    /// fails validation.
    pub fn load(path: &Path) -> ChatResult<Self> {
        let config = match std::fs::read_to_string(path) {
            Ok(raw) => serde_json::from_str::<Self>(&raw)?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Self::default(),
            Err(err) => return Err(err.into()),
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration invariants.
    ///
    /// # Errors
    /// Returns an error if any values are out of range or invalid.
    pub fn validate(&self) -> ChatResult<()> {
        if self.chat.title_max_chars == 0 {
            return Err(ChatError::InvalidConfig(
                "chat.title_max_chars must be > 0".to_string(),
            ));
        }

        if self.chat.event_capacity == 0 {
            return Err(ChatError::InvalidConfig(
                "chat.event_capacity must be > 0".to_string(),
            ));
        }

        if self.reply.text.trim().is_empty() {
            return Err(ChatError::InvalidConfig(
                "reply.text must not be empty".to_string(),
            ));
        }

        for (name, key) in [
            ("chat_key", &self.storage.chat_key),
            ("preferences_key", &self.storage.preferences_key),
            ("auth_key", &self.storage.auth_key),
        ] {
            if !is_valid_storage_key(key) {
                return Err(ChatError::InvalidConfig(format!(
                    "storage.{name} must be a non-empty name without path separators, got {key:?}"
                )));
            }
        }

        Ok(())
    }
}

/// A storage key is used as a file stem, so it must stay a plain name.
#[must_use]
pub fn is_valid_storage_key(key: &str) -> bool {
    !key.is_empty() && key != "." && key != ".." && !key.contains(['/', '\\'])
}

/// Storage settings for persisted state.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding one JSON file per key.
    pub data_dir: PathBuf,
    /// Key for conversations and favorites.
    pub chat_key: String,
    /// Key for display preferences.
    pub preferences_key: String,
    /// Key for the signed-in identity.
    pub auth_key: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("chatline-data"),
            chat_key: "chat-storage".to_string(),
            preferences_key: "preferences-storage".to_string(),
            auth_key: "auth-storage".to_string(),
        }
    }
}

/// Simulated assistant settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplyConfig {
    /// Latency before the reply lands, in milliseconds.
    pub delay_ms: u64,
    /// Fixed reply text.
    pub text: String,
}

impl ReplyConfig {
    /// Reply latency as a `Duration`.
    #[must_use]
    pub const fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

impl Default for ReplyConfig {
    fn default() -> Self {
        Self {
            delay_ms: 1000,
            text: "I'm an AI assistant. This is a simulated response.".to_string(),
        }
    }
}

/// Conversation limits.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatLimits {
    /// Characters of the first user message kept as the derived title.
    pub title_max_chars: usize,
    /// Buffer size of each store's event channel.
    pub event_capacity: usize,
}

impl Default for ChatLimits {
    fn default() -> Self {
        Self {
            title_max_chars: 50,
            event_capacity: 256,
        }
    }
}
