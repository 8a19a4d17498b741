//! Conversation threads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::chat::message::{Message, Role};
use crate::core::ids::{ConversationId, MessageId};

/// Title of a conversation that has no messages yet.
pub const DEFAULT_TITLE: &str = "New Conversation";

/// Marker appended to titles cut from a longer first message.
pub const TITLE_ELLIPSIS: &str = "...";

/// An ordered thread of messages.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    /// Unique identifier.
    pub id: ConversationId,
    /// Display title.
    pub title: String,
    /// Messages in append order.
    pub messages: Vec<Message>,
    /// Time of the last appended message (creation time while empty).
    pub last_message_at: DateTime<Utc>,
}

impl Conversation {
    /// Create an empty conversation.
    #[must_use]
    pub fn new(id: ConversationId, now: DateTime<Utc>) -> Self {
        Self {
            id,
            title: DEFAULT_TITLE.to_string(),
            messages: Vec::new(),
            last_message_at: now,
        }
    }

    /// Append a message and bump the activity timestamp.
    ///
    /// The first message of an empty conversation names it when it comes
    /// from the user. Returns true when the title changed.
    pub fn append(&mut self, message: Message, title_max_chars: usize) -> bool {
        let names_thread = self.messages.is_empty() && message.role() == Role::User;
        let mut title_changed = false;
        if names_thread {
            let title = derive_title(message.content(), title_max_chars);
            title_changed = title != self.title;
            self.title = title;
        }
        self.last_message_at = message.timestamp();
        self.messages.push(message);
        title_changed
    }

    /// Look up a message.
    #[must_use]
    pub fn message(&self, id: MessageId) -> Option<&Message> {
        self.messages.iter().find(|m| m.id() == id)
    }

    /// Look up a message for a status change.
    pub fn message_mut(&mut self, id: MessageId) -> Option<&mut Message> {
        self.messages.iter_mut().find(|m| m.id() == id)
    }

    /// Replace the title with the trimmed input.
    ///
    /// Empty or unchanged titles are ignored; returns true when applied.
    pub fn rename(&mut self, title: &str) -> bool {
        let trimmed = title.trim();
        if trimmed.is_empty() || trimmed == self.title {
            return false;
        }
        trimmed.clone_into(&mut self.title);
        true
    }

    /// Number of messages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether the thread has no messages.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// Build a title from the first `max_chars` characters of `content`,
/// appending [`TITLE_ELLIPSIS`] only when something was cut.
#[must_use]
pub fn derive_title(content: &str, max_chars: usize) -> String {
    let mut chars = content.chars();
    let mut title: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        title.push_str(TITLE_ELLIPSIS);
    }
    title
}
