//! Message model and delivery status transitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::core::ids::MessageId;

/// Author of a message.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Typed by the signed-in user.
    User,
    /// Produced by the assistant.
    Assistant,
}

impl Role {
    /// Stable string form for storage.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "user" => Ok(Self::User),
            "assistant" => Ok(Self::Assistant),
            _ => Err(value.to_string()),
        }
    }
}

/// Delivery status of a message.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    /// Waiting for the assistant exchange to finish.
    Sending,
    /// Delivered.
    Sent,
    /// Delivery failed; see the message's error text.
    Error,
}

impl MessageStatus {
    /// Stable string form for storage.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sending => "sending",
            Self::Sent => "sent",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One turn in a conversation.
///
/// Content, role and timestamp never change after creation; only the
/// delivery status moves, through the `mark_*` methods.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    id: MessageId,
    content: String,
    role: Role,
    timestamp: DateTime<Utc>,
    status: MessageStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    /// Delivery attempt; bumped by every retry. Not persisted.
    #[serde(skip)]
    attempt: u32,
}

impl Message {
    /// Build a message in the given initial status.
    #[must_use]
    pub fn new(
        id: MessageId,
        content: impl Into<String>,
        role: Role,
        timestamp: DateTime<Utc>,
        status: MessageStatus,
    ) -> Self {
        Self {
            id,
            content: content.into(),
            role,
            timestamp,
            status,
            error: None,
            attempt: 0,
        }
    }

    /// Message identifier.
    #[must_use]
    pub const fn id(&self) -> MessageId {
        self.id
    }

    /// Text content.
    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Author role.
    #[must_use]
    pub const fn role(&self) -> Role {
        self.role
    }

    /// Creation time.
    #[must_use]
    pub const fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Current delivery status.
    #[must_use]
    pub const fn status(&self) -> MessageStatus {
        self.status
    }

    /// Failure description, present only in `Error` status.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Current delivery attempt, starting at 0.
    #[must_use]
    pub const fn attempt(&self) -> u32 {
        self.attempt
    }

    /// `sending -> sent`. Returns false if the message was not sending.
    pub fn mark_sent(&mut self) -> bool {
        if self.status != MessageStatus::Sending {
            return false;
        }
        self.status = MessageStatus::Sent;
        self.error = None;
        true
    }

    /// `sending -> error`. Returns false if the message was not sending.
    pub fn mark_failed(&mut self, reason: impl Into<String>) -> bool {
        if self.status != MessageStatus::Sending {
            return false;
        }
        self.status = MessageStatus::Error;
        self.error = Some(reason.into());
        true
    }

    /// Back to `sending` for an explicit retry, clearing any prior error.
    ///
    /// Starts a new attempt; outcomes of earlier attempts no longer apply.
    /// Returns the new attempt number.
    pub fn mark_sending(&mut self) -> u32 {
        self.status = MessageStatus::Sending;
        self.error = None;
        self.attempt = self.attempt.wrapping_add(1);
        self.attempt
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample(status: MessageStatus) -> Message {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();
        Message::new(MessageId::new(), "hi", Role::User, at, status)
    }

    #[test]
    fn test_role_roundtrip() {
        assert_eq!("assistant".parse::<Role>(), Ok(Role::Assistant));
        assert_eq!(Role::User.to_string(), "user");
        assert!("system".parse::<Role>().is_err());
    }

    #[test]
    fn test_sending_to_sent() {
        let mut message = sample(MessageStatus::Sending);
        assert!(message.mark_sent());
        assert_eq!(message.status(), MessageStatus::Sent);
        assert!(!message.mark_failed("late"));
        assert_eq!(message.status(), MessageStatus::Sent);
    }

    #[test]
    fn test_error_then_retry_clears_reason() {
        let mut message = sample(MessageStatus::Sending);
        assert!(message.mark_failed("Failed to send message"));
        assert_eq!(message.error(), Some("Failed to send message"));
        assert!(!message.mark_sent());

        assert_eq!(message.attempt(), 0);
        assert_eq!(message.mark_sending(), 1);
        assert_eq!(message.status(), MessageStatus::Sending);
        assert_eq!(message.error(), None);
        assert_eq!(message.attempt(), 1);
    }

    #[test]
    fn test_serialized_shape() {
        let message = sample(MessageStatus::Sent);
        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(value["role"], "user");
        assert_eq!(value["status"], "sent");
        assert!(value.get("error").is_none());
        assert!(value.get("attempt").is_none());
    }
}
