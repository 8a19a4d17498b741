//! Dashboard statistics derived from conversations and favorites.

use std::collections::BTreeSet;

use chrono::{DateTime, Local, LocalResult, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::chat::conversation::Conversation;
use crate::chat::message::{Message, Role};
use crate::core::ids::ConversationId;

/// Aggregate counters shown on the dashboard.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatStats {
    /// Messages across all conversations.
    pub total_messages: usize,
    /// Mean milliseconds between a user message and the assistant reply
    /// that follows it; zero when no pair exists.
    pub average_response_time_ms: f64,
    /// Number of conversations.
    pub total_conversations: usize,
    /// Conversations whose last activity is at or after `day_start`.
    pub active_today: usize,
    /// Size of the favorite set.
    pub favorite_count: usize,
}

/// Recompute statistics from scratch.
///
/// Pure: the same inputs always give the same output.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn compute_stats(
    conversations: &[Conversation],
    favorites: &BTreeSet<ConversationId>,
    day_start: DateTime<Utc>,
) -> ChatStats {
    let mut total_messages = 0;
    let mut total_response_ms: i64 = 0;
    let mut response_count: i64 = 0;
    let mut active_today = 0;

    for conversation in conversations {
        if conversation.last_message_at >= day_start {
            active_today += 1;
        }

        let mut pending_user: Option<&Message> = None;
        for message in &conversation.messages {
            total_messages += 1;
            match message.role() {
                Role::User => pending_user = Some(message),
                Role::Assistant => {
                    if let Some(user) = pending_user.take() {
                        total_response_ms += (message.timestamp() - user.timestamp())
                            .num_milliseconds();
                        response_count += 1;
                    }
                }
            }
        }
    }

    let average_response_time_ms = if response_count > 0 {
        total_response_ms as f64 / response_count as f64
    } else {
        0.0
    };

    ChatStats {
        total_messages,
        average_response_time_ms,
        total_conversations: conversations.len(),
        active_today,
        favorite_count: favorites.len(),
    }
}

/// Start of the local calendar day containing `now`, as UTC.
#[must_use]
pub fn local_day_start(now: DateTime<Utc>) -> DateTime<Utc> {
    let local_date = now.with_timezone(&Local).date_naive();
    match Local.from_local_datetime(&local_date.and_time(NaiveTime::MIN)) {
        LocalResult::Single(start) | LocalResult::Ambiguous(start, _) => start.with_timezone(&Utc),
        // Midnight skipped by a DST jump; fall back to UTC midnight.
        LocalResult::None => local_date.and_time(NaiveTime::MIN).and_utc(),
    }
}

/// Human-readable latency: `"850ms"` below one second, `"1.5s"` above.
#[must_use]
pub fn format_response_time(ms: f64) -> String {
    if ms < 1000.0 {
        format!("{}ms", ms.round())
    } else {
        format!("{:.1}s", ms / 1000.0)
    }
}
