//! Conversation search for the sidebar.

use crate::chat::conversation::Conversation;
use crate::core::ids::ConversationId;

/// Score for a title that starts with the query.
const TITLE_PREFIX_SCORE: u32 = 3;
/// Score for a title containing the query elsewhere.
const TITLE_MATCH_SCORE: u32 = 2;
/// Score added per message containing the query.
const MESSAGE_MATCH_SCORE: u32 = 1;

/// A conversation matched by a search query.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchHit {
    /// Matched conversation.
    pub conversation_id: ConversationId,
    /// Relevance; higher ranks first.
    pub score: u32,
    /// Messages whose content contains the query.
    pub matching_messages: usize,
}

/// Rank conversations against `query` without touching them.
///
/// Matching is case-insensitive. A blank query returns every conversation
/// in its given order with a score of zero. Ties keep the given order.
#[must_use]
pub fn rank_conversations(conversations: &[Conversation], query: &str) -> Vec<SearchHit> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return conversations
            .iter()
            .map(|c| SearchHit {
                conversation_id: c.id,
                score: 0,
                matching_messages: 0,
            })
            .collect();
    }

    let mut hits: Vec<SearchHit> = conversations
        .iter()
        .filter_map(|conversation| score_conversation(conversation, &needle))
        .collect();
    // Stable sort keeps insertion order among equal scores.
    hits.sort_by(|a, b| b.score.cmp(&a.score));
    hits
}

fn score_conversation(conversation: &Conversation, needle: &str) -> Option<SearchHit> {
    let title = conversation.title.to_lowercase();
    let title_score = if title.starts_with(needle) {
        TITLE_PREFIX_SCORE
    } else if title.contains(needle) {
        TITLE_MATCH_SCORE
    } else {
        0
    };

    let matching_messages = conversation
        .messages
        .iter()
        .filter(|m| m.content().to_lowercase().contains(needle))
        .count();

    let message_score = u32::try_from(matching_messages)
        .unwrap_or(u32::MAX)
        .saturating_mul(MESSAGE_MATCH_SCORE);
    let score = title_score.saturating_add(message_score);

    (score > 0).then_some(SearchHit {
        conversation_id: conversation.id,
        score,
        matching_messages,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::message::{Message, MessageStatus, Role};
    use crate::core::ids::MessageId;
    use chrono::Utc;

    fn conversation(title: &str, contents: &[&str]) -> Conversation {
        let mut conv = Conversation::new(ConversationId::new(), Utc::now());
        conv.title = title.to_string();
        for content in contents {
            conv.messages.push(Message::new(
                MessageId::new(),
                *content,
                Role::User,
                Utc::now(),
                MessageStatus::Sent,
            ));
        }
        conv
    }

    #[test]
    fn test_blank_query_returns_all_in_order() {
        let convs = vec![conversation("a", &[]), conversation("b", &[])];
        let hits = rank_conversations(&convs, "   ");
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].conversation_id, convs[0].id);
        assert_eq!(hits[1].conversation_id, convs[1].id);
    }

    #[test]
    fn test_case_insensitive_and_ranked() {
        let convs = vec![
            conversation("Weekend", &["Rust lifetimes?"]),
            conversation("Rust borrow checker", &[]),
            conversation("Cooking", &["pasta"]),
            conversation("Learning rust", &["more RUST", "rust again"]),
        ];
        let hits = rank_conversations(&convs, "RUST");
        let order: Vec<_> = hits.iter().map(|h| h.conversation_id).collect();
        // Learning rust: 2 + 2 = 4, Rust borrow checker: 3, Weekend: 1
        assert_eq!(order, vec![convs[3].id, convs[1].id, convs[0].id]);
        assert_eq!(hits[0].matching_messages, 2);
    }

    #[test]
    fn test_ties_keep_input_order() {
        let convs = vec![
            conversation("one", &["needle"]),
            conversation("two", &["needle"]),
        ];
        let hits = rank_conversations(&convs, "needle");
        assert_eq!(hits[0].conversation_id, convs[0].id);
        assert_eq!(hits[1].conversation_id, convs[1].id);
    }

    #[test]
    fn test_no_match() {
        let convs = vec![conversation("one", &["hello"])];
        assert!(rank_conversations(&convs, "zebra").is_empty());
    }
}
