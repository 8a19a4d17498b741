//! Conversations, messages and the store that owns them.

pub mod conversation;
pub mod message;
pub mod responder;
pub mod search;
pub mod stats;
pub mod store;

pub use conversation::{Conversation, DEFAULT_TITLE, derive_title};
pub use message::{Message, MessageStatus, Role};
pub use responder::{ReplyFuture, Responder, SimulatedResponder};
pub use search::{SearchHit, rank_conversations};
pub use stats::{ChatStats, compute_stats, format_response_time, local_day_start};
pub use store::{ChatEvent, ChatStore, INTERRUPTED_REASON};
