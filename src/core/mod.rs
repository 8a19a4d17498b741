//! Core configuration, errors, identifiers and providers.

pub mod clock;
pub mod config;
pub mod errors;
pub mod ids;

pub use clock::{Clock, IdSource, ManualClock, RandomIds, SequentialIds, SystemClock};
pub use config::{ChatConfig, ChatLimits, ReplyConfig, StorageConfig, is_valid_storage_key};
pub use errors::{ChatError, ChatResult};
pub use ids::{ConversationId, MessageId, UserId};
