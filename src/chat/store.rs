//! Conversation store: the owned state behind the chat dashboard.
//!
//! All mutations go through a single `RwLock` and run to completion before
//! the next one is observed. The assistant reply is the only suspension
//! point: the delivery task captures ids, not references, and re-checks
//! that its conversation and message still exist before applying anything.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{RwLock, broadcast};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::chat::conversation::Conversation;
use crate::chat::message::{Message, MessageStatus, Role};
use crate::chat::responder::Responder;
use crate::chat::search::rank_conversations;
use crate::chat::stats::{ChatStats, compute_stats, local_day_start};
use crate::core::clock::{Clock, IdSource};
use crate::core::config::ChatConfig;
use crate::core::ids::{ConversationId, MessageId};
use crate::storage::local::{BlobStorage, BlobWriter, StagedBlob, load_or_default};

/// Error text prefix for failed deliveries.
const SEND_FAILURE_PREFIX: &str = "Failed to send message";

/// Error text for messages still in flight when the process stopped.
pub const INTERRUPTED_REASON: &str = "Interrupted before delivery";

/// Change notifications published by [`ChatStore`].
#[derive(Clone, Debug, PartialEq)]
pub enum ChatEvent {
    /// A conversation was inserted at the front of the list.
    ConversationCreated(ConversationId),
    /// A conversation was removed.
    ConversationDeleted(ConversationId),
    /// The active pointer moved.
    ActiveChanged(Option<ConversationId>),
    /// A message was appended.
    MessageAppended {
        /// Owning conversation.
        conversation_id: ConversationId,
        /// New message.
        message_id: MessageId,
        /// Author of the new message.
        role: Role,
    },
    /// A message's delivery status moved.
    MessageStatusChanged {
        /// Owning conversation.
        conversation_id: ConversationId,
        /// Affected message.
        message_id: MessageId,
        /// New status.
        status: MessageStatus,
    },
    /// A conversation title changed.
    TitleChanged {
        /// Renamed conversation.
        conversation_id: ConversationId,
        /// New title.
        title: String,
    },
    /// Favorite membership changed.
    FavoritesChanged {
        /// Toggled conversation.
        conversation_id: ConversationId,
        /// Membership after the change.
        favorite: bool,
    },
    /// Statistics were recomputed.
    StatsUpdated(ChatStats),
}

/// Shape of the persisted chat blob.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PersistedChat {
    #[serde(default)]
    conversations: Vec<Conversation>,
    #[serde(default)]
    favorites: Vec<ConversationId>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PersistedChatRef<'a> {
    conversations: &'a [Conversation],
    favorites: &'a BTreeSet<ConversationId>,
}

#[derive(Debug, Default)]
struct ChatState {
    conversations: Vec<Conversation>,
    active: Option<ConversationId>,
    favorites: BTreeSet<ConversationId>,
    stats: ChatStats,
}

impl ChatState {
    fn conversation(&self, id: ConversationId) -> Option<&Conversation> {
        self.conversations.iter().find(|c| c.id == id)
    }

    fn conversation_mut(&mut self, id: ConversationId) -> Option<&mut Conversation> {
        self.conversations.iter_mut().find(|c| c.id == id)
    }

    fn contains(&self, id: ConversationId) -> bool {
        self.conversation(id).is_some()
    }

    /// Rebuild state from a stored blob, repairing what a crash or an older
    /// build may have left behind.
    fn rehydrate(stored: PersistedChat) -> Self {
        let mut conversations = stored.conversations;

        let mut interrupted = 0usize;
        for message in conversations.iter_mut().flat_map(|c| c.messages.iter_mut()) {
            if message.mark_failed(INTERRUPTED_REASON) {
                interrupted += 1;
            }
        }

        let known: BTreeSet<ConversationId> = conversations.iter().map(|c| c.id).collect();
        let stored_favorites = stored.favorites.len();
        let favorites: BTreeSet<ConversationId> = stored
            .favorites
            .into_iter()
            .filter(|id| known.contains(id))
            .collect();

        if interrupted > 0 || favorites.len() != stored_favorites {
            warn!(
                interrupted,
                dropped_favorites = stored_favorites.saturating_sub(favorites.len()),
                "Repaired stored chat state"
            );
        }

        Self {
            conversations,
            active: None,
            favorites,
            stats: ChatStats::default(),
        }
    }
}

/// Work captured for one assistant exchange.
struct PendingDelivery {
    conversation_id: ConversationId,
    message_id: MessageId,
    attempt: u32,
    prompt: String,
}

struct Inner {
    state: RwLock<ChatState>,
    responder: Arc<dyn Responder>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdSource>,
    writer: BlobWriter,
    title_max_chars: usize,
    events: broadcast::Sender<ChatEvent>,
}

/// Handle to the conversation store. Cloning shares the same state.
#[derive(Clone)]
pub struct ChatStore {
    inner: Arc<Inner>,
}

impl ChatStore {
    /// Open the store, rehydrating conversations and favorites from storage.
    ///
    /// A missing or unreadable blob yields an empty store.
    #[must_use]
    pub fn open(
        config: &ChatConfig,
        storage: Arc<dyn BlobStorage>,
        responder: Arc<dyn Responder>,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdSource>,
    ) -> Self {
        let stored: PersistedChat = load_or_default(storage.as_ref(), &config.storage.chat_key);
        let mut state = ChatState::rehydrate(stored);
        state.stats = compute_stats(
            &state.conversations,
            &state.favorites,
            local_day_start(clock.now()),
        );
        info!(
            conversations = state.conversations.len(),
            favorites = state.favorites.len(),
            "Chat store loaded"
        );

        let (events, _) = broadcast::channel(config.chat.event_capacity.max(1));
        Self {
            inner: Arc::new(Inner {
                state: RwLock::new(state),
                responder,
                clock,
                ids,
                writer: BlobWriter::new(storage, config.storage.chat_key.clone()),
                title_max_chars: config.chat.title_max_chars,
                events,
            }),
        }
    }

    /// Subscribe to change notifications.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ChatEvent> {
        self.inner.events.subscribe()
    }

    /// All conversations, most recently created first.
    pub async fn conversations(&self) -> Vec<Conversation> {
        self.inner.state.read().await.conversations.clone()
    }

    /// One conversation by id.
    pub async fn conversation(&self, id: ConversationId) -> Option<Conversation> {
        self.inner.state.read().await.conversation(id).cloned()
    }

    /// Active conversation pointer; may be stale.
    pub async fn active_conversation_id(&self) -> Option<ConversationId> {
        self.inner.state.read().await.active
    }

    /// The active conversation, if the pointer resolves.
    pub async fn active_conversation(&self) -> Option<Conversation> {
        let state = self.inner.state.read().await;
        state.active.and_then(|id| state.conversation(id).cloned())
    }

    /// Favorite conversation ids.
    pub async fn favorites(&self) -> BTreeSet<ConversationId> {
        self.inner.state.read().await.favorites.clone()
    }

    /// Whether `id` is a favorite.
    pub async fn is_favorite(&self, id: ConversationId) -> bool {
        self.inner.state.read().await.favorites.contains(&id)
    }

    /// Last computed statistics.
    pub async fn stats(&self) -> ChatStats {
        self.inner.state.read().await.stats.clone()
    }

    /// Insert an empty conversation at the front and make it active.
    pub async fn create_conversation(&self) -> ConversationId {
        let id = ConversationId::from_uuid(self.inner.ids.next_uuid());
        let now = self.inner.clock.now();
        let staged = {
            let mut state = self.inner.state.write().await;
            state.conversations.insert(0, Conversation::new(id, now));
            state.active = Some(id);
            self.stage(&state)
        };
        self.inner.writer.commit(staged).await;
        info!(conversation_id = %id, "Created conversation");
        self.emit(ChatEvent::ConversationCreated(id));
        self.emit(ChatEvent::ActiveChanged(Some(id)));
        self.update_stats().await;
        id
    }

    /// Point the dashboard at `id` without checking that it exists.
    pub async fn set_active_conversation(&self, id: ConversationId) {
        let changed = {
            let mut state = self.inner.state.write().await;
            let changed = state.active != Some(id);
            state.active = Some(id);
            changed
        };
        if changed {
            debug!(conversation_id = %id, "Active conversation changed");
            self.emit(ChatEvent::ActiveChanged(Some(id)));
        }
    }

    /// Append a message and, for user messages, run the assistant exchange
    /// to completion.
    ///
    /// Returns the new message id, or `None` when the conversation does not
    /// exist.
    pub async fn add_message(
        &self,
        conversation_id: ConversationId,
        content: impl Into<String>,
        role: Role,
    ) -> Option<MessageId> {
        let (message_id, pending) = self.append(conversation_id, content.into(), role).await?;
        if let Some(pending) = pending {
            self.deliver(pending).await;
        }
        Some(message_id)
    }

    /// Append a user message and run the assistant exchange in the
    /// background.
    ///
    /// The returned handle completes once the reply (or failure) has been
    /// applied; dropping it does not cancel the exchange.
    pub async fn send_message(
        &self,
        conversation_id: ConversationId,
        content: impl Into<String>,
    ) -> Option<(MessageId, JoinHandle<()>)> {
        let (message_id, pending) = self
            .append(conversation_id, content.into(), Role::User)
            .await?;
        let store = self.clone();
        let handle = tokio::spawn(async move {
            if let Some(pending) = pending {
                store.deliver(pending).await;
            }
        });
        Some((message_id, handle))
    }

    /// Re-run delivery for a message with its original content.
    ///
    /// Returns false when the conversation or message does not exist, or
    /// when the message is not a user message (assistant messages have no
    /// delivery to repeat).
    pub async fn retry_message(
        &self,
        conversation_id: ConversationId,
        message_id: MessageId,
    ) -> bool {
        let (pending, staged) = {
            let mut state = self.inner.state.write().await;
            let Some(message) = state
                .conversation_mut(conversation_id)
                .and_then(|c| c.message_mut(message_id))
            else {
                debug!(%conversation_id, %message_id, "Retry target not found");
                return false;
            };
            if message.role() != Role::User {
                debug!(%message_id, "Ignoring retry of assistant message");
                return false;
            }
            let attempt = message.mark_sending();
            let pending = PendingDelivery {
                conversation_id,
                message_id,
                attempt,
                prompt: message.content().to_string(),
            };
            (pending, self.stage(&state))
        };
        self.inner.writer.commit(staged).await;

        info!(%conversation_id, %message_id, "Retrying message");
        self.emit(ChatEvent::MessageStatusChanged {
            conversation_id,
            message_id,
            status: MessageStatus::Sending,
        });
        self.deliver(pending).await;
        true
    }

    /// Rename a conversation. Blank or unchanged titles are ignored.
    pub async fn update_conversation_title(&self, id: ConversationId, title: &str) -> bool {
        let (renamed, staged) = {
            let mut state = self.inner.state.write().await;
            let renamed = match state.conversation_mut(id) {
                Some(conversation) => conversation
                    .rename(title)
                    .then(|| conversation.title.clone()),
                None => None,
            };
            let staged = if renamed.is_some() {
                self.stage(&state)
            } else {
                None
            };
            (renamed, staged)
        };
        self.inner.writer.commit(staged).await;

        match renamed {
            Some(title) => {
                debug!(conversation_id = %id, %title, "Renamed conversation");
                self.emit(ChatEvent::TitleChanged {
                    conversation_id: id,
                    title,
                });
                true
            }
            None => false,
        }
    }

    /// Remove a conversation and its favorite mark.
    ///
    /// If it was active, the first remaining conversation becomes active.
    /// Returns false when nothing was removed.
    pub async fn delete_conversation(&self, id: ConversationId) -> bool {
        let (removed, active_change, staged) = {
            let mut state = self.inner.state.write().await;
            let before = state.conversations.len();
            state.conversations.retain(|c| c.id != id);
            let removed = state.conversations.len() != before;
            let unfavorited = state.favorites.remove(&id);

            let mut active_change = None;
            if removed && state.active == Some(id) {
                state.active = state.conversations.first().map(|c| c.id);
                active_change = Some(state.active);
            }

            if !removed && !unfavorited {
                debug!(conversation_id = %id, "Delete target not found");
                return false;
            }
            (removed, active_change, self.stage(&state))
        };
        self.inner.writer.commit(staged).await;

        if removed {
            info!(conversation_id = %id, "Deleted conversation");
            self.emit(ChatEvent::ConversationDeleted(id));
        }
        if let Some(active) = active_change {
            self.emit(ChatEvent::ActiveChanged(active));
        }
        self.update_stats().await;
        true
    }

    /// Flip favorite membership of `id`.
    ///
    /// Marking an unknown conversation is a no-op (returns `None`);
    /// unmarking always succeeds. Returns the membership after the change.
    pub async fn toggle_favorite(&self, id: ConversationId) -> Option<bool> {
        let (favorite, staged) = {
            let mut state = self.inner.state.write().await;
            let favorite = if state.favorites.remove(&id) {
                false
            } else if state.contains(id) {
                state.favorites.insert(id);
                true
            } else {
                debug!(conversation_id = %id, "Cannot favorite unknown conversation");
                return None;
            };
            (favorite, self.stage(&state))
        };
        self.inner.writer.commit(staged).await;

        self.emit(ChatEvent::FavoritesChanged {
            conversation_id: id,
            favorite,
        });
        self.update_stats().await;
        Some(favorite)
    }

    /// Conversations matching `query`, best match first.
    ///
    /// View-only: works on a copy and never changes stored data.
    pub async fn search_conversations(&self, query: &str) -> Vec<Conversation> {
        let state = self.inner.state.read().await;
        rank_conversations(&state.conversations, query)
            .into_iter()
            .filter_map(|hit| state.conversation(hit.conversation_id).cloned())
            .collect()
    }

    /// Recompute statistics from current conversations and favorites.
    pub async fn update_stats(&self) -> ChatStats {
        let day_start = local_day_start(self.inner.clock.now());
        let stats = {
            let mut state = self.inner.state.write().await;
            let stats = compute_stats(&state.conversations, &state.favorites, day_start);
            state.stats = stats.clone();
            stats
        };
        self.emit(ChatEvent::StatsUpdated(stats.clone()));
        stats
    }

    async fn append(
        &self,
        conversation_id: ConversationId,
        content: String,
        role: Role,
    ) -> Option<(MessageId, Option<PendingDelivery>)> {
        let message_id = MessageId::from_uuid(self.inner.ids.next_uuid());
        let now = self.inner.clock.now();
        // Assistant messages have nothing to deliver.
        let status = match role {
            Role::User => MessageStatus::Sending,
            Role::Assistant => MessageStatus::Sent,
        };
        let pending = (role == Role::User).then(|| PendingDelivery {
            conversation_id,
            message_id,
            attempt: 0,
            prompt: content.clone(),
        });

        let (new_title, staged) = {
            let mut state = self.inner.state.write().await;
            let Some(conversation) = state.conversation_mut(conversation_id) else {
                debug!(%conversation_id, "Cannot append to unknown conversation");
                return None;
            };
            let message = Message::new(message_id, content, role, now, status);
            let new_title = conversation
                .append(message, self.inner.title_max_chars)
                .then(|| conversation.title.clone());
            (new_title, self.stage(&state))
        };
        self.inner.writer.commit(staged).await;

        self.emit(ChatEvent::MessageAppended {
            conversation_id,
            message_id,
            role,
        });
        if let Some(title) = new_title {
            self.emit(ChatEvent::TitleChanged {
                conversation_id,
                title,
            });
        }
        self.update_stats().await;
        Some((message_id, pending))
    }

    /// Run one assistant exchange and apply its outcome atomically.
    async fn deliver(&self, pending: PendingDelivery) {
        let PendingDelivery {
            conversation_id,
            message_id,
            attempt,
            prompt,
        } = pending;
        let outcome = self.inner.responder.reply(&prompt).await;

        let mut events = Vec::new();
        let staged = {
            let mut state = self.inner.state.write().await;
            let reply_id = MessageId::from_uuid(self.inner.ids.next_uuid());
            let now = self.inner.clock.now();
            let title_max_chars = self.inner.title_max_chars;

            let Some(conversation) = state.conversation_mut(conversation_id) else {
                debug!(%conversation_id, "Conversation deleted before reply landed, discarding");
                return;
            };
            let Some(message) = conversation.message_mut(message_id) else {
                debug!(%message_id, "Message gone before reply landed, discarding");
                return;
            };
            if message.attempt() != attempt || message.status() != MessageStatus::Sending {
                debug!(
                    %message_id,
                    attempt,
                    current_attempt = message.attempt(),
                    status = %message.status(),
                    "Stale delivery, discarding"
                );
                return;
            }

            match outcome {
                Ok(reply) => {
                    message.mark_sent();
                    conversation.append(
                        Message::new(reply_id, reply, Role::Assistant, now, MessageStatus::Sent),
                        title_max_chars,
                    );
                    events.push(ChatEvent::MessageStatusChanged {
                        conversation_id,
                        message_id,
                        status: MessageStatus::Sent,
                    });
                    events.push(ChatEvent::MessageAppended {
                        conversation_id,
                        message_id: reply_id,
                        role: Role::Assistant,
                    });
                }
                Err(err) => {
                    warn!(%conversation_id, %message_id, ?err, "Message delivery failed");
                    message.mark_failed(format!("{SEND_FAILURE_PREFIX}: {err}"));
                    events.push(ChatEvent::MessageStatusChanged {
                        conversation_id,
                        message_id,
                        status: MessageStatus::Error,
                    });
                }
            }
            self.stage(&state)
        };
        self.inner.writer.commit(staged).await;

        for event in events {
            self.emit(event);
        }
        self.update_stats().await;
    }

    /// Snapshot for persistence; call with the state lock held.
    fn stage(&self, state: &ChatState) -> Option<StagedBlob> {
        self.inner.writer.stage(&PersistedChatRef {
            conversations: &state.conversations,
            favorites: &state.favorites,
        })
    }

    fn emit(&self, event: ChatEvent) {
        // No subscribers is fine.
        let _ = self.inner.events.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::conversation::DEFAULT_TITLE;
    use crate::chat::responder::{ReplyFuture, SimulatedResponder};
    use crate::core::clock::{ManualClock, SequentialIds};
    use crate::core::config::ReplyConfig;
    use crate::core::errors::ChatError;
    use crate::storage::local::MemoryStorage;
    use chrono::{Duration, TimeZone, Utc};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tokio::sync::Notify;

    const REPLY: &str = "I'm an AI assistant. This is a simulated response.";

    fn test_config() -> ChatConfig {
        let mut config = ChatConfig::default();
        config.reply = ReplyConfig {
            delay_ms: 0,
            text: REPLY.to_string(),
        };
        config
    }

    fn clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::new(Utc::now()))
    }

    fn open_with(
        storage: Arc<MemoryStorage>,
        responder: Arc<dyn Responder>,
        clock: Arc<ManualClock>,
    ) -> ChatStore {
        ChatStore::open(
            &test_config(),
            storage,
            responder,
            clock,
            Arc::new(SequentialIds::new()),
        )
    }

    fn open_store() -> ChatStore {
        let responder = Arc::new(SimulatedResponder::new(&test_config().reply));
        open_with(Arc::new(MemoryStorage::new()), responder, clock())
    }

    /// Fails until told otherwise.
    struct FlakyResponder {
        fail: AtomicBool,
    }

    impl Responder for FlakyResponder {
        fn reply(&self, _prompt: &str) -> ReplyFuture<'_> {
            Box::pin(async move {
                if self.fail.load(Ordering::SeqCst) {
                    Err(ChatError::DeliveryFailed("network unreachable".to_string()))
                } else {
                    Ok(REPLY.to_string())
                }
            })
        }
    }

    /// Holds every reply until released.
    struct GatedResponder {
        entered: Notify,
        release: Notify,
    }

    impl Responder for GatedResponder {
        fn reply(&self, _prompt: &str) -> ReplyFuture<'_> {
            Box::pin(async move {
                self.entered.notify_one();
                self.release.notified().await;
                Ok(REPLY.to_string())
            })
        }
    }

    #[tokio::test]
    async fn test_create_inserts_at_front_and_activates() {
        let store = open_store();
        let first = store.create_conversation().await;
        let second = store.create_conversation().await;

        let conversations = store.conversations().await;
        assert_eq!(conversations[0].id, second);
        assert_eq!(conversations[1].id, first);
        assert_eq!(conversations[0].title, DEFAULT_TITLE);
        assert_eq!(store.active_conversation_id().await, Some(second));
        assert_eq!(store.stats().await.total_conversations, 2);
    }

    #[tokio::test]
    async fn test_hello_scenario() {
        let store = open_store();
        let c1 = store.create_conversation().await;

        let message_id = store.add_message(c1, "Hello", Role::User).await.unwrap();

        let conversation = store.conversation(c1).await.unwrap();
        assert_eq!(conversation.title, "Hello");
        assert_eq!(conversation.messages.len(), 2);
        assert_eq!(conversation.messages[0].id(), message_id);
        assert_eq!(conversation.messages[0].status(), MessageStatus::Sent);
        assert_eq!(conversation.messages[1].role(), Role::Assistant);
        assert_eq!(conversation.messages[1].content(), REPLY);
        assert_eq!(store.stats().await.total_messages, 2);

        assert_eq!(store.toggle_favorite(c1).await, Some(true));
        assert!(store.delete_conversation(c1).await);
        assert!(store.favorites().await.is_empty());
        assert_eq!(store.active_conversation_id().await, None);
        assert_eq!(store.stats().await, ChatStats::default());
    }

    #[tokio::test]
    async fn test_message_is_sending_until_reply_lands() {
        let gate = Arc::new(GatedResponder {
            entered: Notify::new(),
            release: Notify::new(),
        });
        let store = open_with(Arc::new(MemoryStorage::new()), gate.clone(), clock());
        let c1 = store.create_conversation().await;

        let (message_id, handle) = store.send_message(c1, "Hello").await.unwrap();
        gate.entered.notified().await;

        let conversation = store.conversation(c1).await.unwrap();
        assert_eq!(conversation.messages.len(), 1);
        assert_eq!(conversation.messages[0].status(), MessageStatus::Sending);

        gate.release.notify_one();
        handle.await.unwrap();

        let conversation = store.conversation(c1).await.unwrap();
        assert_eq!(conversation.messages.len(), 2);
        assert_eq!(
            conversation.message(message_id).unwrap().status(),
            MessageStatus::Sent
        );
    }

    #[tokio::test]
    async fn test_reply_for_deleted_conversation_is_discarded() {
        let gate = Arc::new(GatedResponder {
            entered: Notify::new(),
            release: Notify::new(),
        });
        let store = open_with(Arc::new(MemoryStorage::new()), gate.clone(), clock());
        let keep = store.create_conversation().await;
        let doomed = store.create_conversation().await;

        let (_, handle) = store.send_message(doomed, "Hi").await.unwrap();
        gate.entered.notified().await;
        assert!(store.delete_conversation(doomed).await);
        assert_eq!(store.active_conversation_id().await, Some(keep));

        gate.release.notify_one();
        handle.await.unwrap();

        let conversations = store.conversations().await;
        assert_eq!(conversations.len(), 1);
        assert!(conversations[0].messages.is_empty());
        assert_eq!(store.stats().await.total_messages, 0);
    }

    #[tokio::test]
    async fn test_failure_then_retry() {
        let responder = Arc::new(FlakyResponder {
            fail: AtomicBool::new(true),
        });
        let store = open_with(Arc::new(MemoryStorage::new()), responder.clone(), clock());
        let c1 = store.create_conversation().await;

        let message_id = store.add_message(c1, "Hello", Role::User).await.unwrap();
        let conversation = store.conversation(c1).await.unwrap();
        assert_eq!(conversation.messages.len(), 1);
        let failed = conversation.message(message_id).unwrap();
        assert_eq!(failed.status(), MessageStatus::Error);
        assert!(failed.error().unwrap().starts_with("Failed to send message"));

        responder.fail.store(false, Ordering::SeqCst);
        assert!(store.retry_message(c1, message_id).await);

        let conversation = store.conversation(c1).await.unwrap();
        assert_eq!(conversation.messages.len(), 2);
        assert_eq!(conversation.messages[0].id(), message_id);
        assert_eq!(conversation.messages[0].content(), "Hello");
        assert_eq!(conversation.messages[0].status(), MessageStatus::Sent);
        assert_eq!(conversation.messages[0].error(), None);
        assert_eq!(conversation.messages[1].role(), Role::Assistant);
        assert_eq!(conversation.title, "Hello");
    }

    /// First call fails, every later call succeeds; each call waits for its
    /// own release.
    struct TwoAttemptResponder {
        calls: AtomicUsize,
        entered: Notify,
        release_first: Notify,
        release_later: Notify,
    }

    impl Responder for TwoAttemptResponder {
        fn reply(&self, _prompt: &str) -> ReplyFuture<'_> {
            Box::pin(async move {
                let call = self.calls.fetch_add(1, Ordering::SeqCst);
                self.entered.notify_one();
                if call == 0 {
                    self.release_first.notified().await;
                    Err(ChatError::DeliveryFailed("boom".to_string()))
                } else {
                    self.release_later.notified().await;
                    Ok(REPLY.to_string())
                }
            })
        }
    }

    #[tokio::test]
    async fn test_retry_during_flight_ignores_earlier_outcome() {
        let responder = Arc::new(TwoAttemptResponder {
            calls: AtomicUsize::new(0),
            entered: Notify::new(),
            release_first: Notify::new(),
            release_later: Notify::new(),
        });
        let store = open_with(Arc::new(MemoryStorage::new()), responder.clone(), clock());
        let c1 = store.create_conversation().await;

        let (message_id, first) = store.send_message(c1, "Hello").await.unwrap();
        responder.entered.notified().await;

        let retry = tokio::spawn({
            let store = store.clone();
            async move { store.retry_message(c1, message_id).await }
        });
        responder.entered.notified().await;

        // The first attempt fails after the retry started: it must not land.
        responder.release_first.notify_one();
        first.await.unwrap();
        let conversation = store.conversation(c1).await.unwrap();
        let message = conversation.message(message_id).unwrap();
        assert_eq!(message.status(), MessageStatus::Sending);
        assert_eq!(message.error(), None);

        responder.release_later.notify_one();
        assert!(retry.await.unwrap());

        let conversation = store.conversation(c1).await.unwrap();
        assert_eq!(conversation.messages.len(), 2);
        assert_eq!(
            conversation.message(message_id).unwrap().status(),
            MessageStatus::Sent
        );
        assert_eq!(conversation.messages[1].role(), Role::Assistant);
        assert_eq!(conversation.messages[1].content(), REPLY);
    }

    #[tokio::test]
    async fn test_retry_unknown_message_is_noop() {
        let store = open_store();
        let c1 = store.create_conversation().await;
        assert!(!store.retry_message(c1, MessageId::new()).await);
        assert!(!store.retry_message(ConversationId::new(), MessageId::new()).await);
    }

    #[tokio::test]
    async fn test_title_only_set_by_first_message() {
        let store = open_store();
        let c1 = store.create_conversation().await;
        let long = "x".repeat(80);
        store.add_message(c1, long.as_str(), Role::User).await;
        store.add_message(c1, "second", Role::User).await;

        let conversation = store.conversation(c1).await.unwrap();
        assert_eq!(conversation.title, format!("{}...", "x".repeat(50)));
        assert_eq!(conversation.messages.len(), 4);
    }

    #[tokio::test]
    async fn test_assistant_message_has_no_exchange() {
        let store = open_store();
        let c1 = store.create_conversation().await;
        store.add_message(c1, "Welcome back", Role::Assistant).await;

        let conversation = store.conversation(c1).await.unwrap();
        assert_eq!(conversation.messages.len(), 1);
        assert_eq!(conversation.messages[0].status(), MessageStatus::Sent);
        assert_eq!(conversation.title, DEFAULT_TITLE);
    }

    #[tokio::test]
    async fn test_add_to_unknown_conversation() {
        let store = open_store();
        assert!(
            store
                .add_message(ConversationId::new(), "lost", Role::User)
                .await
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_rename() {
        let store = open_store();
        let c1 = store.create_conversation().await;
        assert!(!store.update_conversation_title(c1, "   ").await);
        assert!(store.update_conversation_title(c1, " Plans ").await);
        assert!(!store.update_conversation_title(c1, "Plans").await);
        assert_eq!(store.conversation(c1).await.unwrap().title, "Plans");
        assert!(!store.update_conversation_title(ConversationId::new(), "x").await);
    }

    #[tokio::test]
    async fn test_active_pointer_stays_valid_across_deletes() {
        let store = open_store();
        let a = store.create_conversation().await;
        let b = store.create_conversation().await;
        let c = store.create_conversation().await;

        store.set_active_conversation(b).await;
        assert!(store.delete_conversation(b).await);
        assert_eq!(store.active_conversation_id().await, Some(c));

        assert!(store.delete_conversation(a).await);
        assert_eq!(store.active_conversation_id().await, Some(c));

        assert!(store.delete_conversation(c).await);
        assert_eq!(store.active_conversation_id().await, None);
        assert!(!store.delete_conversation(c).await);
    }

    #[tokio::test]
    async fn test_set_active_does_not_validate() {
        let store = open_store();
        let stale = ConversationId::new();
        store.set_active_conversation(stale).await;
        assert_eq!(store.active_conversation_id().await, Some(stale));
        assert!(store.active_conversation().await.is_none());
    }

    #[tokio::test]
    async fn test_toggle_favorite() {
        let store = open_store();
        let c1 = store.create_conversation().await;
        assert_eq!(store.toggle_favorite(c1).await, Some(true));
        assert_eq!(store.stats().await.favorite_count, 1);
        assert_eq!(store.toggle_favorite(c1).await, Some(false));
        assert_eq!(store.stats().await.favorite_count, 0);
        assert_eq!(store.toggle_favorite(ConversationId::new()).await, None);
    }

    #[tokio::test]
    async fn test_search_does_not_mutate() {
        let store = open_store();
        let cooking = store.create_conversation().await;
        store.add_message(cooking, "Pasta recipes", Role::User).await;
        let rust = store.create_conversation().await;
        store.add_message(rust, "Rust lifetimes", Role::User).await;

        let before = store.conversations().await;
        let hits = store.search_conversations("PASTA").await;
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, cooking);
        assert_eq!(store.search_conversations("").await.len(), 2);
        assert_eq!(store.conversations().await, before);
    }

    #[tokio::test]
    async fn test_stats_idempotent_and_latency() {
        let clock = clock();
        let responder = Arc::new(SimulatedResponder::new(&test_config().reply));
        let store = open_with(Arc::new(MemoryStorage::new()), responder, clock.clone());
        let c1 = store.create_conversation().await;
        store.add_message(c1, "Hello", Role::User).await;

        let first = store.update_stats().await;
        let second = store.update_stats().await;
        assert_eq!(first, second);
        assert_eq!(first.active_today, 1);
        assert!(first.average_response_time_ms.abs() < f64::EPSILON);

        clock.advance(Duration::days(3));
        assert_eq!(store.update_stats().await.active_today, 0);
    }

    #[tokio::test]
    async fn test_events_published() {
        let store = open_store();
        let mut events = store.subscribe();
        let c1 = store.create_conversation().await;
        assert_eq!(events.recv().await.unwrap(), ChatEvent::ConversationCreated(c1));
        assert_eq!(events.recv().await.unwrap(), ChatEvent::ActiveChanged(Some(c1)));
        assert!(matches!(events.recv().await.unwrap(), ChatEvent::StatsUpdated(_)));
    }

    #[tokio::test]
    async fn test_rehydrate_from_storage() {
        let storage = Arc::new(MemoryStorage::new());
        let responder: Arc<dyn Responder> =
            Arc::new(SimulatedResponder::new(&test_config().reply));
        let (c1, c2) = {
            let store = open_with(storage.clone(), responder.clone(), clock());
            let c1 = store.create_conversation().await;
            store.add_message(c1, "Persist me", Role::User).await;
            let c2 = store.create_conversation().await;
            store.toggle_favorite(c1).await;
            (c1, c2)
        };

        let reopened = open_with(storage, responder, clock());
        let conversations = reopened.conversations().await;
        assert_eq!(conversations.len(), 2);
        assert_eq!(conversations[0].id, c2);
        assert_eq!(conversations[1].title, "Persist me");
        assert!(reopened.is_favorite(c1).await);
        assert_eq!(reopened.active_conversation_id().await, None);
        assert_eq!(reopened.stats().await.total_messages, 2);
    }

    #[tokio::test]
    async fn test_rehydrate_repairs_state() {
        let storage = Arc::new(MemoryStorage::new());
        let at = Utc.with_ymd_and_hms(2024, 2, 2, 12, 0, 0).unwrap();
        let id = ConversationId::new();
        let message_id = MessageId::new();
        let mut conversation = Conversation::new(id, at);
        conversation.append(
            Message::new(message_id, "half sent", Role::User, at, MessageStatus::Sending),
            50,
        );
        let blob = serde_json::json!({
            "conversations": [conversation],
            "favorites": [id, ConversationId::new()],
        });
        storage
            .save(&test_config().storage.chat_key, &blob.to_string())
            .unwrap();

        let responder = Arc::new(SimulatedResponder::new(&test_config().reply));
        let store = open_with(storage, responder, clock());
        let restored = store.conversation(id).await.unwrap();
        let message = restored.message(message_id).unwrap();
        assert_eq!(message.status(), MessageStatus::Error);
        assert_eq!(message.error(), Some(INTERRUPTED_REASON));
        assert_eq!(store.favorites().await.len(), 1);

        assert!(store.retry_message(id, message_id).await);
        assert_eq!(store.conversation(id).await.unwrap().messages.len(), 2);
    }
}
