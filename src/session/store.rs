//! Session store: who is signed in.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{RwLock, broadcast};
use tracing::{debug, info};

use crate::core::config::ChatConfig;
use crate::session::identity::{Identity, ProfileUpdate};
use crate::storage::local::{BlobStorage, BlobWriter, StagedBlob, load_or_default};

/// Change notifications published by [`SessionStore`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionEvent {
    /// Identity replaced or edited; `None` means signed out.
    IdentityChanged(Option<Identity>),
    /// Explicit logout.
    LoggedOut,
}

/// Shape of the persisted auth blob.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PersistedSession {
    #[serde(default)]
    user: Option<Identity>,
    #[serde(default)]
    is_authenticated: bool,
}

struct Inner {
    identity: RwLock<Option<Identity>>,
    writer: BlobWriter,
    events: broadcast::Sender<SessionEvent>,
}

/// Handle to the session store. Cloning shares the same state.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<Inner>,
}

impl SessionStore {
    /// Open the store, restoring the last identity from storage.
    #[must_use]
    pub fn open(config: &ChatConfig, storage: Arc<dyn BlobStorage>) -> Self {
        let stored: PersistedSession = load_or_default(storage.as_ref(), &config.storage.auth_key);
        // The flag is derived; trust only the identity itself.
        let identity = stored.user;
        debug!(authenticated = identity.is_some(), "Session store loaded");

        let (events, _) = broadcast::channel(config.chat.event_capacity.max(1));
        Self {
            inner: Arc::new(Inner {
                identity: RwLock::new(identity),
                writer: BlobWriter::new(storage, config.storage.auth_key.clone()),
                events,
            }),
        }
    }

    /// Subscribe to change notifications.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    /// Current identity, if signed in.
    pub async fn identity(&self) -> Option<Identity> {
        self.inner.identity.read().await.clone()
    }

    /// Whether someone is signed in.
    pub async fn is_authenticated(&self) -> bool {
        self.inner.identity.read().await.is_some()
    }

    /// Replace the identity; `None` signs out.
    pub async fn set_identity(&self, identity: Option<Identity>) {
        let staged = {
            let mut guard = self.inner.identity.write().await;
            (*guard).clone_from(&identity);
            self.stage((*guard).as_ref())
        };
        self.inner.writer.commit(staged).await;
        match &identity {
            Some(user) => info!(user_id = %user.id, "Signed in"),
            None => info!("Identity cleared"),
        }
        self.emit(SessionEvent::IdentityChanged(identity));
    }

    /// Merge profile fields into the current identity.
    ///
    /// No-op when signed out; returns true if anything changed.
    pub async fn update_profile(&self, update: ProfileUpdate) -> bool {
        let (updated, staged) = {
            let mut guard = self.inner.identity.write().await;
            let Some(identity) = (*guard).as_mut() else {
                debug!("Ignoring profile update while signed out");
                return false;
            };
            if !identity.apply(update) {
                return false;
            }
            let updated = identity.clone();
            (updated, self.stage((*guard).as_ref()))
        };
        self.inner.writer.commit(staged).await;
        debug!(user_id = %updated.id, "Profile updated");
        self.emit(SessionEvent::IdentityChanged(Some(updated)));
        true
    }

    /// Sign out.
    pub async fn logout(&self) {
        let (was_signed_in, staged) = {
            let mut guard = self.inner.identity.write().await;
            let was_signed_in = guard.take().is_some();
            (was_signed_in, self.stage(None))
        };
        self.inner.writer.commit(staged).await;
        if was_signed_in {
            info!("Logged out");
        }
        self.emit(SessionEvent::LoggedOut);
    }

    fn stage(&self, identity: Option<&Identity>) -> Option<StagedBlob> {
        self.inner.writer.stage(&PersistedSession {
            user: identity.cloned(),
            is_authenticated: identity.is_some(),
        })
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.inner.events.send(event);
    }
}
