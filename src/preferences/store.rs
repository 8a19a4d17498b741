//! Preferences store.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{RwLock, broadcast};
use tracing::debug;

use crate::core::config::ChatConfig;
use crate::preferences::model::{Preferences, PreferencesUpdate};
use crate::storage::local::{BlobStorage, BlobWriter, load_or_default};

/// Change notifications published by [`PreferencesStore`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PreferencesEvent {
    /// Preferences after an effective update.
    Updated(Preferences),
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct PersistedPreferences {
    #[serde(default)]
    preferences: Preferences,
}

struct Inner {
    preferences: RwLock<Preferences>,
    writer: BlobWriter,
    events: broadcast::Sender<PreferencesEvent>,
}

/// Handle to the preferences store. Cloning shares the same state.
#[derive(Clone)]
pub struct PreferencesStore {
    inner: Arc<Inner>,
}

impl PreferencesStore {
    /// Open the store; defaults apply on first run.
    #[must_use]
    pub fn open(config: &ChatConfig, storage: Arc<dyn BlobStorage>) -> Self {
        let stored: PersistedPreferences =
            load_or_default(storage.as_ref(), &config.storage.preferences_key);
        let (events, _) = broadcast::channel(config.chat.event_capacity.max(1));
        Self {
            inner: Arc::new(Inner {
                preferences: RwLock::new(stored.preferences),
                writer: BlobWriter::new(storage, config.storage.preferences_key.clone()),
                events,
            }),
        }
    }

    /// Subscribe to change notifications.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<PreferencesEvent> {
        self.inner.events.subscribe()
    }

    /// Current preferences.
    pub async fn preferences(&self) -> Preferences {
        *self.inner.preferences.read().await
    }

    /// Merge a partial update. Returns the resulting preferences.
    pub async fn update_preferences(&self, update: PreferencesUpdate) -> Preferences {
        let (preferences, changed, staged) = {
            let mut guard = self.inner.preferences.write().await;
            let changed = guard.apply(update);
            let staged = if changed {
                self.inner.writer.stage(&PersistedPreferences {
                    preferences: *guard,
                })
            } else {
                None
            };
            (*guard, changed, staged)
        };
        self.inner.writer.commit(staged).await;

        if changed {
            debug!(?preferences, "Preferences updated");
            let _ = self.inner.events.send(PreferencesEvent::Updated(preferences));
        }
        preferences
    }
}
