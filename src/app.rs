//! Application facade wiring the stores to one storage backend.

use std::sync::Arc;

use tracing::info;

use crate::chat::{ChatStore, Responder, SimulatedResponder};
use crate::core::clock::{Clock, IdSource, RandomIds, SystemClock};
use crate::core::config::ChatConfig;
use crate::core::errors::ChatResult;
use crate::preferences::PreferencesStore;
use crate::session::{DemoAuthenticator, Identity, Registration, SessionStore};
use crate::storage::{BlobStorage, FileStorage};

/// Every store the client needs, sharing one storage backend.
#[derive(Clone)]
pub struct ChatApp {
    /// Conversations, favorites and statistics.
    pub chat: ChatStore,
    /// Signed-in identity.
    pub session: SessionStore,
    /// Display preferences.
    pub preferences: PreferencesStore,
    auth: DemoAuthenticator,
}

impl ChatApp {
    /// Open all stores against `storage`.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid.
    pub fn open(
        config: &ChatConfig,
        storage: Arc<dyn BlobStorage>,
        responder: Arc<dyn Responder>,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdSource>,
    ) -> ChatResult<Self> {
        config.validate()?;
        let app = Self {
            chat: ChatStore::open(config, storage.clone(), responder, clock, ids.clone()),
            session: SessionStore::open(config, storage.clone()),
            preferences: PreferencesStore::open(config, storage),
            auth: DemoAuthenticator::new(ids),
        };
        info!("Chat app opened");
        Ok(app)
    }

    /// Open with file storage under `config.storage.data_dir`, the system
    /// clock, random ids and the simulated responder.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid.
    pub fn with_files(config: &ChatConfig) -> ChatResult<Self> {
        let storage = Arc::new(FileStorage::new(config.storage.data_dir.clone()));
        Self::open(
            config,
            storage,
            Arc::new(SimulatedResponder::new(&config.reply)),
            Arc::new(SystemClock),
            Arc::new(RandomIds),
        )
    }

    /// Demo sign-in; the new identity replaces the current session.
    ///
    /// # Errors
    /// Returns `InvalidCredentials` if the form is rejected.
    pub async fn login(&self, email: &str, password: &str) -> ChatResult<Identity> {
        let identity = self.auth.login(email, password)?;
        self.session.set_identity(Some(identity.clone())).await;
        Ok(identity)
    }

    /// Demo registration; the new identity replaces the current session.
    ///
    /// # Errors
    /// Returns `InvalidCredentials` if the form is rejected.
    pub async fn register(&self, form: &Registration) -> ChatResult<Identity> {
        let identity = self.auth.register(form)?;
        self.session.set_identity(Some(identity.clone())).await;
        Ok(identity)
    }

    /// Sign out. Conversations are kept.
    pub async fn logout(&self) {
        self.session.logout().await;
    }
}
