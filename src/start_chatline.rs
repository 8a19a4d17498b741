//! Startup helpers for the chatline binary.

use std::path::Path;
use std::process::ExitCode;

use anyhow::Context;
use tracing::{error, info};

use crate::app::ChatApp;
use crate::core::config::ChatConfig;

/// Configuration file read from the working directory when present.
pub const CONFIG_FILE: &str = "chatline.json";

/// Install the global tracing subscriber.
///
/// Honors `RUST_LOG`, defaulting to `info`. Does nothing if a subscriber is
/// already installed.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Open the persisted client state and report what was restored.
///
/// # Returns
/// `ExitCode::SUCCESS` when the state opened, `1` on failure.
#[must_use]
pub fn run() -> ExitCode {
    init_tracing();
    info!("Starting chatline v{}", env!("CARGO_PKG_VERSION"));

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            error!("Failed to create runtime: {e}");
            return ExitCode::from(1);
        }
    };

    if let Err(e) = rt.block_on(bootstrap(Path::new(CONFIG_FILE))) {
        error!("Startup failed: {e:#}");
        return ExitCode::from(1);
    }

    ExitCode::SUCCESS
}

/// Load configuration, open the app and log a summary of restored state.
///
/// # Errors
/// Returns an error if the configuration cannot be loaded or is invalid.
pub async fn bootstrap(config_path: &Path) -> anyhow::Result<ChatApp> {
    let config = ChatConfig::load(config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    info!(data_dir = %config.storage.data_dir.display(), "Configuration loaded");

    let app = ChatApp::with_files(&config).context("opening chat state")?;

    let stats = app.chat.stats().await;
    let user = app.session.identity().await;
    let prefs = app.preferences.preferences().await;
    info!(
        conversations = stats.total_conversations,
        messages = stats.total_messages,
        favorites = stats.favorite_count,
        active_today = stats.active_today,
        signed_in = user.is_some(),
        theme = ?prefs.theme,
        "State restored"
    );

    Ok(app)
}
