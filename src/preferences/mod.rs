//! User-facing display and behaviour preferences.

pub mod model;
pub mod store;

pub use model::{
    FontSize, InterfacePrefs, InterfaceUpdate, NotificationPrefs, NotificationUpdate,
    Preferences, PreferencesUpdate, PrivacyPrefs, PrivacyUpdate, ThemeMode,
};
pub use store::{PreferencesEvent, PreferencesStore};
