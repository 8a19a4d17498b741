//! Display, notification, privacy and interface preferences.

use serde::{Deserialize, Serialize};

/// Color scheme selection.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThemeMode {
    /// Always light.
    Light,
    /// Always dark.
    Dark,
    /// Follow the operating system.
    #[default]
    System,
}

impl ThemeMode {
    /// Whether the dark palette applies, given the system preference.
    #[must_use]
    pub const fn is_dark(self, system_prefers_dark: bool) -> bool {
        match self {
            Self::Light => false,
            Self::Dark => true,
            Self::System => system_prefers_dark,
        }
    }
}

/// Message text size.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FontSize {
    /// Compact text.
    Small,
    /// Default text.
    #[default]
    Medium,
    /// Enlarged text.
    Large,
}

/// Notification toggles.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NotificationPrefs {
    /// Notify on new messages.
    pub messages: bool,
    /// Notify on product updates.
    pub updates: bool,
    /// Play sounds.
    pub sounds: bool,
}

impl Default for NotificationPrefs {
    fn default() -> Self {
        Self {
            messages: true,
            updates: true,
            sounds: true,
        }
    }
}

/// Privacy toggles.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PrivacyPrefs {
    /// Show others when you are typing.
    pub share_typing_status: bool,
    /// Show others when you are online.
    pub show_online_status: bool,
    /// Allow anonymous usage data collection.
    pub allow_data_collection: bool,
}

impl Default for PrivacyPrefs {
    fn default() -> Self {
        Self {
            share_typing_status: true,
            show_online_status: true,
            allow_data_collection: false,
        }
    }
}

/// Interface toggles.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InterfacePrefs {
    /// Show timestamps next to messages.
    pub show_timestamps: bool,
    /// Tighter message spacing.
    pub compact_mode: bool,
    /// Animate transitions.
    pub enable_animations: bool,
}

impl Default for InterfacePrefs {
    fn default() -> Self {
        Self {
            show_timestamps: true,
            compact_mode: false,
            enable_animations: true,
        }
    }
}

/// All user-facing preferences. Every field defaults independently.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Preferences {
    /// Color scheme.
    pub theme: ThemeMode,
    /// Text size.
    pub font_size: FontSize,
    /// Notification toggles.
    pub notifications: NotificationPrefs,
    /// Privacy toggles.
    pub privacy: PrivacyPrefs,
    /// Interface toggles.
    pub interface: InterfacePrefs,
}

/// Partial notification edit.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NotificationUpdate {
    /// See [`NotificationPrefs::messages`].
    pub messages: Option<bool>,
    /// See [`NotificationPrefs::updates`].
    pub updates: Option<bool>,
    /// See [`NotificationPrefs::sounds`].
    pub sounds: Option<bool>,
}

/// Partial privacy edit.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PrivacyUpdate {
    /// See [`PrivacyPrefs::share_typing_status`].
    pub share_typing_status: Option<bool>,
    /// See [`PrivacyPrefs::show_online_status`].
    pub show_online_status: Option<bool>,
    /// See [`PrivacyPrefs::allow_data_collection`].
    pub allow_data_collection: Option<bool>,
}

/// Partial interface edit.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InterfaceUpdate {
    /// See [`InterfacePrefs::show_timestamps`].
    pub show_timestamps: Option<bool>,
    /// See [`InterfacePrefs::compact_mode`].
    pub compact_mode: Option<bool>,
    /// See [`InterfacePrefs::enable_animations`].
    pub enable_animations: Option<bool>,
}

/// Partial preferences edit. Group updates merge flag by flag, so setting
/// one flag never resets its siblings.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PreferencesUpdate {
    /// New theme.
    pub theme: Option<ThemeMode>,
    /// New font size.
    pub font_size: Option<FontSize>,
    /// Notification flags to change.
    pub notifications: Option<NotificationUpdate>,
    /// Privacy flags to change.
    pub privacy: Option<PrivacyUpdate>,
    /// Interface flags to change.
    pub interface: Option<InterfaceUpdate>,
}

fn merge_flag(target: &mut bool, value: Option<bool>) {
    if let Some(value) = value {
        *target = value;
    }
}

impl Preferences {
    /// Apply a partial update. Returns true if anything changed.
    pub fn apply(&mut self, update: PreferencesUpdate) -> bool {
        let before = *self;

        if let Some(theme) = update.theme {
            self.theme = theme;
        }
        if let Some(font_size) = update.font_size {
            self.font_size = font_size;
        }
        if let Some(n) = update.notifications {
            merge_flag(&mut self.notifications.messages, n.messages);
            merge_flag(&mut self.notifications.updates, n.updates);
            merge_flag(&mut self.notifications.sounds, n.sounds);
        }
        if let Some(p) = update.privacy {
            merge_flag(&mut self.privacy.share_typing_status, p.share_typing_status);
            merge_flag(&mut self.privacy.show_online_status, p.show_online_status);
            merge_flag(&mut self.privacy.allow_data_collection, p.allow_data_collection);
        }
        if let Some(i) = update.interface {
            merge_flag(&mut self.interface.show_timestamps, i.show_timestamps);
            merge_flag(&mut self.interface.compact_mode, i.compact_mode);
            merge_flag(&mut self.interface.enable_animations, i.enable_animations);
        }

        *self != before
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let prefs = Preferences::default();
        assert_eq!(prefs.theme, ThemeMode::System);
        assert_eq!(prefs.font_size, FontSize::Medium);
        assert!(prefs.notifications.sounds);
        assert!(!prefs.privacy.allow_data_collection);
        assert!(!prefs.interface.compact_mode);
    }

    #[test]
    fn test_group_update_keeps_siblings() {
        let mut prefs = Preferences::default();
        let changed = prefs.apply(PreferencesUpdate {
            notifications: Some(NotificationUpdate {
                sounds: Some(false),
                ..NotificationUpdate::default()
            }),
            ..PreferencesUpdate::default()
        });
        assert!(changed);
        assert!(!prefs.notifications.sounds);
        assert!(prefs.notifications.messages);
        assert!(prefs.notifications.updates);
    }

    #[test]
    fn test_noop_update() {
        let mut prefs = Preferences::default();
        assert!(!prefs.apply(PreferencesUpdate::default()));
        assert!(!prefs.apply(PreferencesUpdate {
            theme: Some(ThemeMode::System),
            ..PreferencesUpdate::default()
        }));
    }

    #[test]
    fn test_theme_resolution() {
        assert!(ThemeMode::Dark.is_dark(false));
        assert!(!ThemeMode::Light.is_dark(true));
        assert!(ThemeMode::System.is_dark(true));
        assert!(!ThemeMode::System.is_dark(false));
    }

    #[test]
    fn test_partial_blob_fills_defaults() {
        let prefs: Preferences =
            serde_json::from_str(r#"{"theme":"dark","privacy":{"allowDataCollection":true}}"#)
                .unwrap();
        assert_eq!(prefs.theme, ThemeMode::Dark);
        assert!(prefs.privacy.allow_data_collection);
        assert!(prefs.privacy.show_online_status);
        assert_eq!(prefs.font_size, FontSize::Medium);
    }
}
