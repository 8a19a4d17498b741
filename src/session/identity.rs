//! Signed-in user record and partial profile updates.

use serde::{Deserialize, Deserializer, Serialize};

use crate::core::ids::UserId;

/// The authenticated user.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    /// User identifier.
    pub id: UserId,
    /// Contact address.
    pub email: String,
    /// Display name.
    pub name: String,
    /// Free-form biography.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    /// Free-form location.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// Avatar URL or data URI.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    /// Whether the email address was confirmed.
    #[serde(default)]
    pub email_verified: bool,
}

impl Identity {
    /// Build a minimal identity.
    #[must_use]
    pub fn new(id: UserId, email: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id,
            email: email.into(),
            name: name.into(),
            bio: None,
            location: None,
            avatar: None,
            email_verified: false,
        }
    }

    /// Merge the fields present in `update`. Returns true if anything changed.
    pub fn apply(&mut self, update: ProfileUpdate) -> bool {
        let before = self.clone();
        if let Some(email) = update.email {
            self.email = email;
        }
        if let Some(name) = update.name {
            self.name = name;
        }
        if let Some(bio) = update.bio {
            self.bio = bio;
        }
        if let Some(location) = update.location {
            self.location = location;
        }
        if let Some(avatar) = update.avatar {
            self.avatar = avatar;
        }
        if let Some(verified) = update.email_verified {
            self.email_verified = verified;
        }
        *self != before
    }
}

/// Partial profile edit; `None` leaves a field untouched.
///
/// The optional profile fields take `Some(None)` to clear them. In JSON an
/// absent key leaves the field alone and `null` clears it.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProfileUpdate {
    /// New email.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// New display name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// New biography, or `Some(None)` to clear it.
    #[serde(deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub bio: Option<Option<String>>,
    /// New location, or `Some(None)` to clear it.
    #[serde(deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub location: Option<Option<String>>,
    /// New avatar, or `Some(None)` to clear it.
    #[serde(deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub avatar: Option<Option<String>>,
    /// New verification flag.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_verified: Option<bool>,
}

/// A key that is present, even as `null`, is an edit.
fn present<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}
