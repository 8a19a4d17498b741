//! Demo-mode sign-in and registration.
//!
//! Any non-blank email and password is accepted; there is no account
//! database behind this and credentials are not validated.

use std::sync::Arc;

use crate::core::clock::IdSource;
use crate::core::errors::{ChatError, ChatResult};
use crate::core::ids::UserId;
use crate::session::identity::Identity;

/// Display name given to demo logins.
pub const DEMO_NAME: &str = "Demo User";
/// Bio given to demo logins.
pub const DEMO_BIO: &str = "AI enthusiast and tech explorer";
/// Location given to demo logins.
pub const DEMO_LOCATION: &str = "San Francisco, CA";
/// Avatar given to demo logins.
pub const DEMO_AVATAR: &str = "https://images.unsplash.com/photo-1472099645785-5658abf4ff4e?ixlib=rb-1.2.1&ixid=eyJhcHBfaWQiOjEyMDd9&auto=format&fit=facearea&facepad=2&w=256&h=256&q=80";

/// Registration form input.
#[derive(Clone, Debug, Default)]
pub struct Registration {
    /// Display name.
    pub name: String,
    /// Email address.
    pub email: String,
    /// Password.
    pub password: String,
    /// Password typed a second time.
    pub confirm_password: String,
}

/// Issues identities without checking credentials against anything.
#[derive(Clone)]
pub struct DemoAuthenticator {
    ids: Arc<dyn IdSource>,
}

impl DemoAuthenticator {
    /// Create an authenticator drawing user ids from `ids`.
    #[must_use]
    pub fn new(ids: Arc<dyn IdSource>) -> Self {
        Self { ids }
    }

    /// Sign in with any non-empty email and password.
    ///
    /// # Errors
    /// Returns `InvalidCredentials` if either field is blank.
    pub fn login(&self, email: &str, password: &str) -> ChatResult<Identity> {
        let email = email.trim();
        if email.is_empty() || password.is_empty() {
            return Err(ChatError::InvalidCredentials(
                "Please enter both email and password".to_string(),
            ));
        }

        let mut identity = Identity::new(self.next_user_id(), email, DEMO_NAME);
        identity.email_verified = true;
        identity.bio = Some(DEMO_BIO.to_string());
        identity.location = Some(DEMO_LOCATION.to_string());
        identity.avatar = Some(DEMO_AVATAR.to_string());
        Ok(identity)
    }

    /// Create an unverified account from the registration form.
    ///
    /// # Errors
    /// Returns `InvalidCredentials` if the passwords differ or a field is
    /// blank.
    pub fn register(&self, form: &Registration) -> ChatResult<Identity> {
        if form.password != form.confirm_password {
            return Err(ChatError::InvalidCredentials(
                "Passwords do not match".to_string(),
            ));
        }
        let name = form.name.trim();
        let email = form.email.trim();
        if name.is_empty() || email.is_empty() || form.password.is_empty() {
            return Err(ChatError::InvalidCredentials("Invalid input".to_string()));
        }

        Ok(Identity::new(self.next_user_id(), email, name))
    }

    fn next_user_id(&self) -> UserId {
        UserId::from_uuid(self.ids.next_uuid())
    }
}
