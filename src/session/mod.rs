//! Signed-in identity and demo authentication.

pub mod auth;
pub mod identity;
pub mod store;

pub use auth::{DemoAuthenticator, Registration};
pub use identity::{Identity, ProfileUpdate};
pub use store::{SessionEvent, SessionStore};
