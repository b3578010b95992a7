//! Authentication collaborator.
//!
//! Authentication itself happens elsewhere. The cart only needs to ask
//! "who is signed in right now?" and to hear about sign-in and sign-out as
//! they happen.

mod manual;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::broadcast;

use basket_core::{Email, UserId};

pub use manual::ManualAuth;

/// The signed-in user, as reported by the auth provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionUser {
    pub id: UserId,
    pub email: Option<Email>,
}

/// Session changes emitted by the auth provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    SignedIn(SessionUser),
    SignedOut,
}

/// Errors returned by the auth provider.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The provider could not be reached.
    #[error("auth provider unavailable: {0}")]
    Unavailable(String),

    /// The provider returned a session that could not be understood.
    #[error("invalid session: {0}")]
    InvalidSession(String),
}

/// Source of the current session and of session-change events.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// The currently signed-in user, or `None` for a guest.
    async fn current_session(&self) -> Result<Option<SessionUser>, AuthError>;

    /// Subscribe to sign-in and sign-out events.
    fn subscribe(&self) -> broadcast::Receiver<AuthEvent>;
}
