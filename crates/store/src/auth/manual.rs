//! Host-driven auth provider.

use std::sync::RwLock;

use async_trait::async_trait;
use tokio::sync::broadcast;

use super::{AuthError, AuthEvent, AuthProvider, SessionUser};

const EVENT_CAPACITY: usize = 16;

/// An [`AuthProvider`] whose session is set by the host.
///
/// The CLI builds one from its `--user` flag; tests use it to script
/// sign-in and sign-out sequences.
#[derive(Debug)]
pub struct ManualAuth {
    session: RwLock<Option<SessionUser>>,
    events: broadcast::Sender<AuthEvent>,
}

impl Default for ManualAuth {
    fn default() -> Self {
        Self::new(None)
    }
}

impl ManualAuth {
    /// Create a provider with an initial session (`None` for a guest).
    #[must_use]
    pub fn new(session: Option<SessionUser>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            session: RwLock::new(session),
            events,
        }
    }

    /// Make `user` the current session and emit [`AuthEvent::SignedIn`].
    pub fn sign_in(&self, user: SessionUser) {
        self.replace_session(Some(user.clone()));
        // No subscribers is fine; the session is still recorded.
        let _ = self.events.send(AuthEvent::SignedIn(user));
    }

    /// Clear the current session and emit [`AuthEvent::SignedOut`].
    pub fn sign_out(&self) {
        self.replace_session(None);
        let _ = self.events.send(AuthEvent::SignedOut);
    }

    fn replace_session(&self, session: Option<SessionUser>) {
        match self.session.write() {
            Ok(mut guard) => *guard = session,
            Err(poisoned) => *poisoned.into_inner() = session,
        }
    }
}

#[async_trait]
impl AuthProvider for ManualAuth {
    async fn current_session(&self) -> Result<Option<SessionUser>, AuthError> {
        self.session
            .read()
            .map(|guard| guard.clone())
            .map_err(|e| AuthError::Unavailable(e.to_string()))
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use uuid::Uuid;

    use basket_core::UserId;

    use super::*;

    fn user() -> SessionUser {
        SessionUser {
            id: UserId::new(Uuid::new_v4()),
            email: None,
        }
    }

    #[tokio::test]
    async fn test_sign_in_updates_session_and_emits() {
        let auth = ManualAuth::default();
        let mut events = auth.subscribe();
        let user = user();

        auth.sign_in(user.clone());

        assert_eq!(auth.current_session().await.unwrap(), Some(user.clone()));
        assert_eq!(events.recv().await.unwrap(), AuthEvent::SignedIn(user));
    }

    #[tokio::test]
    async fn test_sign_out_clears_session() {
        let auth = ManualAuth::new(Some(user()));
        let mut events = auth.subscribe();

        auth.sign_out();

        assert_eq!(auth.current_session().await.unwrap(), None);
        assert_eq!(events.recv().await.unwrap(), AuthEvent::SignedOut);
    }
}
