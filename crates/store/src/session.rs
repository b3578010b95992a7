//! Session bootstrap.
//!
//! Wires the auth provider to the cart store: picks guest or user mode at
//! startup, then re-initializes the store on every sign-in and sign-out.

use std::sync::Arc;

use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::instrument;

use crate::auth::{AuthEvent, AuthProvider, SessionUser};
use crate::error::{Result, clear_sentry_user, set_sentry_user};
use crate::store::SharedCartStore;

/// Connects an [`AuthProvider`] to a [`SharedCartStore`].
pub struct SessionBootstrap {
    auth: Arc<dyn AuthProvider>,
    store: SharedCartStore,
}

impl SessionBootstrap {
    #[must_use]
    pub fn new(auth: Arc<dyn AuthProvider>, store: SharedCartStore) -> Self {
        Self { auth, store }
    }

    /// Initialize the store for the current session and start following
    /// session changes.
    ///
    /// A failed session query is treated as a guest session. The returned
    /// task runs until the auth provider's event channel closes.
    ///
    /// # Errors
    ///
    /// Returns the store's initialization error; no task is started in that
    /// case.
    pub async fn start(self) -> Result<JoinHandle<()>> {
        // Subscribe first so a sign-in racing the initial query is not lost.
        let events = self.auth.subscribe();
        let session = self.current_session().await;
        self.apply(session).await?;

        tracing::info!("Session bootstrap started");
        Ok(tokio::spawn(self.follow(events)))
    }

    async fn current_session(&self) -> Option<SessionUser> {
        match self.auth.current_session().await {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!(error = %e, "Session query failed, continuing as guest");
                None
            }
        }
    }

    async fn follow(self, mut events: broadcast::Receiver<AuthEvent>) {
        loop {
            let session = match events.recv().await {
                Ok(AuthEvent::SignedIn(user)) => Some(user),
                Ok(AuthEvent::SignedOut) => None,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Missed session events, re-reading session");
                    self.current_session().await
                }
                Err(RecvError::Closed) => break,
            };

            if let Err(e) = self.apply(session).await {
                e.report();
            }
        }

        tracing::debug!("Session event channel closed");
    }

    #[instrument(skip_all, fields(user_id = ?session.as_ref().map(|user| user.id)))]
    async fn apply(&self, session: Option<SessionUser>) -> Result<()> {
        let mut store = self.store.lock().await;
        match session {
            Some(user) => {
                set_sentry_user(&user.id, user.email.as_ref().map(|email| email.as_str()));
                store.init_user(Some(user.id), user.email.as_ref()).await
            }
            None => {
                clear_sentry_user();
                store.reset();
                store.init_user(None, None).await
            }
        }
    }
}
