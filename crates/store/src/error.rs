//! Unified error handling with Sentry integration.
//!
//! Every cart operation returns `Result<T, CartError>`. Failures are logged
//! where they happen; callers that have nowhere to return an error (the
//! session bootstrap task) call [`CartError::report`] to capture it to
//! Sentry.

use thiserror::Error;

use basket_core::CartLineKey;

use crate::auth::AuthError;
use crate::local::LocalStorageError;
use crate::remote::RepositoryError;

/// Error type for cart store operations.
#[derive(Debug, Error)]
pub enum CartError {
    /// Remote (account) persistence failed.
    #[error("Remote store error: {0}")]
    Remote(#[from] RepositoryError),

    /// Local (guest) persistence failed.
    #[error("Local storage error: {0}")]
    Local(#[from] LocalStorageError),

    /// The cart snapshot could not be encoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The auth provider failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// No line in the cart has this key.
    #[error("No cart line for {0}")]
    LineNotFound(CartLineKey),

    /// A positional index past the end of the cart.
    #[error("Cart line {index} out of range (cart has {len} lines)")]
    LineIndexOutOfRange { index: usize, len: usize },

    /// Placing an order needs at least one line.
    #[error("Cart is empty")]
    EmptyCart,

    /// A user-mode operation ran while the store is in guest mode.
    #[error("No signed-in user")]
    NotSignedIn,

    /// A line or cart total does not fit in a `Decimal`.
    #[error("Cart amount out of range")]
    AmountOverflow,

    /// The last `init_user` failed, so saving would overwrite a cart that
    /// was never loaded.
    #[error("Cart was not loaded; sign in again before saving")]
    CartNotLoaded,
}

impl CartError {
    /// Whether this error comes from a collaborator rather than from the
    /// caller's input.
    #[must_use]
    pub const fn is_backend(&self) -> bool {
        matches!(
            self,
            Self::Remote(_) | Self::Local(_) | Self::Serialization(_) | Self::Auth(_)
        )
    }

    /// Log the error and, for backend failures, capture it to Sentry.
    pub fn report(&self) {
        if self.is_backend() {
            let event_id = sentry::capture_error(self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Cart error"
            );
        } else {
            tracing::warn!(error = %self, "Cart error");
        }
    }
}

/// Result type alias for `CartError`.
pub type Result<T> = std::result::Result<T, CartError>;

/// Set the Sentry user context from a user ID.
///
/// Call this after sign-in to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Call this on sign-out to stop associating errors with the user.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for a cart action.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of actions
/// leading up to an error.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("cart", "Added item", Some(&[("product_id", "123")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}
