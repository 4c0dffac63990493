//! Identity provider seam.
//!
//! The provider owns accounts, credentials and the session lifetime. This
//! module only describes what the coordinator consumes from it, the closed
//! set of error codes it reports, and [`SessionNotifier`], the fan-out used by
//! provider implementations to deliver session-change notifications.

use async_trait::async_trait;
use parking_lot::Mutex;
use secrecy::SecretString;
use std::{fmt, str::FromStr};
use thiserror::Error;
use tokio::sync::mpsc;

use super::session::Session;

/// Stream of session changes. The first item is the state at subscription
/// time; dropping the receiver unsubscribes.
pub type SessionChanges = mpsc::UnboundedReceiver<Option<Session>>;

/// Third-party providers reachable through an interactive consent flow.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FederatedProvider {
    Google,
    Facebook,
}

impl FederatedProvider {
    /// Provider id as understood by the identity platform.
    #[must_use]
    pub const fn provider_id(self) -> &'static str {
        match self {
            Self::Google => "google.com",
            Self::Facebook => "facebook.com",
        }
    }
}

impl fmt::Display for FederatedProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Google => f.write_str("google"),
            Self::Facebook => f.write_str("facebook"),
        }
    }
}

impl FromStr for FederatedProvider {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "google" | "google.com" => Ok(Self::Google),
            "facebook" | "facebook.com" => Ok(Self::Facebook),
            other => Err(format!("unsupported provider: {other}")),
        }
    }
}

/// Result of a federated sign-in.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FederatedSignIn {
    pub session: Session,
    /// Explicit "new user" flag when the provider reports one.
    pub is_new_account: Option<bool>,
}

impl FederatedSignIn {
    /// Whether this sign-in created the account. The provider flag wins; the
    /// creation/last-sign-in timestamp comparison is only a fallback.
    #[must_use]
    pub fn is_new_account(&self) -> bool {
        self.is_new_account
            .unwrap_or_else(|| self.session.metadata.is_first_sign_in())
    }
}

/// Closed set of provider error codes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProviderErrorCode {
    EmailAlreadyInUse,
    InvalidEmail,
    WeakPassword,
    UserNotFound,
    WrongPassword,
    TooManyRequests,
    PopupClosedByUser,
    Other(String),
}

impl ProviderErrorCode {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::EmailAlreadyInUse => "auth/email-already-in-use",
            Self::InvalidEmail => "auth/invalid-email",
            Self::WeakPassword => "auth/weak-password",
            Self::UserNotFound => "auth/user-not-found",
            Self::WrongPassword => "auth/wrong-password",
            Self::TooManyRequests => "auth/too-many-requests",
            Self::PopupClosedByUser => "auth/popup-closed-by-user",
            Self::Other(code) => code,
        }
    }
}

impl From<&str> for ProviderErrorCode {
    fn from(code: &str) -> Self {
        match code {
            "auth/email-already-in-use" => Self::EmailAlreadyInUse,
            "auth/invalid-email" => Self::InvalidEmail,
            "auth/weak-password" => Self::WeakPassword,
            "auth/user-not-found" => Self::UserNotFound,
            "auth/wrong-password" => Self::WrongPassword,
            "auth/too-many-requests" => Self::TooManyRequests,
            "auth/popup-closed-by-user" => Self::PopupClosedByUser,
            other => Self::Other(other.to_string()),
        }
    }
}

impl fmt::Display for ProviderErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error reported by the identity provider. `message` is raw provider detail
/// and is only ever logged.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{code}: {message}")]
pub struct ProviderError {
    pub code: ProviderErrorCode,
    pub message: String,
}

impl ProviderError {
    pub fn new(code: ProviderErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn other(code: &str, message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::Other(code.to_string()), message)
    }
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Create an account and sign it in.
    async fn create_account(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<Session, ProviderError>;

    async fn authenticate(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<Session, ProviderError>;

    /// Run the provider's interactive flow for `provider`.
    async fn authenticate_federated(
        &self,
        provider: FederatedProvider,
    ) -> Result<FederatedSignIn, ProviderError>;

    async fn deauthenticate(&self) -> Result<(), ProviderError>;

    /// Cached session; never performs I/O.
    fn current_session(&self) -> Option<Session>;

    fn subscribe(&self) -> SessionChanges;

    async fn request_email_verification(&self) -> Result<(), ProviderError>;

    /// Refresh the current account and report its verification flag.
    async fn check_email_verified(&self) -> Result<bool, ProviderError>;
}

/// Cached session plus the subscribers interested in its changes.
#[derive(Debug, Default)]
pub struct SessionNotifier {
    current: Mutex<Option<Session>>,
    subscribers: Mutex<Vec<mpsc::UnboundedSender<Option<Session>>>>,
}

impl SessionNotifier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn current(&self) -> Option<Session> {
        self.current.lock().clone()
    }

    /// Register a subscriber; it immediately receives the current state.
    pub fn subscribe(&self) -> SessionChanges {
        let (sender, receiver) = mpsc::unbounded_channel();
        let mut subscribers = self.subscribers.lock();
        // the receiver is alive, this send cannot fail
        let _ = sender.send(self.current());
        subscribers.push(sender);
        receiver
    }

    /// Replace the cached session and notify every live subscriber. Closed
    /// subscribers are dropped.
    pub fn publish(&self, session: Option<Session>) {
        // Holding the subscriber lock keeps concurrent publishes in order.
        let mut subscribers = self.subscribers.lock();
        (*self.current.lock()).clone_from(&session);
        subscribers.retain(|subscriber| subscriber.send(session.clone()).is_ok());
    }

    /// Replace the cached session without notifying, e.g. after a reload
    /// that only refreshed account fields.
    pub fn refresh(&self, session: Session) {
        *self.current.lock() = Some(session);
    }

    #[cfg(test)]
    fn subscriber_count(&self) -> usize {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|subscriber| !subscriber.is_closed());
        subscribers.len()
    }
}
