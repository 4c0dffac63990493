//! Error taxonomy for coordinator operations.
//!
//! `Display` on [`IdentityError`] is the user-facing message. Raw provider
//! detail only travels inside [`IdentityError::Unknown`] for logging and is
//! never part of the rendered text.

use thiserror::Error;

use super::identity::{ProviderError, ProviderErrorCode};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum IdentityError {
    #[error("This email is already registered")]
    DuplicateEmail,
    #[error("Password should be at least 6 characters")]
    WeakPassword,
    #[error("Please enter a valid email address")]
    InvalidEmail,
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("Too many failed attempts. Please try again later")]
    TooManyAttempts,
    #[error("Sign in was cancelled")]
    PopupCancelled,
    #[error("An error occurred during authentication")]
    Unknown { code: String, detail: String },
}

impl IdentityError {
    /// Expected errors are user-correctable and logged at low severity.
    #[must_use]
    pub const fn is_expected(&self) -> bool {
        !matches!(self, Self::Unknown { .. })
    }
}

impl From<ProviderError> for IdentityError {
    fn from(err: ProviderError) -> Self {
        match err.code {
            ProviderErrorCode::EmailAlreadyInUse => Self::DuplicateEmail,
            ProviderErrorCode::InvalidEmail => Self::InvalidEmail,
            ProviderErrorCode::WeakPassword => Self::WeakPassword,
            ProviderErrorCode::UserNotFound | ProviderErrorCode::WrongPassword => {
                Self::InvalidCredentials
            }
            ProviderErrorCode::TooManyRequests => Self::TooManyAttempts,
            ProviderErrorCode::PopupClosedByUser => Self::PopupCancelled,
            ProviderErrorCode::Other(code) => Self::Unknown {
                code,
                detail: err.message,
            },
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("profile store unavailable: {0}")]
    Unavailable(String),
    #[error("profile store rejected the request: {0}")]
    Rejected(String),
    #[error("profile document is malformed: {0}")]
    Malformed(String),
    #[error("profile store requires a signed-in user")]
    Unauthenticated,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error(transparent)]
    Identity(#[from] IdentityError),
    #[error("No user is currently signed in")]
    NoActiveSession,
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl AuthError {
    #[must_use]
    pub const fn is_expected(&self) -> bool {
        match self {
            Self::Identity(err) => err.is_expected(),
            Self::NoActiveSession => true,
            Self::Store(_) => false,
        }
    }

    /// Message safe to show to the user.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Identity(err) => err.to_string(),
            Self::NoActiveSession => self.to_string(),
            Self::Store(_) => "An error occurred while saving your profile".to_string(),
        }
    }

    /// The identity error behind this failure, if any.
    #[must_use]
    pub const fn identity(&self) -> Option<&IdentityError> {
        match self {
            Self::Identity(err) => Some(err),
            _ => None,
        }
    }
}
