//! View models for the landing flows.
//!
//! Each model holds UI-only state (field values, validity, a loading flag,
//! message text) and calls exactly one coordinator operation per user action.
//! Outcomes are translated into fixed messages; raw provider detail never
//! reaches a message. Navigation is returned to the caller rather than
//! performed here.

mod login;
mod pending_verification;
mod register;

pub use login::LoginForm;
pub use pending_verification::{
    Opening, PendingVerification, PollOutcome, VerificationPoller, POLL_INTERVAL,
};
pub use register::{RegisterForm, REDIRECT_DELAY};

use std::{fmt, time::Duration};

use super::validation::valid_email;

/// Minimum password length checked before the provider is contacted.
pub const MIN_PASSWORD_LENGTH: usize = 6;

/// Where the front-end should go next.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Navigation {
    Dashboard,
    Login,
    PendingVerification,
}

impl Navigation {
    #[must_use]
    pub const fn path(self) -> &'static str {
        match self {
            Self::Dashboard => "/dashboard",
            Self::Login => "/login",
            Self::PendingVerification => "/pending-verification",
        }
    }
}

/// Navigation that should happen after `delay`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Redirect {
    pub to: Navigation,
    pub delay: Duration,
}

/// Client-side validation failure for one form field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldError {
    Required(&'static str),
    InvalidEmail,
    TooShort { field: &'static str, min: usize },
    PasswordMismatch,
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Required(field) => write!(f, "{field} is required"),
            Self::InvalidEmail => f.write_str("Please enter a valid email address"),
            Self::TooShort { field, min } => {
                write!(f, "{field} must be at least {min} characters")
            }
            Self::PasswordMismatch => f.write_str("Passwords do not match"),
        }
    }
}

fn check_required(errors: &mut Vec<FieldError>, field: &'static str, value: &str) -> bool {
    if value.trim().is_empty() {
        errors.push(FieldError::Required(field));
        return false;
    }
    true
}

fn check_email(errors: &mut Vec<FieldError>, email: &str) {
    if check_required(errors, "Email", email) && !valid_email(email.trim()) {
        errors.push(FieldError::InvalidEmail);
    }
}

fn check_min_length(errors: &mut Vec<FieldError>, field: &'static str, value: &str, min: usize) {
    if check_required(errors, field, value) && value.chars().count() < min {
        errors.push(FieldError::TooShort { field, min });
    }
}
