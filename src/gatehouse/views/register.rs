use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;
use tracing::error;

use super::{
    check_email, check_min_length, FieldError, Navigation, Redirect, MIN_PASSWORD_LENGTH,
};
use crate::gatehouse::{
    coordinator::Coordinator,
    error::{AuthError, IdentityError},
};

/// Pause between the success message and the verification screen.
pub const REDIRECT_DELAY: Duration = Duration::from_millis(1500);

const MIN_DISPLAY_NAME_LENGTH: usize = 3;

const SUCCESS: &str = "Registration successful! Redirecting to email verification...";

fn failure_message(err: &AuthError) -> &'static str {
    match err.identity() {
        Some(IdentityError::DuplicateEmail) => {
            "This email is already registered. Please use a different email or log in."
        }
        Some(IdentityError::WeakPassword) => "Password should be at least 6 characters long.",
        Some(IdentityError::InvalidEmail) => "Please enter a valid email address.",
        _ => "An error occurred during registration. Please try again.",
    }
}

#[derive(Debug)]
pub struct RegisterForm {
    display_name: String,
    email: String,
    password: SecretString,
    confirm_password: SecretString,
    error_message: String,
    success_message: String,
    loading: bool,
}

impl Default for RegisterForm {
    fn default() -> Self {
        Self {
            display_name: String::new(),
            email: String::new(),
            password: SecretString::default(),
            confirm_password: SecretString::default(),
            error_message: String::new(),
            success_message: String::new(),
            loading: false,
        }
    }
}

impl RegisterForm {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_display_name(&mut self, display_name: impl Into<String>) {
        self.display_name = display_name.into();
    }

    pub fn set_email(&mut self, email: impl Into<String>) {
        self.email = email.into();
    }

    pub fn set_password(&mut self, password: SecretString) {
        self.password = password;
    }

    pub fn set_confirm_password(&mut self, confirm_password: SecretString) {
        self.confirm_password = confirm_password;
    }

    #[must_use]
    pub fn error_message(&self) -> &str {
        &self.error_message
    }

    #[must_use]
    pub fn success_message(&self) -> &str {
        &self.success_message
    }

    #[must_use]
    pub const fn is_loading(&self) -> bool {
        self.loading
    }

    #[must_use]
    pub fn validate(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();
        check_min_length(
            &mut errors,
            "Display name",
            &self.display_name,
            MIN_DISPLAY_NAME_LENGTH,
        );
        check_email(&mut errors, &self.email);
        check_min_length(
            &mut errors,
            "Password",
            self.password.expose_secret(),
            MIN_PASSWORD_LENGTH,
        );
        if self.password.expose_secret() != self.confirm_password.expose_secret() {
            errors.push(FieldError::PasswordMismatch);
        }
        errors
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.validate().is_empty()
    }

    /// Create the account. On success the caller should follow the returned
    /// redirect once its delay has elapsed.
    pub async fn submit(&mut self, coordinator: &Coordinator) -> Option<Redirect> {
        if !self.is_valid() {
            return None;
        }

        self.loading = true;
        self.error_message.clear();
        self.success_message.clear();

        let result = coordinator
            .sign_up(self.email.trim(), &self.password, self.display_name.trim())
            .await;

        self.loading = false;

        match result {
            Ok(_) => {
                self.success_message = SUCCESS.to_string();
                Some(Redirect {
                    to: Navigation::PendingVerification,
                    delay: REDIRECT_DELAY,
                })
            }
            Err(err) => {
                error!("Registration error: {err:?}");
                self.error_message = failure_message(&err).to_string();
                None
            }
        }
    }
}
