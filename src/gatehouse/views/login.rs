use secrecy::{ExposeSecret, SecretString};
use tracing::{error, warn};

use super::{check_email, check_min_length, FieldError, Navigation, MIN_PASSWORD_LENGTH};
use crate::gatehouse::{
    coordinator::Coordinator,
    error::{AuthError, IdentityError},
    identity::FederatedProvider,
};

const INVALID_CREDENTIALS: &str = "Invalid email or password.";
const GENERIC_FAILURE: &str = "An error occurred. Please try again later.";

/// Email/password and social login form.
#[derive(Debug)]
pub struct LoginForm {
    email: String,
    password: SecretString,
    error_message: String,
    loading: bool,
}

impl Default for LoginForm {
    fn default() -> Self {
        Self {
            email: String::new(),
            password: SecretString::default(),
            error_message: String::new(),
            loading: false,
        }
    }
}

impl LoginForm {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_email(&mut self, email: impl Into<String>) {
        self.email = email.into();
    }

    pub fn set_password(&mut self, password: SecretString) {
        self.password = password;
    }

    #[must_use]
    pub fn email(&self) -> &str {
        &self.email
    }

    #[must_use]
    pub fn error_message(&self) -> &str {
        &self.error_message
    }

    #[must_use]
    pub const fn is_loading(&self) -> bool {
        self.loading
    }

    #[must_use]
    pub fn validate(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();
        check_email(&mut errors, &self.email);
        check_min_length(
            &mut errors,
            "Password",
            self.password.expose_secret(),
            MIN_PASSWORD_LENGTH,
        );
        errors
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.validate().is_empty()
    }

    /// Sign in with the form's credentials. Invalid forms are not submitted.
    pub async fn submit(&mut self, coordinator: &Coordinator) -> Option<Navigation> {
        if !self.is_valid() {
            return None;
        }

        self.loading = true;
        self.error_message.clear();

        let result = coordinator
            .sign_in(self.email.trim(), &self.password)
            .await;

        self.loading = false;

        match result {
            Ok(_) => Some(Navigation::Dashboard),
            Err(err) => {
                error!("Login error: {err:?}");
                self.error_message = match err {
                    AuthError::Identity(IdentityError::InvalidCredentials) => INVALID_CREDENTIALS,
                    _ => GENERIC_FAILURE,
                }
                .to_string();
                None
            }
        }
    }

    /// Sign in through a federated provider; form fields are ignored.
    pub async fn submit_federated(
        &mut self,
        coordinator: &Coordinator,
        provider: FederatedProvider,
    ) -> Option<Navigation> {
        self.loading = true;
        self.error_message.clear();

        let result = coordinator.sign_in_with_federated(provider).await;

        self.loading = false;

        match result {
            Ok(_) => Some(Navigation::Dashboard),
            Err(err) => {
                warn!(%provider, "Federated login error: {err:?}");
                self.error_message = err.user_message();
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gatehouse::memory::{
        FederatedIdentity, MemoryIdentityProvider, MemoryProfileStore,
    };
    use anyhow::Result;
    use std::sync::Arc;

    fn secret(value: &str) -> SecretString {
        SecretString::from(value.to_string())
    }

    fn coordinator() -> (Arc<MemoryIdentityProvider>, Coordinator) {
        let provider = Arc::new(MemoryIdentityProvider::new());
        let coordinator =
            Coordinator::start(provider.clone(), Arc::new(MemoryProfileStore::new()));
        (provider, coordinator)
    }

    #[test]
    fn empty_form_is_invalid() {
        let form = LoginForm::new();
        assert_eq!(
            form.validate(),
            vec![FieldError::Required("Email"), FieldError::Required("Password")]
        );
    }

    #[test]
    fn short_password_is_invalid() {
        let mut form = LoginForm::new();
        form.set_email("alice@example.com");
        form.set_password(secret("123"));
        assert!(!form.is_valid());

        form.set_password(secret("secret1"));
        assert!(form.is_valid());
    }

    #[tokio::test]
    async fn invalid_form_is_not_submitted() {
        let (_provider, coordinator) = coordinator();
        let mut form = LoginForm::new();
        form.set_email("nope");
        assert_eq!(form.submit(&coordinator).await, None);
        assert!(form.error_message().is_empty());
    }

    #[tokio::test]
    async fn wrong_password_shows_credentials_message() -> Result<()> {
        let (provider, coordinator) = coordinator();
        crate::gatehouse::identity::IdentityProvider::create_account(
            provider.as_ref(),
            "alice@example.com",
            &secret("secret1"),
        )
        .await?;
        coordinator.sign_out().await?;

        let mut form = LoginForm::new();
        form.set_email("alice@example.com");
        form.set_password(secret("wrong-password"));

        assert_eq!(form.submit(&coordinator).await, None);
        assert_eq!(form.error_message(), INVALID_CREDENTIALS);
        assert!(!form.is_loading());
        Ok(())
    }

    #[tokio::test]
    async fn successful_login_navigates_to_dashboard() -> Result<()> {
        let (_provider, coordinator) = coordinator();
        coordinator
            .sign_up("alice@example.com", &secret("secret1"), "Alice")
            .await?;
        coordinator.sign_out().await?;

        let mut form = LoginForm::new();
        form.set_email(" alice@example.com ");
        form.set_password(secret("secret1"));
        assert_eq!(form.submit(&coordinator).await, Some(Navigation::Dashboard));
        assert!(form.error_message().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn dismissed_federated_login_shows_cancel_message() {
        let (provider, coordinator) = coordinator();
        provider.queue_dismissed_consent();

        let mut form = LoginForm::new();
        let next = form
            .submit_federated(&coordinator, FederatedProvider::Google)
            .await;
        assert_eq!(next, None);
        assert_eq!(form.error_message(), "Sign in was cancelled");
    }

    #[tokio::test]
    async fn federated_login_navigates_to_dashboard() {
        let (provider, coordinator) = coordinator();
        provider.queue_consent(FederatedIdentity::new("fed@example.com"));

        let mut form = LoginForm::new();
        let next = form
            .submit_federated(&coordinator, FederatedProvider::Facebook)
            .await;
        assert_eq!(next, Some(Navigation::Dashboard));
    }
}
