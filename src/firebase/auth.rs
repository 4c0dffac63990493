//! Identity Toolkit adapter.
//!
//! Every successful sign-in keeps the returned id token, reloads the account
//! through `accounts:lookup` to obtain its metadata and verification flag, and
//! notifies subscribers. Sign-out is local: the token is dropped and an absent
//! session is published.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, instrument};
use url::{form_urlencoded, Url};

use super::{api_error, endpoint_url, http_client, FirebaseError, TokenHandle};
use crate::gatehouse::{
    FederatedProvider, FederatedSignIn, IdentityProvider, ProviderError, ProviderErrorCode,
    Session, SessionChanges, SessionMetadata, SessionNotifier,
};

/// Redirect URI presented with federated credentials.
const IDP_REQUEST_URI: &str = "http://localhost";

/// Token issued by a federated provider's consent screen.
#[derive(Debug)]
pub enum ProviderCredential {
    IdToken(SecretString),
    AccessToken(SecretString),
}

impl ProviderCredential {
    fn post_body(&self, provider: FederatedProvider) -> String {
        let mut body = form_urlencoded::Serializer::new(String::new());
        match self {
            Self::IdToken(token) => body.append_pair("id_token", token.expose_secret()),
            Self::AccessToken(token) => body.append_pair("access_token", token.expose_secret()),
        };
        body.append_pair("providerId", provider.provider_id());
        body.finish()
    }
}

/// Interactive part of a federated sign-in.
#[async_trait]
pub trait ConsentFlow: Send + Sync {
    /// `None` when the user dismissed the flow.
    async fn consent(&self, provider: FederatedProvider) -> Option<ProviderCredential>;
}

/// Consent answered up front with a token obtained out of band. The token is
/// handed out once; later flows count as dismissed.
#[derive(Debug, Default)]
pub struct StaticConsent {
    credential: Mutex<Option<ProviderCredential>>,
}

impl StaticConsent {
    #[must_use]
    pub fn new(credential: Option<ProviderCredential>) -> Self {
        Self {
            credential: Mutex::new(credential),
        }
    }
}

#[async_trait]
impl ConsentFlow for StaticConsent {
    async fn consent(&self, _provider: FederatedProvider) -> Option<ProviderCredential> {
        self.credential.lock().take()
    }
}

/// Map an Identity Toolkit error message such as `WEAK_PASSWORD : Password
/// should be at least 6 characters` to a provider code.
#[must_use]
pub fn error_code(message: &str) -> ProviderErrorCode {
    let reason = message.split(':').next().unwrap_or_default().trim();
    match reason {
        "EMAIL_EXISTS" => ProviderErrorCode::EmailAlreadyInUse,
        "INVALID_EMAIL" => ProviderErrorCode::InvalidEmail,
        "WEAK_PASSWORD" => ProviderErrorCode::WeakPassword,
        "EMAIL_NOT_FOUND" | "USER_NOT_FOUND" => ProviderErrorCode::UserNotFound,
        "INVALID_PASSWORD" | "INVALID_LOGIN_CREDENTIALS" => ProviderErrorCode::WrongPassword,
        "TOO_MANY_ATTEMPTS_TRY_LATER" => ProviderErrorCode::TooManyRequests,
        other => ProviderErrorCode::Other(format!(
            "auth/{}",
            other.to_ascii_lowercase().replace('_', "-")
        )),
    }
}

impl From<FirebaseError> for ProviderError {
    fn from(err: FirebaseError) -> Self {
        match err {
            FirebaseError::Api { ref message, .. } if !message.is_empty() => {
                Self::new(error_code(message), err.to_string())
            }
            FirebaseError::Http(_) => Self::other("auth/network-request-failed", err.to_string()),
            other => Self::other("auth/internal-error", other.to_string()),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LookupResponse {
    #[serde(default)]
    users: Vec<AccountInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountInfo {
    local_id: String,
    email: Option<String>,
    display_name: Option<String>,
    photo_url: Option<String>,
    #[serde(default)]
    email_verified: bool,
    created_at: Option<String>,
    last_login_at: Option<String>,
}

/// Millisecond epoch strings as returned by `accounts:lookup`.
fn millis(value: Option<&str>) -> Option<DateTime<Utc>> {
    value
        .and_then(|raw| raw.parse::<i64>().ok())
        .and_then(DateTime::from_timestamp_millis)
}

impl From<AccountInfo> for Session {
    fn from(info: AccountInfo) -> Self {
        Self {
            uid: info.local_id,
            email: info.email,
            display_name: info.display_name,
            photo_url: info.photo_url,
            email_verified: info.email_verified,
            metadata: SessionMetadata {
                created_at: millis(info.created_at.as_deref()),
                last_sign_in_at: millis(info.last_login_at.as_deref()),
            },
        }
    }
}

pub struct FirebaseAuth {
    client: Client,
    base: Url,
    api_key: SecretString,
    consent: Box<dyn ConsentFlow>,
    token: TokenHandle,
    notifier: SessionNotifier,
}

impl std::fmt::Debug for FirebaseAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FirebaseAuth")
            .field("base", &self.base.as_str())
            .field("token", &self.token)
            .finish_non_exhaustive()
    }
}

impl FirebaseAuth {
    /// # Errors
    ///
    /// Fails when `base_url` is not a usable URL or the HTTP client cannot be
    /// built.
    pub fn new(
        base_url: &str,
        api_key: SecretString,
        consent: Box<dyn ConsentFlow>,
    ) -> Result<Self, FirebaseError> {
        Ok(Self {
            client: http_client()?,
            base: Url::parse(base_url)?,
            api_key,
            consent,
            token: TokenHandle::new(),
            notifier: SessionNotifier::new(),
        })
    }

    /// Handle onto the id token of the signed-in user.
    #[must_use]
    pub fn token(&self) -> TokenHandle {
        self.token.clone()
    }

    async fn call(&self, method: &str, body: &Value) -> Result<Value, FirebaseError> {
        let mut url = endpoint_url(&self.base, &[method])?;
        url.query_pairs_mut()
            .append_pair("key", self.api_key.expose_secret());

        let response = self.client.post(url).json(body).send().await?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        Ok(response.json().await?)
    }

    async fn lookup(&self, id_token: &str) -> Result<Session, FirebaseError> {
        let response = self
            .call("accounts:lookup", &json!({ "idToken": id_token }))
            .await?;
        let lookup: LookupResponse =
            serde_json::from_value(response).map_err(|e| FirebaseError::Decode(e.to_string()))?;
        lookup
            .users
            .into_iter()
            .next()
            .map(Session::from)
            .ok_or_else(|| FirebaseError::Decode("no account in lookup response".to_string()))
    }

    /// Keep the id token of a sign-in response, reload the account and
    /// publish it.
    async fn establish(&self, response: &Value) -> Result<Session, FirebaseError> {
        let id_token = response["idToken"]
            .as_str()
            .ok_or_else(|| FirebaseError::Decode("no idToken in response".to_string()))?;

        let session = self.lookup(id_token).await?;
        self.token
            .set(Some(SecretString::from(id_token.to_string())));
        self.notifier.publish(Some(session.clone()));

        debug!(uid = %session.uid, "session established");

        Ok(session)
    }

    fn signed_in_token(&self) -> Result<String, ProviderError> {
        self.token.bearer().ok_or_else(|| {
            ProviderError::other("auth/no-current-user", "No user currently signed in.")
        })
    }
}

#[async_trait]
impl IdentityProvider for FirebaseAuth {
    #[instrument(skip(self, password))]
    async fn create_account(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<Session, ProviderError> {
        let body = json!({
            "email": email,
            "password": password.expose_secret(),
            "returnSecureToken": true,
        });
        let response = self.call("accounts:signUp", &body).await?;
        Ok(self.establish(&response).await?)
    }

    #[instrument(skip(self, password))]
    async fn authenticate(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<Session, ProviderError> {
        let body = json!({
            "email": email,
            "password": password.expose_secret(),
            "returnSecureToken": true,
        });
        let response = self.call("accounts:signInWithPassword", &body).await?;
        Ok(self.establish(&response).await?)
    }

    #[instrument(skip(self))]
    async fn authenticate_federated(
        &self,
        provider: FederatedProvider,
    ) -> Result<FederatedSignIn, ProviderError> {
        let Some(credential) = self.consent.consent(provider).await else {
            return Err(ProviderError::new(
                ProviderErrorCode::PopupClosedByUser,
                format!("The {provider} popup has been closed by the user."),
            ));
        };

        let body = json!({
            "postBody": credential.post_body(provider),
            "requestUri": IDP_REQUEST_URI,
            "returnIdpCredential": true,
            "returnSecureToken": true,
        });
        let response = self.call("accounts:signInWithIdp", &body).await?;
        let is_new_account = response["isNewUser"].as_bool();
        let session = self.establish(&response).await?;

        Ok(FederatedSignIn {
            session,
            is_new_account,
        })
    }

    async fn deauthenticate(&self) -> Result<(), ProviderError> {
        self.token.set(None);
        self.notifier.publish(None);
        Ok(())
    }

    fn current_session(&self) -> Option<Session> {
        self.notifier.current()
    }

    fn subscribe(&self) -> SessionChanges {
        self.notifier.subscribe()
    }

    #[instrument(skip(self))]
    async fn request_email_verification(&self) -> Result<(), ProviderError> {
        let id_token = self.signed_in_token()?;
        let body = json!({
            "requestType": "VERIFY_EMAIL",
            "idToken": id_token,
        });
        self.call("accounts:sendOobCode", &body).await?;
        Ok(())
    }

    async fn check_email_verified(&self) -> Result<bool, ProviderError> {
        let id_token = self.signed_in_token()?;
        let session = self.lookup(&id_token).await?;
        let verified = session.email_verified;
        self.notifier.refresh(session);
        Ok(verified)
    }
}
