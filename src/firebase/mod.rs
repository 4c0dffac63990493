//! Hosted backends: Identity Toolkit for accounts and sessions, Firestore for
//! profile documents. Both speak plain REST through `reqwest`.

pub mod auth;
pub mod firestore;

pub use auth::{ConsentFlow, FirebaseAuth, ProviderCredential, StaticConsent};
pub use firestore::Firestore;

use parking_lot::RwLock;
use reqwest::{Client, Response};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use std::{fmt, sync::Arc};
use thiserror::Error;
use url::Url;

use crate::APP_USER_AGENT;

pub const DEFAULT_AUTH_URL: &str = "https://identitytoolkit.googleapis.com/v1";
pub const DEFAULT_FIRESTORE_URL: &str = "https://firestore.googleapis.com/v1";

#[derive(Debug, Error)]
pub enum FirebaseError {
    #[error("invalid endpoint URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("endpoint URL cannot carry a path: {0}")]
    NotABase(String),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("{status} - {message}")]
    Api { status: u16, message: String },
    #[error("unexpected response: {0}")]
    Decode(String),
}

/// Id token of the signed-in user, shared between the auth adapter that
/// obtains it and the document store that presents it.
#[derive(Clone, Default)]
pub struct TokenHandle(Arc<RwLock<Option<SecretString>>>);

impl TokenHandle {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, token: Option<SecretString>) {
        *self.0.write() = token;
    }

    #[must_use]
    pub fn is_set(&self) -> bool {
        self.0.read().is_some()
    }

    /// Token value for an `Authorization` header.
    #[must_use]
    pub fn bearer(&self) -> Option<String> {
        self.0
            .read()
            .as_ref()
            .map(|token| token.expose_secret().to_string())
    }
}

impl fmt::Debug for TokenHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = if self.is_set() { "***" } else { "none" };
        f.debug_tuple("TokenHandle").field(&state).finish()
    }
}

pub(crate) fn http_client() -> Result<Client, FirebaseError> {
    Ok(Client::builder().user_agent(APP_USER_AGENT).build()?)
}

/// Append `segments` to the path of `base`.
pub(crate) fn endpoint_url(base: &Url, segments: &[&str]) -> Result<Url, FirebaseError> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|()| FirebaseError::NotABase(base.to_string()))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// Turn a non-success response into [`FirebaseError::Api`], keeping the
/// service's `error.message` when the body carries one.
pub(crate) async fn api_error(response: Response) -> FirebaseError {
    let status = response.status();
    let message = match response.json::<Value>().await {
        Ok(body) => body["error"]["message"]
            .as_str()
            .unwrap_or_default()
            .to_string(),
        Err(_) => String::new(),
    };
    FirebaseError::Api {
        status: status.as_u16(),
        message,
    }
}
