//! Firestore adapter for profile documents.
//!
//! Documents live at `projects/{project}/databases/(default)/documents/
//! {collection}/{key}`. Merge-writes are `PATCH` requests whose
//! `updateMask.fieldPaths` lists exactly the fields being set, so other fields
//! of an existing document are left alone.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Map, Value};
use tracing::{debug, instrument};
use url::Url;

use super::{api_error, endpoint_url, http_client, FirebaseError, TokenHandle};
use crate::gatehouse::{ProfilePatch, ProfileStore, StoreError};

/// Profile fields stored as `timestampValue`; every other field is a string.
const TIMESTAMP_FIELDS: [&str; 2] = ["createdAt", "lastLoginAt"];

/// Encode the set fields of `patch` as Firestore typed values.
///
/// # Errors
///
/// [`StoreError::Malformed`] when the patch cannot be represented.
pub fn encode_fields(patch: &ProfilePatch) -> Result<Map<String, Value>, StoreError> {
    let Value::Object(plain) =
        serde_json::to_value(patch).map_err(|e| StoreError::Malformed(e.to_string()))?
    else {
        return Err(StoreError::Malformed("profile is not an object".to_string()));
    };

    Ok(plain
        .into_iter()
        .map(|(name, value)| {
            let kind = if TIMESTAMP_FIELDS.contains(&name.as_str()) {
                "timestampValue"
            } else {
                "stringValue"
            };
            let mut typed = Map::new();
            typed.insert(kind.to_string(), value);
            (name, Value::Object(typed))
        })
        .collect())
}

/// Decode a document's `fields`. Unknown fields and value types the profile
/// does not use are ignored.
///
/// # Errors
///
/// [`StoreError::Malformed`] when a known field holds an unusable value.
pub fn decode_fields(fields: &Map<String, Value>) -> Result<ProfilePatch, StoreError> {
    let plain: Map<String, Value> = fields
        .iter()
        .filter_map(|(name, typed)| {
            typed
                .get("stringValue")
                .or_else(|| typed.get("timestampValue"))
                .map(|value| (name.clone(), value.clone()))
        })
        .collect();

    serde_json::from_value(Value::Object(plain)).map_err(|e| StoreError::Malformed(e.to_string()))
}

impl From<FirebaseError> for StoreError {
    fn from(err: FirebaseError) -> Self {
        match err {
            FirebaseError::Api { status: 401, .. } => Self::Unauthenticated,
            FirebaseError::Api { status, .. } if (400..500).contains(&status) => {
                Self::Rejected(err.to_string())
            }
            FirebaseError::Decode(detail) => Self::Malformed(detail),
            other => Self::Unavailable(other.to_string()),
        }
    }
}

pub struct Firestore {
    client: Client,
    documents: Url,
    token: TokenHandle,
}

impl std::fmt::Debug for Firestore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Firestore")
            .field("documents", &self.documents.as_str())
            .field("token", &self.token)
            .finish_non_exhaustive()
    }
}

impl Firestore {
    /// # Errors
    ///
    /// Fails when `base_url` is not a usable URL or the HTTP client cannot be
    /// built.
    pub fn new(base_url: &str, project_id: &str, token: TokenHandle) -> Result<Self, FirebaseError> {
        let base = Url::parse(base_url)?;
        let documents = endpoint_url(
            &base,
            &["projects", project_id, "databases", "(default)", "documents"],
        )?;
        Ok(Self {
            client: http_client()?,
            documents,
            token,
        })
    }

    fn document_url(&self, collection: &str, key: &str) -> Result<Url, StoreError> {
        Ok(endpoint_url(&self.documents, &[collection, key])?)
    }

    fn bearer(&self) -> Result<String, StoreError> {
        self.token.bearer().ok_or(StoreError::Unauthenticated)
    }
}

#[async_trait]
impl ProfileStore for Firestore {
    #[instrument(skip(self))]
    async fn read_document(
        &self,
        collection: &str,
        key: &str,
    ) -> Result<Option<ProfilePatch>, StoreError> {
        let url = self.document_url(collection, key)?;
        let response = self
            .client
            .get(url)
            .bearer_auth(self.bearer()?)
            .send()
            .await
            .map_err(FirebaseError::from)?;

        if response.status() == StatusCode::NOT_FOUND {
            debug!("no profile document");
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(api_error(response).await.into());
        }

        let document: Value = response.json().await.map_err(FirebaseError::from)?;
        match document.get("fields") {
            Some(Value::Object(fields)) => decode_fields(fields).map(Some),
            Some(_) => Err(StoreError::Malformed("fields is not an object".to_string())),
            None => Ok(Some(ProfilePatch::default())),
        }
    }

    #[instrument(skip(self, patch))]
    async fn merge_write_document(
        &self,
        collection: &str,
        key: &str,
        patch: &ProfilePatch,
    ) -> Result<(), StoreError> {
        if patch.is_empty() {
            debug!(collection, key, "empty patch, nothing to write");
            return Ok(());
        }
        let fields = encode_fields(patch)?;

        let mut url = self.document_url(collection, key)?;
        {
            let mut query = url.query_pairs_mut();
            for name in fields.keys() {
                query.append_pair("updateMask.fieldPaths", name);
            }
        }

        let response = self
            .client
            .patch(url)
            .bearer_auth(self.bearer()?)
            .json(&json!({ "fields": fields }))
            .send()
            .await
            .map_err(FirebaseError::from)?;

        if !response.status().is_success() {
            return Err(api_error(response).await.into());
        }

        debug!(fields = fields.len(), "profile document written");

        Ok(())
    }
}
