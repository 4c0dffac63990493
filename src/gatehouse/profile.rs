//! Locally owned profile records and the partial form used for merge-writes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::session::Session;

/// Role assigned to every profile that has no stored role.
pub const DEFAULT_ROLE: &str = "user";

/// Store collection holding one profile document per `uid`.
pub const PROFILE_COLLECTION: &str = "users";

/// Enriched view of a signed-in account.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub uid: String,
    pub email: String,
    pub display_name: String,
    #[serde(rename = "photoURL")]
    pub photo_url: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
    pub last_login_at: DateTime<Utc>,
}

/// Partial profile. Only the fields that are set take part in a merge-write,
/// and a stored document is read back in this shape because it may be
/// incomplete.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfilePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(
        default,
        rename = "photoURL",
        skip_serializing_if = "Option::is_none"
    )]
    pub photo_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_login_at: Option<DateTime<Utc>>,
}

impl ProfilePatch {
    /// Full document written when an account signs in for the first time.
    #[must_use]
    pub fn new_account(
        uid: &str,
        email: &str,
        display_name: &str,
        photo_url: Option<&str>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            uid: Some(uid.to_string()),
            email: Some(email.to_string()),
            display_name: Some(display_name.to_string()),
            photo_url: photo_url.map(str::to_string),
            role: Some(DEFAULT_ROLE.to_string()),
            created_at: Some(now),
            last_login_at: Some(now),
        }
    }

    #[must_use]
    pub fn last_login(now: DateTime<Utc>) -> Self {
        Self {
            last_login_at: Some(now),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    #[must_use]
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    #[must_use]
    pub fn with_photo_url(mut self, photo_url: impl Into<String>) -> Self {
        self.photo_url = Some(photo_url.into());
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// True when this patch carries a creation timestamp, i.e. it creates the
    /// document rather than touching an existing one.
    #[must_use]
    pub fn is_creation(&self) -> bool {
        self.created_at.is_some()
    }

    /// Field-wise merge; fields set in `other` win.
    pub fn merge(&mut self, other: &Self) {
        merge_field(&mut self.uid, &other.uid);
        merge_field(&mut self.email, &other.email);
        merge_field(&mut self.display_name, &other.display_name);
        merge_field(&mut self.photo_url, &other.photo_url);
        merge_field(&mut self.role, &other.role);
        merge_field(&mut self.created_at, &other.created_at);
        merge_field(&mut self.last_login_at, &other.last_login_at);
    }
}

fn merge_field<T: Clone>(target: &mut Option<T>, source: &Option<T>) {
    if let Some(value) = source {
        *target = Some(value.clone());
    }
}

impl Profile {
    /// Merge the live session with whatever the store holds.
    ///
    /// Non-empty session values win over stored ones, the role falls back to
    /// [`DEFAULT_ROLE`], a missing creation time becomes `now`, and the last
    /// login is always `now`.
    #[must_use]
    pub fn enrich(session: &Session, stored: Option<&ProfilePatch>, now: DateTime<Utc>) -> Self {
        Self {
            uid: session.uid.clone(),
            email: prefer_live(
                session.email.as_deref(),
                stored.and_then(|p| p.email.as_deref()),
            ),
            display_name: prefer_live(
                session.display_name.as_deref(),
                stored.and_then(|p| p.display_name.as_deref()),
            ),
            photo_url: prefer_live(
                session.photo_url.as_deref(),
                stored.and_then(|p| p.photo_url.as_deref()),
            ),
            role: stored
                .and_then(|p| p.role.as_deref())
                .filter(|role| !role.is_empty())
                .unwrap_or(DEFAULT_ROLE)
                .to_string(),
            created_at: stored.and_then(|p| p.created_at).unwrap_or(now),
            last_login_at: now,
        }
    }

    /// Apply a merge-write to the in-memory copy. The `uid` never changes.
    pub fn apply(&mut self, patch: &ProfilePatch) {
        if let Some(email) = &patch.email {
            self.email.clone_from(email);
        }
        if let Some(display_name) = &patch.display_name {
            self.display_name.clone_from(display_name);
        }
        if let Some(photo_url) = &patch.photo_url {
            self.photo_url.clone_from(photo_url);
        }
        if let Some(role) = &patch.role {
            self.role.clone_from(role);
        }
        if let Some(created_at) = patch.created_at {
            self.created_at = created_at;
        }
        if let Some(last_login_at) = patch.last_login_at {
            self.last_login_at = last_login_at;
        }
    }
}

fn prefer_live(live: Option<&str>, stored: Option<&str>) -> String {
    live.filter(|value| !value.is_empty())
        .or_else(|| stored.filter(|value| !value.is_empty()))
        .unwrap_or_default()
        .to_string()
}
