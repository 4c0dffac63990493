//! Provider-issued session records. The coordinator observes these and never
//! mutates them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Authenticated identity as reported by the identity provider.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub uid: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
    pub email_verified: bool,
    pub metadata: SessionMetadata,
}

/// Account timestamps kept by the provider.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionMetadata {
    pub created_at: Option<DateTime<Utc>>,
    pub last_sign_in_at: Option<DateTime<Utc>>,
}

impl SessionMetadata {
    #[must_use]
    pub fn new(created_at: DateTime<Utc>, last_sign_in_at: DateTime<Utc>) -> Self {
        Self {
            created_at: Some(created_at),
            last_sign_in_at: Some(last_sign_in_at),
        }
    }

    /// True when the account was created by this very sign-in.
    ///
    /// Both timestamps must be known; a missing one never counts as a first
    /// sign-in.
    #[must_use]
    pub fn is_first_sign_in(&self) -> bool {
        match (self.created_at, self.last_sign_in_at) {
            (Some(created), Some(last)) => created == last,
            _ => false,
        }
    }
}

impl Session {
    #[must_use]
    pub fn new(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            email: None,
            display_name: None,
            photo_url: None,
            email_verified: false,
            metadata: SessionMetadata::default(),
        }
    }

    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    #[must_use]
    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    #[must_use]
    pub fn with_photo_url(mut self, photo_url: impl Into<String>) -> Self {
        self.photo_url = Some(photo_url.into());
        self
    }

    #[must_use]
    pub fn with_email_verified(mut self, verified: bool) -> Self {
        self.email_verified = verified;
        self
    }

    #[must_use]
    pub fn with_metadata(mut self, metadata: SessionMetadata) -> Self {
        self.metadata = metadata;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn first_sign_in_requires_equal_timestamps() {
        let now = Utc::now();
        assert!(SessionMetadata::new(now, now).is_first_sign_in());
        assert!(!SessionMetadata::new(now, now + Duration::seconds(5)).is_first_sign_in());
    }

    #[test]
    fn missing_timestamps_are_not_first_sign_in() {
        let metadata = SessionMetadata {
            created_at: Some(Utc::now()),
            last_sign_in_at: None,
        };
        assert!(!metadata.is_first_sign_in());
        assert!(!SessionMetadata::default().is_first_sign_in());
    }

    #[test]
    fn builder_sets_fields() {
        let session = Session::new("uid-1")
            .with_email("alice@example.com")
            .with_display_name("Alice")
            .with_email_verified(true);
        assert_eq!(session.uid, "uid-1");
        assert_eq!(session.email.as_deref(), Some("alice@example.com"));
        assert_eq!(session.display_name.as_deref(), Some("Alice"));
        assert!(session.photo_url.is_none());
        assert!(session.email_verified);
    }
}
