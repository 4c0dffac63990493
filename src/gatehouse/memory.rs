//! In-process identity provider and profile store.
//!
//! Both follow the semantics of the hosted services closely enough to drive
//! the coordinator end to end: duplicate emails, the six character password
//! floor, lockout after repeated failures, federated consent that can be
//! dismissed, and merge-writes with a write log that tests can inspect.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use secrecy::{ExposeSecret, SecretString};
use std::{
    collections::{HashMap, VecDeque},
    sync::atomic::{AtomicBool, AtomicUsize, Ordering},
};
use tracing::debug;
use uuid::Uuid;

use super::{
    error::StoreError,
    identity::{
        FederatedProvider, FederatedSignIn, IdentityProvider, ProviderError, ProviderErrorCode,
        SessionChanges, SessionNotifier,
    },
    profile::ProfilePatch,
    session::{Session, SessionMetadata},
    store::ProfileStore,
    validation::valid_email,
};

/// Minimum password length enforced by the provider.
pub const MIN_PASSWORD_LENGTH: usize = 6;

/// Failed password attempts before further attempts are refused.
pub const MAX_FAILED_ATTEMPTS: usize = 5;

#[derive(Debug)]
struct Account {
    uid: String,
    email: String,
    password: Option<SecretString>,
    display_name: Option<String>,
    photo_url: Option<String>,
    email_verified: bool,
    created_at: DateTime<Utc>,
    last_sign_in_at: DateTime<Utc>,
    failed_attempts: usize,
}

impl Account {
    fn session(&self) -> Session {
        Session {
            uid: self.uid.clone(),
            email: Some(self.email.clone()),
            display_name: self.display_name.clone(),
            photo_url: self.photo_url.clone(),
            email_verified: self.email_verified,
            metadata: SessionMetadata::new(self.created_at, self.last_sign_in_at),
        }
    }
}

/// Identity returned by a scripted federated consent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FederatedIdentity {
    pub email: String,
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
}

impl FederatedIdentity {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            display_name: None,
            photo_url: None,
        }
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
}

#[derive(Debug, Default)]
pub struct MemoryIdentityProvider {
    accounts: Mutex<HashMap<String, Account>>,
    notifier: SessionNotifier,
    consents: Mutex<VecDeque<Option<FederatedIdentity>>>,
    next_failure: Mutex<Option<ProviderError>>,
    report_new_account: AtomicBool,
    verification_requests: AtomicUsize,
}

impl MemoryIdentityProvider {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Report the explicit new-account flag on federated sign-ins instead of
    /// leaving the decision to the timestamps.
    #[must_use]
    pub fn with_new_account_flag(self) -> Self {
        self.report_new_account.store(true, Ordering::Relaxed);
        self
    }

    /// The next federated flow completes with `identity`.
    pub fn queue_consent(&self, identity: FederatedIdentity) {
        self.consents.lock().push_back(Some(identity));
    }

    /// The next federated flow is dismissed by the user.
    pub fn queue_dismissed_consent(&self) {
        self.consents.lock().push_back(None);
    }

    /// The next provider call fails with `error`.
    pub fn fail_next(&self, error: ProviderError) {
        *self.next_failure.lock() = Some(error);
    }

    /// Mark the account behind `email` as verified, as if the link in the
    /// verification email had been followed.
    pub fn confirm_email(&self, email: &str) -> bool {
        let mut accounts = self.accounts.lock();
        match accounts.get_mut(&normalize(email)) {
            Some(account) => {
                account.email_verified = true;
                true
            }
            None => false,
        }
    }

    #[must_use]
    pub fn verification_requests(&self) -> usize {
        self.verification_requests.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn account_count(&self) -> usize {
        self.accounts.lock().len()
    }

    fn take_failure(&self) -> Result<(), ProviderError> {
        match self.next_failure.lock().take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn sign_in_account(&self, session: Session) -> Session {
        self.notifier.publish(Some(session.clone()));
        session
    }
}

fn normalize(email: &str) -> String {
    email.trim().to_lowercase()
}

#[async_trait]
impl IdentityProvider for MemoryIdentityProvider {
    async fn create_account(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<Session, ProviderError> {
        self.take_failure()?;

        let email = normalize(email);
        if !valid_email(&email) {
            return Err(ProviderError::new(
                ProviderErrorCode::InvalidEmail,
                "The email address is badly formatted.",
            ));
        }
        if password.expose_secret().chars().count() < MIN_PASSWORD_LENGTH {
            return Err(ProviderError::new(
                ProviderErrorCode::WeakPassword,
                "Password should be at least 6 characters",
            ));
        }

        let session = {
            let mut accounts = self.accounts.lock();
            if accounts.contains_key(&email) {
                return Err(ProviderError::new(
                    ProviderErrorCode::EmailAlreadyInUse,
                    "The email address is already in use by another account.",
                ));
            }
            let now = Utc::now();
            let account = Account {
                uid: Uuid::new_v4().simple().to_string(),
                email: email.clone(),
                password: Some(SecretString::from(password.expose_secret().to_string())),
                display_name: None,
                photo_url: None,
                email_verified: false,
                created_at: now,
                last_sign_in_at: now,
                failed_attempts: 0,
            };
            let session = account.session();
            accounts.insert(email, account);
            session
        };

        debug!(uid = %session.uid, "account created");
        Ok(self.sign_in_account(session))
    }

    async fn authenticate(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<Session, ProviderError> {
        self.take_failure()?;

        let session = {
            let mut accounts = self.accounts.lock();
            let Some(account) = accounts.get_mut(&normalize(email)) else {
                return Err(ProviderError::new(
                    ProviderErrorCode::UserNotFound,
                    "There is no user record corresponding to this identifier.",
                ));
            };
            if account.failed_attempts >= MAX_FAILED_ATTEMPTS {
                return Err(ProviderError::new(
                    ProviderErrorCode::TooManyRequests,
                    "Access to this account has been temporarily disabled.",
                ));
            }
            let matches = account
                .password
                .as_ref()
                .is_some_and(|stored| stored.expose_secret() == password.expose_secret());
            if !matches {
                account.failed_attempts += 1;
                return Err(ProviderError::new(
                    ProviderErrorCode::WrongPassword,
                    "The password is invalid or the user does not have a password.",
                ));
            }
            account.failed_attempts = 0;
            account.last_sign_in_at = Utc::now();
            account.session()
        };

        Ok(self.sign_in_account(session))
    }

    async fn authenticate_federated(
        &self,
        provider: FederatedProvider,
    ) -> Result<FederatedSignIn, ProviderError> {
        self.take_failure()?;

        let Some(identity) = self.consents.lock().pop_front().flatten() else {
            return Err(ProviderError::new(
                ProviderErrorCode::PopupClosedByUser,
                format!("The {provider} popup has been closed by the user."),
            ));
        };

        let (session, created) = {
            let mut accounts = self.accounts.lock();
            let email = normalize(&identity.email);
            let now = Utc::now();
            match accounts.get_mut(&email) {
                Some(account) => {
                    account.last_sign_in_at = now;
                    (account.session(), false)
                }
                None => {
                    let account = Account {
                        uid: Uuid::new_v4().simple().to_string(),
                        email: email.clone(),
                        password: None,
                        display_name: identity.display_name,
                        photo_url: identity.photo_url,
                        email_verified: true,
                        created_at: now,
                        last_sign_in_at: now,
                        failed_attempts: 0,
                    };
                    let session = account.session();
                    accounts.insert(email, account);
                    (session, true)
                }
            }
        };

        let is_new_account = self
            .report_new_account
            .load(Ordering::Relaxed)
            .then_some(created);

        Ok(FederatedSignIn {
            session: self.sign_in_account(session),
            is_new_account,
        })
    }

    async fn deauthenticate(&self) -> Result<(), ProviderError> {
        self.take_failure()?;
        self.notifier.publish(None);
        Ok(())
    }

    fn current_session(&self) -> Option<Session> {
        self.notifier.current()
    }

    fn subscribe(&self) -> SessionChanges {
        self.notifier.subscribe()
    }

    async fn request_email_verification(&self) -> Result<(), ProviderError> {
        self.take_failure()?;
        if self.notifier.current().is_none() {
            return Err(ProviderError::other(
                "auth/no-current-user",
                "No user currently signed in.",
            ));
        }
        self.verification_requests.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn check_email_verified(&self) -> Result<bool, ProviderError> {
        self.take_failure()?;
        let Some(current) = self.notifier.current() else {
            return Err(ProviderError::other(
                "auth/no-current-user",
                "No user currently signed in.",
            ));
        };

        let refreshed = self
            .accounts
            .lock()
            .values()
            .find(|account| account.uid == current.uid)
            .map(Account::session);

        match refreshed {
            Some(session) => {
                let verified = session.email_verified;
                self.notifier.refresh(session);
                Ok(verified)
            }
            None => Err(ProviderError::other(
                "auth/user-token-expired",
                "The user's credential is no longer valid.",
            )),
        }
    }
}

/// One merge-write as seen by the store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoreWrite {
    pub collection: String,
    pub key: String,
    pub patch: ProfilePatch,
}

#[derive(Debug, Default)]
pub struct MemoryProfileStore {
    documents: Mutex<HashMap<(String, String), ProfilePatch>>,
    writes: Mutex<Vec<StoreWrite>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl MemoryProfileStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::Relaxed);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::Relaxed);
    }

    #[must_use]
    pub fn document(&self, collection: &str, key: &str) -> Option<ProfilePatch> {
        self.documents
            .lock()
            .get(&(collection.to_string(), key.to_string()))
            .cloned()
    }

    /// Every successful write, oldest first.
    #[must_use]
    pub fn writes(&self) -> Vec<StoreWrite> {
        self.writes.lock().clone()
    }

    /// Writes to `key` that created the profile document.
    #[must_use]
    pub fn creation_writes(&self, key: &str) -> usize {
        self.writes
            .lock()
            .iter()
            .filter(|write| write.key == key && write.patch.is_creation())
            .count()
    }
}

#[async_trait]
impl ProfileStore for MemoryProfileStore {
    async fn read_document(
        &self,
        collection: &str,
        key: &str,
    ) -> Result<Option<ProfilePatch>, StoreError> {
        if self.fail_reads.load(Ordering::Relaxed) {
            return Err(StoreError::Unavailable("read refused".to_string()));
        }
        Ok(self.document(collection, key))
    }

    async fn merge_write_document(
        &self,
        collection: &str,
        key: &str,
        patch: &ProfilePatch,
    ) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::Relaxed) {
            return Err(StoreError::Unavailable("write refused".to_string()));
        }
        self.documents
            .lock()
            .entry((collection.to_string(), key.to_string()))
            .or_default()
            .merge(patch);
        self.writes.lock().push(StoreWrite {
            collection: collection.to_string(),
            key: key.to_string(),
            patch: patch.clone(),
        });
        Ok(())
    }
}
