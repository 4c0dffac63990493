//! Session/profile coordinator.
//!
//! One long-lived subscription to the provider's session changes drives the
//! published [`AuthSnapshot`]. Notifications are handled one at a time in a
//! single task:
//!
//! 1. the raw session is published immediately;
//! 2. a present session is enriched from the profile store, the merged profile
//!    is published, and `lastLoginAt` is written back best-effort;
//! 3. an absent session publishes an absent profile without touching the
//!    store.
//!
//! A profile is only published when the snapshot holds a session with the
//! same `uid`, so consumers never observe a profile without its session. The
//! profile may lag the session by one store round trip.
//!
//! A profile write for the signed-in user that lands while its enrichment is
//! still in flight is parked and applied when the enriched profile is
//! published, so a read answered before the write cannot publish stale
//! fields.

use chrono::Utc;
use parking_lot::Mutex;
use secrecy::SecretString;
use serde::Serialize;
use std::{collections::HashMap, sync::Arc};
use tokio::{sync::watch, task::JoinHandle};
use tracing::{debug, error, info, instrument, warn};

use super::{
    error::{AuthError, IdentityError},
    identity::{FederatedProvider, IdentityProvider, ProviderError, SessionChanges},
    profile::{Profile, ProfilePatch, PROFILE_COLLECTION},
    session::Session,
    store::ProfileStore,
};

/// What the front-end renders from.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct AuthSnapshot {
    pub session: Option<Session>,
    pub profile: Option<Profile>,
}

impl AuthSnapshot {
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        self.session.is_some()
    }

    /// True once the profile for the current session has been published.
    #[must_use]
    pub fn is_enriched(&self) -> bool {
        match (&self.session, &self.profile) {
            (Some(session), Some(profile)) => session.uid == profile.uid,
            _ => false,
        }
    }
}

struct Shared {
    provider: Arc<dyn IdentityProvider>,
    store: Arc<dyn ProfileStore>,
    state: watch::Sender<AuthSnapshot>,
    // Written patches waiting for the enriched profile of their uid. Only
    // touched inside `state` closures.
    parked: Mutex<HashMap<String, ProfilePatch>>,
}

pub struct Coordinator {
    shared: Arc<Shared>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("snapshot", &*self.shared.state.borrow())
            .field("listening", &self.is_listening())
            .finish_non_exhaustive()
    }
}

impl Coordinator {
    /// Subscribe to the provider and start handling session changes.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime.
    pub fn start(provider: Arc<dyn IdentityProvider>, store: Arc<dyn ProfileStore>) -> Self {
        let (state, _) = watch::channel(AuthSnapshot::default());
        let changes = provider.subscribe();
        let shared = Arc::new(Shared {
            provider,
            store,
            state,
            parked: Mutex::new(HashMap::new()),
        });

        let listener = tokio::spawn(listen(Arc::clone(&shared), changes));
        debug!("subscribed to session changes");

        Self {
            shared,
            listener: Mutex::new(Some(listener)),
        }
    }

    /// Tear down the session subscription. Later calls are no-ops.
    pub fn shutdown(&self) {
        if let Some(listener) = self.listener.lock().take() {
            listener.abort();
            debug!("unsubscribed from session changes");
        }
    }

    #[must_use]
    pub fn is_listening(&self) -> bool {
        self.listener
            .lock()
            .as_ref()
            .is_some_and(|listener| !listener.is_finished())
    }

    /// Receiver for every published snapshot.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<AuthSnapshot> {
        self.shared.state.subscribe()
    }

    #[must_use]
    pub fn snapshot(&self) -> AuthSnapshot {
        self.shared.state.borrow().clone()
    }

    /// Provider's cached session; no I/O.
    #[must_use]
    pub fn current_session(&self) -> Option<Session> {
        self.shared.provider.current_session()
    }

    #[must_use]
    pub fn current_profile(&self) -> Option<Profile> {
        self.shared.state.borrow().profile.clone()
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.shared.state.borrow().is_authenticated()
    }

    /// `false` when no profile is loaded.
    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.shared
            .state
            .borrow()
            .profile
            .as_ref()
            .is_some_and(|profile| profile.role == role)
    }

    /// Create an account and its profile document.
    ///
    /// # Errors
    ///
    /// [`AuthError::Identity`] when the provider refuses the account,
    /// [`AuthError::Store`] when the profile document cannot be written.
    #[instrument(skip(self, password))]
    pub async fn sign_up(
        &self,
        email: &str,
        password: &SecretString,
        display_name: &str,
    ) -> Result<Session, AuthError> {
        let session = self
            .shared
            .provider
            .create_account(email, password)
            .await
            .map_err(|err| identity_failure("sign up", err))?;

        let patch = ProfilePatch::new_account(
            &session.uid,
            session.email.as_deref().unwrap_or(email),
            display_name,
            None,
            Utc::now(),
        );
        self.set_profile(&session.uid, &patch).await?;

        info!(uid = %session.uid, "account created");

        Ok(session)
    }

    /// Password sign-in. The last-login write is left to the session-change
    /// handler so it happens once per sign-in.
    ///
    /// # Errors
    ///
    /// [`AuthError::Identity`] when the provider rejects the credentials.
    #[instrument(skip(self, password))]
    pub async fn sign_in(&self, email: &str, password: &SecretString) -> Result<Session, AuthError> {
        let session = self
            .shared
            .provider
            .authenticate(email, password)
            .await
            .map_err(|err| identity_failure("sign in", err))?;

        debug!(uid = %session.uid, "signed in");

        Ok(session)
    }

    /// Federated sign-in; first-time accounts get a profile document.
    ///
    /// # Errors
    ///
    /// [`AuthError::Identity`] when the flow is dismissed or fails,
    /// [`AuthError::Store`] when the new profile cannot be written.
    #[instrument(skip(self))]
    pub async fn sign_in_with_federated(
        &self,
        provider: FederatedProvider,
    ) -> Result<Session, AuthError> {
        let sign_in = self
            .shared
            .provider
            .authenticate_federated(provider)
            .await
            .map_err(|err| identity_failure("federated sign in", err))?;

        if sign_in.is_new_account() {
            let session = &sign_in.session;
            let patch = ProfilePatch::new_account(
                &session.uid,
                session.email.as_deref().unwrap_or_default(),
                session.display_name.as_deref().unwrap_or_default(),
                Some(session.photo_url.as_deref().unwrap_or_default()),
                Utc::now(),
            );
            self.set_profile(&session.uid, &patch).await?;
            info!(uid = %session.uid, %provider, "federated account created");
        } else {
            debug!(uid = %sign_in.session.uid, %provider, "returning federated account");
        }

        Ok(sign_in.session)
    }

    /// Sign out. The snapshot clears when the provider's notification arrives.
    ///
    /// # Errors
    ///
    /// [`AuthError::Identity`] when the provider fails to sign out.
    #[instrument(skip(self))]
    pub async fn sign_out(&self) -> Result<(), AuthError> {
        self.shared
            .provider
            .deauthenticate()
            .await
            .map_err(|err| identity_failure("sign out", err))
    }

    /// Merge-write `patch` into the profile of `uid` and mirror it into the
    /// published profile when it belongs to the same user. When that user's
    /// profile is not published yet the patch is applied on publication.
    ///
    /// # Errors
    ///
    /// [`AuthError::Store`] when the write fails; the snapshot is untouched.
    #[instrument(skip(self, patch))]
    pub async fn set_profile(&self, uid: &str, patch: &ProfilePatch) -> Result<(), AuthError> {
        self.shared
            .store
            .merge_write_document(PROFILE_COLLECTION, uid, patch)
            .await
            .map_err(|err| {
                error!("Error setting user data: {err}");
                AuthError::Store(err)
            })?;

        self.shared.state.send_if_modified(|snapshot| {
            if let Some(profile) = snapshot.profile.as_mut().filter(|p| p.uid == uid) {
                profile.apply(patch);
                return true;
            }
            if snapshot.session.as_ref().is_some_and(|s| s.uid == uid) {
                self.shared
                    .parked
                    .lock()
                    .entry(uid.to_string())
                    .or_default()
                    .merge(patch);
            }
            false
        });

        Ok(())
    }

    /// [`Self::set_profile`] for the signed-in user.
    ///
    /// # Errors
    ///
    /// [`AuthError::NoActiveSession`] without a session (nothing is written),
    /// [`AuthError::Store`] when the write fails.
    pub async fn update_profile(&self, patch: &ProfilePatch) -> Result<(), AuthError> {
        let Some(session) = self.current_session() else {
            return Err(AuthError::NoActiveSession);
        };
        self.set_profile(&session.uid, patch).await
    }

    /// Ask the provider to send a verification email to the signed-in user.
    ///
    /// # Errors
    ///
    /// [`AuthError::NoActiveSession`] without a session,
    /// [`AuthError::Identity`] when the provider fails.
    #[instrument(skip(self))]
    pub async fn send_email_verification(&self) -> Result<(), AuthError> {
        if self.current_session().is_none() {
            return Err(AuthError::NoActiveSession);
        }
        self.shared
            .provider
            .request_email_verification()
            .await
            .map_err(|err| identity_failure("send email verification", err))
    }

    /// Refresh the signed-in account and report whether its email is
    /// verified.
    ///
    /// # Errors
    ///
    /// [`AuthError::NoActiveSession`] without a session,
    /// [`AuthError::Identity`] when the provider fails.
    pub async fn check_email_verification(&self) -> Result<bool, AuthError> {
        if self.current_session().is_none() {
            return Err(AuthError::NoActiveSession);
        }
        self.shared
            .provider
            .check_email_verified()
            .await
            .map_err(|err| identity_failure("check email verification", err))
    }
}

impl Drop for Coordinator {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Log a provider failure at the severity its class calls for and convert it.
fn identity_failure(operation: &'static str, err: ProviderError) -> AuthError {
    let code = err.code.clone();
    let identity = IdentityError::from(err);
    match &identity {
        IdentityError::Unknown { detail, .. } => {
            error!(operation, %code, "Auth error: {detail}");
        }
        expected => {
            warn!(operation, %code, "Auth warning: {expected}");
        }
    }
    AuthError::Identity(identity)
}

async fn listen(shared: Arc<Shared>, mut changes: SessionChanges) {
    while let Some(session) = changes.recv().await {
        shared.on_session_change(session).await;
    }
    debug!("session change stream closed");
}

impl Shared {
    #[instrument(skip_all, fields(uid = session.as_ref().map(|s| s.uid.as_str())))]
    async fn on_session_change(&self, session: Option<Session>) {
        self.state.send_modify(|snapshot| {
            let same_user = matches!(
                (&snapshot.profile, &session),
                (Some(profile), Some(next)) if profile.uid == next.uid
            );
            if !same_user {
                snapshot.profile = None;
                self.parked
                    .lock()
                    .retain(|uid, _| session.as_ref().is_some_and(|next| &next.uid == uid));
            }
            snapshot.session.clone_from(&session);
        });

        let Some(session) = session else {
            debug!("session cleared");
            return;
        };

        let stored = match self
            .store
            .read_document(PROFILE_COLLECTION, &session.uid)
            .await
        {
            Ok(stored) => stored,
            Err(err) => {
                // Signed in with a degraded (absent) profile.
                warn!("Error getting user data: {err}");
                return;
            }
        };

        let now = Utc::now();
        let mut profile = Profile::enrich(&session, stored.as_ref(), now);
        self.state.send_if_modified(|snapshot| {
            let current = snapshot
                .session
                .as_ref()
                .is_some_and(|active| active.uid == profile.uid);
            if current {
                if let Some(patch) = self.parked.lock().remove(&profile.uid) {
                    profile.apply(&patch);
                }
                snapshot.profile = Some(profile);
            }
            current
        });

        if let Err(err) = self
            .store
            .merge_write_document(PROFILE_COLLECTION, &session.uid, &ProfilePatch::last_login(now))
            .await
        {
            warn!("Failed to record last login: {err}");
        }
    }
}
