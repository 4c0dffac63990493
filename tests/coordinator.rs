use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use gatehouse::gatehouse::{
    memory::{FederatedIdentity, MemoryIdentityProvider, MemoryProfileStore},
    AuthError, AuthSnapshot, Coordinator, FederatedProvider, IdentityError, ProfilePatch,
    ProfileStore, StoreError, PROFILE_COLLECTION,
};
use secrecy::SecretString;
use std::{sync::Arc, time::Duration};
use tokio::{sync::watch, time::timeout};

struct Harness {
    provider: Arc<MemoryIdentityProvider>,
    store: Arc<MemoryProfileStore>,
    coordinator: Coordinator,
}

fn harness() -> Harness {
    harness_with(MemoryIdentityProvider::new())
}

fn harness_with(provider: MemoryIdentityProvider) -> Harness {
    let provider = Arc::new(provider);
    let store = Arc::new(MemoryProfileStore::new());
    let coordinator = Coordinator::start(provider.clone(), store.clone());
    Harness {
        provider,
        store,
        coordinator,
    }
}

/// Store with network-like latency: a read sees the document as it was when
/// the request was made and answers later, a write lands after a delay.
struct SlowStore {
    inner: MemoryProfileStore,
    read_delay: Duration,
    write_delay: Duration,
}

#[async_trait]
impl ProfileStore for SlowStore {
    async fn read_document(
        &self,
        collection: &str,
        key: &str,
    ) -> Result<Option<ProfilePatch>, StoreError> {
        let document = self.inner.read_document(collection, key).await;
        tokio::time::sleep(self.read_delay).await;
        document
    }

    async fn merge_write_document(
        &self,
        collection: &str,
        key: &str,
        patch: &ProfilePatch,
    ) -> Result<(), StoreError> {
        tokio::time::sleep(self.write_delay).await;
        self.inner.merge_write_document(collection, key, patch).await
    }
}

fn secret(value: &str) -> SecretString {
    SecretString::from(value.to_string())
}

async fn wait_until(
    receiver: &mut watch::Receiver<AuthSnapshot>,
    condition: impl FnMut(&AuthSnapshot) -> bool,
) -> Result<AuthSnapshot> {
    let snapshot = timeout(Duration::from_secs(2), receiver.wait_for(condition))
        .await
        .context("timed out waiting for snapshot")??
        .clone();
    Ok(snapshot)
}

#[tokio::test]
async fn sign_up_publishes_session_and_profile() -> Result<()> {
    let h = harness();
    let mut receiver = h.coordinator.watch();
    let before = Utc::now();

    let session = h
        .coordinator
        .sign_up("alice@example.com", &secret("secret1"), "Alice")
        .await?;
    assert!(!session.uid.is_empty());

    let snapshot = wait_until(&mut receiver, AuthSnapshot::is_enriched).await?;
    let profile = snapshot.profile.context("profile missing")?;
    assert_eq!(profile.uid, session.uid);
    assert_eq!(profile.role, "user");
    assert_eq!(profile.display_name, "Alice");
    assert_eq!(profile.email, "alice@example.com");
    assert!(profile.created_at >= before);
    assert!(profile.created_at <= Utc::now());
    assert!(h.coordinator.is_authenticated());
    Ok(())
}

#[tokio::test]
async fn duplicate_sign_up_is_expected_error() -> Result<()> {
    let h = harness();
    h.coordinator
        .sign_up("alice@example.com", &secret("secret1"), "Alice")
        .await?;

    let duplicate = h
        .coordinator
        .sign_up("alice@example.com", &secret("secret2"), "Other Alice")
        .await;
    let err = duplicate.err().context("duplicate sign up succeeded")?;
    assert_eq!(err, AuthError::Identity(IdentityError::DuplicateEmail));
    assert!(err.is_expected());
    assert_eq!(h.provider.account_count(), 1);
    Ok(())
}

#[tokio::test]
async fn wrong_password_leaves_session_absent() -> Result<()> {
    let h = harness();
    h.coordinator
        .sign_up("alice@example.com", &secret("secret1"), "Alice")
        .await?;
    h.coordinator.sign_out().await?;
    let mut receiver = h.coordinator.watch();
    wait_until(&mut receiver, |s| s.session.is_none()).await?;

    let result = h
        .coordinator
        .sign_in("alice@example.com", &secret("wrong-password"))
        .await;
    assert_eq!(
        result.err(),
        Some(AuthError::Identity(IdentityError::InvalidCredentials))
    );
    assert!(h.coordinator.current_session().is_none());
    assert!(h.coordinator.snapshot().session.is_none());
    Ok(())
}

#[tokio::test]
async fn store_read_failure_keeps_session_without_profile() -> Result<()> {
    let h = harness();
    h.coordinator
        .sign_up("alice@example.com", &secret("secret1"), "Alice")
        .await?;
    h.coordinator.sign_out().await?;
    let mut receiver = h.coordinator.watch();
    wait_until(&mut receiver, |s| s.session.is_none()).await?;

    h.store.set_fail_reads(true);
    let writes_before = h.store.writes().len();

    let session = h
        .coordinator
        .sign_in("alice@example.com", &secret("secret1"))
        .await?;
    let snapshot = wait_until(&mut receiver, |s| s.session.is_some()).await?;
    assert_eq!(snapshot.session.map(|s| s.uid), Some(session.uid));

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(h.coordinator.current_profile().is_none());
    assert_eq!(h.store.writes().len(), writes_before);
    Ok(())
}

#[tokio::test]
async fn sign_in_records_last_login() -> Result<()> {
    let h = harness();
    let session = h
        .coordinator
        .sign_up("alice@example.com", &secret("secret1"), "Alice")
        .await?;
    h.coordinator.sign_out().await?;
    let mut receiver = h.coordinator.watch();
    wait_until(&mut receiver, |s| s.session.is_none()).await?;
    let created = h
        .store
        .document(PROFILE_COLLECTION, &session.uid)
        .and_then(|d| d.created_at)
        .context("creation time missing")?;

    h.coordinator
        .sign_in("alice@example.com", &secret("secret1"))
        .await?;
    let snapshot = wait_until(&mut receiver, AuthSnapshot::is_enriched).await?;
    let profile = snapshot.profile.context("profile missing")?;
    assert_eq!(profile.created_at, created);

    timeout(Duration::from_secs(2), async {
        loop {
            let logged = h
                .store
                .document(PROFILE_COLLECTION, &session.uid)
                .and_then(|d| d.last_login_at);
            if logged == Some(profile.last_login_at) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .context("last login was not written")?;
    Ok(())
}

#[tokio::test]
async fn profile_is_never_published_without_session() -> Result<()> {
    let h = harness();
    let mut receiver = h.coordinator.watch();
    let observer = tokio::spawn(async move {
        let mut violations = 0usize;
        while receiver.changed().await.is_ok() {
            let snapshot = receiver.borrow_and_update().clone();
            let consistent = match (&snapshot.session, &snapshot.profile) {
                (None, Some(_)) => false,
                (Some(session), Some(profile)) => session.uid == profile.uid,
                _ => true,
            };
            if !consistent {
                violations += 1;
            }
        }
        violations
    });

    for round in 0..3 {
        let email = format!("user{round}@example.com");
        h.coordinator.sign_up(&email, &secret("secret1"), "User").await?;
        h.coordinator.sign_out().await?;
        h.coordinator.sign_in(&email, &secret("secret1")).await?;
        h.coordinator.sign_out().await?;
    }

    let mut settled = h.coordinator.watch();
    wait_until(&mut settled, |s| s.session.is_none()).await?;
    tokio::time::sleep(Duration::from_millis(50)).await;

    let snapshot = h.coordinator.snapshot();
    assert!(snapshot.session.is_none());
    assert!(snapshot.profile.is_none());

    drop(h);
    let violations = timeout(Duration::from_secs(2), observer).await??;
    assert_eq!(violations, 0);
    Ok(())
}

#[tokio::test]
async fn update_profile_without_session_writes_nothing() -> Result<()> {
    let h = harness();
    let result = h
        .coordinator
        .update_profile(&ProfilePatch::default().with_display_name("Nobody"))
        .await;
    assert_eq!(result, Err(AuthError::NoActiveSession));
    assert!(h.store.writes().is_empty());
    Ok(())
}

#[tokio::test]
async fn first_federated_sign_in_creates_profile_once() -> Result<()> {
    let h = harness();
    let identity = FederatedIdentity::new("fed@example.com")
        .with_display_name("Fed")
        .with_photo_url("https://example.com/fed.png");
    h.provider.queue_consent(identity.clone());
    h.provider.queue_consent(identity);

    let first = h
        .coordinator
        .sign_in_with_federated(FederatedProvider::Google)
        .await?;
    assert_eq!(h.store.creation_writes(&first.uid), 1);
    let stored = h
        .store
        .document(PROFILE_COLLECTION, &first.uid)
        .context("profile document missing")?;
    assert_eq!(stored.photo_url.as_deref(), Some("https://example.com/fed.png"));

    h.coordinator.sign_out().await?;
    let mut receiver = h.coordinator.watch();
    wait_until(&mut receiver, |s| s.session.is_none()).await?;

    let second = h
        .coordinator
        .sign_in_with_federated(FederatedProvider::Google)
        .await?;
    assert_eq!(second.uid, first.uid);
    wait_until(&mut receiver, AuthSnapshot::is_enriched).await?;
    assert_eq!(h.store.creation_writes(&first.uid), 1);
    Ok(())
}

#[tokio::test]
async fn explicit_new_account_flag_drives_creation() -> Result<()> {
    let h = harness_with(MemoryIdentityProvider::new().with_new_account_flag());
    h.provider
        .queue_consent(FederatedIdentity::new("flag@example.com"));

    let session = h
        .coordinator
        .sign_in_with_federated(FederatedProvider::Facebook)
        .await?;
    assert_eq!(h.store.creation_writes(&session.uid), 1);
    Ok(())
}

#[tokio::test]
async fn dismissed_consent_is_popup_cancelled() {
    let h = harness();
    h.provider.queue_dismissed_consent();

    let result = h
        .coordinator
        .sign_in_with_federated(FederatedProvider::Google)
        .await;
    assert_eq!(
        result.err(),
        Some(AuthError::Identity(IdentityError::PopupCancelled))
    );
    assert!(h.store.writes().is_empty());
}

#[tokio::test]
async fn sign_out_clears_session_and_profile() -> Result<()> {
    let h = harness();
    let mut receiver = h.coordinator.watch();
    h.coordinator
        .sign_up("alice@example.com", &secret("secret1"), "Alice")
        .await?;
    wait_until(&mut receiver, AuthSnapshot::is_enriched).await?;

    h.coordinator.sign_out().await?;
    let snapshot = wait_until(&mut receiver, |s| s.session.is_none()).await?;
    assert!(snapshot.profile.is_none());
    assert!(!h.coordinator.is_authenticated());
    assert!(!h.coordinator.has_role("user"));
    Ok(())
}

#[tokio::test]
async fn sign_up_profile_survives_slow_enrichment_read() -> Result<()> {
    let provider = Arc::new(MemoryIdentityProvider::new());
    let store = Arc::new(SlowStore {
        inner: MemoryProfileStore::new(),
        read_delay: Duration::from_millis(30),
        write_delay: Duration::from_millis(10),
    });
    let coordinator = Coordinator::start(provider, store.clone());
    let mut receiver = coordinator.watch();

    let session = coordinator
        .sign_up("alice@example.com", &secret("secret1"), "Alice")
        .await?;

    let first = wait_until(&mut receiver, AuthSnapshot::is_enriched).await?;
    let published = first.profile.context("profile missing")?;
    assert_eq!(published.display_name, "Alice");

    tokio::time::sleep(Duration::from_millis(100)).await;
    let stored = store
        .inner
        .document(PROFILE_COLLECTION, &session.uid)
        .context("profile document missing")?;
    assert_eq!(stored.display_name.as_deref(), Some("Alice"));
    let settled = coordinator.current_profile().context("profile missing")?;
    assert_eq!(settled.display_name, "Alice");
    assert_eq!(Some(settled.created_at), stored.created_at);
    Ok(())
}

#[tokio::test]
async fn failed_last_login_write_does_not_block_sign_in() -> Result<()> {
    let h = harness();
    let session = h
        .coordinator
        .sign_up("alice@example.com", &secret("secret1"), "Alice")
        .await?;
    h.coordinator.sign_out().await?;
    let mut receiver = h.coordinator.watch();
    wait_until(&mut receiver, |s| s.session.is_none()).await?;

    h.store.set_fail_writes(true);
    let writes_before = h.store.writes().len();
    h.coordinator
        .sign_in("alice@example.com", &secret("secret1"))
        .await?;
    let snapshot = wait_until(&mut receiver, AuthSnapshot::is_enriched).await?;
    let profile = snapshot.profile.context("profile missing")?;
    assert_eq!(profile.display_name, "Alice");
    assert_eq!(h.store.writes().len(), writes_before);

    // The listener keeps handling notifications after the failed write.
    h.store.set_fail_writes(false);
    h.coordinator.sign_out().await?;
    wait_until(&mut receiver, |s| s.session.is_none()).await?;
    h.coordinator
        .sign_in("alice@example.com", &secret("secret1"))
        .await?;
    let snapshot = wait_until(&mut receiver, AuthSnapshot::is_enriched).await?;
    let profile = snapshot.profile.context("profile missing")?;

    timeout(Duration::from_secs(2), async {
        while h
            .store
            .document(PROFILE_COLLECTION, &session.uid)
            .and_then(|d| d.last_login_at)
            != Some(profile.last_login_at)
        {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .context("last login was not written after recovery")?;
    Ok(())
}

#[tokio::test]
async fn failed_profile_creation_surfaces_store_error() -> Result<()> {
    let h = harness();
    h.store.set_fail_writes(true);

    let result = h
        .coordinator
        .sign_up("alice@example.com", &secret("secret1"), "Alice")
        .await;
    assert!(matches!(result, Err(AuthError::Store(StoreError::Unavailable(_)))));
    assert_eq!(h.provider.account_count(), 1);
    assert!(h.store.writes().is_empty());

    h.coordinator.sign_out().await?;
    h.provider
        .queue_consent(FederatedIdentity::new("fed@example.com"));
    let result = h
        .coordinator
        .sign_in_with_federated(FederatedProvider::Google)
        .await;
    let err = result.err().context("federated sign in succeeded")?;
    assert!(matches!(err, AuthError::Store(_)));
    assert!(!err.is_expected());
    Ok(())
}
