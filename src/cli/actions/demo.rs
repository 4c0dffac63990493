use anyhow::{bail, Result};
use secrecy::SecretString;
use std::{sync::Arc, time::Duration};
use tokio::time::timeout;
use tracing::info;

use super::{print_snapshot, settled};
use crate::gatehouse::{
    memory::{FederatedIdentity, MemoryIdentityProvider, MemoryProfileStore},
    views::{LoginForm, Opening, PendingVerification, RegisterForm},
    AuthSnapshot, Coordinator, FederatedProvider,
};

const DEMO_POLL_INTERVAL: Duration = Duration::from_millis(200);

async fn signed_out(coordinator: &Coordinator) -> Result<()> {
    let mut receiver = coordinator.watch();
    timeout(
        Duration::from_secs(2),
        receiver.wait_for(|snapshot: &AuthSnapshot| snapshot.session.is_none()),
    )
    .await??;
    Ok(())
}

/// Execute the demo action against in-memory backends.
/// # Errors
/// Returns an error if a step of the walkthrough does not behave as expected.
pub async fn execute() -> Result<()> {
    let provider = Arc::new(MemoryIdentityProvider::new());
    let store = Arc::new(MemoryProfileStore::new());
    let coordinator = Arc::new(Coordinator::start(provider.clone(), store.clone()));
    let password = || SecretString::from("secret1".to_string());

    println!("== register alice@example.com");
    let mut register = RegisterForm::new();
    register.set_display_name("Alice");
    register.set_email("alice@example.com");
    register.set_password(password());
    register.set_confirm_password(password());
    if register.submit(&coordinator).await.is_none() {
        bail!("registration failed: {}", register.error_message());
    }
    println!("{}", register.success_message());
    print_snapshot(&settled(&coordinator).await)?;

    coordinator.sign_out().await?;
    signed_out(&coordinator).await?;

    println!("== sign in with a wrong password");
    let mut login = LoginForm::new();
    login.set_email("alice@example.com");
    login.set_password(SecretString::from("not-her-password".to_string()));
    if login.submit(&coordinator).await.is_some() {
        bail!("a wrong password was accepted");
    }
    println!("{}", login.error_message());

    println!("== sign in again");
    login.set_password(password());
    if login.submit(&coordinator).await.is_none() {
        bail!("sign in failed: {}", login.error_message());
    }
    print_snapshot(&settled(&coordinator).await)?;
    println!("role user: {}", coordinator.has_role("user"));

    coordinator.sign_out().await?;
    signed_out(&coordinator).await?;

    println!("== federated sign in with google");
    provider.queue_consent(
        FederatedIdentity::new("bob@example.com").with_display_name("Bob"),
    );
    let Some(next) = login
        .submit_federated(&coordinator, FederatedProvider::Google)
        .await
    else {
        bail!("federated sign in failed: {}", login.error_message());
    };
    let snapshot = settled(&coordinator).await;
    print_snapshot(&snapshot)?;
    if let Some(session) = &snapshot.session {
        println!(
            "profile documents created for bob: {}",
            store.creation_writes(&session.uid)
        );
    }
    println!("next: {}", next.path());

    println!("== verification");
    match PendingVerification::open(Arc::clone(&coordinator), DEMO_POLL_INTERVAL) {
        Opening::Waiting(mut screen) => {
            let next = timeout(Duration::from_secs(2), screen.verified()).await?;
            info!(verified = next.is_some(), "verification finished");
            println!(
                "{} verified: {}",
                screen.user_email(),
                next.map_or("no", |_| "yes")
            );
            screen.sign_out().await;
        }
        Opening::Redirect(to) => println!("not signed in, continue at {}", to.path()),
    }

    coordinator.shutdown();

    Ok(())
}
