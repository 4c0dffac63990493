pub mod demo;
pub mod federated;
pub mod signin;
pub mod signup;
pub mod verify;

// Single dispatch point lives in `run`.
mod run;

use anyhow::{Context, Result};
use std::{sync::Arc, time::Duration};
use tokio::time::timeout;
use tracing::debug;

use crate::{
    cli::globals::GlobalArgs,
    firebase::{ConsentFlow, FirebaseAuth, Firestore},
    gatehouse::{AuthSnapshot, Coordinator},
};

/// How long an action waits for the profile to catch up with the session.
const SETTLE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug)]
pub enum Action {
    SignUp(signup::Args),
    SignIn(signin::Args),
    Federated(federated::Args),
    Verify(verify::Args),
    Demo,
}

impl Action {
    /// Execute the action.
    /// # Errors
    /// Returns an error if the action fails.
    pub async fn execute(self) -> Result<()> {
        run::execute(self).await
    }
}

/// Coordinator over the hosted backends described by `globals`.
fn connect(globals: &GlobalArgs, consent: Box<dyn ConsentFlow>) -> Result<Coordinator> {
    let auth = FirebaseAuth::new(&globals.auth_url, globals.api_key.clone(), consent)
        .context("failed to set up the identity provider")?;
    let store = Firestore::new(&globals.firestore_url, &globals.project_id, auth.token())
        .context("failed to set up the profile store")?;

    debug!(?globals, "backends ready");

    Ok(Coordinator::start(Arc::new(auth), Arc::new(store)))
}

/// Wait until the published profile matches the session, or give up after
/// [`SETTLE_TIMEOUT`] and return whatever is published.
async fn settled(coordinator: &Coordinator) -> AuthSnapshot {
    let mut receiver = coordinator.watch();
    let snapshot = match timeout(SETTLE_TIMEOUT, receiver.wait_for(AuthSnapshot::is_enriched)).await {
        Ok(Ok(snapshot)) => snapshot.clone(),
        _ => coordinator.snapshot(),
    };
    snapshot
}

fn print_snapshot(snapshot: &AuthSnapshot) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(snapshot)?);
    Ok(())
}
