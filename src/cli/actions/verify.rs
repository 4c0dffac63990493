use anyhow::{anyhow, bail, Result};
use secrecy::SecretString;
use std::{sync::Arc, time::Duration};
use tracing::info;

use super::connect;
use crate::{
    cli::globals::GlobalArgs,
    firebase::StaticConsent,
    gatehouse::views::{Navigation, Opening, PendingVerification},
};

#[derive(Debug)]
pub struct Args {
    pub globals: GlobalArgs,
    pub email: String,
    pub password: SecretString,
    pub poll_interval: Duration,
    pub resend: bool,
}

/// Execute the verify action: sign in, optionally resend the verification
/// email, then wait until the address is verified or Ctrl-C is pressed.
/// # Errors
/// Returns an error if sign-in fails.
pub async fn execute(args: Args) -> Result<()> {
    let coordinator = Arc::new(connect(
        &args.globals,
        Box::new(StaticConsent::default()),
    )?);

    coordinator
        .sign_in(&args.email, &args.password)
        .await
        .map_err(|err| anyhow!(err.user_message()))?;

    let mut screen = match PendingVerification::open(Arc::clone(&coordinator), args.poll_interval) {
        Opening::Waiting(screen) => screen,
        Opening::Redirect(to) => bail!("not signed in, continue at {}", to.path()),
    };

    if args.resend {
        screen.resend().await;
        println!("{}", screen.resend_message());
    }

    println!(
        "waiting for {} to be verified (checking every {}s)",
        screen.user_email(),
        args.poll_interval.as_secs()
    );

    let interrupted = tokio::select! {
        next = screen.verified() => {
            if next == Some(Navigation::Dashboard) {
                info!("email verified");
                println!("verified, next: {}", Navigation::Dashboard.path());
            }
            false
        }
        _ = tokio::signal::ctrl_c() => true,
    };

    if interrupted {
        screen.dispose();
        println!("stopped waiting");
    }

    coordinator.shutdown();

    Ok(())
}
