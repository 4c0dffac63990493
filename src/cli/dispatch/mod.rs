//! Map validated CLI matches to an [`Action`].

use anyhow::{anyhow, Context, Result};
use clap::ArgMatches;
use secrecy::SecretString;
use std::time::Duration;

use crate::{
    cli::{
        actions::{federated, signin, signup, verify, Action},
        commands::{
            firebase, ARG_DISPLAY_NAME, ARG_EMAIL, ARG_ID_TOKEN, ARG_PASSWORD, ARG_POLL_SECONDS,
            ARG_PROVIDER, ARG_RESEND,
        },
    },
    gatehouse::FederatedProvider,
};

fn required(matches: &ArgMatches, name: &str) -> Result<String> {
    matches
        .get_one::<String>(name)
        .cloned()
        .with_context(|| format!("missing required argument: --{name}"))
}

fn password(matches: &ArgMatches) -> Result<SecretString> {
    required(matches, ARG_PASSWORD).map(SecretString::from)
}

/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &ArgMatches) -> Result<Action> {
    match matches.subcommand() {
        Some(("signup", sub)) => Ok(Action::SignUp(signup::Args {
            globals: firebase::parse(matches)?,
            email: required(sub, ARG_EMAIL)?,
            password: password(sub)?,
            display_name: required(sub, ARG_DISPLAY_NAME)?,
        })),
        Some(("signin", sub)) => Ok(Action::SignIn(signin::Args {
            globals: firebase::parse(matches)?,
            email: required(sub, ARG_EMAIL)?,
            password: password(sub)?,
        })),
        Some(("federated", sub)) => Ok(Action::Federated(federated::Args {
            globals: firebase::parse(matches)?,
            provider: required(sub, ARG_PROVIDER)?
                .parse::<FederatedProvider>()
                .map_err(|e| anyhow!(e))?,
            id_token: sub
                .get_one::<String>(ARG_ID_TOKEN)
                .cloned()
                .map(SecretString::from),
        })),
        Some(("verify", sub)) => Ok(Action::Verify(verify::Args {
            globals: firebase::parse(matches)?,
            email: required(sub, ARG_EMAIL)?,
            password: password(sub)?,
            poll_interval: Duration::from_secs(
                sub.get_one::<u64>(ARG_POLL_SECONDS).copied().unwrap_or(3),
            ),
            resend: sub.get_flag(ARG_RESEND),
        })),
        Some(("demo", _)) => Ok(Action::Demo),
        Some((other, _)) => Err(anyhow!("unknown command: {other}")),
        None => Err(anyhow!("no command given")),
    }
}
