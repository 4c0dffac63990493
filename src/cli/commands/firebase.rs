use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;

use crate::{
    cli::globals::GlobalArgs,
    firebase::{DEFAULT_AUTH_URL, DEFAULT_FIRESTORE_URL},
};

pub const ARG_API_KEY: &str = "api-key";
pub const ARG_PROJECT_ID: &str = "project-id";
pub const ARG_AUTH_URL: &str = "auth-url";
pub const ARG_FIRESTORE_URL: &str = "firestore-url";

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_API_KEY)
                .long(ARG_API_KEY)
                .help("Web API key of the Firebase project")
                .env("GATEHOUSE_API_KEY")
                .hide_env_values(true)
                .global(true),
        )
        .arg(
            Arg::new(ARG_PROJECT_ID)
                .long(ARG_PROJECT_ID)
                .help("Firebase project id holding the profile documents")
                .env("GATEHOUSE_PROJECT_ID")
                .global(true),
        )
        .arg(
            Arg::new(ARG_AUTH_URL)
                .long(ARG_AUTH_URL)
                .help("Identity Toolkit base URL, e.g. an emulator")
                .env("GATEHOUSE_AUTH_URL")
                .default_value(DEFAULT_AUTH_URL)
                .global(true),
        )
        .arg(
            Arg::new(ARG_FIRESTORE_URL)
                .long(ARG_FIRESTORE_URL)
                .help("Firestore base URL, e.g. an emulator")
                .env("GATEHOUSE_FIRESTORE_URL")
                .default_value(DEFAULT_FIRESTORE_URL)
                .global(true),
        )
}

/// Connection settings for the hosted backends.
///
/// # Errors
///
/// Returns an error when the API key or the project id is missing.
pub fn parse(matches: &ArgMatches) -> Result<GlobalArgs> {
    let api_key = matches
        .get_one::<String>(ARG_API_KEY)
        .cloned()
        .context("missing required argument: --api-key")?;
    let project_id = matches
        .get_one::<String>(ARG_PROJECT_ID)
        .cloned()
        .context("missing required argument: --project-id")?;

    let mut globals = GlobalArgs::new(project_id);
    globals.set_api_key(SecretString::from(api_key));
    if let Some(url) = matches.get_one::<String>(ARG_AUTH_URL) {
        globals.auth_url.clone_from(url);
    }
    if let Some(url) = matches.get_one::<String>(ARG_FIRESTORE_URL) {
        globals.firestore_url.clone_from(url);
    }

    Ok(globals)
}
