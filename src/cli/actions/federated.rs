use anyhow::{bail, Result};
use secrecy::SecretString;

use super::{connect, print_snapshot, settled};
use crate::{
    cli::globals::GlobalArgs,
    firebase::{ProviderCredential, StaticConsent},
    gatehouse::{views::LoginForm, FederatedProvider},
};

#[derive(Debug)]
pub struct Args {
    pub globals: GlobalArgs,
    pub provider: FederatedProvider,
    pub id_token: Option<SecretString>,
}

/// Execute the federated sign-in action.
/// # Errors
/// Returns an error if the provider token is missing or rejected.
pub async fn execute(args: Args) -> Result<()> {
    let consent = StaticConsent::new(args.id_token.map(ProviderCredential::IdToken));
    let coordinator = connect(&args.globals, Box::new(consent))?;

    let mut form = LoginForm::new();
    let Some(next) = form.submit_federated(&coordinator, args.provider).await else {
        bail!("{}", form.error_message());
    };

    print_snapshot(&settled(&coordinator).await)?;
    println!("next: {}", next.path());

    coordinator.shutdown();

    Ok(())
}
