use anyhow::{bail, Result};
use secrecy::SecretString;

use super::{connect, print_snapshot, settled};
use crate::{
    cli::globals::GlobalArgs,
    firebase::StaticConsent,
    gatehouse::views::LoginForm,
};

#[derive(Debug)]
pub struct Args {
    pub globals: GlobalArgs,
    pub email: String,
    pub password: SecretString,
}

/// Execute the signin action.
/// # Errors
/// Returns an error if the credentials are rejected.
pub async fn execute(args: Args) -> Result<()> {
    let coordinator = connect(&args.globals, Box::new(StaticConsent::default()))?;

    let mut form = LoginForm::new();
    form.set_email(args.email);
    form.set_password(args.password);

    let Some(next) = form.submit(&coordinator).await else {
        if form.error_message().is_empty() {
            let problems: Vec<String> = form.validate().iter().map(ToString::to_string).collect();
            bail!("{}", problems.join("; "));
        }
        bail!("{}", form.error_message());
    };

    print_snapshot(&settled(&coordinator).await)?;
    println!("next: {}", next.path());

    coordinator.shutdown();

    Ok(())
}
