use anyhow::{bail, Result};
use secrecy::SecretString;
use tracing::info;

use super::{connect, print_snapshot, settled};
use crate::{
    cli::globals::GlobalArgs,
    firebase::StaticConsent,
    gatehouse::views::RegisterForm,
};

#[derive(Debug)]
pub struct Args {
    pub globals: GlobalArgs,
    pub email: String,
    pub password: SecretString,
    pub display_name: String,
}

/// Execute the signup action.
/// # Errors
/// Returns an error if the form is invalid or registration fails.
pub async fn execute(args: Args) -> Result<()> {
    let coordinator = connect(&args.globals, Box::new(StaticConsent::default()))?;

    let mut form = RegisterForm::new();
    form.set_display_name(args.display_name);
    form.set_email(args.email);
    form.set_confirm_password(args.password.clone());
    form.set_password(args.password);

    let problems = form.validate();
    if !problems.is_empty() {
        let problems: Vec<String> = problems.iter().map(ToString::to_string).collect();
        bail!("{}", problems.join("; "));
    }

    let Some(redirect) = form.submit(&coordinator).await else {
        bail!("{}", form.error_message());
    };

    println!("{}", form.success_message());
    info!(next = redirect.to.path(), "registered");

    print_snapshot(&settled(&coordinator).await)?;
    println!("next: {}", redirect.to.path());

    coordinator.shutdown();

    Ok(())
}
