use crate::cli::actions::{demo, federated, signin, signup, verify, Action};
use anyhow::Result;

/// Execute the provided action.
// This is the single dispatch point for all CLI actions.
/// # Errors
/// Returns an error if the action fails.
pub async fn execute(action: Action) -> Result<()> {
    match action {
        Action::SignUp(args) => signup::execute(args).await,
        Action::SignIn(args) => signin::execute(args).await,
        Action::Federated(args) => federated::execute(args).await,
        Action::Verify(args) => verify::execute(args).await,
        Action::Demo => demo::execute().await,
    }
}
