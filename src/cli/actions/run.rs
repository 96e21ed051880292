use crate::cli::actions::{Action, bot};
use anyhow::Result;

/// Single dispatch point for all CLI actions.
/// # Errors
/// Returns an error if the action fails.
pub async fn execute(action: Action) -> Result<()> {
    match action {
        Action::Run(args) => bot::execute(args).await,
    }
}
