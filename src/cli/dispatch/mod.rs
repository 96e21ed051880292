//! Map validated CLI matches to the action to run.

use crate::cli::actions::{Action, bot::Args};
use crate::cli::commands::{store, telegram, vetting};
use anyhow::Result;

/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let telegram_opts = telegram::Options::parse(matches)?;
    let store_opts = store::Options::parse(matches)?;
    let vetting_opts = vetting::Options::parse(matches);

    Ok(Action::Run(Args {
        token: telegram_opts.token,
        client_timeout_seconds: telegram_opts.client_timeout_seconds,
        database: store_opts.database,
        db_max_connections: store_opts.max_connections,
        db_timeout_seconds: store_opts.timeout_seconds,
        vetted_on_storage_error: store_opts.failure_policy,
        challenge_ttl_seconds: vetting_opts.challenge_ttl_seconds,
        sweep_interval_seconds: vetting_opts.sweep_interval_seconds,
        removal: vetting_opts.removal,
    }))
}
