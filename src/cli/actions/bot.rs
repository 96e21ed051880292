use crate::{
    chat::BoundedClient,
    store::{StorageFailurePolicy, Store, StoreOptions},
    sweeper::{ExpirySweeper, RemovalPolicy, SweepConfig},
    telegram::{self, TelegramClient},
    vetting::VettingMachine,
};
use anyhow::{Context, Result};
use secrecy::SecretString;
use std::{sync::Arc, time::Duration};
use tracing::info;

#[derive(Debug)]
pub struct Args {
    pub token: SecretString,
    pub client_timeout_seconds: u64,
    pub database: String,
    pub db_max_connections: u32,
    pub db_timeout_seconds: u64,
    pub vetted_on_storage_error: StorageFailurePolicy,
    pub challenge_ttl_seconds: u64,
    pub sweep_interval_seconds: u64,
    pub removal: RemovalPolicy,
}

/// Run the bot until interrupted.
/// # Errors
/// Returns an error if the database cannot be opened or the bot token is rejected.
pub async fn execute(args: Args) -> Result<()> {
    let store = Store::connect(
        StoreOptions::new(args.database)
            .with_max_connections(args.db_max_connections)
            .with_timeout_seconds(args.db_timeout_seconds)
            .with_failure_policy(args.vetted_on_storage_error),
    )
    .await
    .context("Could not open the database")?;

    info!(vetted_on_storage_error = ?store.failure_policy(), "database opened");

    let telegram = TelegramClient::new(&args.token);
    let identity = telegram
        .identity()
        .await
        .context("Could not log in to Telegram")?;

    info!(username = ?identity.username, "logged in");

    let client = BoundedClient::new(
        Arc::new(telegram.clone()),
        Duration::from_secs(args.client_timeout_seconds),
    );

    let machine = Arc::new(VettingMachine::new(store.clone(), client.clone()));

    let sweeper = ExpirySweeper::new(
        store,
        client,
        SweepConfig::new()
            .with_threshold_seconds(args.challenge_ttl_seconds)
            .with_interval_seconds(args.sweep_interval_seconds)
            .with_removal(args.removal),
    );

    let config = sweeper.config();
    info!(
        ttl = ?config.threshold(),
        every = ?config.interval(),
        removal = %config.removal(),
        "starting expiry sweeper"
    );
    let sweeper = sweeper.spawn();

    telegram::run(telegram.bot(), machine, identity).await;

    sweeper.abort();
    info!("shutting down");

    Ok(())
}
