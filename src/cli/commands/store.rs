use crate::store::StorageFailurePolicy;
use clap::{Arg, ArgMatches, Command, builder::ValueParser};

pub const ARG_DATABASE: &str = "database";
pub const ARG_DB_MAX_CONNECTIONS: &str = "db-max-connections";
pub const ARG_DB_TIMEOUT_SECONDS: &str = "db-timeout-seconds";
pub const ARG_VETTED_ON_STORAGE_ERROR: &str = "vetted-on-storage-error";

pub const DEFAULT_DATABASE: &str = "sqlite://bigboofer_data.sqlite3?mode=rwc";

#[derive(Debug, Clone)]
pub struct Options {
    pub database: String,
    pub max_connections: u32,
    pub timeout_seconds: u64,
    pub failure_policy: StorageFailurePolicy,
}

impl Options {
    /// Parse storage arguments from matches.
    ///
    /// # Errors
    /// Returns an error if the database URL is blank.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        let database = match matches.get_one::<String>(ARG_DATABASE) {
            Some(value) if !value.trim().is_empty() => value.trim().to_string(),
            _ => anyhow::bail!("missing required argument: --{ARG_DATABASE}"),
        };

        Ok(Self {
            database,
            max_connections: matches
                .get_one::<u32>(ARG_DB_MAX_CONNECTIONS)
                .copied()
                .unwrap_or(5),
            timeout_seconds: matches
                .get_one::<u64>(ARG_DB_TIMEOUT_SECONDS)
                .copied()
                .unwrap_or(5),
            failure_policy: matches
                .get_one::<StorageFailurePolicy>(ARG_VETTED_ON_STORAGE_ERROR)
                .copied()
                .unwrap_or_default(),
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_DATABASE)
                .short('d')
                .long(ARG_DATABASE)
                .help("SQLite database URL")
                .env("BIGBOOFER_DATABASE")
                .default_value(DEFAULT_DATABASE),
        )
        .arg(
            Arg::new(ARG_DB_MAX_CONNECTIONS)
                .long(ARG_DB_MAX_CONNECTIONS)
                .help("Maximum number of pooled database connections")
                .env("BIGBOOFER_DB_MAX_CONNECTIONS")
                .default_value("5")
                .value_parser(clap::value_parser!(u32).range(1..)),
        )
        .arg(
            Arg::new(ARG_DB_TIMEOUT_SECONDS)
                .long(ARG_DB_TIMEOUT_SECONDS)
                .help("Seconds to wait for a connection or a locked database")
                .env("BIGBOOFER_DB_TIMEOUT_SECONDS")
                .default_value("5")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new(ARG_VETTED_ON_STORAGE_ERROR)
                .long(ARG_VETTED_ON_STORAGE_ERROR)
                .help("Treat users as vetted (open) or pending (closed) when the database fails")
                .env("BIGBOOFER_VETTED_ON_STORAGE_ERROR")
                .default_value("open")
                .value_parser(ValueParser::from(|value: &str| {
                    value.parse::<StorageFailurePolicy>()
                })),
        )
}
