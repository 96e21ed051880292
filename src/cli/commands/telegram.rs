use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;

pub const ARG_TOKEN: &str = "token";
pub const ARG_CLIENT_TIMEOUT_SECONDS: &str = "client-timeout-seconds";

#[derive(Debug, Clone)]
pub struct Options {
    pub token: SecretString,
    pub client_timeout_seconds: u64,
}

impl Options {
    /// Parse Telegram arguments from matches.
    ///
    /// # Errors
    /// Returns an error if the bot token is missing or blank.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        let token = match matches.get_one::<String>(ARG_TOKEN) {
            Some(value) if !value.trim().is_empty() => SecretString::from(value.trim().to_string()),
            _ => anyhow::bail!("missing required argument: --{ARG_TOKEN}"),
        };

        Ok(Self {
            token,
            client_timeout_seconds: matches
                .get_one::<u64>(ARG_CLIENT_TIMEOUT_SECONDS)
                .copied()
                .unwrap_or(10),
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_TOKEN)
                .short('t')
                .long(ARG_TOKEN)
                .help("Telegram bot API token")
                .env("BIGBOOFER_TOKEN")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new(ARG_CLIENT_TIMEOUT_SECONDS)
                .long(ARG_CLIENT_TIMEOUT_SECONDS)
                .help("Timeout for each Telegram API call in seconds")
                .env("BIGBOOFER_CLIENT_TIMEOUT_SECONDS")
                .default_value("10")
                .value_parser(clap::value_parser!(u64)),
        )
}
