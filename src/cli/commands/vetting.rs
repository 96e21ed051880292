use crate::sweeper::RemovalPolicy;
use clap::{Arg, ArgMatches, Command, builder::ValueParser};

pub const ARG_CHALLENGE_TTL_SECONDS: &str = "challenge-ttl-seconds";
pub const ARG_SWEEP_INTERVAL_SECONDS: &str = "sweep-interval-seconds";
pub const ARG_REMOVAL: &str = "removal";

#[derive(Debug, Clone, Copy)]
pub struct Options {
    pub challenge_ttl_seconds: u64,
    pub sweep_interval_seconds: u64,
    pub removal: RemovalPolicy,
}

impl Options {
    #[must_use]
    pub fn parse(matches: &ArgMatches) -> Self {
        Self {
            challenge_ttl_seconds: matches
                .get_one::<u64>(ARG_CHALLENGE_TTL_SECONDS)
                .copied()
                .unwrap_or(300),
            sweep_interval_seconds: matches
                .get_one::<u64>(ARG_SWEEP_INTERVAL_SECONDS)
                .copied()
                .unwrap_or(60),
            removal: matches
                .get_one::<RemovalPolicy>(ARG_REMOVAL)
                .copied()
                .unwrap_or_default(),
        }
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_CHALLENGE_TTL_SECONDS)
                .long(ARG_CHALLENGE_TTL_SECONDS)
                .help("Seconds a newcomer has to answer before being removed")
                .env("BIGBOOFER_CHALLENGE_TTL_SECONDS")
                .default_value("300")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new(ARG_SWEEP_INTERVAL_SECONDS)
                .long(ARG_SWEEP_INTERVAL_SECONDS)
                .help("Seconds between sweeps for expired challenges")
                .env("BIGBOOFER_SWEEP_INTERVAL_SECONDS")
                .default_value("60")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new(ARG_REMOVAL)
                .long(ARG_REMOVAL)
                .help("What happens to users who never answer: ban or kick")
                .env("BIGBOOFER_REMOVAL")
                .default_value("ban")
                .value_parser(ValueParser::from(|value: &str| value.parse::<RemovalPolicy>())),
        )
}
