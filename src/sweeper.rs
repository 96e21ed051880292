//! Expiry sweeper.
//!
//! Challenges that were never answered are collected on a fixed cadence.
//! Each expired challenge is first claimed in the store: the row is deleted
//! only if it is still expired, so a user who answered or rejoined since the
//! listing is left alone. Only then is the user removed from the group
//! (banned, or kicked so they may rejoin) and a notice posted. A claimed user
//! the bot cannot remove is not retried.
//!
//! Every step is per user: one failure is logged and counted, and the sweep
//! moves on to the next user and group.
use crate::chat::{BoundedClient, ChatId, ChatUser, UserId};
use crate::store::Store;
use crate::vetting::messages;
use anyhow::Result;
use chrono::{DateTime, Utc};
use std::{fmt, str::FromStr, time::Duration};
use tokio::time::{MissedTickBehavior, interval};
use tracing::{Instrument, debug, info, info_span, warn};

/// How an expired user leaves the group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RemovalPolicy {
    /// Banned for good.
    #[default]
    Ban,
    /// Banned then unbanned right away, so they can join again later.
    Kick,
}

impl FromStr for RemovalPolicy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "ban" => Ok(Self::Ban),
            "kick" => Ok(Self::Kick),
            other => Err(format!("unknown removal policy '{other}', expected ban or kick")),
        }
    }
}

impl fmt::Display for RemovalPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ban => write!(f, "ban"),
            Self::Kick => write!(f, "kick"),
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct SweepConfig {
    threshold: Duration,
    interval: Duration,
    removal: RemovalPolicy,
}

impl SweepConfig {
    /// Default sweep config: challenges expire after 5 minutes, checked every
    /// 60s, expired users are banned.
    #[must_use]
    pub fn new() -> Self {
        Self {
            threshold: Duration::from_secs(300),
            interval: Duration::from_secs(60),
            removal: RemovalPolicy::Ban,
        }
    }

    #[must_use]
    pub fn with_threshold_seconds(mut self, seconds: u64) -> Self {
        self.threshold = Duration::from_secs(seconds);
        self
    }

    #[must_use]
    pub fn with_interval_seconds(mut self, seconds: u64) -> Self {
        self.interval = Duration::from_secs(seconds);
        self
    }

    #[must_use]
    pub fn with_removal(mut self, removal: RemovalPolicy) -> Self {
        self.removal = removal;
        self
    }

    #[must_use]
    pub fn normalize(self) -> Self {
        let interval = if self.interval.is_zero() {
            Duration::from_secs(1)
        } else {
            self.interval
        };
        Self { interval, ..self }
    }

    #[must_use]
    pub fn threshold(&self) -> Duration {
        self.threshold
    }

    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    #[must_use]
    pub fn removal(&self) -> RemovalPolicy {
        self.removal
    }
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Counts from one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub expired: usize,
    pub removed: usize,
    pub failed: usize,
}

#[derive(Clone, Debug)]
pub struct ExpirySweeper {
    store: Store,
    client: BoundedClient,
    config: SweepConfig,
}

impl ExpirySweeper {
    #[must_use]
    pub fn new(store: Store, client: BoundedClient, config: SweepConfig) -> Self {
        Self {
            store,
            client,
            config: config.normalize(),
        }
    }

    #[must_use]
    pub fn config(&self) -> SweepConfig {
        self.config
    }

    /// Sweep every group with pending challenges.
    pub async fn run_sweep(&self) -> SweepReport {
        self.run_sweep_at(Utc::now()).await
    }

    /// [`ExpirySweeper::run_sweep`] against an explicit clock reading.
    pub async fn run_sweep_at(&self, now: DateTime<Utc>) -> SweepReport {
        let mut report = SweepReport::default();

        for group in self.store.pending_groups().await {
            let expired = self
                .store
                .list_expired_challenges_at(Some(group), self.config.threshold, now)
                .await;

            for user in expired {
                if !self
                    .store
                    .claim_expired_challenge_at(group, user, self.config.threshold, now)
                    .await
                {
                    debug!(%group, %user, "challenge answered or refreshed since listing");
                    continue;
                }

                report.expired += 1;
                if self.expire(group, user).await {
                    report.removed += 1;
                } else {
                    report.failed += 1;
                }
            }
        }

        if report.expired > 0 {
            info!(
                expired = report.expired,
                removed = report.removed,
                failed = report.failed,
                "sweep finished"
            );
        }

        report
    }

    /// Remove one claimed user. Returns whether the removal went through.
    async fn expire(&self, group: ChatId, user: UserId) -> bool {
        let member = self.resolve(group, user).await;

        let removed = match self.remove(group, user).await {
            Ok(()) => {
                info!(%group, %user, policy = %self.config.removal, "removed unvetted user");
                if let Err(err) = self
                    .client
                    .send_message(group, &messages::expired(&member.mention()))
                    .await
                {
                    warn!(%group, "could not post removal notice: {err:#}");
                }
                true
            }
            Err(err) => {
                warn!(%group, %user, "could not remove unvetted user: {err:#}");
                false
            }
        };

        removed
    }

    async fn resolve(&self, group: ChatId, user: UserId) -> ChatUser {
        match self.client.resolve_member(group, user).await {
            Ok(member) => member,
            Err(err) => {
                debug!(%group, %user, "could not resolve member: {err:#}");
                ChatUser {
                    id: user,
                    username: None,
                    first_name: format!("User {user}"),
                    is_bot: false,
                }
            }
        }
    }

    async fn remove(&self, group: ChatId, user: UserId) -> Result<()> {
        self.client.ban_member(group, user).await?;
        if self.config.removal == RemovalPolicy::Kick {
            self.client.unban_member(group, user).await?;
        }
        Ok(())
    }

    /// Spawn a background task that sweeps on the configured interval.
    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(self.config.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                self.run_sweep()
                    .instrument(info_span!("sweep"))
                    .await;
            }
        })
    }
}
