//! SQLite persistence for challenges and per-group auth channels.
//!
//! Every operation checks a connection out of the pool and returns it on every
//! exit path. Writes run inside a transaction that is committed only on
//! success; dropping an uncommitted `sqlx::Transaction` rolls it back.
//!
//! Public operations never raise. Failures are logged and mapped to a safe
//! default: writes report `false`, the vetted check follows
//! [`StorageFailurePolicy`], and every other read returns "nothing found".

pub mod channel_url;
pub mod schema;

use crate::chat::{ChatId, ChatUser, UserId};
use crate::vetting::VettingState;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};
use std::{str::FromStr, time::Duration};
use tracing::{debug, error, info, instrument, warn};

/// What `is_vetted` answers when the challenge table cannot be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageFailurePolicy {
    /// Treat the user as vetted. Favors availability: a storage outage does
    /// not silence the whole group.
    #[default]
    FailOpen,
    /// Treat the user as pending. Favors strictness: a storage outage deletes
    /// every message from users the bot cannot vouch for.
    FailClosed,
}

impl StorageFailurePolicy {
    #[must_use]
    pub fn vetted_on_error(self) -> bool {
        matches!(self, Self::FailOpen)
    }
}

impl FromStr for StorageFailurePolicy {
    type Err = String;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        match value.to_lowercase().as_str() {
            "open" | "fail-open" => Ok(Self::FailOpen),
            "closed" | "fail-closed" => Ok(Self::FailClosed),
            _ => Err(format!("invalid storage failure policy: {value}")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StoreOptions {
    url: String,
    max_connections: u32,
    timeout: Duration,
    failure_policy: StorageFailurePolicy,
}

impl StoreOptions {
    /// Defaults: 5 connections, 5s acquire/busy timeout, fail-open vetted check.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: 5,
            timeout: Duration::from_secs(5),
            failure_policy: StorageFailurePolicy::default(),
        }
    }

    #[must_use]
    pub fn with_max_connections(mut self, max_connections: u32) -> Self {
        self.max_connections = max_connections;
        self
    }

    #[must_use]
    pub fn with_timeout_seconds(mut self, seconds: u64) -> Self {
        self.timeout = Duration::from_secs(seconds);
        self
    }

    #[must_use]
    pub fn with_failure_policy(mut self, policy: StorageFailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    fn is_in_memory(&self) -> bool {
        self.url.contains(":memory:") || self.url.contains("mode=memory")
    }
}

#[derive(Clone, Debug)]
pub struct Store {
    pool: SqlitePool,
    failure_policy: StorageFailurePolicy,
}

impl Store {
    /// Open the database and create the schema if needed.
    ///
    /// # Errors
    /// Returns an error if the URL is invalid, the database cannot be opened,
    /// or the schema cannot be created. The bot cannot run without it.
    pub async fn connect(options: StoreOptions) -> Result<Self> {
        let timeout = if options.timeout.is_zero() {
            Duration::from_secs(1)
        } else {
            options.timeout
        };

        let connect_options = SqliteConnectOptions::from_str(&options.url)
            .with_context(|| format!("invalid database url: {}", options.url))?
            .create_if_missing(true)
            .busy_timeout(timeout);

        // Each connection to `:memory:` is its own database, so keep exactly one alive.
        let pool_options = if options.is_in_memory() {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(options.max_connections.max(1))
        };

        let pool = pool_options
            .acquire_timeout(timeout)
            .connect_with(connect_options)
            .await
            .context("could not open database")?;

        let store = Self {
            pool,
            failure_policy: options.failure_policy,
        };
        store.migrate().await?;

        info!("database ready");

        Ok(store)
    }

    async fn migrate(&self) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("begin schema transaction")?;

        for statement in schema::statements() {
            sqlx::query(statement)
                .execute(&mut *tx)
                .await
                .with_context(|| format!("schema statement failed: {statement}"))?;
        }

        tx.commit().await.context("commit schema")?;

        Ok(())
    }

    #[must_use]
    pub fn failure_policy(&self) -> StorageFailurePolicy {
        self.failure_policy
    }

    /// Issue a challenge stamped with the current time, superseding any
    /// earlier one for the same pair.
    pub async fn upsert_challenge(&self, group: ChatId, user: &ChatUser) -> bool {
        self.upsert_challenge_at(group, user, Utc::now()).await
    }

    /// Issue a challenge with an explicit `issued_on`.
    #[instrument(level = "debug", skip(self, user), fields(user = %user.id))]
    pub async fn upsert_challenge_at(
        &self,
        group: ChatId,
        user: &ChatUser,
        issued_on: DateTime<Utc>,
    ) -> bool {
        match self.try_upsert_challenge(group, user, issued_on).await {
            Ok(()) => true,
            Err(err) => {
                error!(%group, user = %user.id, "could not issue challenge: {err:#}");
                false
            }
        }
    }

    async fn try_upsert_challenge(
        &self,
        group: ChatId,
        user: &ChatUser,
        issued_on: DateTime<Utc>,
    ) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("begin challenge transaction")?;

        sqlx::query("DELETE FROM challenge WHERE group_id = ? AND user_id = ?")
            .bind(group.0)
            .bind(user.id.0)
            .execute(&mut *tx)
            .await
            .context("failed to clear previous challenge")?;

        sqlx::query(
            r"
            INSERT INTO challenge (group_id, user_id, username, issued_on)
            VALUES (?, ?, ?, ?)
            ",
        )
        .bind(group.0)
        .bind(user.id.0)
        .bind(user.username.as_deref())
        .bind(issued_on.timestamp_millis())
        .execute(&mut *tx)
        .await
        .context("failed to insert challenge")?;

        tx.commit().await.context("commit challenge")?;

        Ok(())
    }

    /// Delete the pair's challenge. Deleting a missing row counts as success.
    #[instrument(level = "debug", skip(self))]
    pub async fn remove_challenge(&self, group: ChatId, user: UserId) -> bool {
        match self.try_remove_challenge(group, user).await {
            Ok(removed) => {
                debug!(%group, %user, removed, "challenge cleared");
                true
            }
            Err(err) => {
                error!(%group, %user, "could not clear challenge: {err:#}");
                false
            }
        }
    }

    /// Delete the pair's challenge and report whether one existed.
    /// `None` when the store could not be reached.
    #[instrument(level = "debug", skip(self))]
    pub async fn take_challenge(&self, group: ChatId, user: UserId) -> Option<bool> {
        match self.try_remove_challenge(group, user).await {
            Ok(removed) => Some(removed == 1),
            Err(err) => {
                error!(%group, %user, "could not clear challenge: {err:#}");
                None
            }
        }
    }

    /// Delete the pair's challenge only if it is still at least `max_age` old
    /// at `now`. Returns true when this call removed it.
    ///
    /// A challenge answered or refreshed since it was listed as expired is
    /// left alone, so callers must act on an expiry only after claiming it.
    #[instrument(level = "debug", skip(self))]
    pub async fn claim_expired_challenge_at(
        &self,
        group: ChatId,
        user: UserId,
        max_age: Duration,
        now: DateTime<Utc>,
    ) -> bool {
        match self.try_claim_expired(group, user, cutoff_millis(max_age, now)).await {
            Ok(claimed) => claimed,
            Err(err) => {
                error!(%group, %user, "could not claim expired challenge: {err:#}");
                false
            }
        }
    }

    async fn try_claim_expired(&self, group: ChatId, user: UserId, cutoff: i64) -> Result<bool> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("begin expiry transaction")?;

        let result = sqlx::query(
            r"
            DELETE FROM challenge
            WHERE group_id = ? AND user_id = ? AND issued_on <= ?
            ",
        )
        .bind(group.0)
        .bind(user.0)
        .bind(cutoff)
        .execute(&mut *tx)
        .await
        .context("failed to claim expired challenge")?;

        tx.commit().await.context("commit expiry claim")?;

        Ok(result.rows_affected() == 1)
    }

    async fn try_remove_challenge(&self, group: ChatId, user: UserId) -> Result<u64> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("begin challenge transaction")?;

        let result = sqlx::query("DELETE FROM challenge WHERE group_id = ? AND user_id = ?")
            .bind(group.0)
            .bind(user.0)
            .execute(&mut *tx)
            .await
            .context("failed to delete challenge")?;

        tx.commit().await.context("commit challenge removal")?;

        Ok(result.rows_affected())
    }

    /// `Pending` iff a challenge row exists for the pair.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn challenge_state(&self, group: ChatId, user: UserId) -> Result<VettingState> {
        let row = sqlx::query("SELECT 1 FROM challenge WHERE group_id = ? AND user_id = ? LIMIT 1")
            .bind(group.0)
            .bind(user.0)
            .fetch_optional(&self.pool)
            .await
            .context("failed to look up challenge")?;

        Ok(if row.is_some() {
            VettingState::Pending
        } else {
            VettingState::Unchallenged
        })
    }

    /// True iff the user has no active challenge in the group. Query failures
    /// are answered by the configured [`StorageFailurePolicy`].
    pub async fn is_vetted(&self, group: ChatId, user: UserId) -> bool {
        self.vetting_state(group, user).await.is_vetted()
    }

    /// [`Store::challenge_state`] with query failures resolved by the
    /// configured [`StorageFailurePolicy`].
    pub async fn vetting_state(&self, group: ChatId, user: UserId) -> VettingState {
        match self.challenge_state(group, user).await {
            Ok(state) => state,
            Err(err) => {
                let vetted = self.failure_policy.vetted_on_error();
                warn!(%group, %user, vetted, "vetted check failed: {err:#}");
                VettingState::from_vetted(vetted)
            }
        }
    }

    /// Create or replace the group's auth channel and passphrase.
    #[instrument(level = "debug", skip(self, passphrase))]
    pub async fn set_auth_channel(&self, group: ChatId, channel_url: &str, passphrase: &str) -> bool {
        match self.try_set_auth_channel(group, channel_url, passphrase).await {
            Ok(()) => true,
            Err(err) => {
                error!(%group, "could not save auth channel: {err:#}");
                false
            }
        }
    }

    async fn try_set_auth_channel(
        &self,
        group: ChatId,
        channel_url: &str,
        passphrase: &str,
    ) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("begin channel transaction")?;

        sqlx::query(
            r"
            INSERT INTO channels (group_id, channel_url, passphrase)
            VALUES (?, ?, ?)
            ON CONFLICT (group_id) DO UPDATE
            SET channel_url = excluded.channel_url,
                passphrase = excluded.passphrase
            ",
        )
        .bind(group.0)
        .bind(channel_url)
        .bind(passphrase)
        .execute(&mut *tx)
        .await
        .context("failed to upsert channel")?;

        tx.commit().await.context("commit channel")?;

        Ok(())
    }

    /// The group's auth channel as an openable link, or `None` when the group
    /// is not configured (or the lookup failed).
    pub async fn get_auth_channel(&self, group: ChatId) -> Option<String> {
        let stored = sqlx::query_scalar::<_, String>(
            "SELECT channel_url FROM channels WHERE group_id = ?",
        )
        .bind(group.0)
        .fetch_optional(&self.pool)
        .await;

        match stored {
            Ok(Some(url)) => channel_url::normalize(&url),
            Ok(None) => None,
            Err(err) => {
                error!(%group, "could not read auth channel: {err}");
                None
            }
        }
    }

    /// Exact comparison against the group's passphrase. Unconfigured groups
    /// and failed lookups never match.
    pub async fn check_passphrase(&self, group: ChatId, candidate: &str) -> bool {
        let stored = sqlx::query_scalar::<_, String>(
            "SELECT passphrase FROM channels WHERE group_id = ?",
        )
        .bind(group.0)
        .fetch_optional(&self.pool)
        .await;

        match stored {
            Ok(Some(passphrase)) => passphrase == candidate,
            Ok(None) => false,
            Err(err) => {
                error!(%group, "could not read passphrase: {err}");
                false
            }
        }
    }

    /// Users whose challenge was issued at least `max_age` ago, in one group
    /// or (with `None`) in all of them.
    pub async fn list_expired_challenges(
        &self,
        group: Option<ChatId>,
        max_age: Duration,
    ) -> Vec<UserId> {
        self.list_expired_challenges_at(group, max_age, Utc::now())
            .await
    }

    /// [`Store::list_expired_challenges`] against an explicit clock reading.
    pub async fn list_expired_challenges_at(
        &self,
        group: Option<ChatId>,
        max_age: Duration,
        now: DateTime<Utc>,
    ) -> Vec<UserId> {
        match self.try_list_expired(group, max_age, now).await {
            Ok(users) => users,
            Err(err) => {
                error!(group = ?group, "could not list expired challenges: {err:#}");
                Vec::new()
            }
        }
    }

    async fn try_list_expired(
        &self,
        group: Option<ChatId>,
        max_age: Duration,
        now: DateTime<Utc>,
    ) -> Result<Vec<UserId>> {
        let cutoff = cutoff_millis(max_age, now);

        let users = match group {
            Some(group) => {
                sqlx::query_scalar::<_, i64>(
                    r"
                    SELECT user_id FROM challenge
                    WHERE group_id = ? AND issued_on <= ?
                    ORDER BY issued_on ASC
                    ",
                )
                .bind(group.0)
                .bind(cutoff)
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query_scalar::<_, i64>(
                    r"
                    SELECT user_id FROM challenge
                    WHERE issued_on <= ?
                    ORDER BY issued_on ASC
                    ",
                )
                .bind(cutoff)
                .fetch_all(&self.pool)
                .await
            }
        }
        .context("failed to query expired challenges")?;

        Ok(users.into_iter().map(UserId).collect())
    }

    /// Groups with at least one pending challenge.
    pub async fn pending_groups(&self) -> Vec<ChatId> {
        let groups = sqlx::query_scalar::<_, i64>(
            "SELECT DISTINCT group_id FROM challenge ORDER BY group_id",
        )
        .fetch_all(&self.pool)
        .await;

        match groups {
            Ok(groups) => groups.into_iter().map(ChatId).collect(),
            Err(err) => {
                error!("could not list pending groups: {err}");
                Vec::new()
            }
        }
    }

    /// Find a pending user by the username they had when they joined.
    /// Matching ignores case and a leading `@`.
    pub async fn find_challenged_user(&self, group: ChatId, username: &str) -> Option<UserId> {
        let username = username.trim().trim_start_matches('@');
        if username.is_empty() {
            return None;
        }

        let user = sqlx::query_scalar::<_, i64>(
            r"
            SELECT user_id FROM challenge
            WHERE group_id = ? AND username = ? COLLATE NOCASE
            ORDER BY issued_on DESC
            LIMIT 1
            ",
        )
        .bind(group.0)
        .bind(username)
        .fetch_optional(&self.pool)
        .await;

        match user {
            Ok(user) => user.map(UserId),
            Err(err) => {
                error!(%group, username, "could not look up challenged user: {err}");
                None
            }
        }
    }
}

/// Challenges issued at or before this instant (unix millis) are expired.
fn cutoff_millis(max_age: Duration, now: DateTime<Utc>) -> i64 {
    let max_age_ms = i64::try_from(max_age.as_millis()).unwrap_or(i64::MAX);
    now.timestamp_millis().saturating_sub(max_age_ms)
}
