//! XP awards and rank-change detection.
//!
//! The read-modify-write of a user's XP runs under a per-user async lock so
//! concurrent awards for the same user are serialized. Writes are absolute
//! (`set_user_xp`) which makes retrying a failed write safe: a retry can only
//! store the same total again, never add the reward twice.

use crate::error::StoreError;
use crate::message::UserId;
use crate::rank::{NextTier, RankInfo, RankTable, RankTier};
use crate::traits::Store;
use dashmap::DashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// A user moved from one tier to another.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankChange {
    pub user_id: UserId,
    pub previous: RankTier,
    /// Full standing after the award.
    pub current: RankInfo,
}

impl RankChange {
    pub fn tier(&self) -> &RankTier {
        &self.current.tier
    }

    /// The new tier is the last one.
    pub fn is_terminal(&self) -> bool {
        self.current.is_terminal()
    }

    pub fn next(&self) -> Option<&NextTier> {
        self.current.next.as_ref()
    }
}

/// Compare tiers before and after an award.
///
/// Fires only when the tier name changes; a level-up inside one tier is not a
/// rank change.
pub fn detect_rank_change(user_id: UserId, before: &RankInfo, after: &RankInfo) -> Option<RankChange> {
    (before.tier.name != after.tier.name).then(|| RankChange {
        user_id,
        previous: before.tier,
        current: after.clone(),
    })
}

/// Result of one XP award.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Progress {
    pub user_id: UserId,
    pub awarded: u64,
    pub before: RankInfo,
    pub after: RankInfo,
    pub change: Option<RankChange>,
}

impl Progress {
    pub fn total(&self) -> u64 {
        self.after.xp
    }

    pub fn level_changed(&self) -> bool {
        self.before.level != self.after.level
    }
}

/// How transient store failures are retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub attempts: u32,
    /// Delay before retry `n` is `n * base_delay`.
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub const fn new(attempts: u32, base_delay: Duration) -> Self {
        Self {
            attempts,
            base_delay,
        }
    }

    pub const fn none() -> Self {
        Self::new(1, Duration::ZERO)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(100))
    }
}

/// Awards XP and reports rank transitions.
pub struct ProgressionEngine {
    store: Arc<dyn Store>,
    table: RankTable,
    retry: RetryPolicy,
    locks: DashMap<UserId, Arc<Mutex<()>>>,
}

impl ProgressionEngine {
    pub fn new(store: Arc<dyn Store>, table: RankTable) -> Self {
        Self {
            store,
            table,
            retry: RetryPolicy::default(),
            locks: DashMap::new(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn table(&self) -> &RankTable {
        &self.table
    }

    /// Current standing of `user`.
    pub async fn rank_of(&self, user: UserId) -> Result<RankInfo, StoreError> {
        let record = self
            .retrying("get_user", user, || self.store.get_user(user))
            .await?;
        Ok(self.table.rank_for(record.xp))
    }

    /// Add `amount` to the user's XP and compute ranks before and after.
    ///
    /// An award of zero performs no write.
    pub async fn award_xp(&self, user: UserId, amount: u64) -> Result<Progress, StoreError> {
        let lock = self
            .locks
            .entry(user)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        let result = {
            let _guard = lock.lock().await;
            self.award_locked(user, amount).await
        };

        drop(lock);
        self.locks.remove_if(&user, |_, l| Arc::strong_count(l) == 1);
        result
    }

    async fn award_locked(&self, user: UserId, amount: u64) -> Result<Progress, StoreError> {
        let record = self
            .retrying("get_user", user, || self.store.get_user(user))
            .await?;
        let old_xp = record.xp;
        let new_xp = old_xp.saturating_add(amount);

        if new_xp != old_xp {
            self.retrying("set_user_xp", user, || self.store.set_user_xp(user, new_xp))
                .await?;
        }

        let before = self.table.rank_for(old_xp);
        let after = self.table.rank_for(new_xp);
        let change = detect_rank_change(user, &before, &after);

        debug!(
            user,
            awarded = amount,
            total = new_xp,
            level = after.level,
            tier = after.tier.name,
            "XP awarded"
        );

        Ok(Progress {
            user_id: user,
            awarded: amount,
            before,
            after,
            change,
        })
    }

    async fn retrying<T, F, Fut>(&self, op: &'static str, user: UserId, mut f: F) -> Result<T, StoreError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        let mut attempt = 1;
        loop {
            match f().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < self.retry.attempts => {
                    warn!(op, user, attempt, error = %e, "Store unavailable, retrying");
                    tokio::time::sleep(self.retry.base_delay * attempt).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    #[cfg(test)]
    fn tracked_users(&self) -> usize {
        self.locks.len()
    }
}
