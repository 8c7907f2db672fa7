//! Durable record of completed blocks and of the work left in the active run.
//!
//! The ledger is the only source of truth when a run is resumed, so every
//! mutation is committed before the call returns.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use follower_blocker_common::{BlockedUser, UserId};

use crate::LedgerError;

mod inmem;
mod sqlite;

pub use inmem::InMemoryBlockLedger;
pub use sqlite::{SqliteBlockLedger, SqliteBlockLedgerConfig};

/// A block that went through, keyed by `(user_id, parent_id)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockRecord {
    pub user_id: UserId,
    pub display_name: String,
    /// `None` when the blocked account is the root of its own campaign.
    pub parent_id: Option<UserId>,
    pub reason: String,
    pub blocked_at: DateTime<Utc>,
}

/// Work not yet resolved in the active run.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PendingItem {
    pub user_id: UserId,
    pub parent_id: UserId,
    pub reason: String,
}

impl PendingItem {
    pub fn is_root(&self) -> bool {
        self.user_id == self.parent_id
    }

    /// Key under which a successful block of this item is recorded.
    pub fn record_parent(&self) -> Option<UserId> {
        record_parent(self.user_id, self.parent_id)
    }
}

pub(crate) fn record_parent(user_id: UserId, parent_id: UserId) -> Option<UserId> {
    (user_id != parent_id).then_some(parent_id)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// `user` is the canonical identity the directory answered with and
    /// `date` the timestamp shared by the whole run.
    Blocked {
        user: BlockedUser,
        date: DateTime<Utc>,
    },
    /// Permanent for this run, the item is dropped without a record.
    Failed,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunInfo {
    pub remaining: u64,
    pub reason: Option<String>,
}

#[async_trait]
pub trait BlockLedger: Send + Sync + Clone {
    /// Replaces any unfinished run with `member_ids` followed by `target_id`.
    async fn begin_run(
        &mut self,
        target_id: UserId,
        member_ids: &[UserId],
        reason: &str,
    ) -> Result<(), LedgerError>;

    /// Commits the outcome of one pending item and removes it from the run.
    async fn record_block_attempt(
        &mut self,
        item: &PendingItem,
        outcome: AttemptOutcome,
    ) -> Result<(), LedgerError>;

    /// Remaining work in insertion order.
    async fn pending_items(&self) -> Result<Vec<PendingItem>, LedgerError>;

    async fn active_run_target(&self) -> Result<Option<UserId>, LedgerError>;

    /// Distinct accounts ever blocked, across all campaigns.
    async fn completed_count(&self) -> Result<u64, LedgerError>;

    async fn find_block_record(
        &self,
        user_id: UserId,
        parent_id: Option<UserId>,
    ) -> Result<Option<BlockRecord>, LedgerError>;

    /// Earliest record of `user_id` under any campaign.
    async fn blocked_user(&self, user_id: UserId) -> Result<Option<BlockRecord>, LedgerError>;

    /// Records belonging to the campaign rooted at `target_id`.
    async fn blocked_for_target(&self, target_id: UserId) -> Result<u64, LedgerError>;

    async fn last_run_info(&self) -> Result<RunInfo, LedgerError>;

    async fn close(self) -> Result<(), LedgerError>
    where
        Self: Sized;
}

#[async_trait]
pub trait BlockLedgerConfig {
    type BlockLedger: BlockLedger;

    async fn create_ledger(self) -> Result<Self::BlockLedger, LedgerError>;
}

pub(crate) fn validate_run(target_id: UserId, member_ids: &[UserId]) -> Result<(), LedgerError> {
    std::iter::once(&target_id)
        .chain(member_ids)
        .find(|user_id| !user_id.is_valid())
        .map_or(Ok(()), |invalid| Err(LedgerError::InvalidIdentity(*invalid)))
}
