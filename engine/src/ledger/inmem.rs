use std::{collections::HashSet, sync::Arc};

use async_trait::async_trait;
use follower_blocker_common::UserId;
use tokio::sync::Mutex;

use crate::LedgerError;

use super::{
    record_parent, validate_run, AttemptOutcome, BlockLedger, BlockLedgerConfig, BlockRecord,
    PendingItem, RunInfo,
};

#[derive(Debug, Default)]
struct LedgerState {
    records: Vec<BlockRecord>,
    pending: Vec<PendingItem>,
}

/// Ledger kept in process memory. Nothing survives the process, which makes
/// it a stand-in for tests rather than for real runs.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBlockLedger {
    state: Arc<Mutex<LedgerState>>,
}

impl InMemoryBlockLedger {
    /// Adds a pending item without any of the single-run checks.
    pub async fn push_pending_unchecked(&self, item: PendingItem) {
        self.state.lock().await.pending.push(item);
    }

    pub async fn records(&self) -> Vec<BlockRecord> {
        self.state.lock().await.records.clone()
    }
}

#[async_trait]
impl BlockLedgerConfig for InMemoryBlockLedger {
    type BlockLedger = InMemoryBlockLedger;

    async fn create_ledger(self) -> Result<Self::BlockLedger, LedgerError> {
        Ok(self)
    }
}

#[async_trait]
impl BlockLedger for InMemoryBlockLedger {
    async fn begin_run(
        &mut self,
        target_id: UserId,
        member_ids: &[UserId],
        reason: &str,
    ) -> Result<(), LedgerError> {
        validate_run(target_id, member_ids)?;

        let mut state = self.state.lock().await;
        state.pending.clear();
        for member_id in member_ids.iter().chain(std::iter::once(&target_id)) {
            match state
                .pending
                .iter()
                .position(|item| item.user_id == *member_id)
            {
                Some(index) => state.pending[index].reason = reason.to_owned(),
                None => state.pending.push(PendingItem {
                    user_id: *member_id,
                    parent_id: target_id,
                    reason: reason.to_owned(),
                }),
            }
        }
        Ok(())
    }

    async fn record_block_attempt(
        &mut self,
        item: &PendingItem,
        outcome: AttemptOutcome,
    ) -> Result<(), LedgerError> {
        let mut state = self.state.lock().await;

        if let AttemptOutcome::Blocked { user, date } = outcome {
            let parent_id = record_parent(user.id, item.parent_id);
            match state
                .records
                .iter()
                .position(|record| record.user_id == user.id && record.parent_id == parent_id)
            {
                Some(index) => state.records[index].display_name = user.display_name,
                None => state.records.push(BlockRecord {
                    user_id: user.id,
                    display_name: user.display_name,
                    parent_id,
                    reason: item.reason.clone(),
                    blocked_at: date,
                }),
            }
        }

        state.pending.retain(|pending| {
            !(pending.user_id == item.user_id && pending.parent_id == item.parent_id)
        });
        Ok(())
    }

    async fn pending_items(&self) -> Result<Vec<PendingItem>, LedgerError> {
        Ok(self.state.lock().await.pending.clone())
    }

    async fn active_run_target(&self) -> Result<Option<UserId>, LedgerError> {
        let state = self.state.lock().await;
        let mut parents: Vec<UserId> = Vec::new();
        for item in &state.pending {
            if !parents.contains(&item.parent_id) {
                parents.push(item.parent_id);
            }
        }

        match parents.len() {
            0 => Ok(None),
            1 => Ok(Some(parents[0])),
            _ => Err(LedgerError::MultipleActiveRuns(parents)),
        }
    }

    async fn completed_count(&self) -> Result<u64, LedgerError> {
        let state = self.state.lock().await;
        let distinct: HashSet<UserId> = state.records.iter().map(|record| record.user_id).collect();
        Ok(distinct.len() as u64)
    }

    async fn find_block_record(
        &self,
        user_id: UserId,
        parent_id: Option<UserId>,
    ) -> Result<Option<BlockRecord>, LedgerError> {
        Ok(self
            .state
            .lock()
            .await
            .records
            .iter()
            .find(|record| record.user_id == user_id && record.parent_id == parent_id)
            .cloned())
    }

    async fn blocked_user(&self, user_id: UserId) -> Result<Option<BlockRecord>, LedgerError> {
        Ok(self
            .state
            .lock()
            .await
            .records
            .iter()
            .filter(|record| record.user_id == user_id)
            .min_by_key(|record| record.blocked_at)
            .cloned())
    }

    async fn blocked_for_target(&self, target_id: UserId) -> Result<u64, LedgerError> {
        let state = self.state.lock().await;
        let blocked = state
            .records
            .iter()
            .filter(|record| match record.parent_id {
                Some(parent_id) => parent_id == target_id,
                None => record.user_id == target_id,
            })
            .count();
        Ok(blocked as u64)
    }

    async fn last_run_info(&self) -> Result<RunInfo, LedgerError> {
        let state = self.state.lock().await;
        Ok(RunInfo {
            remaining: state.pending.len() as u64,
            reason: state.pending.first().map(|item| item.reason.clone()),
        })
    }

    async fn close(self) -> Result<(), LedgerError> {
        Ok(())
    }
}
