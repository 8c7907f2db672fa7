use follower_blocker_common::{DirectoryClient, Profile, UserId};
use log::info;

use crate::{pager::FollowerPager, BlockLedger, BlockerError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunPlan {
    pub target: UserId,
    pub reason: String,
    /// Pending items seeded, the target included.
    pub total: usize,
}

/// Seeds new runs into the ledger.
pub struct RunPlanner<'a, C, L> {
    client: &'a C,
    ledger: &'a mut L,
}

impl<'a, C: DirectoryClient, L: BlockLedger> RunPlanner<'a, C, L> {
    pub fn new(client: &'a C, ledger: &'a mut L) -> Self {
        Self { client, ledger }
    }

    /// Plans a run against `target` and all of its followers.
    ///
    /// The complete follower list is fetched before the ledger is touched, so
    /// a failed enumeration leaves any previous run in place.
    pub async fn new_run(
        &mut self,
        target: &Profile,
        reason: &str,
    ) -> Result<RunPlan, BlockerError> {
        info!(
            "Fetching {} followers of @{}",
            target.follower_count, target.handle
        );
        let follower_ids = FollowerPager::new(self.client, target.id)
            .collect_ids()
            .await?;

        self.seed(target.id, &follower_ids, reason).await
    }

    /// Plans a run against `parent` and an explicit list of accounts.
    pub async fn explicit_run(
        &mut self,
        parent: UserId,
        member_ids: &[UserId],
        reason: &str,
    ) -> Result<RunPlan, BlockerError> {
        self.seed(parent, member_ids, reason).await
    }

    async fn seed(
        &mut self,
        target: UserId,
        member_ids: &[UserId],
        reason: &str,
    ) -> Result<RunPlan, BlockerError> {
        self.ledger.begin_run(target, member_ids, reason).await?;
        let total = self.ledger.pending_items().await?.len();
        info!("Planned run against {target}: {total} accounts to block");

        Ok(RunPlan {
            target,
            reason: reason.to_owned(),
            total,
        })
    }
}
