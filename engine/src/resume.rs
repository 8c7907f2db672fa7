use follower_blocker_common::{DirectoryClient, UserId};
use log::info;
use tokio::sync::{mpsc, watch};

use crate::{BlockExecutor, BlockLedger, LedgerError, RunInfo, RunProgress};

/// An unfinished run found in the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResumeOffer {
    pub target: UserId,
    pub reason: String,
    pub remaining: u64,
}

/// Looks for an unfinished run when the program starts. Resuming it is left
/// to the caller.
pub struct ResumeCoordinator<L> {
    ledger: L,
    offer: Option<ResumeOffer>,
}

impl<L: BlockLedger> ResumeCoordinator<L> {
    pub async fn new(ledger: L) -> Result<Self, LedgerError> {
        let offer = match ledger.active_run_target().await? {
            Some(target) => {
                let info = ledger.last_run_info().await?;
                (info.remaining > 0).then(|| ResumeOffer {
                    target,
                    reason: info.reason.unwrap_or_default(),
                    remaining: info.remaining,
                })
            }
            None => None,
        };
        if let Some(offer) = &offer {
            info!(
                "Found unfinished run against {} with {} accounts left",
                offer.target, offer.remaining
            );
        }

        Ok(Self { ledger, offer })
    }

    pub fn offer(&self) -> Option<&ResumeOffer> {
        self.offer.as_ref()
    }

    pub async fn last_run_info(&self) -> Result<RunInfo, LedgerError> {
        self.ledger.last_run_info().await
    }

    /// Builds an executor for the unfinished run whose success counter
    /// continues from the blocks already recorded for the target.
    pub async fn resume<C: DirectoryClient>(
        self,
        client: C,
        progress: Option<mpsc::Sender<RunProgress>>,
        stop: Option<watch::Receiver<bool>>,
    ) -> Result<BlockExecutor<C, L>, LedgerError> {
        let offer = self.offer.ok_or(LedgerError::NoActiveRun)?;
        let baseline = self.ledger.blocked_for_target(offer.target).await?;
        info!(
            "Resuming run against {}: {baseline} blocked so far, {} left",
            offer.target, offer.remaining
        );

        Ok(BlockExecutor::builder()
            .client(client)
            .ledger(self.ledger)
            .baseline(baseline)
            .maybe_progress(progress)
            .maybe_stop(stop)
            .build())
    }
}

#[cfg(test)]
mod test {
    use follower_blocker_common::{DirectorySnapshot, InMemoryDirectoryClient};

    use crate::InMemoryBlockLedger;

    use super::*;

    #[tokio::test]
    async fn nothing_to_offer_on_empty_ledger() {
        let coordinator = ResumeCoordinator::new(InMemoryBlockLedger::default())
            .await
            .expect("Can inspect ledger");

        assert!(coordinator.offer().is_none());
        let client = InMemoryDirectoryClient::new(DirectorySnapshot::default());
        assert!(matches!(
            coordinator.resume(client, None, None).await,
            Err(LedgerError::NoActiveRun)
        ));
    }

    #[tokio::test]
    async fn offers_the_unfinished_run() {
        let mut ledger = InMemoryBlockLedger::default();
        ledger
            .begin_run(UserId::new(42), &[UserId::new(1), UserId::new(2)], "spam")
            .await
            .expect("Can begin run");

        let coordinator = ResumeCoordinator::new(ledger)
            .await
            .expect("Can inspect ledger");

        assert_eq!(
            coordinator.offer(),
            Some(&ResumeOffer {
                target: UserId::new(42),
                reason: "spam".to_owned(),
                remaining: 3,
            })
        );
        assert_eq!(
            coordinator.last_run_info().await.expect("Can read"),
            RunInfo {
                remaining: 3,
                reason: Some("spam".to_owned())
            }
        );
    }

    #[tokio::test]
    async fn corrupt_ledger_is_not_offered() {
        let ledger = InMemoryBlockLedger::default();
        for (user, parent) in [(1, 42), (2, 43)] {
            ledger
                .push_pending_unchecked(crate::PendingItem {
                    user_id: UserId::new(user),
                    parent_id: UserId::new(parent),
                    reason: "spam".to_owned(),
                })
                .await;
        }

        let result = ResumeCoordinator::new(ledger).await;

        assert!(matches!(result, Err(LedgerError::MultipleActiveRuns(_))));
    }
}
