use bon::bon;
use chrono::{DateTime, Utc};
use follower_blocker_common::{BlockedUser, DirectoryClient, DirectoryError};
use log::{debug, info, warn};
use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
};

use crate::{AttemptOutcome, BlockLedger, LedgerError, PendingItem};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    Blocked(BlockedUser),
    /// A local record already existed, the directory was not called.
    AlreadyBlocked(BlockedUser),
    Failed(DirectoryError),
}

impl ItemOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, ItemOutcome::Failed(_))
    }
}

/// Sent after every committed item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunProgress {
    pub item: PendingItem,
    pub outcome: ItemOutcome,
    /// Successful blocks so far, counted from the executor's baseline.
    pub successes: u64,
    pub failures: u64,
    pub processed: u64,
    pub total: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunReport {
    pub blocked: u64,
    pub failed: u64,
    /// Success counter at the end, baseline included.
    pub successes: u64,
    pub remaining: u64,
    pub cancelled: bool,
}

/// Drains the pending items of the ledger against the directory, one item
/// and one transaction at a time.
///
/// Directory failures are counted and the item is dropped from the run; they
/// are not retried. Ledger failures stop the run with the current item still
/// pending.
pub struct BlockExecutor<C, L> {
    client: C,
    ledger: L,
    baseline: u64,
    progress: Option<mpsc::Sender<RunProgress>>,
    stop: Option<watch::Receiver<bool>>,
}

#[bon]
impl<C: DirectoryClient, L: BlockLedger> BlockExecutor<C, L> {
    #[builder]
    pub fn new(
        client: C,
        ledger: L,
        #[builder(default)] baseline: u64,
        progress: Option<mpsc::Sender<RunProgress>>,
        stop: Option<watch::Receiver<bool>>,
    ) -> Self {
        Self {
            client,
            ledger,
            baseline,
            progress,
            stop,
        }
    }

    pub async fn run(mut self) -> Result<RunReport, LedgerError> {
        // one timestamp for the whole run
        let date = Utc::now();
        let items = self.ledger.pending_items().await?;
        let total = items.len() as u64;
        info!("Blocking {total} pending accounts");

        let mut report = RunReport {
            successes: self.baseline,
            ..RunReport::default()
        };
        for (index, item) in items.into_iter().enumerate() {
            let outcome = self.attempt(&item, date).await?;
            if outcome.is_success() {
                report.blocked += 1;
                report.successes += 1;
            } else {
                report.failed += 1;
            }

            self.notify(RunProgress {
                item,
                outcome,
                successes: report.successes,
                failures: report.failed,
                processed: index as u64 + 1,
                total,
            })
            .await;

            if self.stop_requested() {
                info!("Stop requested after {} of {total} accounts", index + 1);
                report.cancelled = true;
                break;
            }
        }

        report.remaining = self.ledger.pending_items().await?.len() as u64;
        info!(
            "Run finished: {} blocked, {} failed, {} remaining",
            report.blocked, report.failed, report.remaining
        );
        Ok(report)
    }

    async fn attempt(
        &mut self,
        item: &PendingItem,
        date: DateTime<Utc>,
    ) -> Result<ItemOutcome, LedgerError> {
        if let Some(record) = self
            .ledger
            .find_block_record(item.user_id, item.record_parent())
            .await?
        {
            debug!("{} is already blocked, skipping", item.user_id);
            let user = BlockedUser {
                id: record.user_id,
                display_name: record.display_name,
            };
            self.ledger
                .record_block_attempt(
                    item,
                    AttemptOutcome::Blocked {
                        user: user.clone(),
                        date,
                    },
                )
                .await?;
            return Ok(ItemOutcome::AlreadyBlocked(user));
        }

        match self.client.block(item.user_id).await {
            Ok(user) => {
                debug!("Blocked {} ({})", user.display_name, user.id);
                self.ledger
                    .record_block_attempt(
                        item,
                        AttemptOutcome::Blocked {
                            user: user.clone(),
                            date,
                        },
                    )
                    .await?;
                Ok(ItemOutcome::Blocked(user))
            }
            Err(error) => {
                warn!("Could not block {}: {error}", item.user_id);
                self.ledger
                    .record_block_attempt(item, AttemptOutcome::Failed)
                    .await?;
                Ok(ItemOutcome::Failed(error))
            }
        }
    }

    async fn notify(&self, progress: RunProgress) {
        if let Some(sender) = &self.progress {
            if sender.send(progress).await.is_err() {
                debug!("Progress receiver dropped");
            }
        }
    }

    fn stop_requested(&self) -> bool {
        self.stop.as_ref().is_some_and(|stop| *stop.borrow())
    }
}

impl<C, L> BlockExecutor<C, L>
where
    C: DirectoryClient + 'static,
    L: BlockLedger + 'static,
{
    /// Runs on a background task so the caller stays responsive.
    pub fn spawn(self) -> JoinHandle<Result<RunReport, LedgerError>> {
        tokio::spawn(self.run())
    }
}
