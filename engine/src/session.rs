use chrono::Utc;
use follower_blocker_common::{
    DirectoryClient, DirectoryClientConfig, DirectoryError, Profile, ProfileLookup, UserId,
};
use log::{info, warn};
use tokio::sync::{mpsc, watch};

use crate::{
    BlockExecutor, BlockLedger, BlockRecord, BlockerError, LedgerError, ResumeCoordinator,
    RunPlanner, RunProgress, RunReport, SettingsStore,
};

/// An authenticated directory client together with the local stores.
pub struct Session<C, L, S> {
    client: C,
    me: Profile,
    ledger: L,
    settings: S,
}

impl<C, L, S> Session<C, L, S>
where
    C: DirectoryClient + Clone,
    L: BlockLedger,
    S: SettingsStore,
{
    /// Authentication failures end here, before the ledger is touched.
    pub async fn open<F>(config: F, ledger: L, settings: S) -> Result<Self, BlockerError>
    where
        F: DirectoryClientConfig<DirectoryClient = C>,
    {
        let credentials = settings.credentials().await?;
        let client = config.create(credentials).await?;
        let me = client
            .verify_identity()
            .await
            .inspect_err(|e| warn!("Could not verify credentials: {e}"))?;
        info!("Authenticated as @{}", me.handle);

        Ok(Self {
            client,
            me,
            ledger,
            settings,
        })
    }

    pub fn me(&self) -> &Profile {
        &self.me
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    pub fn settings(&self) -> &S {
        &self.settings
    }

    pub async fn lookup(&self, lookup: ProfileLookup) -> Result<Profile, DirectoryError> {
        self.client.get_profile(lookup).await
    }

    pub async fn completed_count(&self) -> Result<u64, LedgerError> {
        self.ledger.completed_count().await
    }

    /// Local record of an account blocked under any campaign.
    pub async fn blocked_user(&self, user_id: UserId) -> Result<Option<BlockRecord>, LedgerError> {
        self.ledger.blocked_user(user_id).await
    }

    pub async fn resume_coordinator(&self) -> Result<ResumeCoordinator<L>, LedgerError> {
        ResumeCoordinator::new(self.ledger.clone()).await
    }

    /// Blocks `target` and every one of its followers.
    pub async fn block_followers(
        &mut self,
        target: &Profile,
        reason: &str,
        progress: Option<mpsc::Sender<RunProgress>>,
        stop: Option<watch::Receiver<bool>>,
    ) -> Result<RunReport, BlockerError> {
        RunPlanner::new(&self.client, &mut self.ledger)
            .new_run(target, reason)
            .await?;
        self.execute(progress, stop).await
    }

    /// Blocks `parent` and the given accounts.
    pub async fn block_users(
        &mut self,
        parent: UserId,
        user_ids: &[UserId],
        reason: &str,
        progress: Option<mpsc::Sender<RunProgress>>,
        stop: Option<watch::Receiver<bool>>,
    ) -> Result<RunReport, BlockerError> {
        RunPlanner::new(&self.client, &mut self.ledger)
            .explicit_run(parent, user_ids, reason)
            .await?;
        self.execute(progress, stop).await
    }

    /// Continues the unfinished run, if any.
    pub async fn resume(
        &mut self,
        progress: Option<mpsc::Sender<RunProgress>>,
        stop: Option<watch::Receiver<bool>>,
    ) -> Result<RunReport, BlockerError> {
        let report = self
            .resume_coordinator()
            .await?
            .resume(self.client.clone(), progress, stop)
            .await?
            .run()
            .await?;
        self.finish(report).await
    }

    /// Drains the run that was just planned.
    async fn execute(
        &mut self,
        progress: Option<mpsc::Sender<RunProgress>>,
        stop: Option<watch::Receiver<bool>>,
    ) -> Result<RunReport, BlockerError> {
        let report = BlockExecutor::builder()
            .client(self.client.clone())
            .ledger(self.ledger.clone())
            .maybe_progress(progress)
            .maybe_stop(stop)
            .build()
            .run()
            .await?;
        self.finish(report).await
    }

    async fn finish(&mut self, report: RunReport) -> Result<RunReport, BlockerError> {
        if report.remaining == 0 {
            self.settings.save_sync_date(Utc::now()).await?;
        }
        Ok(report)
    }
}
