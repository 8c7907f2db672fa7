use std::collections::HashMap;

use follower_blocker_common::{
    BlockFailure, DirectorySnapshot, InMemoryDirectoryClient, Profile, UserId,
};
use follower_blocker_engine::{
    BlockExecutor, BlockLedgerConfig, ItemOutcome, ResumeCoordinator, RunPlanner,
    SqliteBlockLedgerConfig,
};
use log::info;
use tokio::sync::{mpsc, watch};

const FOLLOWERS: i64 = 12;

/// Blocks a target with a few followers, stops halfway and resumes, logging
/// every step.
#[tokio::main]
async fn main() {
    env_logger::builder()
        .parse_filters("follower_blocker_e2e=info,follower_blocker_engine=info")
        .init();

    let target = Profile::builder()
        .id(42)
        .display_name("Target")
        .handle("target")
        .follower_count(FOLLOWERS as u64)
        .build();
    let client = InMemoryDirectoryClient::new(
        DirectorySnapshot::builder()
            .profiles(vec![target.clone()])
            .followers(HashMap::from([(
                target.id,
                (1..=FOLLOWERS).map(UserId::new).collect(),
            )]))
            .block_failures(HashMap::from([(UserId::new(5), BlockFailure::Suspended)]))
            .page_size(5)
            .follower_ids_quota(15)
            .build(),
    );
    let mut ledger = SqliteBlockLedgerConfig::in_memory()
        .create_ledger()
        .await
        .expect("Can create ledger");

    // ##### Experiment #####
    let plan = RunPlanner::new(&client, &mut ledger)
        .new_run(&target, "demo")
        .await
        .expect("Can plan run");
    info!("Planned {} accounts", plan.total);

    let (stop_tx, stop_rx) = watch::channel(false);
    let (tx, mut rx) = mpsc::channel(1);
    let run = BlockExecutor::builder()
        .client(client.clone())
        .ledger(ledger.clone())
        .progress(tx)
        .stop(stop_rx)
        .build()
        .spawn();
    while let Some(progress) = rx.recv().await {
        log_progress(progress.processed, progress.total, &progress.outcome);
        if progress.processed == plan.total as u64 / 2 {
            info!("---------");
            info!("Stopping");
            stop_tx.send(true).expect("Executor is listening");
        }
    }
    let report = run.await.expect("Task joins").expect("Run completes");
    info!("{} accounts left", report.remaining);
    info!("---------");

    let (tx, mut rx) = mpsc::channel(1);
    let run = ResumeCoordinator::new(ledger)
        .await
        .expect("Can inspect ledger")
        .resume(client, Some(tx), None)
        .await
        .expect("Run can be resumed")
        .spawn();
    while let Some(progress) = rx.recv().await {
        info!("Success counter {}", progress.successes);
        log_progress(progress.processed, progress.total, &progress.outcome);
    }
    let report = run.await.expect("Task joins").expect("Run completes");
    info!(
        "Done: {} blocked, {} failed, {} left",
        report.successes, report.failed, report.remaining
    );
}

fn log_progress(processed: u64, total: u64, outcome: &ItemOutcome) {
    match outcome {
        ItemOutcome::Blocked(user) | ItemOutcome::AlreadyBlocked(user) => {
            info!("[{processed}/{total}] {} ({})", user.display_name, user.id)
        }
        ItemOutcome::Failed(e) => info!("[{processed}/{total}] {e}"),
    }
}
