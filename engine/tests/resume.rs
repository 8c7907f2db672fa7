use std::collections::HashMap;

use follower_blocker_common::{
    BlockFailure, DirectorySnapshot, InMemoryDirectoryClient, Profile, UserId,
};
use follower_blocker_engine::{
    BlockExecutor, BlockLedger, BlockLedgerConfig, ResumeCoordinator, RunPlanner, RunProgress,
    SqliteBlockLedger, SqliteBlockLedgerConfig,
};
use rstest::rstest;
use tokio::sync::{mpsc, watch};

fn target() -> Profile {
    Profile::builder()
        .id(42)
        .display_name("Target")
        .handle("target")
        .build()
}

fn client(followers: &[i64], failures: &[i64]) -> InMemoryDirectoryClient {
    InMemoryDirectoryClient::new(
        DirectorySnapshot::builder()
            .profiles(vec![target()])
            .followers(HashMap::from([(
                UserId::new(42),
                followers.iter().copied().map(UserId::new).collect(),
            )]))
            .block_failures(
                failures
                    .iter()
                    .map(|id| (UserId::new(*id), BlockFailure::Transient))
                    .collect(),
            )
            .page_size(3)
            .build(),
    )
}

async fn planned_ledger(client: &InMemoryDirectoryClient) -> SqliteBlockLedger {
    let _ = env_logger::try_init();
    let mut ledger = SqliteBlockLedgerConfig::in_memory()
        .create_ledger()
        .await
        .expect("Can create ledger");
    RunPlanner::new(client, &mut ledger)
        .new_run(&target(), "spam")
        .await
        .expect("Can plan run");
    ledger
}

async fn drain(mut rx: mpsc::Receiver<RunProgress>) -> Vec<u64> {
    let mut successes = Vec::new();
    while let Some(progress) = rx.recv().await {
        successes.push(progress.successes);
    }
    successes
}

/// Commits exactly `k` items, one interrupted run per item, and returns the
/// number of blocks recorded for the target afterwards.
async fn interrupt_after(
    client: &InMemoryDirectoryClient,
    ledger: &SqliteBlockLedger,
    k: usize,
) -> u64 {
    for _ in 0..k {
        // raised before the run starts, so it stops after the first commit
        let (_stop_tx, stop_rx) = watch::channel(true);
        let report = BlockExecutor::builder()
            .client(client.clone())
            .ledger(ledger.clone())
            .stop(stop_rx)
            .build()
            .run()
            .await
            .expect("Run completes");
        assert!(report.cancelled);
        assert_eq!(report.blocked + report.failed, 1);
    }
    ledger
        .blocked_for_target(UserId::new(42))
        .await
        .expect("Can count")
}

#[rstest]
#[case(vec![1, 2, 3, 4, 5, 6, 7], vec![], 3)]
#[case(vec![1, 2, 3, 4, 5, 6, 7], vec![2, 5], 4)]
#[case(vec![1, 2, 3], vec![], 2)]
#[tokio::test]
async fn resumed_run_processes_only_the_rest(
    #[case] followers: Vec<i64>,
    #[case] failures: Vec<i64>,
    #[case] k: usize,
) {
    let client = client(&followers, &failures);
    let ledger = planned_ledger(&client).await;
    let n = followers.len() + 1;

    let before = interrupt_after(&client, &ledger, k).await;
    let remaining = ledger.pending_items().await.expect("Can read").len();
    let calls_before = client.block_calls().await;
    assert_eq!(remaining, n - k);
    assert_eq!(calls_before, k);

    let coordinator = ResumeCoordinator::new(ledger.clone())
        .await
        .expect("Can inspect ledger");
    let offer = coordinator.offer().cloned().expect("Run can be resumed");
    assert_eq!(offer.target, UserId::new(42));
    assert_eq!(offer.remaining as usize, n - k);

    let (tx, rx) = mpsc::channel(n);
    let report = coordinator
        .resume(client.clone(), Some(tx), None)
        .await
        .expect("Can resume")
        .run()
        .await
        .expect("Run completes");
    let successes = drain(rx).await;

    assert_eq!(client.block_calls().await - calls_before, n - k);
    assert_eq!(successes.len(), n - k);
    let first_resumed = followers[k];
    let expected_first = if failures.contains(&first_resumed) {
        before
    } else {
        before + 1
    };
    assert_eq!(successes[0], expected_first);
    assert!(successes.windows(2).all(|pair| pair[1] >= pair[0]));
    assert_eq!(report.successes, (n - failures.len()) as u64);
    assert_eq!(report.remaining, 0);
    assert!(ResumeCoordinator::new(ledger)
        .await
        .expect("Can inspect ledger")
        .offer()
        .is_none());
}

#[tokio::test]
async fn planning_twice_gives_the_same_pending_set() {
    let client = client(&[1, 2, 3], &[]);
    let mut ledger = planned_ledger(&client).await;
    let first = ledger.pending_items().await.expect("Can read");

    RunPlanner::new(&client, &mut ledger)
        .new_run(&target(), "spam")
        .await
        .expect("Can plan run");

    assert_eq!(ledger.pending_items().await.expect("Can read"), first);
}
