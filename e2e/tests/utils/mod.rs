#![allow(dead_code)]

use std::{collections::HashMap, fs::File, io::BufReader, path::PathBuf};

use follower_blocker_common::{
    BlockFailure, Credentials, DirectorySnapshot, InMemoryDirectoryClient,
    InMemoryDirectoryConfig, Profile, UserId,
};
use follower_blocker_engine::{
    BlockLedgerConfig, RunProgress, Session, SettingsStore, SqliteBlockLedger,
    SqliteBlockLedgerConfig, SqliteSettingsStore,
};
use rstest::fixture;
use tempfile::TempDir;
use tokio::sync::mpsc;

pub type TestSession = Session<InMemoryDirectoryClient, SqliteBlockLedger, SqliteSettingsStore>;

pub const TARGET: i64 = 42;

#[fixture]
pub fn workdir() -> TempDir {
    let _ = env_logger::try_init();
    tempfile::tempdir().expect("Can create temp dir")
}

pub fn profile(id: i64, handle: &str) -> Profile {
    Profile::builder()
        .id(id)
        .display_name(handle)
        .handle(handle)
        .build()
}

pub fn ids(ids: &[i64]) -> Vec<UserId> {
    ids.iter().copied().map(UserId::new).collect()
}

/// Directory where `TARGET` is followed by `followers` and blocking any of
/// `suspended` fails.
pub fn snapshot(followers: &[i64], suspended: &[i64]) -> DirectorySnapshot {
    DirectorySnapshot::builder()
        .me(profile(1000, "me"))
        .profiles(vec![profile(TARGET, "target")])
        .followers(HashMap::from([(UserId::new(TARGET), ids(followers))]))
        .block_failures(
            suspended
                .iter()
                .map(|id| (UserId::new(*id), BlockFailure::Suspended))
                .collect(),
        )
        .page_size(2)
        .build()
}

/// Writes the snapshot to disk so it goes through the same loader as the
/// command line.
pub fn write_snapshot(dir: &TempDir, snapshot: &DirectorySnapshot) -> PathBuf {
    let path = dir.path().join("directory.json");
    let file = File::create(&path).expect("Can create snapshot file");
    serde_json::to_writer(file, snapshot).expect("Can write snapshot");
    path
}

pub fn directory_config(path: &PathBuf) -> InMemoryDirectoryConfig {
    let file = File::open(path).expect("Can open snapshot file");
    InMemoryDirectoryConfig::load(BufReader::new(file)).expect("Valid snapshot")
}

pub async fn open_ledger(dir: &TempDir) -> SqliteBlockLedger {
    let path = dir.path().join("ledger.db");
    SqliteBlockLedgerConfig::from_path(&path.to_string_lossy())
        .create_ledger()
        .await
        .expect("Can open ledger")
}

pub async fn open_session(ledger: &SqliteBlockLedger, snapshot: &PathBuf) -> TestSession {
    let mut settings = ledger.settings();
    if !settings
        .credentials()
        .await
        .expect("Can read settings")
        .is_complete()
    {
        settings
            .save_credentials(
                &Credentials::builder()
                    .consumer_key("key")
                    .consumer_secret("secret")
                    .access_token_key("token")
                    .access_token_secret("token secret")
                    .build(),
            )
            .await
            .expect("Can save credentials");
    }
    Session::open(directory_config(snapshot), ledger.clone(), settings)
        .await
        .expect("Can open session")
}

pub async fn successes(mut rx: mpsc::Receiver<RunProgress>) -> Vec<u64> {
    let mut successes = Vec::new();
    while let Some(progress) = rx.recv().await {
        successes.push(progress.successes);
    }
    successes
}
