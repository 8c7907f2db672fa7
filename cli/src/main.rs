use clap::{Arg, ArgAction, ArgMatches, Command};
use follower_blocker_cli::{config::BlockerCliConfig, error::CliError};
use follower_blocker_common::{
    Credentials, InMemoryDirectoryClient, InMemoryDirectoryConfig, ProfileLookup,
};
use follower_blocker_engine::{
    BlockLedger, BlockLedgerConfig, BlockerError, ItemOutcome, ResumeCoordinator, RunProgress,
    RunReport, Session, SettingsStore, SqliteBlockLedger, SqliteBlockLedgerConfig,
    SqliteSettingsStore,
};
use log::{error, info, warn};
use std::io::BufReader;
use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
};

type CliSession = Session<InMemoryDirectoryClient, SqliteBlockLedger, SqliteSettingsStore>;

const DEFAULT_DATABASE_PATH: &str = "follower-blocker.db";
const DEFAULT_SNAPSHOT_PATH: &str = "directory.json";
const DEFAULT_PROGRESS_BUFFER_SIZE: usize = 10;

fn welcome(config: &BlockerCliConfig) {
    let database = config
        .database_path
        .clone()
        .unwrap_or(DEFAULT_DATABASE_PATH.to_string());
    let snapshot = config
        .snapshot_path
        .clone()
        .unwrap_or(DEFAULT_SNAPSHOT_PATH.to_string());
    let buffer = config
        .progress_buffer_size
        .unwrap_or(DEFAULT_PROGRESS_BUFFER_SIZE);
    info!("*********Configuration*********");
    info!("Database: {database}");
    info!("Directory Snapshot: {snapshot}");
    info!("Progress Buffer size: {buffer}");
    info!("*******************************");
}

fn command() -> Command {
    Command::new("follower-blocker")
        .about("Blocks an account together with all of its followers")
        .subcommand_required(true)
        .arg(
            Arg::new("database")
                .short('d')
                .long("database")
                .required(false)
                .help("SQLite file holding the block ledger")
                .default_value(DEFAULT_DATABASE_PATH)
                .conflicts_with("config"),
        )
        .arg(
            Arg::new("snapshot")
                .short('s')
                .long("snapshot")
                .required(false)
                .help("JSON directory snapshot to run against")
                .default_value(DEFAULT_SNAPSHOT_PATH)
                .conflicts_with("config"),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .required(false)
                .help("JSON Config path"),
        )
        .subcommand(Command::new("status").about("Show the ledger and the unfinished run"))
        .subcommand(
            Command::new("credentials")
                .about("Store the directory credentials")
                .arg(Arg::new("consumer_key").long("consumer-key").required(true))
                .arg(
                    Arg::new("consumer_secret")
                        .long("consumer-secret")
                        .required(true),
                )
                .arg(
                    Arg::new("access_token_key")
                        .long("access-token-key")
                        .required(true),
                )
                .arg(
                    Arg::new("access_token_secret")
                        .long("access-token-secret")
                        .required(true),
                ),
        )
        .subcommand(
            Command::new("block")
                .about("Block an account and every one of its followers")
                .arg(
                    Arg::new("handle")
                        .required(true)
                        .help("Handle of the account, with or without '@'"),
                )
                .arg(
                    Arg::new("reason")
                        .short('r')
                        .long("reason")
                        .required(true)
                        .help("Why the accounts are blocked"),
                )
                .arg(yes_arg()),
        )
        .subcommand(
            Command::new("resume")
                .about("Continue the unfinished run")
                .arg(yes_arg()),
        )
}

fn yes_arg() -> Arg {
    Arg::new("yes")
        .short('y')
        .long("yes")
        .action(ArgAction::SetTrue)
        .help("Proceed without asking")
}

fn required<'a>(matches: &'a ArgMatches, id: &str) -> Result<&'a String, CliError> {
    matches
        .get_one::<String>(id)
        .ok_or_else(|| CliError::ArgumentError(format!("Expected {id}")))
}

fn load_config(matches: &ArgMatches) -> Result<BlockerCliConfig, CliError> {
    if let Some(config_path) = matches.get_one::<String>("config") {
        let file = std::fs::File::open(config_path)?;
        let reader = BufReader::new(file);
        Ok(BlockerCliConfig::load(reader)?)
    } else {
        Ok(BlockerCliConfig::new(
            Some(required(matches, "database")?.to_string()),
            Some(required(matches, "snapshot")?.to_string()),
            None,
        ))
    }
}

async fn open_session(
    config: &BlockerCliConfig,
    ledger: &SqliteBlockLedger,
) -> Result<CliSession, CliError> {
    let path = config
        .snapshot_path
        .clone()
        .unwrap_or(DEFAULT_SNAPSHOT_PATH.to_string());
    let file = std::fs::File::open(path)?;
    let directory = InMemoryDirectoryConfig::load(BufReader::new(file))?;
    Ok(Session::open(directory, ledger.clone(), ledger.settings()).await?)
}

fn spawn_progress_printer(mut rx: mpsc::Receiver<RunProgress>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(progress) = rx.recv().await {
            let step = format!("[{}/{}]", progress.processed, progress.total);
            match &progress.outcome {
                ItemOutcome::Blocked(user) => {
                    info!("{step} Blocked {} ({})", user.display_name, user.id)
                }
                ItemOutcome::AlreadyBlocked(user) => {
                    info!("{step} {} ({}) was already blocked", user.display_name, user.id)
                }
                ItemOutcome::Failed(e) => {
                    warn!("{step} Could not block {}: {e}", progress.item.user_id)
                }
            }
        }
    })
}

/// Waits for the printer to drain. A panicked printer is reported, the run
/// result is still returned.
async fn finish_printer(printer: JoinHandle<()>) -> bool {
    match printer.await {
        Ok(()) => true,
        Err(e) => {
            warn!("Progress printer stopped unexpectedly: {e}");
            false
        }
    }
}

/// Raises the stop signal on Ctrl-C. The run halts after the account it is
/// working on.
fn spawn_stop_on_ctrl_c(stop: watch::Sender<bool>) -> JoinHandle<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Stopping after the current account");
            let _ = stop.send(true);
        }
    })
}

fn report(report: &RunReport) {
    info!(
        "Blocked {} accounts, {} failed, success counter at {}",
        report.blocked, report.failed, report.successes
    );
    if report.cancelled {
        info!("{} accounts left, run `resume` to continue", report.remaining);
    }
}

async fn status(ledger: &SqliteBlockLedger) -> Result<(), CliError> {
    info!("Blocked accounts: {}", ledger.completed_count().await?);
    match ledger.settings().sync_date().await? {
        Some(date) => info!("Last completed run: {date}"),
        None => info!("No run has completed yet"),
    }
    let info = ResumeCoordinator::new(ledger.clone())
        .await?
        .last_run_info()
        .await?;
    if info.remaining > 0 {
        info!(
            "Unfinished run ({}): {} accounts left",
            info.reason.unwrap_or_default(),
            info.remaining
        );
    }
    Ok(())
}

async fn store_credentials(ledger: &SqliteBlockLedger, sub: &ArgMatches) -> Result<(), CliError> {
    let credentials = Credentials::builder()
        .consumer_key(required(sub, "consumer_key")?)
        .consumer_secret(required(sub, "consumer_secret")?)
        .access_token_key(required(sub, "access_token_key")?)
        .access_token_secret(required(sub, "access_token_secret")?)
        .build();
    ledger.settings().save_credentials(&credentials).await?;
    info!("Credentials saved");
    Ok(())
}

async fn block(
    config: &BlockerCliConfig,
    ledger: &SqliteBlockLedger,
    sub: &ArgMatches,
) -> Result<(), CliError> {
    let handle = required(sub, "handle")?.trim_start_matches('@').to_owned();
    let reason = required(sub, "reason")?;
    let mut session = open_session(config, ledger).await?;

    let target = session
        .lookup(ProfileLookup::Handle(handle))
        .await
        .map_err(BlockerError::from)?;
    info!("{} (@{})", target.display_name, target.handle);
    info!("{} followers", target.follower_count);
    if !target.description.is_empty() {
        info!("{}", target.description);
    }
    if let Some(offer) = session.resume_coordinator().await?.offer() {
        warn!(
            "A new run replaces the unfinished run against {} ({} accounts left)",
            offer.target, offer.remaining
        );
    }
    if !sub.get_flag("yes") {
        info!("Pass --yes to block @{} and its followers", target.handle);
        return Ok(());
    }

    let (progress, printer) = progress_channel(config);
    let (stop_tx, stop_rx) = watch::channel(false);
    let stopper = spawn_stop_on_ctrl_c(stop_tx);
    let result = session
        .block_followers(&target, reason, Some(progress), Some(stop_rx))
        .await;
    stopper.abort();
    finish_printer(printer).await;

    report(&result?);
    Ok(())
}

async fn resume(
    config: &BlockerCliConfig,
    ledger: &SqliteBlockLedger,
    sub: &ArgMatches,
) -> Result<(), CliError> {
    let coordinator = ResumeCoordinator::new(ledger.clone()).await?;
    let Some(offer) = coordinator.offer() else {
        info!("There is no unfinished run");
        return Ok(());
    };
    info!(
        "Unfinished run against {} ({}): {} accounts left",
        offer.target, offer.reason, offer.remaining
    );
    if !sub.get_flag("yes") {
        info!("Pass --yes to resume it");
        return Ok(());
    }

    let mut session = open_session(config, ledger).await?;
    let (progress, printer) = progress_channel(config);
    let (stop_tx, stop_rx) = watch::channel(false);
    let stopper = spawn_stop_on_ctrl_c(stop_tx);
    let result = session.resume(Some(progress), Some(stop_rx)).await;
    stopper.abort();
    finish_printer(printer).await;

    report(&result?);
    Ok(())
}

fn progress_channel(config: &BlockerCliConfig) -> (mpsc::Sender<RunProgress>, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(
        config
            .progress_buffer_size
            .unwrap_or(DEFAULT_PROGRESS_BUFFER_SIZE),
    );
    (tx, spawn_progress_printer(rx))
}

async fn cli() -> Result<(), CliError> {
    let matches = command().get_matches();
    let config = load_config(&matches)?;
    welcome(&config);

    let database = config
        .database_path
        .clone()
        .unwrap_or(DEFAULT_DATABASE_PATH.to_string());
    let ledger = SqliteBlockLedgerConfig::from_path(&database)
        .create_ledger()
        .await?;

    let result = match matches.subcommand() {
        Some(("status", _)) => status(&ledger).await,
        Some(("credentials", sub)) => store_credentials(&ledger, sub).await,
        Some(("block", sub)) => block(&config, &ledger, sub).await,
        Some(("resume", sub)) => resume(&config, &ledger, sub).await,
        _ => Err(CliError::ArgumentError("Expected a command".to_string())),
    };
    ledger.close().await?;
    result
}

#[tokio::main]
async fn main() {
    env_logger::init();
    match cli().await {
        Ok(_) => info!("Goodbye!"),
        Err(e) => error!("Fatal Error: {}", e),
    }
}
