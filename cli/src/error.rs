use derive_more::{Display, Error, From};
use follower_blocker_engine::{BlockerError, LedgerError, SettingsError};

#[derive(Debug, Display, Error, From)]
pub enum CliError {
    Io(std::io::Error),
    Json(serde_json::Error),
    #[display("{_0}")]
    #[from(skip)]
    ArgumentError(#[error(not(source))] String),
    Blocker(BlockerError),
    Ledger(LedgerError),
    Settings(SettingsError),
}
