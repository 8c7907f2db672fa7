use derive_more::{Display, Error, From};
use follower_blocker_common::{DirectoryError, UserId};

#[derive(Debug, Display, Error, From)]
pub enum LedgerError {
    Database(sqlx::Error),
    Migration(sqlx::migrate::MigrateError),
    #[display("'{_0}' is not a valid user id")]
    #[from(skip)]
    InvalidIdentity(#[error(not(source))] UserId),
    /// More than one parent among pending items; the ledger is corrupt.
    #[display("Pending items belong to more than one run: {_0:?}")]
    #[from(skip)]
    MultipleActiveRuns(#[error(not(source))] Vec<UserId>),
    #[display("There is no unfinished run to resume")]
    NoActiveRun,
}

#[derive(Debug, Display, Error, From)]
pub enum SettingsError {
    Database(sqlx::Error),
    InvalidDate(chrono::ParseError),
}

#[derive(Debug, Display, Error, From)]
pub enum BlockerError {
    Directory(DirectoryError),
    Ledger(LedgerError),
    Settings(SettingsError),
}
