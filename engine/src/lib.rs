pub mod error;
pub mod executor;
pub mod ledger;
pub mod pager;
pub mod planner;
pub mod resume;
pub mod session;
pub mod settings;

pub use error::{BlockerError, LedgerError, SettingsError};
pub use executor::{BlockExecutor, ItemOutcome, RunProgress, RunReport};
pub use ledger::{
    AttemptOutcome, BlockLedger, BlockLedgerConfig, BlockRecord, InMemoryBlockLedger,
    PendingItem, RunInfo, SqliteBlockLedger, SqliteBlockLedgerConfig,
};
pub use pager::{FollowerPage, FollowerPager};
pub use planner::{RunPlan, RunPlanner};
pub use resume::{ResumeCoordinator, ResumeOffer};
pub use session::Session;
pub use settings::{InMemorySettingsStore, SettingsStore, SqliteSettingsStore};
