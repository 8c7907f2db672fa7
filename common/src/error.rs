use derive_more::{Display, Error};

use crate::UserId;

/// Failures reported by a remote directory service.
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum DirectoryError {
    /// Credentials are missing or were rejected.
    #[display("Authentication failed")]
    Auth,
    #[display("User '{_0}' was not found")]
    NotFound(#[error(not(source))] String),
    #[display("User '{_0}' is suspended")]
    Suspended(#[error(not(source))] UserId),
    #[display("Followers of '{_0}' are protected")]
    ProtectedAccount(#[error(not(source))] UserId),
    /// Rate limit, timeout or any other hiccup that could succeed later.
    #[display("Transient directory failure: {_0}")]
    Transient(#[error(not(source))] String),
}
