pub mod directory;
mod error;
mod identity;

pub use directory::{
    BlockFailure, DirectoryClient, DirectoryClientConfig, DirectorySnapshot,
    InMemoryDirectoryClient, InMemoryDirectoryConfig, ScriptedPage,
};
pub use error::DirectoryError;
pub use identity::{
    BlockedUser, Credentials, Cursor, CursorPage, Profile, ProfileLookup, UserId, FIRST_PAGE,
    LAST_PAGE,
};
