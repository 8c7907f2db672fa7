use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    BlockedUser, Credentials, Cursor, CursorPage, DirectoryError, Profile, ProfileLookup, UserId,
};

pub mod in_mem;

pub use in_mem::{
    BlockFailure, DirectorySnapshot, InMemoryDirectoryClient, InMemoryDirectoryConfig,
    ScriptedPage,
};

/// Authenticated access to the remote social graph.
///
/// Waiting on rate limits is the implementation's concern; callers see every
/// call as one sequential, blocking request.
#[async_trait]
pub trait DirectoryClient: Send + Sync {
    async fn verify_identity(&self) -> Result<Profile, DirectoryError>;

    async fn get_profile(&self, lookup: ProfileLookup) -> Result<Profile, DirectoryError>;

    async fn follower_ids_page(
        &self,
        user_id: UserId,
        cursor: Cursor,
    ) -> Result<CursorPage, DirectoryError>;

    async fn block(&self, user_id: UserId) -> Result<BlockedUser, DirectoryError>;

    /// Calls left in the current window for the follower listing operation.
    async fn follower_ids_quota(&self) -> Option<u32>;
}

#[async_trait]
impl<T: DirectoryClient + ?Sized> DirectoryClient for Arc<T> {
    async fn verify_identity(&self) -> Result<Profile, DirectoryError> {
        (**self).verify_identity().await
    }

    async fn get_profile(&self, lookup: ProfileLookup) -> Result<Profile, DirectoryError> {
        (**self).get_profile(lookup).await
    }

    async fn follower_ids_page(
        &self,
        user_id: UserId,
        cursor: Cursor,
    ) -> Result<CursorPage, DirectoryError> {
        (**self).follower_ids_page(user_id, cursor).await
    }

    async fn block(&self, user_id: UserId) -> Result<BlockedUser, DirectoryError> {
        (**self).block(user_id).await
    }

    async fn follower_ids_quota(&self) -> Option<u32> {
        (**self).follower_ids_quota().await
    }
}

#[async_trait]
pub trait DirectoryClientConfig {
    type DirectoryClient: DirectoryClient;

    async fn create(self, credentials: Credentials)
        -> Result<Self::DirectoryClient, DirectoryError>;
}
