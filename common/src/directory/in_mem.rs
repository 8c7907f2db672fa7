use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use async_trait::async_trait;
use bon::Builder;
use log::debug;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::{
    BlockedUser, Credentials, Cursor, CursorPage, DirectoryError, Profile, ProfileLookup, UserId,
    FIRST_PAGE, LAST_PAGE,
};

use super::{DirectoryClient, DirectoryClientConfig};

const DEFAULT_PAGE_SIZE: usize = 5000;

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BlockFailure {
    Suspended,
    Transient,
}

/// A page served verbatim when `user` is listed at `cursor`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptedPage {
    pub user: UserId,
    pub cursor: Cursor,
    pub page: CursorPage,
}

/// Everything an [`InMemoryDirectoryClient`] knows about the social graph.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectorySnapshot {
    /// Account the credentials belong to. `None` rejects authentication.
    pub me: Option<Profile>,
    #[builder(default)]
    #[serde(default)]
    pub profiles: Vec<Profile>,
    #[builder(default)]
    #[serde(default)]
    pub followers: HashMap<UserId, Vec<UserId>>,
    #[builder(default)]
    #[serde(default)]
    pub protected: HashSet<UserId>,
    #[builder(default)]
    #[serde(default)]
    pub suspended: HashSet<UserId>,
    #[builder(default)]
    #[serde(default)]
    pub block_failures: HashMap<UserId, BlockFailure>,
    /// Requested id to canonical id, applied when blocking.
    #[builder(default)]
    #[serde(default)]
    pub aliases: HashMap<UserId, UserId>,
    #[builder(default)]
    #[serde(default)]
    pub pages: Vec<ScriptedPage>,
    #[builder(default = DEFAULT_PAGE_SIZE)]
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    pub follower_ids_quota: Option<u32>,
}

impl Default for DirectorySnapshot {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl DirectorySnapshot {
    pub fn load<R: std::io::Read>(reader: R) -> Result<Self, serde_json::Error> {
        serde_json::from_reader(reader)
    }

    fn profile(&self, user_id: UserId) -> Option<&Profile> {
        self.profiles.iter().find(|profile| profile.id == user_id)
    }

    fn scripted_page(&self, user_id: UserId, cursor: Cursor) -> Option<&CursorPage> {
        self.pages
            .iter()
            .find(|scripted| scripted.user == user_id && scripted.cursor == cursor)
            .map(|scripted| &scripted.page)
    }

    fn offset_page(&self, user_id: UserId, cursor: Cursor) -> CursorPage {
        let offset = match cursor {
            FIRST_PAGE => 0,
            cursor if cursor > 0 => cursor as usize,
            _ => return CursorPage::default(),
        };
        let followers = self
            .followers
            .get(&user_id)
            .map(Vec::as_slice)
            .unwrap_or_default();
        let page_size = self.page_size.max(1);
        let end = offset.saturating_add(page_size).min(followers.len());
        let ids = followers.get(offset..end).unwrap_or_default().to_vec();
        let next_cursor = if end < followers.len() {
            end as Cursor
        } else {
            LAST_PAGE
        };

        CursorPage {
            next_cursor,
            previous_cursor: -(offset as Cursor),
            ids,
        }
    }
}

struct DirectoryState {
    snapshot: DirectorySnapshot,
    quota_left: Option<u32>,
    blocked: Vec<UserId>,
    block_calls: usize,
    page_calls: usize,
}

/// Directory held entirely in memory.
///
/// Clones share state, so a test can hand one clone to the engine and
/// inspect the calls through another.
#[derive(Clone)]
pub struct InMemoryDirectoryClient {
    state: Arc<Mutex<DirectoryState>>,
}

impl InMemoryDirectoryClient {
    pub fn new(snapshot: DirectorySnapshot) -> Self {
        let quota_left = snapshot.follower_ids_quota;
        Self {
            state: Arc::new(Mutex::new(DirectoryState {
                snapshot,
                quota_left,
                blocked: Vec::new(),
                block_calls: 0,
                page_calls: 0,
            })),
        }
    }

    /// Canonical ids blocked so far, in call order.
    pub async fn blocked(&self) -> Vec<UserId> {
        self.state.lock().await.blocked.clone()
    }

    pub async fn block_calls(&self) -> usize {
        self.state.lock().await.block_calls
    }

    pub async fn follower_page_calls(&self) -> usize {
        self.state.lock().await.page_calls
    }
}

#[async_trait]
impl DirectoryClient for InMemoryDirectoryClient {
    async fn verify_identity(&self) -> Result<Profile, DirectoryError> {
        self.state
            .lock()
            .await
            .snapshot
            .me
            .clone()
            .ok_or(DirectoryError::Auth)
    }

    async fn get_profile(&self, lookup: ProfileLookup) -> Result<Profile, DirectoryError> {
        let state = self.state.lock().await;
        let snapshot = &state.snapshot;
        let profile = match &lookup {
            ProfileLookup::Id(user_id) => snapshot.profile(*user_id),
            ProfileLookup::Handle(handle) => snapshot
                .profiles
                .iter()
                .find(|profile| profile.handle.eq_ignore_ascii_case(handle)),
        };

        match profile {
            Some(profile) if snapshot.suspended.contains(&profile.id) => {
                Err(DirectoryError::Suspended(profile.id))
            }
            Some(profile) => Ok(profile.clone()),
            None => match lookup {
                ProfileLookup::Id(user_id) if snapshot.suspended.contains(&user_id) => {
                    Err(DirectoryError::Suspended(user_id))
                }
                lookup => Err(DirectoryError::NotFound(lookup.to_string())),
            },
        }
    }

    async fn follower_ids_page(
        &self,
        user_id: UserId,
        cursor: Cursor,
    ) -> Result<CursorPage, DirectoryError> {
        let mut state = self.state.lock().await;
        state.page_calls += 1;
        state.quota_left = state.quota_left.map(|left| left.saturating_sub(1));

        if state.snapshot.protected.contains(&user_id) {
            return Err(DirectoryError::ProtectedAccount(user_id));
        }

        let page = match state.snapshot.scripted_page(user_id, cursor) {
            Some(page) => page.clone(),
            None => state.snapshot.offset_page(user_id, cursor),
        };
        debug!(
            "Follower page for {user_id} at {cursor}: {} ids, next {}",
            page.ids.len(),
            page.next_cursor
        );
        Ok(page)
    }

    async fn block(&self, user_id: UserId) -> Result<BlockedUser, DirectoryError> {
        let mut state = self.state.lock().await;
        state.block_calls += 1;

        let failure = if state.snapshot.suspended.contains(&user_id) {
            Some(BlockFailure::Suspended)
        } else {
            state.snapshot.block_failures.get(&user_id).copied()
        };
        match failure {
            Some(BlockFailure::Suspended) => return Err(DirectoryError::Suspended(user_id)),
            Some(BlockFailure::Transient) => {
                return Err(DirectoryError::Transient(format!(
                    "Rate limit exceeded while blocking {user_id}"
                )))
            }
            None => {}
        }

        let canonical = state
            .snapshot
            .aliases
            .get(&user_id)
            .copied()
            .unwrap_or(user_id);
        let display_name = state
            .snapshot
            .profile(canonical)
            .map(|profile| profile.display_name.clone())
            .unwrap_or_else(|| canonical.to_string());
        state.blocked.push(canonical);

        Ok(BlockedUser {
            id: canonical,
            display_name,
        })
    }

    async fn follower_ids_quota(&self) -> Option<u32> {
        self.state.lock().await.quota_left
    }
}

#[derive(Debug, Default)]
pub struct InMemoryDirectoryConfig {
    snapshot: DirectorySnapshot,
}

impl InMemoryDirectoryConfig {
    pub fn new(snapshot: DirectorySnapshot) -> Self {
        Self { snapshot }
    }

    pub fn load<R: std::io::Read>(reader: R) -> Result<Self, serde_json::Error> {
        Ok(Self::new(DirectorySnapshot::load(reader)?))
    }
}

#[async_trait]
impl DirectoryClientConfig for InMemoryDirectoryConfig {
    type DirectoryClient = InMemoryDirectoryClient;

    async fn create(
        self,
        credentials: Credentials,
    ) -> Result<Self::DirectoryClient, DirectoryError> {
        if !credentials.is_complete() {
            return Err(DirectoryError::Auth);
        }
        Ok(InMemoryDirectoryClient::new(self.snapshot))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use rstest::rstest;

    fn profile(id: i64, handle: &str) -> Profile {
        Profile::builder()
            .id(id)
            .display_name(handle.to_uppercase())
            .handle(handle)
            .build()
    }

    fn ids(ids: &[i64]) -> Vec<UserId> {
        ids.iter().copied().map(UserId::new).collect()
    }

    #[rstest]
    #[case(2, vec![vec![1, 2], vec![3, 4], vec![5]])]
    #[case(5, vec![vec![1, 2, 3, 4, 5]])]
    #[case(10, vec![vec![1, 2, 3, 4, 5]])]
    #[tokio::test]
    async fn pages_through_followers(#[case] page_size: usize, #[case] expected: Vec<Vec<i64>>) {
        let _ = env_logger::try_init();
        let client = InMemoryDirectoryClient::new(
            DirectorySnapshot::builder()
                .followers(HashMap::from([(UserId::new(42), ids(&[1, 2, 3, 4, 5]))]))
                .page_size(page_size)
                .build(),
        );

        let mut cursor = FIRST_PAGE;
        let mut pages = Vec::new();
        loop {
            let page = client
                .follower_ids_page(UserId::new(42), cursor)
                .await
                .expect("Can list followers");
            pages.push(page.ids.iter().map(UserId::value).collect::<Vec<_>>());
            if page.next_cursor == LAST_PAGE {
                break;
            }
            cursor = page.next_cursor;
        }

        assert_eq!(pages, expected);
        assert_eq!(client.follower_page_calls().await, expected.len());
    }

    #[rstest]
    #[case(6)]
    #[case(i64::MAX)]
    #[tokio::test]
    async fn cursor_past_the_end_is_an_empty_last_page(#[case] cursor: Cursor) {
        let _ = env_logger::try_init();
        let client = InMemoryDirectoryClient::new(
            DirectorySnapshot::builder()
                .followers(HashMap::from([(UserId::new(42), ids(&[1, 2, 3, 4, 5]))]))
                .page_size(2)
                .build(),
        );

        let page = client
            .follower_ids_page(UserId::new(42), cursor)
            .await
            .expect("Can list followers");

        assert!(page.ids.is_empty());
        assert_eq!(page.next_cursor, LAST_PAGE);
    }

    #[tokio::test]
    async fn protected_followers_cannot_be_listed() {
        let client = InMemoryDirectoryClient::new(
            DirectorySnapshot::builder()
                .protected(HashSet::from([UserId::new(9)]))
                .build(),
        );

        let result = client.follower_ids_page(UserId::new(9), FIRST_PAGE).await;

        assert_eq!(result, Err(DirectoryError::ProtectedAccount(UserId::new(9))));
    }

    #[tokio::test]
    async fn quota_counts_down_per_page() {
        let client = InMemoryDirectoryClient::new(
            DirectorySnapshot::builder().follower_ids_quota(2).build(),
        );

        for expected in [1, 0, 0] {
            client
                .follower_ids_page(UserId::new(1), FIRST_PAGE)
                .await
                .expect("Can list followers");
            assert_eq!(client.follower_ids_quota().await, Some(expected));
        }
    }

    #[tokio::test]
    async fn block_resolves_aliases_and_reports_failures() {
        let client = InMemoryDirectoryClient::new(
            DirectorySnapshot::builder()
                .profiles(vec![profile(100, "canonical")])
                .aliases(HashMap::from([(UserId::new(1), UserId::new(100))]))
                .suspended(HashSet::from([UserId::new(2)]))
                .block_failures(HashMap::from([(UserId::new(3), BlockFailure::Transient)]))
                .build(),
        );

        let blocked = client.block(UserId::new(1)).await.expect("Can block");
        assert_eq!(blocked.id, UserId::new(100));
        assert_eq!(blocked.display_name, "CANONICAL");

        assert_eq!(
            client.block(UserId::new(2)).await,
            Err(DirectoryError::Suspended(UserId::new(2)))
        );
        assert!(matches!(
            client.block(UserId::new(3)).await,
            Err(DirectoryError::Transient(_))
        ));
        assert_eq!(client.blocked().await, ids(&[100]));
        assert_eq!(client.block_calls().await, 3);
    }

    #[tokio::test]
    async fn profiles_are_found_by_handle() {
        let client = InMemoryDirectoryClient::new(
            DirectorySnapshot::builder()
                .profiles(vec![profile(7, "Someone"), profile(8, "gone")])
                .suspended(HashSet::from([UserId::new(8)]))
                .build(),
        );

        let found = client
            .get_profile(ProfileLookup::Handle("someone".to_owned()))
            .await
            .expect("Can find profile");
        assert_eq!(found.id, UserId::new(7));
        assert_eq!(
            client
                .get_profile(ProfileLookup::Handle("gone".to_owned()))
                .await,
            Err(DirectoryError::Suspended(UserId::new(8)))
        );
        assert!(matches!(
            client.get_profile(ProfileLookup::Id(UserId::new(99))).await,
            Err(DirectoryError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn incomplete_credentials_are_rejected() {
        let config = InMemoryDirectoryConfig::default();

        let result = config.create(Credentials::default()).await;

        assert!(matches!(result, Err(DirectoryError::Auth)));
    }

    #[test]
    fn snapshot_loads_from_json() {
        let json = r#"{
            "me": {"id": 1, "displayName": "Me", "handle": "me"},
            "followers": {"42": [1, 2, 3]},
            "blockFailures": {"2": "suspended"},
            "pageSize": 2
        }"#;

        let snapshot = DirectorySnapshot::load(json.as_bytes()).expect("Can parse snapshot");

        assert_eq!(snapshot.page_size, 2);
        assert_eq!(snapshot.followers[&UserId::new(42)], ids(&[1, 2, 3]));
        assert_eq!(
            snapshot.block_failures[&UserId::new(2)],
            BlockFailure::Suspended
        );
        assert!(snapshot.follower_ids_quota.is_none());
    }
}
