use std::fmt;

use bon::Builder;
use derive_more::{Display, From};
use serde::{Deserialize, Serialize};

/// Opaque pagination token used when walking a follower list.
pub type Cursor = i64;

/// Cursor requesting the first page of a listing.
pub const FIRST_PAGE: Cursor = -1;
/// Cursor value marking that no further page exists.
pub const LAST_PAGE: Cursor = 0;

/// Numeric account identity on the remote directory.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    From,
    Serialize,
    Deserialize,
)]
#[serde(transparent)]
pub struct UserId(i64);

impl UserId {
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn value(&self) -> i64 {
        self.0
    }

    /// Only strictly positive ids name real accounts.
    pub fn is_valid(&self) -> bool {
        self.0 > 0
    }
}

impl From<UserId> for i64 {
    fn from(value: UserId) -> Self {
        value.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Builder, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    #[builder(into)]
    pub id: UserId,
    #[builder(into)]
    pub display_name: String,
    #[builder(into)]
    pub handle: String,
    #[builder(default)]
    #[serde(default)]
    pub follower_count: u64,
    #[builder(default)]
    #[serde(default)]
    pub description: String,
    #[builder(default)]
    #[serde(default)]
    pub avatar_url: String,
}

/// Canonical identity returned by the directory after a block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockedUser {
    pub id: UserId,
    pub display_name: String,
}

impl From<&Profile> for BlockedUser {
    fn from(profile: &Profile) -> Self {
        Self {
            id: profile.id,
            display_name: profile.display_name.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum ProfileLookup {
    #[display("id {_0}")]
    Id(UserId),
    #[display("@{_0}")]
    Handle(String),
}

/// One page of a cursor driven follower listing.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CursorPage {
    pub next_cursor: Cursor,
    pub previous_cursor: Cursor,
    pub ids: Vec<UserId>,
}

#[derive(Clone, Default, PartialEq, Eq, Builder, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    #[builder(into)]
    pub consumer_key: Option<String>,
    #[builder(into)]
    pub consumer_secret: Option<String>,
    #[builder(into)]
    pub access_token_key: Option<String>,
    #[builder(into)]
    pub access_token_secret: Option<String>,
}

impl Credentials {
    pub fn is_complete(&self) -> bool {
        [
            &self.consumer_key,
            &self.consumer_secret,
            &self.access_token_key,
            &self.access_token_secret,
        ]
        .iter()
        .all(|value| value.as_deref().is_some_and(|v| !v.is_empty()))
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |value: &Option<String>| value.as_ref().map(|_| "***");
        f.debug_struct("Credentials")
            .field("consumer_key", &redact(&self.consumer_key))
            .field("consumer_secret", &redact(&self.consumer_secret))
            .field("access_token_key", &redact(&self.access_token_key))
            .field("access_token_secret", &redact(&self.access_token_secret))
            .finish()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn only_positive_ids_are_valid() {
        assert!(UserId::new(42).is_valid());
        assert!(!UserId::new(0).is_valid());
        assert!(!UserId::new(-1).is_valid());
    }

    #[test]
    fn credentials_need_every_value() {
        let partial = Credentials::builder()
            .consumer_key("key")
            .consumer_secret("secret")
            .access_token_key("token")
            .build();
        assert!(!partial.is_complete());

        let full = Credentials::builder()
            .consumer_key("key")
            .consumer_secret("secret")
            .access_token_key("token")
            .access_token_secret("token secret")
            .build();
        assert!(full.is_complete());
    }

    #[test]
    fn credentials_debug_hides_secrets() {
        let credentials = Credentials::builder().consumer_secret("hunter2").build();
        assert!(!format!("{credentials:?}").contains("hunter2"));
    }
}
