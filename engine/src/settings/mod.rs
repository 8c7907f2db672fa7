use async_trait::async_trait;
use chrono::{DateTime, Utc};
use follower_blocker_common::Credentials;

use crate::SettingsError;

mod inmem;
mod sqlite;

pub use inmem::InMemorySettingsStore;
pub use sqlite::SqliteSettingsStore;

const CONSUMER_KEY: &str = "consumer_key";
const CONSUMER_SECRET: &str = "consumer_secret";
const ACCESS_TOKEN_KEY: &str = "access_token_key";
const ACCESS_TOKEN_SECRET: &str = "access_token_secret";
const SYNC_DATE: &str = "sync_date";

/// Single-value key/value settings kept next to the ledger.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, SettingsError>;

    /// Writes every pair in one transaction.
    async fn set_many(&mut self, values: &[(&str, String)]) -> Result<(), SettingsError>;

    async fn credentials(&self) -> Result<Credentials, SettingsError> {
        Ok(Credentials {
            consumer_key: self.get(CONSUMER_KEY).await?,
            consumer_secret: self.get(CONSUMER_SECRET).await?,
            access_token_key: self.get(ACCESS_TOKEN_KEY).await?,
            access_token_secret: self.get(ACCESS_TOKEN_SECRET).await?,
        })
    }

    async fn save_credentials(&mut self, credentials: &Credentials) -> Result<(), SettingsError> {
        let values: Vec<(&str, String)> = [
            (CONSUMER_KEY, &credentials.consumer_key),
            (CONSUMER_SECRET, &credentials.consumer_secret),
            (ACCESS_TOKEN_KEY, &credentials.access_token_key),
            (ACCESS_TOKEN_SECRET, &credentials.access_token_secret),
        ]
        .into_iter()
        .filter_map(|(key, value)| value.clone().map(|value| (key, value)))
        .collect();
        self.set_many(&values).await
    }

    async fn sync_date(&self) -> Result<Option<DateTime<Utc>>, SettingsError> {
        match self.get(SYNC_DATE).await? {
            Some(value) => Ok(Some(
                DateTime::parse_from_rfc3339(&value)?.with_timezone(&Utc),
            )),
            None => Ok(None),
        }
    }

    async fn save_sync_date(&mut self, date: DateTime<Utc>) -> Result<(), SettingsError> {
        self.set_many(&[(SYNC_DATE, date.to_rfc3339())]).await
    }
}
