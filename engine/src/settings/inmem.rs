use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::SettingsError;

use super::SettingsStore;

#[derive(Debug, Clone, Default)]
pub struct InMemorySettingsStore {
    values: Arc<Mutex<HashMap<String, String>>>,
}

#[async_trait]
impl SettingsStore for InMemorySettingsStore {
    async fn get(&self, key: &str) -> Result<Option<String>, SettingsError> {
        Ok(self.values.lock().await.get(key).cloned())
    }

    async fn set_many(&mut self, values: &[(&str, String)]) -> Result<(), SettingsError> {
        let mut stored = self.values.lock().await;
        for (key, value) in values {
            stored.insert((*key).to_owned(), value.clone());
        }
        Ok(())
    }
}
