use crate::{Error, Result, StorageAdapter};
use consult_dm::PublicKeyRecord;
use std::sync::Arc;

/// Shared directory of published public keys, one per user.
pub trait KeyDirectory: Send + Sync {
    fn get_public_key(&self, user_id: &str) -> Result<Option<PublicKeyRecord>>;

    /// Last write wins; a new session's key silently replaces the old one.
    fn upsert_public_key(&self, user_id: &str, public_key: &str) -> Result<()>;
}

const USER_KEYS_PREFIX: &str = "v1/user-keys/";

/// Key directory backed by any `StorageAdapter`.
#[derive(Clone)]
pub struct StorageKeyDirectory {
    storage: Arc<dyn StorageAdapter>,
}

impl StorageKeyDirectory {
    pub fn new(storage: Arc<dyn StorageAdapter>) -> Self {
        Self { storage }
    }

    fn key(user_id: &str) -> String {
        format!("{}{}", USER_KEYS_PREFIX, user_id)
    }

    /// Every user with a published key.
    pub fn list_users(&self) -> Result<Vec<String>> {
        let mut users: Vec<String> = self
            .storage
            .list(USER_KEYS_PREFIX)?
            .into_iter()
            .filter_map(|k| k.strip_prefix(USER_KEYS_PREFIX).map(str::to_string))
            .collect();
        users.sort();
        Ok(users)
    }
}

impl KeyDirectory for StorageKeyDirectory {
    fn get_public_key(&self, user_id: &str) -> Result<Option<PublicKeyRecord>> {
        let Some(raw) = self
            .storage
            .get(&Self::key(user_id))
            .map_err(|e| Error::Directory(e.to_string()))?
        else {
            return Ok(None);
        };
        let record: PublicKeyRecord = serde_json::from_str(&raw)?;
        Ok(Some(record))
    }

    fn upsert_public_key(&self, user_id: &str, public_key: &str) -> Result<()> {
        let record = PublicKeyRecord {
            user_id: user_id.to_string(),
            public_key: public_key.to_string(),
        };
        self.storage
            .put(&Self::key(user_id), serde_json::to_string(&record)?)
            .map_err(|e| Error::Directory(e.to_string()))
    }
}
