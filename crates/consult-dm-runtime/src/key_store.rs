use crate::{Error, Result, StorageAdapter};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use consult_dm::KeyPair;
use std::sync::Arc;
use zeroize::Zeroizing;

const IDENTITY_KEY_PREFIX: &str = "v1/identity-key/";

/// Persists a user's key pair so it survives across sessions.
///
/// Secrets are stored base64-encoded; protecting them at rest is up to the
/// storage adapter.
#[derive(Clone)]
pub struct KeyStore {
    storage: Arc<dyn StorageAdapter>,
}

impl KeyStore {
    pub fn new(storage: Arc<dyn StorageAdapter>) -> Self {
        Self { storage }
    }

    fn key(user_id: &str) -> String {
        format!("{}{}", IDENTITY_KEY_PREFIX, user_id)
    }

    pub fn load(&self, user_id: &str) -> Result<Option<KeyPair>> {
        let Some(raw) = self.storage.get(&Self::key(user_id))? else {
            return Ok(None);
        };
        let raw = Zeroizing::new(raw);
        let decoded = STANDARD
            .decode(raw.trim())
            .map_err(|e| Error::Storage(format!("corrupt key for {}: {}", user_id, e)))?;
        let bytes = Zeroizing::new(decoded);
        Ok(Some(KeyPair::from_secret_bytes(&bytes)?))
    }

    pub fn save(&self, user_id: &str, key_pair: &KeyPair) -> Result<()> {
        let encoded = STANDARD.encode(key_pair.secret_bytes().as_slice());
        self.storage.put(&Self::key(user_id), encoded)
    }

    /// Load the stored key pair, or generate and store a new one.
    pub fn load_or_generate(&self, user_id: &str) -> Result<KeyPair> {
        if let Some(key_pair) = self.load(user_id)? {
            tracing::debug!(user = %user_id, "restored persisted key pair");
            return Ok(key_pair);
        }
        let key_pair = KeyPair::generate();
        self.save(user_id, &key_pair)?;
        tracing::debug!(user = %user_id, "generated and persisted new key pair");
        Ok(key_pair)
    }

    pub fn forget(&self, user_id: &str) -> Result<()> {
        self.storage.del(&Self::key(user_id))
    }
}
