#![allow(dead_code)]

use consult_dm::{KeyManager, Message};
use consult_dm_runtime::{
    Clock, ConversationChannel, Error, InMemoryStorage, InsertCallback, KeyDirectory, KeyStore,
    MessageStore, Result, StorageAdapter, StorageKeyDirectory, StorageMessageStore, Subscription,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Message store wrapper that counts calls and fails on demand.
pub struct FlakyStore {
    pub inner: StorageMessageStore,
    pub fail_append: AtomicBool,
    pub fail_query: AtomicBool,
    pub fail_subscribe: AtomicBool,
    foreign_rows: Mutex<Vec<Message>>,
    calls: AtomicUsize,
    appends: AtomicUsize,
}

impl FlakyStore {
    pub fn new(inner: StorageMessageStore) -> Self {
        Self {
            inner,
            fail_append: AtomicBool::new(false),
            fail_query: AtomicBool::new(false),
            fail_subscribe: AtomicBool::new(false),
            foreign_rows: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            appends: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn appends(&self) -> usize {
        self.appends.load(Ordering::SeqCst)
    }

    /// Rows returned by every query whatever the requested pair, as a store
    /// with a broken pair filter would.
    pub fn leak_rows(&self, rows: Vec<Message>) {
        self.foreign_rows.lock().unwrap().extend(rows);
    }
}

impl MessageStore for FlakyStore {
    fn append_message(
        &self,
        sender_id: &str,
        recipient_id: &str,
        ciphertext: &str,
    ) -> Result<Message> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_append.load(Ordering::SeqCst) {
            return Err(Error::Storage("insert rejected".to_string()));
        }
        self.appends.fetch_add(1, Ordering::SeqCst);
        self.inner.append_message(sender_id, recipient_id, ciphertext)
    }

    fn query_messages(&self, participant_a: &str, participant_b: &str) -> Result<Vec<Message>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_query.load(Ordering::SeqCst) {
            return Err(Error::Storage("query timed out".to_string()));
        }
        let mut rows = self.inner.query_messages(participant_a, participant_b)?;
        rows.extend(self.foreign_rows.lock().unwrap().iter().cloned());
        Ok(rows)
    }

    fn subscribe_inserts(
        &self,
        recipient_id: &str,
        callback: InsertCallback,
    ) -> Result<Subscription> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_subscribe.load(Ordering::SeqCst) {
            return Err(Error::Storage("realtime endpoint unreachable".to_string()));
        }
        self.inner.subscribe_inserts(recipient_id, callback)
    }
}

/// Clock that replays a fixed list of timestamps, then repeats the last one.
pub struct ScriptedClock {
    times: Mutex<VecDeque<u64>>,
    last: AtomicU64,
}

impl ScriptedClock {
    pub fn new(times: &[u64]) -> Self {
        Self {
            times: Mutex::new(times.iter().copied().collect()),
            last: AtomicU64::new(0),
        }
    }
}

impl Clock for ScriptedClock {
    fn now_millis(&self) -> u64 {
        let mut times = self.times.lock().unwrap();
        match times.pop_front() {
            Some(t) => {
                self.last.store(t, Ordering::SeqCst);
                t
            }
            None => self.last.load(Ordering::SeqCst),
        }
    }
}

/// Shared backends for a handful of participants in one process.
pub struct Backend {
    pub storage: Arc<InMemoryStorage>,
    pub directory: Arc<StorageKeyDirectory>,
    pub store: Arc<FlakyStore>,
    pub key_store: KeyStore,
}

impl Backend {
    pub fn new() -> Self {
        let storage = Arc::new(InMemoryStorage::new());
        Self::with_store(storage.clone(), StorageMessageStore::new(storage))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        let storage = Arc::new(InMemoryStorage::new());
        Self::with_store(
            storage.clone(),
            StorageMessageStore::with_clock(storage, clock),
        )
    }

    fn with_store(storage: Arc<InMemoryStorage>, store: StorageMessageStore) -> Self {
        Self {
            directory: Arc::new(StorageKeyDirectory::new(storage.clone())),
            store: Arc::new(FlakyStore::new(store)),
            key_store: KeyStore::new(Arc::new(InMemoryStorage::new())),
            storage,
        }
    }

    /// Channel that generates a fresh key pair on every open.
    pub fn ephemeral_channel(&self) -> ConversationChannel {
        ConversationChannel::new(self.directory.clone(), self.store.clone())
    }

    /// Channel that reuses each user's key pair across opens.
    pub fn channel(&self) -> ConversationChannel {
        self.ephemeral_channel().with_key_store(self.key_store.clone())
    }

    /// Publish `user_id`'s persisted key, as if they had opened a conversation
    /// earlier. Returns a key manager holding the same key pair.
    pub fn publish(&self, user_id: &str) -> KeyManager {
        let key_pair = self.key_store.load_or_generate(user_id).unwrap();
        self.directory
            .upsert_public_key(user_id, &key_pair.public_key_b64())
            .unwrap();
        let mut manager = KeyManager::new();
        manager.initialize_with(key_pair);
        manager
    }

    /// Write a row straight into the message table, bypassing the store clock.
    pub fn insert_row(&self, message: &Message) {
        self.storage
            .put(
                &format!("v1/direct-messages/{}", message.id),
                serde_json::to_string(message).unwrap(),
            )
            .unwrap();
    }
}

pub fn row(
    id: &str,
    sender: &str,
    recipient: &str,
    ciphertext: String,
    created_at: u64,
) -> Message {
    Message {
        id: id.to_string(),
        sender_id: sender.to_string(),
        recipient_id: recipient.to_string(),
        encrypted_content: ciphertext,
        created_at,
    }
}
