use crate::{Error, InsertCallback, Result, StorageAdapter, Subscription};
use consult_dm::Message;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

/// Shared append-only store of encrypted direct messages.
pub trait MessageStore: Send + Sync {
    /// Persist a message and return the stored row with its id and timestamp.
    fn append_message(
        &self,
        sender_id: &str,
        recipient_id: &str,
        ciphertext: &str,
    ) -> Result<Message>;

    /// All messages between the two participants in either direction,
    /// ascending by `created_at`. Safe to call repeatedly.
    fn query_messages(&self, participant_a: &str, participant_b: &str) -> Result<Vec<Message>>;

    /// Register `callback` for every later insert addressed to `recipient_id`.
    fn subscribe_inserts(
        &self,
        recipient_id: &str,
        callback: InsertCallback,
    ) -> Result<Subscription>;
}

pub trait Clock: Send + Sync {
    fn now_millis(&self) -> u64;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }
}

struct Subscriber {
    recipient_id: String,
    callback: InsertCallback,
}

type Subscribers = Arc<Mutex<HashMap<String, Subscriber>>>;

const MESSAGES_PREFIX: &str = "v1/direct-messages/";

/// Message store backed by any `StorageAdapter`, with in-process realtime
/// delivery to subscribers.
///
/// Timestamps come from a single clock and are strictly increasing per store,
/// so ascending `created_at` matches insertion order.
pub struct StorageMessageStore {
    storage: Arc<dyn StorageAdapter>,
    clock: Arc<dyn Clock>,
    last_created_at: Mutex<u64>,
    subscribers: Subscribers,
}

impl StorageMessageStore {
    pub fn new(storage: Arc<dyn StorageAdapter>) -> Self {
        Self::with_clock(storage, Arc::new(SystemClock))
    }

    pub fn with_clock(storage: Arc<dyn StorageAdapter>, clock: Arc<dyn Clock>) -> Self {
        Self {
            storage,
            clock,
            last_created_at: Mutex::new(0),
            subscribers: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn key(id: &str) -> String {
        format!("{}{}", MESSAGES_PREFIX, id)
    }

    fn next_timestamp(&self) -> Result<u64> {
        let mut last = self
            .last_created_at
            .lock()
            .map_err(|_| Error::Storage("clock lock poisoned".to_string()))?;
        let now = self.clock.now_millis().max(*last + 1);
        *last = now;
        Ok(now)
    }

    fn lock_subscribers(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, Subscriber>>> {
        self.subscribers
            .lock()
            .map_err(|_| Error::Storage("subscriber lock poisoned".to_string()))
    }

    /// Number of live insert subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.lock_subscribers().map(|s| s.len()).unwrap_or(0)
    }

    /// Drop every subscriber callback, as when the realtime feed goes away.
    /// Channel-based subscribers observe a disconnect.
    pub fn disconnect_subscribers(&self) -> usize {
        match self.lock_subscribers() {
            Ok(mut subscribers) => {
                let count = subscribers.len();
                subscribers.clear();
                tracing::warn!(count, "realtime subscribers disconnected");
                count
            }
            Err(_) => 0,
        }
    }

    fn notify(&self, message: &Message) -> Result<()> {
        let callbacks: Vec<InsertCallback> = self
            .lock_subscribers()?
            .values()
            .filter(|s| s.recipient_id == message.recipient_id)
            .map(|s| s.callback.clone())
            .collect();
        for callback in callbacks {
            callback(message.clone());
        }
        Ok(())
    }
}

impl MessageStore for StorageMessageStore {
    fn append_message(
        &self,
        sender_id: &str,
        recipient_id: &str,
        ciphertext: &str,
    ) -> Result<Message> {
        let message = Message {
            id: uuid::Uuid::new_v4().to_string(),
            sender_id: sender_id.to_string(),
            recipient_id: recipient_id.to_string(),
            encrypted_content: ciphertext.to_string(),
            created_at: self.next_timestamp()?,
        };
        self.storage.put(&Self::key(&message.id), serde_json::to_string(&message)?)?;
        if let Err(e) = self.notify(&message) {
            tracing::warn!(message = %message.id, error = %e, "insert notification failed");
        }
        Ok(message)
    }

    fn query_messages(&self, participant_a: &str, participant_b: &str) -> Result<Vec<Message>> {
        let mut out = Vec::new();
        for key in self.storage.list(MESSAGES_PREFIX)? {
            let Some(raw) = self.storage.get(&key)? else {
                continue;
            };
            let Ok(message) = serde_json::from_str::<Message>(&raw) else {
                tracing::warn!(key = %key, "skipping unreadable message row");
                continue;
            };
            if message.is_between(participant_a, participant_b) {
                out.push(message);
            }
        }
        out.sort_by_key(|m| (m.created_at, m.id.clone()));
        Ok(out)
    }

    fn subscribe_inserts(
        &self,
        recipient_id: &str,
        callback: InsertCallback,
    ) -> Result<Subscription> {
        let id = format!("inserts-{}", uuid::Uuid::new_v4());
        self.lock_subscribers()?.insert(
            id.clone(),
            Subscriber {
                recipient_id: recipient_id.to_string(),
                callback,
            },
        );

        let subscribers = Arc::downgrade(&self.subscribers);
        let sub_id = id.clone();
        Ok(Subscription::new(
            id,
            Box::new(move || {
                if let Some(subscribers) = subscribers.upgrade() {
                    if let Ok(mut subscribers) = subscribers.lock() {
                        subscribers.remove(&sub_id);
                    }
                }
            }),
        ))
    }
}
