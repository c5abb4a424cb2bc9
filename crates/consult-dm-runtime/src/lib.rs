//! Conversation runtime for consult direct messages.
//!
//! [`ConversationChannel`] wires a [`consult_dm::KeyManager`] to two shared
//! backends: a [`KeyDirectory`] of published public keys and an append-only
//! [`MessageStore`] with realtime insert subscriptions. Reference backends built
//! on [`StorageAdapter`] are included for tests and single-process use.

pub mod channel;
pub mod config;
pub mod directory;
pub mod error;
pub mod file_storage;
pub mod key_store;
pub mod message_store;
pub mod storage;
pub mod subscription;
pub mod timeline;

pub use channel::{ChannelState, ConversationChannel, ConversationHandle, LiveStatus};
pub use config::{default_data_dir, ChannelConfig, KeyPersistence};
pub use directory::{KeyDirectory, StorageKeyDirectory};
pub use error::{Error, Result};
pub use file_storage::FileStorageAdapter;
pub use key_store::KeyStore;
pub use message_store::{Clock, MessageStore, StorageMessageStore, SystemClock};
pub use storage::{InMemoryStorage, StorageAdapter};
pub use subscription::{subscribe_channel, InsertCallback, Subscription, Unsubscribe};
pub use timeline::Timeline;
