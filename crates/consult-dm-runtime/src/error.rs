use crate::ChannelState;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Crypto(#[from] consult_dm::Error),

    #[error("Cannot start secure conversation: {0} has not published a public key")]
    PeerKeyNotFound(String),

    #[error("Message delivery failed: {0}")]
    Delivery(String),

    #[error("Live updates unavailable: {0}")]
    Subscription(String),

    #[error("Failed to load message history: {0}")]
    HistoryLoad(String),

    #[error("Key directory error: {0}")]
    Directory(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Conversation is not ready (state: {0:?})")]
    NotReady(ChannelState),

    #[error("Config error: {0}")]
    Config(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// True for errors that abort opening a conversation.
    pub fn is_initialization(&self) -> bool {
        matches!(
            self,
            Error::PeerKeyNotFound(_)
                | Error::HistoryLoad(_)
                | Error::Directory(_)
                | Error::Crypto(consult_dm::Error::UninitializedKey)
                | Error::Crypto(consult_dm::Error::InvalidKey(_))
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
