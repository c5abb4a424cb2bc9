use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Key manager used before initialize()")]
    UninitializedKey,

    #[error("Encryption error: {0}")]
    Encryption(String),

    #[error("Decryption error: {0}")]
    Decryption(String),

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Malformed wire message: {0}")]
    MalformedWire(String),

    #[error("Unsupported wire version {0}")]
    UnsupportedWireVersion(u8),

    #[error(transparent)]
    Base64(#[from] base64::DecodeError),
}

impl Error {
    /// True for failures that only affect a single message.
    pub fn is_per_message(&self) -> bool {
        matches!(
            self,
            Error::Decryption(_) | Error::MalformedWire(_) | Error::UnsupportedWireVersion(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
