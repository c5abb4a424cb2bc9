use serde::{Deserialize, Serialize};

pub type UserId = String;
pub type MessageId = String;

/// Length of a curve25519 public or secret key.
pub const KEY_LEN: usize = 32;
/// Length of the xsalsa20 nonce carried in every wire message.
pub const NONCE_LEN: usize = 24;
/// Length of the poly1305 tag prepended by the box construction.
pub const TAG_LEN: usize = 16;
pub const WIRE_VERSION: u8 = 1;

pub const DECRYPT_FAILURE_PLACEHOLDER: &str = "[Failed to decrypt message]";

/// One row of the key directory. Writes are upserts keyed by `user_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicKeyRecord {
    pub user_id: UserId,
    /// Standard base64 of the raw 32 key bytes.
    pub public_key: String,
}

/// A stored direct message. The store only ever sees ciphertext.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: MessageId,
    pub sender_id: UserId,
    pub recipient_id: UserId,
    pub encrypted_content: String,
    /// Unix milliseconds, assigned by the store.
    pub created_at: u64,
}

impl Message {
    /// True if the message was exchanged between `a` and `b`, in either direction.
    pub fn is_between(&self, a: &str, b: &str) -> bool {
        (self.sender_id == a && self.recipient_id == b)
            || (self.sender_id == b && self.recipient_id == a)
    }
}

/// A message as the UI renders it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayMessage {
    pub id: MessageId,
    pub sender_id: UserId,
    pub recipient_id: UserId,
    /// Plaintext, or the failure placeholder when `decrypted` is false.
    pub content: String,
    pub decrypted: bool,
    pub outgoing: bool,
    pub created_at: u64,
}
