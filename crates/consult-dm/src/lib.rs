//! End-to-end encryption primitives for consult direct messages.
//!
//! A [`KeyManager`] owns one curve25519 key pair per session and seals
//! messages with the xsalsa20-poly1305 box construction. Ciphertexts travel in
//! the versioned [`wire`] format so the nonce is always explicit.

pub mod error;
pub mod key_manager;
pub mod types;
pub mod utils;
pub mod wire;

pub use error::{Error, Result};
pub use key_manager::{KeyManager, KeyPair};
pub use types::*;
pub use wire::WireMessage;
