//! Versioned wire format for `encrypted_content`.
//!
//! ```text
//! base64_std( version (1 byte) | nonce (24 bytes) | tag (16 bytes) + ciphertext )
//! ```
//!
//! Version 1 carries a curve25519-xsalsa20-poly1305 box. The nonce travels with
//! the ciphertext so any implementation holding the matching key pair can open it.

use crate::{Error, Result, NONCE_LEN, TAG_LEN, WIRE_VERSION};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireMessage {
    pub nonce: [u8; NONCE_LEN],
    /// Box output: poly1305 tag followed by the xsalsa20 ciphertext.
    pub ciphertext: Vec<u8>,
}

impl WireMessage {
    pub fn new(nonce: [u8; NONCE_LEN], ciphertext: Vec<u8>) -> Self {
        Self { nonce, ciphertext }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(1 + NONCE_LEN + self.ciphertext.len());
        out.push(WIRE_VERSION);
        out.extend_from_slice(&self.nonce);
        out.extend_from_slice(&self.ciphertext);
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let (&version, rest) = bytes
            .split_first()
            .ok_or_else(|| Error::MalformedWire("empty payload".to_string()))?;
        if version != WIRE_VERSION {
            return Err(Error::UnsupportedWireVersion(version));
        }
        if rest.len() < NONCE_LEN + TAG_LEN {
            return Err(Error::MalformedWire(format!(
                "payload too short: {} bytes",
                bytes.len()
            )));
        }
        let (nonce_bytes, ciphertext) = rest.split_at(NONCE_LEN);
        let mut nonce = [0u8; NONCE_LEN];
        nonce.copy_from_slice(nonce_bytes);
        Ok(Self {
            nonce,
            ciphertext: ciphertext.to_vec(),
        })
    }

    pub fn encode(&self) -> String {
        STANDARD.encode(self.to_bytes())
    }

    pub fn decode(encoded: &str) -> Result<Self> {
        let bytes = STANDARD
            .decode(encoded.trim())
            .map_err(|e| Error::MalformedWire(e.to_string()))?;
        Self::from_bytes(&bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> WireMessage {
        WireMessage::new([9u8; NONCE_LEN], vec![1u8; TAG_LEN + 5])
    }

    #[test]
    fn layout_is_version_nonce_ciphertext() {
        let bytes = sample().to_bytes();
        assert_eq!(bytes[0], WIRE_VERSION);
        assert_eq!(&bytes[1..1 + NONCE_LEN], &[9u8; NONCE_LEN]);
        assert_eq!(bytes.len(), 1 + NONCE_LEN + TAG_LEN + 5);
    }

    #[test]
    fn decode_reads_back_encoded_message() {
        let msg = sample();
        assert_eq!(WireMessage::decode(&msg.encode()).unwrap(), msg);
    }

    #[test]
    fn unknown_version_is_rejected() {
        let mut bytes = sample().to_bytes();
        bytes[0] = 2;
        assert!(matches!(
            WireMessage::from_bytes(&bytes),
            Err(Error::UnsupportedWireVersion(2))
        ));
    }

    #[test]
    fn truncated_payload_is_rejected() {
        let bytes = sample().to_bytes();
        assert!(matches!(
            WireMessage::from_bytes(&bytes[..1 + NONCE_LEN + TAG_LEN - 1]),
            Err(Error::MalformedWire(_))
        ));
        assert!(matches!(WireMessage::from_bytes(&[]), Err(Error::MalformedWire(_))));
    }

    #[test]
    fn invalid_base64_is_malformed() {
        assert!(matches!(WireMessage::decode("%%%"), Err(Error::MalformedWire(_))));
    }
}
