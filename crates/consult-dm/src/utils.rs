use crate::{Error, Result, KEY_LEN};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use crypto_box::PublicKey;
use sha2::{Digest, Sha256};

pub fn public_key_to_b64(key: &PublicKey) -> String {
    STANDARD.encode(key.as_bytes())
}

pub fn public_key_from_b64(encoded: &str) -> Result<PublicKey> {
    let bytes = STANDARD
        .decode(encoded.trim())
        .map_err(|e| Error::InvalidKey(e.to_string()))?;
    let array: [u8; KEY_LEN] = bytes.as_slice().try_into().map_err(|_| {
        Error::InvalidKey(format!(
            "public key must be {} bytes, got {}",
            KEY_LEN,
            bytes.len()
        ))
    })?;
    Ok(PublicKey::from(array))
}

/// SHA-256 of the public key, first 16 bytes, hex in groups of 4.
///
/// Example: "1f0c 9a2b 77e1 03dd 5c4a 0b19 e2f7 66a0"
pub fn fingerprint(key: &PublicKey) -> String {
    let digest = Sha256::digest(key.as_bytes());
    let hex = hex::encode(&digest[..16]);
    hex.as_bytes()
        .chunks(4)
        .map(|c| String::from_utf8_lossy(c).into_owned())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Fingerprint of a base64-encoded public key.
pub fn fingerprint_b64(encoded: &str) -> Result<String> {
    Ok(fingerprint(&public_key_from_b64(encoded)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_key_b64_roundtrip() {
        let key = PublicKey::from([7u8; KEY_LEN]);
        let encoded = public_key_to_b64(&key);
        let decoded = public_key_from_b64(&encoded).unwrap();
        assert_eq!(decoded.as_bytes(), key.as_bytes());
    }

    #[test]
    fn short_public_key_is_rejected() {
        let encoded = STANDARD.encode([1u8; 31]);
        assert!(matches!(public_key_from_b64(&encoded), Err(Error::InvalidKey(_))));
    }

    #[test]
    fn garbage_public_key_is_rejected() {
        assert!(matches!(public_key_from_b64("not base64!!"), Err(Error::InvalidKey(_))));
    }

    #[test]
    fn fingerprint_is_grouped_hex() {
        let fp = fingerprint(&PublicKey::from([0u8; KEY_LEN]));
        let groups: Vec<&str> = fp.split(' ').collect();
        assert_eq!(groups.len(), 8);
        assert!(groups.iter().all(|g| g.len() == 4));
        assert!(fp.chars().all(|c| c == ' ' || c.is_ascii_hexdigit()));
    }

    #[test]
    fn fingerprint_b64_matches_raw_key() {
        let key = PublicKey::from([9u8; KEY_LEN]);
        let encoded = public_key_to_b64(&key);
        assert_eq!(fingerprint_b64(&encoded).unwrap(), fingerprint(&key));
        assert!(fingerprint_b64("AAAA").is_err());
    }
}
