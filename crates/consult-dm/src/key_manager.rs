use crate::{
    utils::{fingerprint, public_key_from_b64, public_key_to_b64},
    wire::WireMessage,
    Error, Result, KEY_LEN, NONCE_LEN,
};
use crypto_box::aead::{Aead, AeadCore};
use crypto_box::{PublicKey, SalsaBox, SecretKey};
use rand::rngs::OsRng;
use zeroize::Zeroizing;

/// A session key pair. The secret half is zeroized when dropped.
pub struct KeyPair {
    secret: SecretKey,
    public: PublicKey,
}

impl KeyPair {
    pub fn generate() -> Self {
        let secret = SecretKey::generate(&mut OsRng);
        let public = secret.public_key();
        Self { secret, public }
    }

    pub fn from_secret_bytes(bytes: &[u8]) -> Result<Self> {
        let array: [u8; KEY_LEN] = bytes.try_into().map_err(|_| {
            Error::InvalidKey(format!(
                "secret key must be {} bytes, got {}",
                KEY_LEN,
                bytes.len()
            ))
        })?;
        let secret = SecretKey::from(array);
        let public = secret.public_key();
        Ok(Self { secret, public })
    }

    pub fn secret_bytes(&self) -> Zeroizing<[u8; KEY_LEN]> {
        Zeroizing::new(self.secret.to_bytes())
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public
    }

    pub fn public_key_b64(&self) -> String {
        public_key_to_b64(&self.public)
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("public", &fingerprint(&self.public))
            .finish_non_exhaustive()
    }
}

/// Holds the session key pair and performs box encryption against peers.
#[derive(Debug, Default)]
pub struct KeyManager {
    key_pair: Option<KeyPair>,
}

impl KeyManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generate a fresh key pair, discarding any previous one.
    pub fn initialize(&mut self) {
        self.initialize_with(KeyPair::generate());
    }

    /// Install an existing key pair, e.g. one restored from a key store.
    pub fn initialize_with(&mut self, key_pair: KeyPair) {
        tracing::debug!(fingerprint = %fingerprint(&key_pair.public), "key manager initialized");
        self.key_pair = Some(key_pair);
    }

    pub fn is_initialized(&self) -> bool {
        self.key_pair.is_some()
    }

    pub fn key_pair(&self) -> Result<&KeyPair> {
        self.key_pair.as_ref().ok_or(Error::UninitializedKey)
    }

    pub fn public_key(&self) -> Result<String> {
        Ok(self.key_pair()?.public_key_b64())
    }

    pub fn fingerprint(&self) -> Result<String> {
        Ok(fingerprint(&self.key_pair()?.public))
    }

    /// Drop the key pair. Later calls fail with `UninitializedKey`.
    pub fn clear(&mut self) {
        self.key_pair = None;
    }

    /// Encrypt `plaintext` for the holder of `peer_public_key`.
    ///
    /// Every call draws a fresh random nonce, so encrypting the same text twice
    /// yields different wire strings.
    pub fn encrypt(&self, plaintext: &str, peer_public_key: &str) -> Result<String> {
        let key_pair = self.key_pair()?;
        let peer = public_key_from_b64(peer_public_key)?;
        let salsa_box = SalsaBox::new(&peer, &key_pair.secret);

        let nonce = SalsaBox::generate_nonce(&mut OsRng);
        let ciphertext = salsa_box
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|_| Error::Encryption("box encryption failed".to_string()))?;

        let mut nonce_bytes = [0u8; NONCE_LEN];
        nonce_bytes.copy_from_slice(nonce.as_slice());
        Ok(WireMessage::new(nonce_bytes, ciphertext).encode())
    }

    /// Open a wire string produced by `peer_public_key`'s holder for us, or
    /// produced by us for them.
    pub fn decrypt(&self, ciphertext: &str, peer_public_key: &str) -> Result<String> {
        let key_pair = self.key_pair()?;
        let peer = public_key_from_b64(peer_public_key)?;
        let wire = WireMessage::decode(ciphertext).map_err(|e| Error::Decryption(e.to_string()))?;
        let salsa_box = SalsaBox::new(&peer, &key_pair.secret);

        let nonce = crypto_box::aead::Nonce::<SalsaBox>::from_slice(&wire.nonce);
        let plaintext = salsa_box
            .decrypt(nonce, wire.ciphertext.as_slice())
            .map_err(|_| Error::Decryption("authentication failed".to_string()))?;
        let plaintext = Zeroizing::new(plaintext);

        String::from_utf8(plaintext.to_vec())
            .map_err(|_| Error::Decryption("plaintext is not valid UTF-8".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uninitialized_manager_rejects_every_operation() {
        let manager = KeyManager::new();
        let peer = KeyPair::generate().public_key_b64();
        assert!(matches!(manager.public_key(), Err(Error::UninitializedKey)));
        assert!(matches!(manager.fingerprint(), Err(Error::UninitializedKey)));
        assert!(matches!(manager.encrypt("hi", &peer), Err(Error::UninitializedKey)));
        assert!(matches!(manager.decrypt("AQ==", &peer), Err(Error::UninitializedKey)));
    }

    #[test]
    fn reinitialize_replaces_key_pair() {
        let mut manager = KeyManager::new();
        manager.initialize();
        let first = manager.public_key().unwrap();
        manager.initialize();
        assert_ne!(manager.public_key().unwrap(), first);
    }

    #[test]
    fn clear_forgets_key_pair() {
        let mut manager = KeyManager::new();
        manager.initialize();
        manager.clear();
        assert!(!manager.is_initialized());
        assert!(matches!(manager.public_key(), Err(Error::UninitializedKey)));
    }

    #[test]
    fn secret_bytes_restore_same_public_key() {
        let original = KeyPair::generate();
        let restored = KeyPair::from_secret_bytes(original.secret_bytes().as_slice()).unwrap();
        assert_eq!(restored.public_key_b64(), original.public_key_b64());
    }

    #[test]
    fn wrong_secret_length_is_invalid_key() {
        assert!(matches!(
            KeyPair::from_secret_bytes(&[1u8; 16]),
            Err(Error::InvalidKey(_))
        ));
    }

    #[test]
    fn debug_output_hides_secret() {
        let pair = KeyPair::generate();
        let secret_hex = hex::encode(pair.secret_bytes().as_slice());
        let debug = format!("{:?}", pair);
        assert!(!debug.contains(&secret_hex));
    }
}
