use aes_gcm::{aead::Aead, Aes256Gcm, KeyInit, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use zeroize::Zeroizing;

type HmacSha256 = Hmac<Sha256>;

const KEY_LENGTH: usize = 32;
const NONCE_LENGTH: usize = 12;
const TAG_LENGTH: usize = 16;

/// Errors produced by the field-encryption helpers. `KeyNotFound` is a
/// configuration fault and must abort the calling operation; `IntegrityFailure`
/// means the payload was tampered with and no plaintext is ever released.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("no key material registered for key type '{0}'")]
    KeyNotFound(KeyType),
    #[error("integrity check failed")]
    IntegrityFailure,
    #[error("invalid key length: expected {expected} bytes, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },
    #[error("encryption failure")]
    EncryptFailure,
    #[error("base64 decode error: {0}")]
    Base64Decode(#[from] base64::DecodeError),
    #[error("invalid HMAC key length")]
    InvalidMacKey,
    #[error("unknown key type '{0}'")]
    UnknownKeyType(String),
}

/// Named keys the platform encrypts fields under. Each key type gets its own
/// subkey so a leak of one does not expose the others.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyType {
    CustomerPii,
    FinancialTerms,
    IntegrationSecrets,
}

impl KeyType {
    pub const ALL: [KeyType; 3] = [
        KeyType::CustomerPii,
        KeyType::FinancialTerms,
        KeyType::IntegrationSecrets,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            KeyType::CustomerPii => "customer_pii",
            KeyType::FinancialTerms => "financial_terms",
            KeyType::IntegrationSecrets => "integration_secrets",
        }
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KeyType {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "customer_pii" => Ok(KeyType::CustomerPii),
            "financial_terms" => Ok(KeyType::FinancialTerms),
            "integration_secrets" => Ok(KeyType::IntegrationSecrets),
            other => Err(CryptoError::UnknownKeyType(other.to_string())),
        }
    }
}

mod b64 {
    use super::BASE64_STANDARD;
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&BASE64_STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        BASE64_STANDARD
            .decode(encoded)
            .map_err(serde::de::Error::custom)
    }
}

/// Opaque encrypted field value. Callers store and transport it verbatim;
/// only `FieldCipher` looks inside.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptedPayload {
    pub key_type: KeyType,
    #[serde(with = "b64")]
    pub nonce: Vec<u8>,
    #[serde(with = "b64")]
    pub ciphertext: Vec<u8>,
    #[serde(with = "b64")]
    pub tag: Vec<u8>,
}

/// Process-memory key material for every registered key type.
#[derive(Clone)]
pub struct KeyRing {
    keys: HashMap<KeyType, Zeroizing<[u8; KEY_LENGTH]>>,
}

impl KeyRing {
    /// Ring with no keys; lookups fail with `KeyNotFound`.
    pub fn empty() -> Self {
        Self {
            keys: HashMap::new(),
        }
    }

    /// Fresh random key per key type. Suitable for ephemeral processes and
    /// tests; production loads material from the secret-management collaborator.
    pub fn generate() -> Self {
        let mut ring = Self::empty();
        for key_type in KeyType::ALL {
            let mut bytes = [0u8; KEY_LENGTH];
            OsRng.fill_bytes(&mut bytes);
            ring.keys.insert(key_type, Zeroizing::new(bytes));
        }
        ring
    }

    /// Derive one subkey per key type from a 32-byte master secret, domain
    /// separated by the key-type label.
    pub fn from_master_bytes<B>(master: B) -> Result<Self, CryptoError>
    where
        B: AsRef<[u8]>,
    {
        let slice = master.as_ref();
        if slice.len() != KEY_LENGTH {
            return Err(CryptoError::InvalidKeyLength {
                expected: KEY_LENGTH,
                actual: slice.len(),
            });
        }
        let mut ring = Self::empty();
        for key_type in KeyType::ALL {
            let mut hasher = Sha256::new();
            hasher.update(slice);
            hasher.update(b"promoguard-field-key:");
            hasher.update(key_type.as_str().as_bytes());
            let digest = hasher.finalize();
            let mut subkey = [0u8; KEY_LENGTH];
            subkey.copy_from_slice(&digest);
            ring.keys.insert(key_type, Zeroizing::new(subkey));
        }
        Ok(ring)
    }

    /// Construct from a base64-encoded master secret.
    pub fn from_master_base64(value: &str) -> Result<Self, CryptoError> {
        let decoded = Zeroizing::new(BASE64_STANDARD.decode(value.trim())?);
        Self::from_master_bytes(&*decoded)
    }

    /// Install externally supplied key material for a single key type.
    pub fn insert<B>(&mut self, key_type: KeyType, bytes: B) -> Result<(), CryptoError>
    where
        B: AsRef<[u8]>,
    {
        let slice = bytes.as_ref();
        if slice.len() != KEY_LENGTH {
            return Err(CryptoError::InvalidKeyLength {
                expected: KEY_LENGTH,
                actual: slice.len(),
            });
        }
        let mut array = [0u8; KEY_LENGTH];
        array.copy_from_slice(slice);
        self.keys.insert(key_type, Zeroizing::new(array));
        Ok(())
    }

    fn key(&self, key_type: KeyType) -> Result<&[u8; KEY_LENGTH], CryptoError> {
        self.keys
            .get(&key_type)
            .map(|k| &**k)
            .ok_or(CryptoError::KeyNotFound(key_type))
    }
}

impl fmt::Debug for KeyRing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyRing")
            .field("keys", &"***redacted***")
            .finish()
    }
}

/// AES-256-GCM field cipher over a [`KeyRing`]. Stateless; safe to share and
/// call concurrently.
#[derive(Debug, Clone)]
pub struct FieldCipher {
    ring: KeyRing,
}

impl FieldCipher {
    pub fn new(ring: KeyRing) -> Self {
        Self { ring }
    }

    /// Encrypt plaintext under the named key with a fresh random nonce.
    pub fn encrypt(&self, plaintext: &[u8], key_type: KeyType) -> Result<EncryptedPayload, CryptoError> {
        let key = self.ring.key(key_type)?;
        let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| CryptoError::InvalidKeyLength {
            expected: KEY_LENGTH,
            actual: key.len(),
        })?;
        let mut nonce_bytes = [0u8; NONCE_LENGTH];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);
        let mut sealed = cipher
            .encrypt(nonce, plaintext)
            .map_err(|_| CryptoError::EncryptFailure)?;
        // aes-gcm appends the tag; carry it as its own field.
        let tag = sealed.split_off(sealed.len() - TAG_LENGTH);
        Ok(EncryptedPayload {
            key_type,
            nonce: nonce_bytes.to_vec(),
            ciphertext: sealed,
            tag,
        })
    }

    /// Verify and decrypt. Any mismatch in nonce, ciphertext, or tag fails
    /// closed with `IntegrityFailure`.
    pub fn decrypt(&self, payload: &EncryptedPayload) -> Result<Vec<u8>, CryptoError> {
        let key = self.ring.key(payload.key_type)?;
        if payload.nonce.len() != NONCE_LENGTH || payload.tag.len() != TAG_LENGTH {
            return Err(CryptoError::IntegrityFailure);
        }
        let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| CryptoError::InvalidKeyLength {
            expected: KEY_LENGTH,
            actual: key.len(),
        })?;
        let mut sealed = Vec::with_capacity(payload.ciphertext.len() + TAG_LENGTH);
        sealed.extend_from_slice(&payload.ciphertext);
        sealed.extend_from_slice(&payload.tag);
        cipher
            .decrypt(Nonce::from_slice(&payload.nonce), sealed.as_slice())
            .map_err(|_| CryptoError::IntegrityFailure)
    }

    /// Deterministic HMAC-SHA256 blind index for equality lookups over
    /// encrypted fields. Uses a hash subkey derived from the named key so the
    /// encryption key itself never doubles as a MAC key.
    pub fn deterministic_hash(&self, value: &[u8], key_type: KeyType) -> Result<Vec<u8>, CryptoError> {
        let key = self.ring.key(key_type)?;
        let mac_key = derive_hash_key(key);
        let mut mac =
            <HmacSha256 as Mac>::new_from_slice(&mac_key).map_err(|_| CryptoError::InvalidMacKey)?;
        mac.update(value);
        Ok(mac.finalize().into_bytes().to_vec())
    }
}

fn derive_hash_key(key: &[u8; KEY_LENGTH]) -> [u8; KEY_LENGTH] {
    let mut hasher = Sha256::new();
    hasher.update(key);
    hasher.update(b"promoguard-hash-key");
    let digest = hasher.finalize();
    let mut out = [0u8; KEY_LENGTH];
    out.copy_from_slice(&digest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cipher() -> FieldCipher {
        FieldCipher::new(KeyRing::generate())
    }

    #[test]
    fn round_trip_every_key_type() {
        let cipher = cipher();
        for key_type in KeyType::ALL {
            let payload = cipher.encrypt(b"volume rebate 12%", key_type).expect("encrypt");
            assert_eq!(payload.key_type, key_type);
            let plaintext = cipher.decrypt(&payload).expect("decrypt");
            assert_eq!(plaintext, b"volume rebate 12%");
        }
    }

    #[test]
    fn nonces_are_never_reused() {
        let cipher = cipher();
        let a = cipher.encrypt(b"same input", KeyType::CustomerPii).expect("encrypt");
        let b = cipher.encrypt(b"same input", KeyType::CustomerPii).expect("encrypt");
        assert_ne!(a.nonce, b.nonce);
        assert_ne!(a.ciphertext, b.ciphertext);
    }

    #[test]
    fn tampered_ciphertext_fails_closed() {
        let cipher = cipher();
        let mut payload = cipher
            .encrypt(b"net-net price", KeyType::FinancialTerms)
            .expect("encrypt");
        payload.ciphertext[0] ^= 0x01;
        assert!(matches!(
            cipher.decrypt(&payload),
            Err(CryptoError::IntegrityFailure)
        ));
    }

    #[test]
    fn tampered_tag_fails_closed() {
        let cipher = cipher();
        let mut payload = cipher
            .encrypt(b"net-net price", KeyType::FinancialTerms)
            .expect("encrypt");
        let last = payload.tag.len() - 1;
        payload.tag[last] ^= 0x80;
        assert!(matches!(
            cipher.decrypt(&payload),
            Err(CryptoError::IntegrityFailure)
        ));
    }

    #[test]
    fn missing_key_is_a_configuration_error() {
        let cipher = FieldCipher::new(KeyRing::empty());
        assert!(matches!(
            cipher.encrypt(b"x", KeyType::CustomerPii),
            Err(CryptoError::KeyNotFound(KeyType::CustomerPii))
        ));

        let full = FieldCipher::new(KeyRing::generate());
        let payload = full.encrypt(b"x", KeyType::CustomerPii).expect("encrypt");
        assert!(matches!(
            cipher.decrypt(&payload),
            Err(CryptoError::KeyNotFound(KeyType::CustomerPii))
        ));
    }

    #[test]
    fn master_derivation_is_stable_and_separated() {
        let ring_a = KeyRing::from_master_bytes([3u8; KEY_LENGTH]).expect("ring");
        let ring_b = KeyRing::from_master_bytes([3u8; KEY_LENGTH]).expect("ring");
        let payload = FieldCipher::new(ring_a)
            .encrypt(b"claim 991", KeyType::FinancialTerms)
            .expect("encrypt");
        // A ring derived from the same master can decrypt.
        let plaintext = FieldCipher::new(ring_b).decrypt(&payload).expect("decrypt");
        assert_eq!(plaintext, b"claim 991");

        // A payload re-labelled with a different key type must not verify.
        let ring_c = KeyRing::from_master_bytes([3u8; KEY_LENGTH]).expect("ring");
        let mut relabelled = payload.clone();
        relabelled.key_type = KeyType::CustomerPii;
        assert!(matches!(
            FieldCipher::new(ring_c).decrypt(&relabelled),
            Err(CryptoError::IntegrityFailure)
        ));
    }

    #[test]
    fn payload_serde_round_trip_preserves_decryptability() {
        let cipher = cipher();
        let payload = cipher.encrypt(b"gdpr-subject", KeyType::CustomerPii).expect("encrypt");
        let json = serde_json::to_string(&payload).expect("serialize");
        let restored: EncryptedPayload = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(cipher.decrypt(&restored).expect("decrypt"), b"gdpr-subject");
    }

    #[test]
    fn deterministic_hash_is_stable() {
        let cipher = cipher();
        let a = cipher
            .deterministic_hash(b"alice@example.com", KeyType::CustomerPii)
            .expect("hash");
        let b = cipher
            .deterministic_hash(b"alice@example.com", KeyType::CustomerPii)
            .expect("hash");
        let c = cipher
            .deterministic_hash(b"bob@example.com", KeyType::CustomerPii)
            .expect("hash");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
