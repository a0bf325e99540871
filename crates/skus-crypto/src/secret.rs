//! Secret-at-rest encryption for merchant API keys (spec §3 "Key", §4.3,
//! §9 "Global encryption key"). Plaintext secrets are the literal
//! `secret-token:` followed by 32 URL-safe base64 characters; ciphertext and
//! nonce are both stored hex-encoded.

use {
    aes_gcm::{
        Aes256Gcm, Key, Nonce,
        aead::{Aead, KeyInit, OsRng, rand_core::RngCore},
    },
    base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD},
};

pub const SECRET_PREFIX: &str = "secret-token:";
const SECRET_RANDOM_BYTES: usize = 24;
const NONCE_BYTES: usize = 12;

#[derive(thiserror::Error, Debug)]
pub enum CryptoError {
    #[error("ciphertext or nonce is not valid hex")]
    InvalidHex(#[from] hex::FromHexError),
    #[error("AEAD decryption failed")]
    DecryptionFailed,
    #[error("decrypted plaintext was not a valid secret token")]
    MalformedPlaintext,
}

/// The 32-byte process-wide AEAD key, initialized once from `ENCRYPTION_KEY`
/// and treated as immutable afterwards (spec §9).
#[derive(Clone)]
pub struct EncryptionKey(pub [u8; 32]);

impl EncryptionKey {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    fn cipher(&self) -> Aes256Gcm {
        Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.0))
    }
}

/// A secret's encrypted-at-rest form: hex-encoded ciphertext and nonce,
/// matching the `Key.encrypted_secret_key` / `Key.nonce` columns.
pub struct SecretCiphertext {
    pub ciphertext_hex: String,
    pub nonce_hex: String,
}

/// Generates a new plaintext secret: `secret-token:` followed by 32
/// URL-safe base64 characters derived from 24 random bytes.
pub fn generate_secret() -> String {
    let mut bytes = [0u8; SECRET_RANDOM_BYTES];
    OsRng.fill_bytes(&mut bytes);
    format!("{SECRET_PREFIX}{}", URL_SAFE_NO_PAD.encode(bytes))
}

pub fn encrypt_secret(key: &EncryptionKey, plaintext: &str) -> SecretCiphertext {
    let cipher = key.cipher();
    let mut nonce_bytes = [0u8; NONCE_BYTES];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);
    let ciphertext = cipher
        .encrypt(nonce, plaintext.as_bytes())
        .expect("AEAD encryption over a fixed-size key cannot fail");
    SecretCiphertext {
        ciphertext_hex: hex::encode(ciphertext),
        nonce_hex: hex::encode(nonce_bytes),
    }
}

pub fn decrypt_secret(key: &EncryptionKey, stored: &SecretCiphertext) -> Result<String, CryptoError> {
    let ciphertext = hex::decode(&stored.ciphertext_hex)?;
    let nonce_bytes = hex::decode(&stored.nonce_hex)?;
    let nonce = Nonce::from_slice(&nonce_bytes);
    let plaintext = key
        .cipher()
        .decrypt(nonce, ciphertext.as_ref())
        .map_err(|_| CryptoError::DecryptionFailed)?;
    let plaintext = String::from_utf8(plaintext).map_err(|_| CryptoError::MalformedPlaintext)?;
    if !is_well_formed_secret(&plaintext) {
        return Err(CryptoError::MalformedPlaintext);
    }
    Ok(plaintext)
}

fn is_well_formed_secret(plaintext: &str) -> bool {
    plaintext
        .strip_prefix(SECRET_PREFIX)
        .is_some_and(|rest| rest.len() == 32 && rest.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_secret_has_expected_shape() {
        let secret = generate_secret();
        assert!(is_well_formed_secret(&secret), "{secret}");
    }

    #[test]
    fn round_trips_through_encryption() {
        let key = EncryptionKey::from_bytes([7u8; 32]);
        let plaintext = generate_secret();
        let stored = encrypt_secret(&key, &plaintext);
        let decrypted = decrypt_secret(&key, &stored).unwrap();
        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn wrong_key_fails_to_decrypt() {
        let key = EncryptionKey::from_bytes([1u8; 32]);
        let other = EncryptionKey::from_bytes([2u8; 32]);
        let stored = encrypt_secret(&key, &generate_secret());
        assert!(matches!(decrypt_secret(&other, &stored), Err(CryptoError::DecryptionFailed)));
    }
}
