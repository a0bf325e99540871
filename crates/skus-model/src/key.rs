use {chrono::{DateTime, Utc}, uuid::Uuid};

/// Per-merchant API credential (spec §3 "Key"). The secret itself is never
/// held in plaintext outside process memory during issuance; this row
/// carries the AEAD ciphertext and nonce, both hex-encoded.
#[derive(Clone, Debug, PartialEq)]
pub struct Key {
    pub id: Uuid,
    pub name: String,
    pub merchant_id: String,
    pub encrypted_secret_key: String,
    pub nonce: String,
    pub created_at: DateTime<Utc>,
    pub expiry: Option<DateTime<Utc>>,
}

impl Key {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiry.is_some_and(|expiry| now >= expiry)
    }
}
