//! TLV1 Derivation (C8): on-demand HMAC credentials for `time-limited`
//! order items, never persisted (spec §4.8).

use {
    chrono::{DateTime, Duration, Utc},
    skus_crypto::secret::EncryptionKey,
    skus_database::keys,
    skus_model::{iso8601, Error, Iso8601Duration},
    sqlx::PgConnection,
};

const GRACE_PERIOD: Duration = Duration::days(5);

/// One derived credential, ready to be base64-encoded with
/// `skus_crypto::tlv1::encode`.
pub type Tlv1Credential = skus_crypto::tlv1::Tlv1Credential;

/// Derives every TLV1 chunk from `now` through the item's expiry, signed
/// with the merchant's active key (spec §4.8 steps 1-3).
pub async fn derive_credentials(
    ex: &mut PgConnection,
    encryption_key: &EncryptionKey,
    merchant_id: &str,
    issuer_id: &str,
    item_id: uuid::Uuid,
    order_id: uuid::Uuid,
    last_paid_at: DateTime<Utc>,
    valid_for_iso: Iso8601Duration,
    issuance_interval_iso: Iso8601Duration,
    now: DateTime<Utc>,
) -> Result<Vec<(uuid::Uuid, uuid::Uuid, Tlv1Credential)>, Error> {
    let signing_key = active_signing_key(ex, encryption_key, merchant_id).await?;
    let expires_at = valid_for_iso.add_to(last_paid_at) + GRACE_PERIOD;

    let mut credentials = Vec::new();
    let (mut start, mut end) = iso8601::chunk(now, issuance_interval_iso);
    while end < expires_at {
        let cred = skus_crypto::tlv1::derive(&signing_key, issuer_id, start, end);
        credentials.push((item_id, order_id, cred));
        let next = iso8601::chunk(end, issuance_interval_iso);
        start = next.0;
        end = next.1;
    }

    if credentials.is_empty() {
        return Err(Error::NoItems);
    }
    Ok(credentials)
}

/// Verifies a presented TLV1 credential against every key the merchant
/// currently holds (spec §4.8 "Verification").
pub async fn verify_credential(
    ex: &mut PgConnection,
    encryption_key: &EncryptionKey,
    merchant_id: &str,
    issuer_id: &str,
    credential: &Tlv1Credential,
    now: DateTime<Utc>,
) -> Result<bool, Error> {
    let keys = keys::list_by_merchant(ex, merchant_id).await.map_err(anyhow::Error::from)?;
    let decrypted = decrypt_all(encryption_key, &keys)?;
    Ok(skus_crypto::tlv1::verify(&decrypted, issuer_id, credential, now))
}

async fn active_signing_key(ex: &mut PgConnection, encryption_key: &EncryptionKey, merchant_id: &str) -> Result<Vec<u8>, Error> {
    let keys = keys::list_by_merchant(ex, merchant_id).await.map_err(anyhow::Error::from)?;
    let newest = keys.first().ok_or(Error::NotFound)?;
    decrypt_one(encryption_key, newest)
}

fn decrypt_all(encryption_key: &EncryptionKey, keys: &[skus_model::Key]) -> Result<Vec<Vec<u8>>, Error> {
    keys.iter().map(|key| decrypt_one(encryption_key, key)).collect()
}

fn decrypt_one(encryption_key: &EncryptionKey, key: &skus_model::Key) -> Result<Vec<u8>, Error> {
    // TLV1 signing keys are stored AEAD-encrypted the same way HS2019
    // secrets are (spec §4.3), under the same `api_keys` table — the spec
    // names no separate key store for them.
    let ciphertext = skus_crypto::secret::SecretCiphertext {
        ciphertext_hex: key.encrypted_secret_key.clone(),
        nonce_hex: key.nonce.clone(),
    };
    let plaintext = skus_crypto::secret::decrypt_secret(encryption_key, &ciphertext).map_err(anyhow::Error::from)?;
    Ok(plaintext.into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn grace_period_is_five_days() {
        assert_eq!(GRACE_PERIOD, Duration::days(5));
    }

    #[test]
    fn p1d_chunks_cover_the_validity_window() {
        let now = Utc.with_ymd_and_hms(2021, 1, 20, 13, 0, 0).unwrap();
        let issuance_interval = iso8601::parse("P1D").unwrap();
        let valid_for = iso8601::parse("P1M").unwrap();
        let expires_at = valid_for.add_to(now) + GRACE_PERIOD;

        let (mut start, mut end) = iso8601::chunk(now, issuance_interval);
        let mut chunks = Vec::new();
        while end < expires_at {
            chunks.push((start, end));
            let next = iso8601::chunk(end, issuance_interval);
            start = next.0;
            end = next.1;
        }

        assert!(!chunks.is_empty());
        assert_eq!(chunks[0].0, Utc.with_ymd_and_hms(2021, 1, 20, 0, 0, 0).unwrap());
        assert!(chunks.last().unwrap().1 >= Utc.with_ymd_and_hms(2021, 2, 25, 0, 0, 0).unwrap());
    }
}
