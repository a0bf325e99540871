//! Time-limited v1 credential derivation and verification (spec §4.8). TLV1
//! credentials are never stored; they're derived on read from a merchant's
//! HMAC signing key and verified by recomputing the same HMAC.

use {
    base64::{Engine as _, engine::general_purpose::STANDARD},
    chrono::{DateTime, Utc},
    hmac::{Hmac, Mac},
    sha2::Sha256,
};

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
struct WireCredential {
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    token: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tlv1Credential {
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub token: Vec<u8>,
}

#[derive(thiserror::Error, Debug)]
pub enum Tlv1Error {
    #[error("credential is not valid base64")]
    InvalidBase64,
    #[error("credential is not valid json")]
    InvalidJson,
}

fn derive_token(signing_key: &[u8], issuer_id: &str, issued_at: DateTime<Utc>, expires_at: DateTime<Utc>) -> Vec<u8> {
    let mut mac = Hmac::<Sha256>::new_from_slice(signing_key).expect("HMAC accepts keys of any length");
    mac.update(issuer_id.as_bytes());
    mac.update(&issued_at.timestamp().to_be_bytes());
    mac.update(&expires_at.timestamp().to_be_bytes());
    mac.finalize().into_bytes().to_vec()
}

/// Derives one TLV1 credential for the interval `[issued_at, expires_at)`.
pub fn derive(signing_key: &[u8], issuer_id: &str, issued_at: DateTime<Utc>, expires_at: DateTime<Utc>) -> Tlv1Credential {
    Tlv1Credential {
        issued_at,
        expires_at,
        token: derive_token(signing_key, issuer_id, issued_at, expires_at),
    }
}

pub fn encode(cred: &Tlv1Credential) -> String {
    let wire = WireCredential {
        issued_at: cred.issued_at,
        expires_at: cred.expires_at,
        token: STANDARD.encode(&cred.token),
    };
    let json = serde_json::to_vec(&wire).expect("WireCredential always serializes");
    STANDARD.encode(json)
}

pub fn decode(encoded: &str) -> Result<Tlv1Credential, Tlv1Error> {
    let json = STANDARD.decode(encoded).map_err(|_| Tlv1Error::InvalidBase64)?;
    let wire: WireCredential = serde_json::from_slice(&json).map_err(|_| Tlv1Error::InvalidJson)?;
    let token = STANDARD.decode(wire.token).map_err(|_| Tlv1Error::InvalidBase64)?;
    Ok(Tlv1Credential { issued_at: wire.issued_at, expires_at: wire.expires_at, token })
}

/// True if `cred` verifies against any of `signing_keys` for `issuer_id` and
/// `now` falls within its validity window (spec §4.8 "Verification").
pub fn verify(signing_keys: &[Vec<u8>], issuer_id: &str, cred: &Tlv1Credential, now: DateTime<Utc>) -> bool {
    if !(cred.issued_at <= now && now <= cred.expires_at) {
        return false;
    }
    signing_keys
        .iter()
        .any(|key| derive_token(key, issuer_id, cred.issued_at, cred.expires_at) == cred.token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn encode_decode_round_trips() {
        let now = Utc::now();
        let cred = derive(b"signing-key", "issuer", now, now + Duration::days(1));
        let encoded = encode(&cred);
        let decoded = decode(&encoded).unwrap();
        assert_eq!(decoded, cred);
    }

    #[test]
    fn verifies_with_matching_key_and_window() {
        let now = Utc::now();
        let cred = derive(b"signing-key", "issuer", now - Duration::hours(1), now + Duration::hours(1));
        assert!(verify(&[b"signing-key".to_vec()], "issuer", &cred, now));
    }

    #[test]
    fn rejects_wrong_key() {
        let now = Utc::now();
        let cred = derive(b"signing-key", "issuer", now - Duration::hours(1), now + Duration::hours(1));
        assert!(!verify(&[b"other-key".to_vec()], "issuer", &cred, now));
    }

    #[test]
    fn rejects_outside_validity_window() {
        let now = Utc::now();
        let cred = derive(b"signing-key", "issuer", now - Duration::days(2), now - Duration::days(1));
        assert!(!verify(&[b"signing-key".to_vec()], "issuer", &cred, now));
    }
}
