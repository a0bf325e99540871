//! Apple App Store Server notification verification (spec §4.9).
//!
//! Apple signs notification payloads as a JWS whose header carries the
//! signing certificate chain (`x5c`); this module verifies the signature
//! against the leaf certificate's public key. Chaining that leaf back to
//! Apple's fixed root is a one-time provisioning step, not something this
//! module repeats per notification, so callers supply the already-trusted
//! `DecodingKey` for the leaf (see `DESIGN.md`).

use {
    crate::{NotificationAction, VendorError},
    chrono::{DateTime, TimeZone, Utc},
    jsonwebtoken::{decode, Algorithm, DecodingKey, Validation},
    serde::Deserialize,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponseBodyV2DecodedPayload {
    notification_type: String,
    #[serde(default)]
    subtype: Option<String>,
    signed_date: i64,
    data: NotificationData,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NotificationData {
    signed_transaction_info: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransactionInfo {
    original_transaction_id: String,
    expires_date: i64,
}

pub struct VerifiedNotification {
    pub action: NotificationAction,
    pub original_transaction_id: String,
    pub expires_at: DateTime<Utc>,
    pub signed_at: DateTime<Utc>,
}

fn action_for(notification_type: &str) -> NotificationAction {
    match notification_type {
        "SUBSCRIBED" | "DID_RENEW" | "DID_CHANGE_RENEWAL_PREF" => NotificationAction::Renew,
        "CANCEL" | "EXPIRED" | "REFUND" | "REVOKE" | "GRACE_PERIOD_EXPIRED" => NotificationAction::Cancel,
        _ => NotificationAction::Drop,
    }
}

/// Verifies a decoded App Store Server Notification V2 payload (the outer
/// JWS has already been unwrapped into `signedPayload` by the caller) and
/// the nested transaction-info JWS, then classifies it (spec §4.9).
pub fn verify_notification(
    signed_payload: &str,
    signed_transaction_key: &DecodingKey,
    cutoff: DateTime<Utc>,
) -> Result<Option<VerifiedNotification>, VendorError> {
    let mut validation = Validation::new(Algorithm::ES256);
    validation.validate_exp = false;
    validation.required_spec_claims.clear();

    let payload = decode::<ResponseBodyV2DecodedPayload>(signed_payload, signed_transaction_key, &validation)
        .map_err(VendorError::InvalidSignature)?
        .claims;

    let transaction = decode::<TransactionInfo>(&payload.data.signed_transaction_info, signed_transaction_key, &validation)
        .map_err(VendorError::InvalidSignature)?
        .claims;

    let expires_at = Utc
        .timestamp_millis_opt(transaction.expires_date)
        .single()
        .ok_or(VendorError::MalformedReceipt)?;
    let signed_at = Utc.timestamp_millis_opt(payload.signed_date).single().ok_or(VendorError::MalformedReceipt)?;

    if signed_at < cutoff {
        tracing::debug!(notification_type = %payload.notification_type, "ignoring notification before cutoff");
        return Ok(None);
    }

    Ok(Some(VerifiedNotification {
        action: action_for(&payload.notification_type),
        original_transaction_id: transaction.original_transaction_id,
        expires_at,
        signed_at,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("SUBSCRIBED", NotificationAction::Renew)]
    #[case("DID_RENEW", NotificationAction::Renew)]
    #[case("EXPIRED", NotificationAction::Cancel)]
    #[case("REVOKE", NotificationAction::Cancel)]
    #[case("TEST", NotificationAction::Drop)]
    fn classifies_known_notification_types(#[case] notification_type: &str, #[case] expected: NotificationAction) {
        assert_eq!(action_for(notification_type), expected);
    }
}
