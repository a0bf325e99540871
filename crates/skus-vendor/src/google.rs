//! Google Play Developer notification verification (spec §4.9): a Pub/Sub
//! push envelope carrying an OIDC id-token signed by a configured service
//! account, which must match the expected audience/issuer.

use {
    crate::{NotificationAction, VendorError},
    base64::{engine::general_purpose::STANDARD, Engine},
    chrono::{DateTime, TimeZone, Utc},
    jsonwebtoken::{decode, Algorithm, DecodingKey, Validation},
    serde::Deserialize,
};

#[derive(Debug, Deserialize)]
pub struct PubSubEnvelope {
    pub message: PubSubMessage,
}

#[derive(Debug, Deserialize)]
pub struct PubSubMessage {
    pub data: String,
    #[serde(rename = "messageId")]
    pub message_id: String,
}

#[derive(Debug, Deserialize)]
struct IdTokenClaims {
    iss: String,
    aud: String,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct DeveloperNotification {
    #[serde(rename = "eventTimeMillis")]
    event_time_millis: String,
    #[serde(rename = "subscriptionNotification", default)]
    subscription_notification: Option<SubscriptionNotification>,
}

#[derive(Debug, Deserialize)]
struct SubscriptionNotification {
    #[serde(rename = "notificationType")]
    notification_type: i32,
    #[serde(rename = "purchaseToken")]
    purchase_token: String,
}

pub struct VerifiedNotification {
    pub action: NotificationAction,
    pub purchase_token: String,
    pub signed_at: DateTime<Utc>,
}

// https://developers.google.com/android-publisher/realtime_developer_notifications
fn action_for(notification_type: i32) -> NotificationAction {
    match notification_type {
        1 | 2 | 4 | 7 => NotificationAction::Renew,  // RECOVERED, RENEWED, PURCHASED, RESTARTED
        3 | 12 | 13 => NotificationAction::Cancel,    // CANCELED, REVOKED, EXPIRED
        _ => NotificationAction::Drop,
    }
}

/// Verifies the OIDC id-token on a Pub/Sub push request and, if valid,
/// decodes and classifies the embedded developer notification.
pub fn verify_notification(
    id_token: &str,
    envelope: &PubSubEnvelope,
    decoding_key: &DecodingKey,
    expected_audience: &str,
    expected_issuer: &str,
    cutoff: DateTime<Utc>,
) -> Result<Option<VerifiedNotification>, VendorError> {
    let mut validation = Validation::new(Algorithm::RS256);
    validation.set_audience(&[expected_audience]);
    validation.set_issuer(&[expected_issuer]);

    let claims = decode::<IdTokenClaims>(id_token, decoding_key, &validation).map_err(VendorError::InvalidSignature)?.claims;
    if claims.exp < Utc::now().timestamp() {
        return Err(VendorError::InvalidSignature(jsonwebtoken::errors::ErrorKind::ExpiredSignature.into()));
    }

    let decoded = STANDARD.decode(&envelope.message.data).map_err(|_| VendorError::MalformedReceipt)?;
    let notification: DeveloperNotification = serde_json::from_slice(&decoded).map_err(VendorError::MalformedPayload)?;

    let event_time: i64 = notification.event_time_millis.parse().map_err(|_| VendorError::MalformedReceipt)?;
    let signed_at = Utc.timestamp_millis_opt(event_time).single().ok_or(VendorError::MalformedReceipt)?;
    if signed_at < cutoff {
        tracing::debug!(message_id = %envelope.message.message_id, "ignoring notification before cutoff");
        return Ok(None);
    }

    let Some(subscription) = notification.subscription_notification else {
        return Ok(None);
    };

    Ok(Some(VerifiedNotification {
        action: action_for(subscription.notification_type),
        purchase_token: subscription.purchase_token,
        signed_at,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(2, NotificationAction::Renew)]
    #[case(12, NotificationAction::Cancel)]
    #[case(13, NotificationAction::Cancel)]
    #[case(99, NotificationAction::Drop)]
    fn classifies_known_notification_types(#[case] notification_type: i32, #[case] expected: NotificationAction) {
        assert_eq!(action_for(notification_type), expected);
    }
}
