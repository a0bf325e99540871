//! Receipt validation (C10) and vendor/custodial renewal webhooks (C9).
//!
//! The real Apple/Google notification bodies carry price information nested
//! under renewal-info structures this crate doesn't parse (out of scope per
//! spec §1's "full HTTP routing/request parsing" exclusion); these thin
//! routes accept `amount`/`currency`/`fetched_expiry` as explicit fields
//! supplied by the caller instead, noted in `DESIGN.md`.

use {
    super::error::ApiError,
    crate::run::AppState,
    axum::{extract::State, http::StatusCode, Json},
    bigdecimal::BigDecimal,
    skus_core::renewals::CustodialConfirmation,
    std::sync::Arc,
};

pub async fn validate_receipt(State(state): State<Arc<AppState>>, body: String) -> Result<Json<serde_json::Value>, ApiError> {
    let external_id = skus_core::receipts::validate(state.apple_receipt.as_ref(), state.google_receipt.as_ref(), body.trim()).await?;
    Ok(Json(serde_json::json!({ "externalID": external_id })))
}

#[derive(serde::Deserialize)]
pub struct AppleNotificationRequest {
    signed_payload: String,
    amount: BigDecimal,
    currency: String,
}

pub async fn apple_notification(
    State(state): State<Arc<AppState>>,
    Json(body): Json<AppleNotificationRequest>,
) -> Result<StatusCode, ApiError> {
    let Some(key) = &state.apple_notification_key else {
        return Err(skus_model::Error::InvalidVendor.into());
    };
    let notification = skus_vendor::apple::verify_notification(&body.signed_payload, key, state.notification_cutoff)
        .map_err(|err| anyhow::anyhow!(err))
        .map_err(skus_model::Error::from)?;
    let Some(notification) = notification else {
        return Ok(StatusCode::OK);
    };

    let mut tx = state.pool.begin().await.map_err(anyhow::Error::from).map_err(skus_model::Error::from)?;
    skus_core::renewals::apply_apple_notification(&mut tx, &notification, &body.amount, &body.currency).await?;
    tx.commit().await.map_err(anyhow::Error::from).map_err(skus_model::Error::from)?;
    Ok(StatusCode::OK)
}

#[derive(serde::Deserialize)]
pub struct GoogleNotificationRequest {
    id_token: String,
    envelope: skus_vendor::google::PubSubEnvelope,
    fetched_expiry: chrono::DateTime<chrono::Utc>,
    amount: BigDecimal,
    currency: String,
}

pub async fn google_notification(
    State(state): State<Arc<AppState>>,
    Json(body): Json<GoogleNotificationRequest>,
) -> Result<StatusCode, ApiError> {
    let Some(key) = &state.google_push_key else {
        return Err(skus_model::Error::InvalidVendor.into());
    };
    let notification = skus_vendor::google::verify_notification(
        &body.id_token,
        &body.envelope,
        key,
        &state.google_push_audience,
        &state.google_push_issuer,
        state.notification_cutoff,
    )
    .map_err(|err| anyhow::anyhow!(err))
    .map_err(skus_model::Error::from)?;
    let Some(notification) = notification else {
        return Ok(StatusCode::OK);
    };

    let mut tx = state.pool.begin().await.map_err(anyhow::Error::from).map_err(skus_model::Error::from)?;
    skus_core::renewals::apply_google_notification(&mut tx, &notification, body.fetched_expiry, &body.amount, &body.currency).await?;
    tx.commit().await.map_err(anyhow::Error::from).map_err(skus_model::Error::from)?;
    Ok(StatusCode::OK)
}

pub async fn custodial_confirmation(
    State(state): State<Arc<AppState>>,
    Json(confirmation): Json<CustodialConfirmationRequest>,
) -> Result<StatusCode, ApiError> {
    let mut tx = state.pool.begin().await.map_err(anyhow::Error::from).map_err(skus_model::Error::from)?;
    let confirmation = CustodialConfirmation {
        order_id: confirmation.order_id,
        external_id: confirmation.external_id,
        amount: confirmation.amount,
        currency: confirmation.currency,
    };
    skus_core::renewals::apply_custodial_confirmation(&mut tx, &confirmation).await?;
    tx.commit().await.map_err(anyhow::Error::from).map_err(skus_model::Error::from)?;
    Ok(StatusCode::OK)
}

#[derive(serde::Deserialize)]
pub struct CustodialConfirmationRequest {
    order_id: uuid::Uuid,
    external_id: String,
    amount: BigDecimal,
    currency: String,
}
