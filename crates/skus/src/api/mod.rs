//! The thin Axum surface the binary needs to be reachable at all (spec §1
//! lists full HTTP routing/validation as an out-of-scope collaborator);
//! exposes just enough of C7/C9/C10 to exercise the credential-issuance
//! pipeline end-to-end.

mod credentials;
mod error;
mod webhooks;

use {
    crate::run::AppState,
    axum::{
        routing::{get, post},
        Router,
    },
    std::sync::Arc,
};

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/orders/:order_id/credentials", get(credentials::get_order_credentials))
        .route(
            "/v1/orders/:order_id/items/:item_id/credentials/:request_id",
            get(credentials::get_item_credentials),
        )
        .route("/v1/receipt", post(webhooks::validate_receipt))
        .route("/v1/webhooks/apple", post(webhooks::apple_notification))
        .route("/v1/webhooks/google", post(webhooks::google_notification))
        .route("/v1/webhooks/custodial", post(webhooks::custodial_confirmation))
        .with_state(state)
}
