use thiserror::Error;

#[derive(Debug, Error)]
pub enum VendorError {
    #[error("notification signature verification failed")]
    InvalidSignature(#[source] jsonwebtoken::errors::Error),
    #[error("malformed notification payload")]
    MalformedPayload(#[source] serde_json::Error),
    #[error("malformed receipt submission")]
    MalformedReceipt,
    #[error("purchase is still pending")]
    PurchasePending,
    #[error("purchase has expired")]
    PurchaseExpired,
    #[error("purchase could not be validated")]
    PurchaseValidation,
}
