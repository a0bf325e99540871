//! The error taxonomy described in spec §7, shared by `skus-core` and the
//! HTTP edge so the mapping to status codes lives in exactly one place.

/// Errors the core recognizes and maps to a specific HTTP surface.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("not found")]
    NotFound,
    #[error("order is not paid")]
    Unpaid,
    #[error("order has no items")]
    NoItems,
    #[error("unknown credential type")]
    InvalidCredType,
    #[error("operation unsupported for this credential type")]
    UnsupportedCredType,
    #[error("duplicate request id")]
    DupRequest,
    #[error("too many active batches for this item today")]
    TooManyActiveBatches,
    #[error("request id belongs to a different order")]
    WrongOrderForRequest,
    #[error("signing still pending, retry after {retry_after_seconds}s")]
    PendingSigning { retry_after_seconds: u64 },
    #[error("merchant does not own this order")]
    MerchantMismatch,
    #[error("caveat location does not match order location")]
    LocationMismatch,
    #[error("sku caveat is not allowed on order endpoints")]
    UnexpectedSkuCaveat,
    #[error("unsupported vendor")]
    InvalidVendor,
    #[error("purchase is pending")]
    PurchasePending,
    #[error("purchase has expired")]
    PurchaseExpired,
    #[error("purchase could not be validated")]
    PurchaseValidation,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl Error {
    /// The HTTP status this error kind is documented to surface as (spec §7).
    pub fn status_code(&self) -> u16 {
        match self {
            Error::NotFound => 404,
            Error::Unpaid | Error::NoItems => 400,
            Error::InvalidCredType => 409,
            Error::UnsupportedCredType => 400,
            Error::DupRequest => 409,
            Error::TooManyActiveBatches => 409,
            Error::WrongOrderForRequest => 400,
            Error::PendingSigning { .. } => 202,
            Error::MerchantMismatch | Error::LocationMismatch | Error::UnexpectedSkuCaveat => 403,
            Error::InvalidVendor
            | Error::PurchasePending
            | Error::PurchaseExpired
            | Error::PurchaseValidation => 400,
            Error::Internal(_) => 500,
        }
    }
}
