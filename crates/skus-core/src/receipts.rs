//! Receipt Validator (C10): verifies a submitted receipt blob against the
//! owning vendor and returns the order's `external_id` (spec §4.10).

use {
    skus_model::Error,
    skus_vendor::{receipt, AppleReceiptClient, GoogleReceiptClient, VendorError},
};

pub async fn validate(
    apple: &dyn AppleReceiptClient,
    google: &dyn GoogleReceiptClient,
    payload: &str,
) -> Result<String, Error> {
    let submission = receipt::decode(payload).map_err(map_vendor_error)?;

    let verified = match submission.vendor {
        receipt::Vendor::Apple => apple.verify_receipt(&submission.blob, &submission.package).await,
        receipt::Vendor::Google => google.verify_purchase(&submission.package, &submission.subscription_id, &submission.blob).await,
    }
    .map_err(map_vendor_error)?;

    Ok(verified.external_id)
}

fn map_vendor_error(err: VendorError) -> Error {
    match err {
        VendorError::PurchasePending => Error::PurchasePending,
        VendorError::PurchaseExpired => Error::PurchaseExpired,
        VendorError::MalformedReceipt | VendorError::MalformedPayload(_) | VendorError::PurchaseValidation => {
            Error::PurchaseValidation
        }
        VendorError::InvalidSignature(_) => Error::PurchaseValidation,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_pending_and_expired_distinctly() {
        assert!(matches!(map_vendor_error(VendorError::PurchasePending), Error::PurchasePending));
        assert!(matches!(map_vendor_error(VendorError::PurchaseExpired), Error::PurchaseExpired));
    }
}
