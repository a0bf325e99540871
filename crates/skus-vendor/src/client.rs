//! Outbound verification calls to Apple and Google for receipt validation
//! (spec §4.10), following the same thin HTTP-client-over-a-trait shape as
//! the CBR client.

use {crate::VendorError, async_trait::async_trait};

/// The Apple or Google receipt endpoint's answer: a stable vendor-side id
/// that becomes the order's `external_id` (spec §4.10).
pub struct VerifiedReceipt {
    pub external_id: String,
}

#[async_trait]
pub trait AppleReceiptClient: Send + Sync {
    async fn verify_receipt(&self, blob: &str, package: &str) -> Result<VerifiedReceipt, VendorError>;
}

#[async_trait]
pub trait GoogleReceiptClient: Send + Sync {
    async fn verify_purchase(&self, package: &str, subscription_id: &str, purchase_token: &str) -> Result<VerifiedReceipt, VendorError>;
}

pub struct HttpAppleReceiptClient {
    base_url: url::Url,
    http: reqwest::Client,
}

impl HttpAppleReceiptClient {
    pub fn new(base_url: url::Url, timeout: std::time::Duration) -> Self {
        let http = reqwest::Client::builder().timeout(timeout).build().expect("reqwest client builds with a valid timeout");
        Self { base_url, http }
    }
}

#[async_trait]
impl AppleReceiptClient for HttpAppleReceiptClient {
    async fn verify_receipt(&self, blob: &str, package: &str) -> Result<VerifiedReceipt, VendorError> {
        #[derive(serde::Serialize)]
        struct Body<'a> {
            #[serde(rename = "receipt-data")]
            receipt_data: &'a str,
            #[serde(rename = "bundle-id")]
            bundle_id: &'a str,
        }
        #[derive(serde::Deserialize)]
        struct Response {
            status: i32,
            #[serde(default)]
            latest_receipt_info: Vec<LatestReceiptInfo>,
        }
        #[derive(serde::Deserialize)]
        struct LatestReceiptInfo {
            original_transaction_id: String,
        }

        let response: Response = self
            .http
            .post(self.base_url.clone())
            .json(&Body { receipt_data: blob, bundle_id: package })
            .send()
            .await
            .map_err(|_| VendorError::PurchaseValidation)?
            .json()
            .await
            .map_err(|_| VendorError::PurchaseValidation)?;

        match response.status {
            0 => {
                let info = response.latest_receipt_info.into_iter().next().ok_or(VendorError::MalformedReceipt)?;
                Ok(VerifiedReceipt { external_id: info.original_transaction_id })
            }
            21006 => Err(VendorError::PurchaseExpired),
            _ => Err(VendorError::PurchaseValidation),
        }
    }
}

pub struct HttpGoogleReceiptClient {
    base_url: url::Url,
    http: reqwest::Client,
}

impl HttpGoogleReceiptClient {
    pub fn new(base_url: url::Url, timeout: std::time::Duration) -> Self {
        let http = reqwest::Client::builder().timeout(timeout).build().expect("reqwest client builds with a valid timeout");
        Self { base_url, http }
    }
}

#[async_trait]
impl GoogleReceiptClient for HttpGoogleReceiptClient {
    async fn verify_purchase(&self, package: &str, subscription_id: &str, purchase_token: &str) -> Result<VerifiedReceipt, VendorError> {
        #[derive(serde::Deserialize)]
        struct Response {
            #[serde(rename = "expiryTimeMillis")]
            expiry_time_millis: String,
            #[serde(rename = "paymentState", default)]
            payment_state: Option<i32>,
        }

        let mut url = self.base_url.clone();
        url.set_path(&format!("androidpublisher/v3/applications/{package}/purchases/subscriptions/{subscription_id}/tokens/{purchase_token}"));

        let response = self.http.get(url).send().await.map_err(|_| VendorError::PurchaseValidation)?;
        if !response.status().is_success() {
            return Err(VendorError::PurchaseValidation);
        }
        let body: Response = response.json().await.map_err(|_| VendorError::PurchaseValidation)?;

        let expiry: i64 = body.expiry_time_millis.parse().map_err(|_| VendorError::MalformedReceipt)?;
        if expiry < chrono::Utc::now().timestamp_millis() {
            return Err(VendorError::PurchaseExpired);
        }
        if body.payment_state == Some(0) {
            return Err(VendorError::PurchasePending);
        }

        Ok(VerifiedReceipt { external_id: purchase_token.to_string() })
    }
}
