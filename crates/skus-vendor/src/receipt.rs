//! Decodes the receipt submission wire format (spec §6): a base64 payload
//! that decodes to JSON `{package, subscription_id, type, raw_receipt|blob}`.

use {
    crate::VendorError,
    base64::{engine::general_purpose::STANDARD, Engine},
    serde::Deserialize,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Vendor {
    Apple,
    Google,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
enum WireType {
    Android,
    Ios,
}

impl From<WireType> for Vendor {
    fn from(t: WireType) -> Self {
        match t {
            WireType::Android => Vendor::Google,
            WireType::Ios => Vendor::Apple,
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireReceipt {
    package: String,
    subscription_id: String,
    #[serde(rename = "type")]
    kind: WireType,
    #[serde(default)]
    raw_receipt: Option<String>,
    #[serde(default)]
    blob: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReceiptSubmission {
    pub vendor: Vendor,
    pub package: String,
    pub subscription_id: String,
    pub blob: String,
}

/// Decodes a base64 receipt submission. `raw_receipt` (Apple) and `blob`
/// (Google) are both accepted as the opaque payload name; exactly one of
/// them is present on the wire (spec §6).
pub fn decode(payload: &str) -> Result<ReceiptSubmission, VendorError> {
    let json = STANDARD.decode(payload).map_err(|_| VendorError::MalformedReceipt)?;
    let wire: WireReceipt = serde_json::from_slice(&json).map_err(VendorError::MalformedPayload)?;
    let blob = wire.raw_receipt.or(wire.blob).ok_or(VendorError::MalformedReceipt)?;
    Ok(ReceiptSubmission { vendor: wire.kind.into(), package: wire.package, subscription_id: wire.subscription_id, blob })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn android_wire_type_maps_to_google_vendor() {
        let json = serde_json::json!({
            "type": "android",
            "raw_receipt": "aanidfcpncglnjghkmflgkkh.AO-J1Ozq9BLdRxaUDGiNgbGhnriCcRjLacFdAqucembd1S1WBbivoDGuwUlXgw6AXYXoEevUpTHsfIrKP1IEN9XJQBhb8xW_URNyXtuFHAs8i-Lfy0rMTE4",
            "package": "com.brave.browser_nightly",
            "subscription_id": "nightly.bravevpn.monthly",
        });
        let payload = STANDARD.encode(serde_json::to_vec(&json).unwrap());

        let submission = decode(&payload).unwrap();
        assert_eq!(submission.vendor, Vendor::Google);
        assert_eq!(submission.package, "com.brave.browser_nightly");
        assert_eq!(submission.subscription_id, "nightly.bravevpn.monthly");
        assert_eq!(
            submission.blob,
            "aanidfcpncglnjghkmflgkkh.AO-J1Ozq9BLdRxaUDGiNgbGhnriCcRjLacFdAqucembd1S1WBbivoDGuwUlXgw6AXYXoEevUpTHsfIrKP1IEN9XJQBhb8xW_URNyXtuFHAs8i-Lfy0rMTE4"
        );
    }

    #[test]
    fn ios_wire_type_maps_to_apple_vendor() {
        let json = serde_json::json!({
            "type": "ios",
            "blob": "base64-receipt-data",
            "package": "com.brave.ios.browser",
            "subscription_id": "monthly.bravevpn",
        });
        let payload = STANDARD.encode(serde_json::to_vec(&json).unwrap());

        let submission = decode(&payload).unwrap();
        assert_eq!(submission.vendor, Vendor::Apple);
        assert_eq!(submission.blob, "base64-receipt-data");
    }

    #[test]
    fn rejects_non_base64() {
        assert!(decode("not base64!!").is_err());
    }
}
