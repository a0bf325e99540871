//! Issuer identity and canonical name encoding (spec §3, §9 "Issuer
//! encoding"). The canonical name is `merchant_id + "?sku=" + urlencode(sku)`;
//! `merchant_id` itself is never encoded, only `sku` is, so decoding is a
//! single split on the literal separator.

const SEPARATOR: &str = "?sku=";

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Issuer {
    /// Canonical encoded name, e.g. `brave.com?sku=...`.
    pub id: String,
    pub merchant_id: String,
    pub public_key: String,
}

/// Encodes `(merchant_id, sku)` into the canonical issuer name.
pub fn encode_issuer(merchant_id: &str, sku: &str) -> String {
    let encoded_sku: String = url::form_urlencoded::byte_serialize(sku.as_bytes()).collect();
    format!("{merchant_id}{SEPARATOR}{encoded_sku}")
}

/// Inverse of [`encode_issuer`].
pub fn decode_issuer(name: &str) -> Option<(String, String)> {
    let (merchant_id, encoded_sku) = name.split_once(SEPARATOR)?;
    let sku = url::form_urlencoded::parse(encoded_sku.as_bytes())
        .next()
        .map(|(k, _)| k.into_owned())
        .unwrap_or_default();
    Some((merchant_id.to_string(), sku))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("brave.com", "sku-123")]
    #[case("brave.com", "")]
    #[case("", "sku-123")]
    #[case("", "")]
    #[case("brave.com", "a sku with spaces & stuff")]
    fn round_trips(#[case] merchant: &str, #[case] sku: &str) {
        let encoded = encode_issuer(merchant, sku);
        let (decoded_merchant, decoded_sku) = decode_issuer(&encoded).unwrap();
        assert_eq!(decoded_merchant, merchant);
        assert_eq!(decoded_sku, sku);
    }

    #[test]
    fn canonical_form() {
        assert_eq!(encode_issuer("brave.com", "my-sku"), "brave.com?sku=my-sku");
    }
}
