use {crate::iso8601::Iso8601Duration, bigdecimal::BigDecimal, uuid::Uuid};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, strum::Display, strum::EnumString, serde::Serialize, serde::Deserialize)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum CredentialType {
    #[default]
    SingleUse,
    TimeLimited,
    TimeLimitedV2,
}

/// `issuer_config` of an order item: non-negative `buffer`/`overlap` with
/// defaults 30/5 (spec §3).
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct IssuerConfig {
    pub buffer: u32,
    pub overlap: u32,
}

impl Default for IssuerConfig {
    fn default() -> Self {
        Self { buffer: 30, overlap: 5 }
    }
}

/// One row of the `order_items` table (spec §3 "OrderItem").
#[derive(Clone, Debug, PartialEq)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub sku: String,
    pub credential_type: CredentialType,
    pub quantity: u32,
    pub price: BigDecimal,
    pub subtotal: BigDecimal,
    pub valid_for_iso: Iso8601Duration,
    pub each_credential_valid_for_iso: Option<Iso8601Duration>,
    pub issuance_interval_iso: Iso8601Duration,
    pub issuer_config: IssuerConfig,
}

impl OrderItem {
    /// `subtotal = price * quantity`, the invariant spec §3 states.
    pub fn expected_subtotal(&self) -> BigDecimal {
        &self.price * BigDecimal::from(self.quantity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn subtotal_is_price_times_quantity() {
        let item = OrderItem {
            id: Uuid::new_v4(),
            order_id: Uuid::new_v4(),
            sku: "sku".into(),
            credential_type: CredentialType::SingleUse,
            quantity: 3,
            price: BigDecimal::from_str("2.50").unwrap(),
            subtotal: BigDecimal::from_str("7.50").unwrap(),
            valid_for_iso: crate::iso8601::parse("P1M").unwrap(),
            each_credential_valid_for_iso: None,
            issuance_interval_iso: crate::iso8601::parse("P1D").unwrap(),
            issuer_config: IssuerConfig::default(),
        };
        assert_eq!(item.expected_subtotal(), item.subtotal);
    }

    #[test]
    fn default_issuer_config_matches_spec() {
        let config = IssuerConfig::default();
        assert_eq!(config.buffer, 30);
        assert_eq!(config.overlap, 5);
    }
}
