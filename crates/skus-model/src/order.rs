use {
    crate::OrderMetadataValue,
    bigdecimal::BigDecimal,
    chrono::{DateTime, Utc},
    std::collections::{HashMap, HashSet},
    uuid::Uuid,
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, strum::Display, strum::EnumString, serde::Serialize, serde::Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    #[default]
    Pending,
    Paid,
    Canceled,
}

/// One row of the `orders` table (spec §3 "Order").
#[derive(Clone, Debug, PartialEq)]
pub struct Order {
    pub id: Uuid,
    pub merchant_id: String,
    pub currency: String,
    pub status: OrderStatus,
    pub total_price: BigDecimal,
    pub location: Option<String>,
    pub allowed_payment_methods: HashSet<String>,
    pub valid_for: chrono::Duration,
    pub created_at: DateTime<Utc>,
    pub last_paid_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub metadata: HashMap<String, OrderMetadataValue>,
    /// Stable external id assigned by a vendor receipt/notification (spec §4.10).
    pub external_id: Option<String>,
}

impl Order {
    /// Whether the order is eligible to have credentials requested for it.
    pub fn is_paid(&self) -> bool {
        self.status == OrderStatus::Paid
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_strings() {
        for status in [OrderStatus::Pending, OrderStatus::Paid, OrderStatus::Canceled] {
            let s = status.to_string();
            let parsed: OrderStatus = s.parse().unwrap();
            assert_eq!(parsed, status);
        }
    }
}
