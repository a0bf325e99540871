//! Order Store (C2): persists orders, items, metadata, payment history,
//! transactionally (spec §3 "Order"/"OrderItem", §4.2).

use {
    skus_database::{order_items, orders, payment_history, PgTransaction},
    skus_model::{Error, Order, OrderItem, OrderStatus},
    uuid::Uuid,
};

/// Validates the cross-item invariants spec §3 states (shared currency/
/// location/payment methods, subtotal = price * quantity, total = sum of
/// subtotals) before persisting.
pub fn validate_new_order(order: &Order, items: &[OrderItem]) -> Result<(), Error> {
    if items.is_empty() {
        return Err(Error::NoItems);
    }
    for item in items {
        if item.subtotal != item.expected_subtotal() {
            return Err(anyhow::anyhow!("item {} subtotal does not match price * quantity", item.id).into());
        }
    }
    let total = items
        .iter()
        .fold(bigdecimal::BigDecimal::from(0), |acc, item| acc + &item.subtotal);
    if total != order.total_price {
        return Err(anyhow::anyhow!("order total_price does not match sum of item subtotals").into());
    }
    Ok(())
}

pub async fn create(tx: &mut PgTransaction<'_>, order: &Order, items: &[OrderItem]) -> Result<(), Error> {
    validate_new_order(order, items)?;
    orders::create(tx, order).await.map_err(anyhow::Error::from)?;
    for item in items {
        order_items::insert(tx, item).await.map_err(anyhow::Error::from)?;
    }
    Ok(())
}

pub async fn get(tx: &mut PgTransaction<'_>, id: Uuid) -> Result<Order, Error> {
    orders::get(tx, id).await.map_err(anyhow::Error::from)?.ok_or(Error::NotFound)
}

pub async fn get_by_external_id(tx: &mut PgTransaction<'_>, external_id: &str) -> Result<Order, Error> {
    orders::get_by_external_id(tx, external_id).await.map_err(anyhow::Error::from)?.ok_or(Error::NotFound)
}

pub async fn get_item(tx: &mut PgTransaction<'_>, order_id: Uuid, item_id: Uuid) -> Result<OrderItem, Error> {
    let item = order_items::get(tx, item_id).await.map_err(anyhow::Error::from)?.ok_or(Error::NotFound)?;
    if item.order_id != order_id {
        return Err(Error::NotFound);
    }
    Ok(item)
}

/// Renews an order in one transaction: marks it paid, extends expiry,
/// records the payment time and a payment-history row (spec §4.9).
pub async fn renew(
    tx: &mut PgTransaction<'_>,
    order_id: Uuid,
    new_expires_at: chrono::DateTime<chrono::Utc>,
    history: &payment_history::PaymentHistoryRow,
) -> Result<(), Error> {
    orders::set_status(tx, order_id, OrderStatus::Paid).await.map_err(anyhow::Error::from)?;
    orders::set_expires_at(tx, order_id, new_expires_at).await.map_err(anyhow::Error::from)?;
    orders::set_last_paid_at(tx, order_id, chrono::Utc::now()).await.map_err(anyhow::Error::from)?;
    payment_history::insert(tx, history).await.map_err(anyhow::Error::from)?;
    Ok(())
}

pub async fn cancel(tx: &mut PgTransaction<'_>, order_id: Uuid) -> Result<(), Error> {
    orders::set_status(tx, order_id, OrderStatus::Canceled).await.map_err(anyhow::Error::from)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{
        collections::{HashMap, HashSet},
        str::FromStr,
    };

    fn sample_item(order_id: Uuid, price: &str, quantity: u32) -> OrderItem {
        let subtotal = bigdecimal::BigDecimal::from_str(price).unwrap() * bigdecimal::BigDecimal::from(quantity);
        OrderItem {
            id: Uuid::new_v4(),
            order_id,
            sku: "premium".into(),
            credential_type: Default::default(),
            quantity,
            price: price.parse().unwrap(),
            subtotal,
            valid_for_iso: skus_model::iso8601::parse("P1M").unwrap(),
            each_credential_valid_for_iso: None,
            issuance_interval_iso: skus_model::iso8601::parse("P1D").unwrap(),
            issuer_config: Default::default(),
        }
    }

    fn sample_order(id: Uuid, total_price: &str) -> Order {
        Order {
            id,
            merchant_id: "brave.com".into(),
            currency: "USD".into(),
            status: OrderStatus::Pending,
            total_price: total_price.parse().unwrap(),
            location: None,
            allowed_payment_methods: HashSet::from(["stripe".to_string()]),
            valid_for: chrono::Duration::days(30),
            created_at: chrono::Utc::now(),
            last_paid_at: None,
            expires_at: None,
            metadata: HashMap::new(),
            external_id: None,
        }
    }

    #[test]
    fn rejects_empty_item_list() {
        let order = sample_order(Uuid::new_v4(), "0");
        assert!(matches!(validate_new_order(&order, &[]), Err(Error::NoItems)));
    }

    #[test]
    fn rejects_mismatched_total() {
        let order_id = Uuid::new_v4();
        let order = sample_order(order_id, "100.00");
        let items = [sample_item(order_id, "2.50", 3)];
        assert!(validate_new_order(&order, &items).is_err());
    }

    #[test]
    fn accepts_matching_total() {
        let order_id = Uuid::new_v4();
        let order = sample_order(order_id, "7.50");
        let items = [sample_item(order_id, "2.50", 3)];
        assert!(validate_new_order(&order, &items).is_ok());
    }
}
