//! Renewal Orchestrator (C9): turns a verified vendor notification or a
//! custodial payment confirmation into an order transition (spec §4.9).

use {
    chrono::{DateTime, Utc},
    skus_database::{orders, payment_history::PaymentHistoryRow, PgTransaction},
    skus_model::Error,
    skus_vendor::NotificationAction,
    uuid::Uuid,
};

/// A custodial payment confirmation: the order is renewed once the summed
/// transaction amount meets or exceeds the order's total price.
pub struct CustodialConfirmation {
    pub order_id: Uuid,
    pub external_id: String,
    pub amount: bigdecimal::BigDecimal,
    pub currency: String,
}

pub async fn apply_apple_notification(
    tx: &mut PgTransaction<'_>,
    notification: &skus_vendor::apple::VerifiedNotification,
    amount: &bigdecimal::BigDecimal,
    currency: &str,
) -> Result<(), Error> {
    let order = orders::get_by_external_id(tx, &notification.original_transaction_id)
        .await
        .map_err(anyhow::Error::from)?
        .ok_or(Error::NotFound)?;

    match notification.action {
        NotificationAction::Renew => {
            renew(
                tx,
                order.id,
                notification.expires_at,
                &notification.original_transaction_id,
                "apple",
                amount,
                currency,
            )
            .await
        }
        NotificationAction::Cancel => crate::orders::cancel(tx, order.id).await,
        NotificationAction::Drop => Ok(()),
    }
}

pub async fn apply_google_notification(
    tx: &mut PgTransaction<'_>,
    notification: &skus_vendor::google::VerifiedNotification,
    fetched_expiry: DateTime<Utc>,
    amount: &bigdecimal::BigDecimal,
    currency: &str,
) -> Result<(), Error> {
    let order = orders::get_by_external_id(tx, &notification.purchase_token)
        .await
        .map_err(anyhow::Error::from)?
        .ok_or(Error::NotFound)?;

    match notification.action {
        NotificationAction::Renew => {
            renew(tx, order.id, fetched_expiry, &notification.purchase_token, "google", amount, currency).await
        }
        NotificationAction::Cancel => crate::orders::cancel(tx, order.id).await,
        NotificationAction::Drop => Ok(()),
    }
}

/// Renews an order from a custodial transaction once its cumulative amount
/// meets the order's total price (spec §4.9 "custodial transaction sum ≥
/// order total").
pub async fn apply_custodial_confirmation(tx: &mut PgTransaction<'_>, confirmation: &CustodialConfirmation) -> Result<(), Error> {
    let order = orders::get(tx, confirmation.order_id).await.map_err(anyhow::Error::from)?.ok_or(Error::NotFound)?;
    if confirmation.amount < order.total_price {
        return Ok(());
    }
    let expires_at = Utc::now() + order.valid_for;
    renew(tx, order.id, expires_at, &confirmation.external_id, "custodial", &confirmation.amount, &confirmation.currency).await
}

async fn renew(
    tx: &mut PgTransaction<'_>,
    order_id: Uuid,
    expires_at: DateTime<Utc>,
    external_id: &str,
    vendor: &str,
    amount: &bigdecimal::BigDecimal,
    currency: &str,
) -> Result<(), Error> {
    let history = PaymentHistoryRow {
        order_id,
        vendor: vendor.to_string(),
        external_id: external_id.to_string(),
        amount: amount.clone(),
        currency: currency.to_string(),
        recorded_at: Utc::now(),
    };
    crate::orders::renew(tx, order_id, expires_at, &history).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use {
        skus_model::{Order, OrderStatus},
        sqlx::Connection,
        std::collections::{HashMap, HashSet},
    };

    fn sample_order(id: Uuid, total_price: &str) -> Order {
        Order {
            id,
            merchant_id: "brave.com".into(),
            currency: "USD".into(),
            status: OrderStatus::Pending,
            total_price: total_price.parse().unwrap(),
            location: None,
            allowed_payment_methods: HashSet::from(["custodial".to_string()]),
            valid_for: chrono::Duration::days(30),
            created_at: Utc::now(),
            last_paid_at: None,
            expires_at: None,
            metadata: HashMap::new(),
            external_id: None,
        }
    }

    #[tokio::test]
    #[ignore]
    async fn postgres_custodial_confirmation_below_total_is_a_noop() {
        let mut db = sqlx::PgConnection::connect("postgresql://").await.unwrap();
        let mut tx = db.begin().await.unwrap();
        skus_database::clear_DANGER_(&mut tx).await.unwrap();

        let order_id = Uuid::new_v4();
        orders::create(&mut tx, &sample_order(order_id, "10.00")).await.unwrap();

        let confirmation = CustodialConfirmation {
            order_id,
            external_id: "tx-1".into(),
            amount: "5.00".parse().unwrap(),
            currency: "USD".into(),
        };
        apply_custodial_confirmation(&mut tx, &confirmation).await.unwrap();

        let order = orders::get(&mut tx, order_id).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Pending);
    }

    #[tokio::test]
    #[ignore]
    async fn postgres_custodial_confirmation_meeting_total_renews() {
        let mut db = sqlx::PgConnection::connect("postgresql://").await.unwrap();
        let mut tx = db.begin().await.unwrap();
        skus_database::clear_DANGER_(&mut tx).await.unwrap();

        let order_id = Uuid::new_v4();
        orders::create(&mut tx, &sample_order(order_id, "10.00")).await.unwrap();

        let confirmation = CustodialConfirmation {
            order_id,
            external_id: "tx-2".into(),
            amount: "10.00".parse().unwrap(),
            currency: "USD".into(),
        };
        apply_custodial_confirmation(&mut tx, &confirmation).await.unwrap();

        let order = orders::get(&mut tx, order_id).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Paid);
    }
}
