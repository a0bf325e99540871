//! Persistence for the `order_payment_history` table (SPEC_FULL §C.2: the
//! row shape C9 appends on every renewal).

use {
    bigdecimal::BigDecimal,
    chrono::{DateTime, Utc},
    sqlx::PgConnection,
    uuid::Uuid,
};

#[derive(Clone, Debug, PartialEq, sqlx::FromRow)]
pub struct PaymentHistoryRow {
    pub order_id: Uuid,
    pub vendor: String,
    pub external_id: String,
    pub amount: BigDecimal,
    pub currency: String,
    pub recorded_at: DateTime<Utc>,
}

pub async fn insert(ex: &mut PgConnection, row: &PaymentHistoryRow) -> Result<(), sqlx::Error> {
    const QUERY: &str = r#"
INSERT INTO order_payment_history (order_id, vendor, external_id, amount, currency, recorded_at)
VALUES ($1, $2, $3, $4, $5, $6)
    "#;
    sqlx::query(QUERY)
        .bind(row.order_id)
        .bind(&row.vendor)
        .bind(&row.external_id)
        .bind(&row.amount)
        .bind(&row.currency)
        .bind(row.recorded_at)
        .execute(ex)
        .await?;
    Ok(())
}

pub async fn list_for_order(ex: &mut PgConnection, order_id: Uuid) -> Result<Vec<PaymentHistoryRow>, sqlx::Error> {
    const QUERY: &str = "SELECT * FROM order_payment_history WHERE order_id = $1 ORDER BY recorded_at";
    sqlx::query_as(QUERY).bind(order_id).fetch_all(ex).await
}
