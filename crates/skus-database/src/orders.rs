//! Persistence for the `orders` table (spec §3 "Order", §4.2 "Order Store").

use {
    crate::PgTransaction,
    bigdecimal::BigDecimal,
    chrono::{DateTime, Utc},
    skus_model::{Order, OrderStatus},
    sqlx::PgConnection,
    std::{collections::HashMap, str::FromStr},
    uuid::Uuid,
};

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    merchant_id: String,
    currency: String,
    status: String,
    total_price: BigDecimal,
    location: Option<String>,
    allowed_payment_methods: Vec<String>,
    valid_for_seconds: i64,
    created_at: DateTime<Utc>,
    last_paid_at: Option<DateTime<Utc>>,
    expires_at: Option<DateTime<Utc>>,
    external_id: Option<String>,
    metadata: serde_json::Value,
}

impl TryFrom<OrderRow> for Order {
    type Error = sqlx::Error;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let status = OrderStatus::from_str(&row.status)
            .map_err(|err| sqlx::Error::Decode(Box::new(err)))?;
        let metadata: HashMap<String, skus_model::OrderMetadataValue> =
            serde_json::from_value(row.metadata).map_err(|err| sqlx::Error::Decode(Box::new(err)))?;
        Ok(Order {
            id: row.id,
            merchant_id: row.merchant_id,
            currency: row.currency,
            status,
            total_price: row.total_price,
            location: row.location,
            allowed_payment_methods: row.allowed_payment_methods.into_iter().collect(),
            valid_for: chrono::Duration::seconds(row.valid_for_seconds),
            created_at: row.created_at,
            last_paid_at: row.last_paid_at,
            expires_at: row.expires_at,
            metadata,
            external_id: row.external_id,
        })
    }
}

pub async fn create(ex: &mut PgConnection, order: &Order) -> Result<(), sqlx::Error> {
    const QUERY: &str = r#"
INSERT INTO orders (
    id, merchant_id, currency, status, total_price, location,
    allowed_payment_methods, valid_for_seconds, created_at, last_paid_at,
    expires_at, external_id, metadata
)
VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
    "#;
    let allowed_payment_methods: Vec<String> = order.allowed_payment_methods.iter().cloned().collect();
    let metadata = serde_json::to_value(&order.metadata).expect("OrderMetadataValue always serializes");
    sqlx::query(QUERY)
        .bind(order.id)
        .bind(&order.merchant_id)
        .bind(&order.currency)
        .bind(order.status.to_string())
        .bind(&order.total_price)
        .bind(&order.location)
        .bind(allowed_payment_methods)
        .bind(order.valid_for.num_seconds())
        .bind(order.created_at)
        .bind(order.last_paid_at)
        .bind(order.expires_at)
        .bind(&order.external_id)
        .bind(metadata)
        .execute(ex)
        .await?;
    Ok(())
}

pub async fn get(ex: &mut PgConnection, id: Uuid) -> Result<Option<Order>, sqlx::Error> {
    const QUERY: &str = "SELECT * FROM orders WHERE id = $1";
    let row: Option<OrderRow> = sqlx::query_as(QUERY).bind(id).fetch_optional(ex).await?;
    row.map(Order::try_from).transpose()
}

pub async fn get_by_external_id(ex: &mut PgConnection, external_id: &str) -> Result<Option<Order>, sqlx::Error> {
    const QUERY: &str = "SELECT * FROM orders WHERE external_id = $1";
    let row: Option<OrderRow> = sqlx::query_as(QUERY).bind(external_id).fetch_optional(ex).await?;
    row.map(Order::try_from).transpose()
}

pub async fn set_status(ex: &mut PgConnection, id: Uuid, status: OrderStatus) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE orders SET status = $2 WHERE id = $1")
        .bind(id)
        .bind(status.to_string())
        .execute(ex)
        .await?;
    Ok(())
}

pub async fn set_expires_at(ex: &mut PgConnection, id: Uuid, expires_at: DateTime<Utc>) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE orders SET expires_at = $2 WHERE id = $1")
        .bind(id)
        .bind(expires_at)
        .execute(ex)
        .await?;
    Ok(())
}

pub async fn set_last_paid_at(ex: &mut PgConnection, id: Uuid, when: DateTime<Utc>) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE orders SET last_paid_at = $2 WHERE id = $1")
        .bind(id)
        .bind(when)
        .execute(ex)
        .await?;
    Ok(())
}

/// Overwrites `key` in the order's metadata bag (spec §4.2: the reference
/// implementation overwrites rather than merges; preserved verbatim).
pub async fn append_metadata(ex: &mut PgConnection, id: Uuid, key: &str, value: &str) -> Result<(), sqlx::Error> {
    merge_metadata(ex, id, key, serde_json::Value::String(value.to_string())).await
}

pub async fn append_metadata_int(ex: &mut PgConnection, id: Uuid, key: &str, value: i32) -> Result<(), sqlx::Error> {
    merge_metadata(ex, id, key, serde_json::Value::from(value)).await
}

pub async fn append_metadata_int64(ex: &mut PgConnection, id: Uuid, key: &str, value: i64) -> Result<(), sqlx::Error> {
    merge_metadata(ex, id, key, serde_json::Value::from(value)).await
}

async fn merge_metadata(ex: &mut PgConnection, id: Uuid, key: &str, value: serde_json::Value) -> Result<(), sqlx::Error> {
    const QUERY: &str = "UPDATE orders SET metadata = metadata || jsonb_build_object($2::text, $3::jsonb) WHERE id = $1";
    sqlx::query(QUERY).bind(id).bind(key).bind(value).execute(ex).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::{Connection, PgConnection as RawPgConnection};
    use std::collections::HashSet;

    fn sample_order() -> Order {
        Order {
            id: Uuid::new_v4(),
            merchant_id: "brave.com".into(),
            currency: "USD".into(),
            status: OrderStatus::Pending,
            total_price: "9.99".parse().unwrap(),
            location: None,
            allowed_payment_methods: HashSet::from(["stripe".to_string()]),
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
    async fn postgres_create_and_get_round_trips() {
        let mut db = RawPgConnection::connect("postgresql://").await.unwrap();
        let mut db = db.begin().await.unwrap();
        crate::clear_DANGER_(&mut db).await.unwrap();

        let order = sample_order();
        create(&mut db, &order).await.unwrap();
        let fetched = get(&mut db, order.id).await.unwrap().unwrap();
        assert_eq!(fetched, order);
    }

    #[tokio::test]
    #[ignore]
    async fn postgres_metadata_append_overwrites() {
        let mut db = RawPgConnection::connect("postgresql://").await.unwrap();
        let mut db = db.begin().await.unwrap();
        crate::clear_DANGER_(&mut db).await.unwrap();

        let order = sample_order();
        create(&mut db, &order).await.unwrap();
        append_metadata(&mut db, order.id, "stripe_session_id", "sess_1").await.unwrap();
        append_metadata(&mut db, order.id, "stripe_session_id", "sess_2").await.unwrap();
        let fetched = get(&mut db, order.id).await.unwrap().unwrap();
        assert_eq!(
            fetched.metadata.get("stripe_session_id"),
            Some(&skus_model::OrderMetadataValue::String("sess_2".into()))
        );
    }
}
