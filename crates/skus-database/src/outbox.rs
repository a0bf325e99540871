//! Persistence for the `outbox` table (spec §3 "OutboxRow", §4.4 "Outbox").

use {
    crate::PgTransaction,
    chrono::{DateTime, Utc},
    sqlx::PgConnection,
    uuid::Uuid,
};

#[derive(Clone, Debug, PartialEq, sqlx::FromRow)]
pub struct OutboxRow {
    pub request_id: Uuid,
    pub order_id: Uuid,
    pub item_id: Uuid,
    pub message: serde_json::Value,
    pub submitted_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub failed_reason: Option<String>,
}

/// Inserts a new row. Unique on `request_id`; a duplicate insert fails with
/// a Postgres unique violation that callers map to `Error::DupRequest`
/// (spec §4.4, §7).
pub async fn insert(
    ex: &mut PgConnection,
    request_id: Uuid,
    order_id: Uuid,
    item_id: Uuid,
    message: &serde_json::Value,
) -> Result<(), sqlx::Error> {
    const QUERY: &str = r#"
INSERT INTO outbox (request_id, order_id, item_id, message)
VALUES ($1, $2, $3, $4)
    "#;
    sqlx::query(QUERY)
        .bind(request_id)
        .bind(order_id)
        .bind(item_id)
        .bind(message)
        .execute(ex)
        .await?;
    Ok(())
}

pub async fn get_by_request_id(ex: &mut PgConnection, request_id: Uuid) -> Result<Option<OutboxRow>, sqlx::Error> {
    const QUERY: &str =
        "SELECT request_id, order_id, item_id, message, submitted_at, completed_at, failed_reason FROM outbox WHERE request_id = $1";
    sqlx::query_as(QUERY).bind(request_id).fetch_optional(ex).await
}

/// Claims up to `limit` unsent rows, ordered by insertion, and marks them
/// submitted in the same statement (spec §4.4, §4.5: publish-then-commit).
/// `SELECT ... FOR UPDATE SKIP LOCKED` lets multiple producers run
/// concurrently without claiming the same row twice.
pub async fn next_batch(tx: &mut PgTransaction<'_>, limit: i64) -> Result<Vec<OutboxRow>, sqlx::Error> {
    const QUERY: &str = r#"
WITH claimed AS (
    SELECT request_id
    FROM outbox
    WHERE submitted_at IS NULL
    ORDER BY seq
    FOR UPDATE SKIP LOCKED
    LIMIT $1
)
UPDATE outbox
SET submitted_at = now()
FROM claimed
WHERE outbox.request_id = claimed.request_id
RETURNING outbox.request_id, outbox.order_id, outbox.item_id, outbox.message, outbox.submitted_at, outbox.completed_at, outbox.failed_reason
    "#;
    sqlx::query_as(QUERY).bind(limit).fetch_all(&mut **tx).await
}

/// Sets `completed_at` iff it is currently NULL, returning whether this call
/// performed the transition (spec §4.4, used for consumer idempotence).
pub async fn mark_completed(ex: &mut PgConnection, request_id: Uuid, when: DateTime<Utc>) -> Result<bool, sqlx::Error> {
    const QUERY: &str = "UPDATE outbox SET completed_at = $2 WHERE request_id = $1 AND completed_at IS NULL";
    let result = sqlx::query(QUERY).bind(request_id).bind(when).execute(ex).await?;
    Ok(result.rows_affected() > 0)
}

/// Marks a row completed with a failure reason, without inserting any
/// credentials (spec §4.6 step 5: `status != ok`).
pub async fn mark_failed(ex: &mut PgConnection, request_id: Uuid, when: DateTime<Utc>, reason: &str) -> Result<bool, sqlx::Error> {
    const QUERY: &str =
        "UPDATE outbox SET completed_at = $2, failed_reason = $3 WHERE request_id = $1 AND completed_at IS NULL";
    let result = sqlx::query(QUERY).bind(request_id).bind(when).bind(reason).execute(ex).await?;
    Ok(result.rows_affected() > 0)
}

pub async fn delete_by_order(ex: &mut PgConnection, order_id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM outbox WHERE order_id = $1").bind(order_id).execute(ex).await?;
    Ok(())
}

/// Count of rows not yet claimed by a producer tick (spec §4.4 backlog).
pub async fn count_pending(ex: &mut PgConnection) -> Result<i64, sqlx::Error> {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM outbox WHERE submitted_at IS NULL").fetch_one(ex).await?;
    Ok(count)
}

/// Durations of the last `limit` completed rows, most recent first, used to
/// derive the `Retry-After` hint for pending credential reads (spec §4.4).
pub async fn recent_durations(ex: &mut PgConnection, limit: i64) -> Result<Vec<chrono::Duration>, sqlx::Error> {
    #[derive(sqlx::FromRow)]
    struct Row {
        submitted_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
    }
    const QUERY: &str = r#"
SELECT submitted_at, completed_at
FROM outbox
WHERE completed_at IS NOT NULL
ORDER BY completed_at DESC
LIMIT $1
    "#;
    let rows: Vec<Row> = sqlx::query_as(QUERY).bind(limit).fetch_all(ex).await?;
    Ok(rows.into_iter().map(|r| r.completed_at - r.submitted_at).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use skus_model::{Order, OrderStatus};
    use sqlx::{Connection, PgConnection as RawPgConnection};
    use std::collections::{HashMap, HashSet};

    fn sample_order(id: Uuid) -> Order {
        Order {
            id,
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
    async fn postgres_duplicate_request_id_is_rejected() {
        let mut db = RawPgConnection::connect("postgresql://").await.unwrap();
        let mut db = db.begin().await.unwrap();
        crate::clear_DANGER_(&mut db).await.unwrap();

        let request_id = Uuid::new_v4();
        let order_id = Uuid::new_v4();
        let item_id = Uuid::new_v4();
        crate::orders::create(&mut db, &sample_order(order_id)).await.unwrap();

        insert(&mut db, request_id, order_id, item_id, &serde_json::json!({})).await.unwrap();
        let err = insert(&mut db, request_id, order_id, item_id, &serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(crate::is_duplicate_record_error(&err));
    }

    #[tokio::test]
    #[ignore]
    async fn postgres_next_batch_claims_in_insertion_order() {
        let mut db = RawPgConnection::connect("postgresql://").await.unwrap();
        let mut tx = db.begin().await.unwrap();
        crate::clear_DANGER_(&mut tx).await.unwrap();

        let order_id = Uuid::new_v4();
        crate::orders::create(&mut tx, &sample_order(order_id)).await.unwrap();
        let mut ids = Vec::new();
        for _ in 0..3 {
            let request_id = Uuid::new_v4();
            ids.push(request_id);
            insert(&mut tx, request_id, order_id, Uuid::new_v4(), &serde_json::json!({})).await.unwrap();
        }

        let batch = next_batch(&mut tx, 10).await.unwrap();
        assert_eq!(batch.iter().map(|r| r.request_id).collect::<Vec<_>>(), ids);
        assert!(batch.iter().all(|r| r.submitted_at.is_some()));
    }
}
