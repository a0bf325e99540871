//! Persistence for the `tlv2_creds` table (spec §3 "TLV2Cred").

use {
    chrono::{DateTime, Utc},
    sqlx::PgConnection,
    uuid::Uuid,
};

#[derive(Clone, Debug, PartialEq, sqlx::FromRow)]
pub struct Tlv2Cred {
    pub item_id: Uuid,
    pub order_id: Uuid,
    pub request_id: Uuid,
    pub issuer_id: String,
    pub valid_from: DateTime<Utc>,
    pub valid_to: DateTime<Utc>,
    pub blinded_creds: Vec<String>,
    pub signed_creds: Vec<String>,
    pub batch_proof: String,
    pub public_key: String,
}

/// Inserts one row, resolving a `(item_id, valid_from, valid_to)` conflict by
/// keeping the first writer and silently dropping the duplicate (spec §4.6
/// step 6).
pub async fn insert(ex: &mut PgConnection, cred: &Tlv2Cred) -> Result<(), sqlx::Error> {
    const QUERY: &str = r#"
INSERT INTO tlv2_creds (
    item_id, order_id, request_id, issuer_id, valid_from, valid_to,
    blinded_creds, signed_creds, batch_proof, public_key
)
VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
ON CONFLICT (item_id, valid_from, valid_to) DO NOTHING
    "#;
    sqlx::query(QUERY)
        .bind(cred.item_id)
        .bind(cred.order_id)
        .bind(cred.request_id)
        .bind(&cred.issuer_id)
        .bind(cred.valid_from)
        .bind(cred.valid_to)
        .bind(&cred.blinded_creds)
        .bind(&cred.signed_creds)
        .bind(&cred.batch_proof)
        .bind(&cred.public_key)
        .execute(ex)
        .await?;
    Ok(())
}

pub async fn list_for_request(
    ex: &mut PgConnection,
    order_id: Uuid,
    item_id: Uuid,
    request_id: Uuid,
) -> Result<Vec<Tlv2Cred>, sqlx::Error> {
    const QUERY: &str = r#"
SELECT * FROM tlv2_creds
WHERE order_id = $1 AND item_id = $2 AND request_id = $3
ORDER BY valid_from
    "#;
    sqlx::query_as(QUERY).bind(order_id).bind(item_id).bind(request_id).fetch_all(ex).await
}

/// Counts non-overlapping batches already claimed for `(order_id, item_id)`
/// within `[from, to]`, used to enforce `maxTLV2ActiveDailyItemCreds` (spec
/// §5, §9 Open Questions).
pub async fn uniq_batches(
    ex: &mut PgConnection,
    order_id: Uuid,
    item_id: Uuid,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> Result<i64, sqlx::Error> {
    const QUERY: &str = r#"
SELECT count(DISTINCT (valid_from, valid_to))
FROM tlv2_creds
WHERE order_id = $1 AND item_id = $2 AND valid_from >= $3 AND valid_to <= $4
    "#;
    sqlx::query_scalar(QUERY).bind(order_id).bind(item_id).bind(from).bind(to).fetch_one(ex).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::{Connection, PgConnection as RawPgConnection};

    fn sample(order_id: Uuid, item_id: Uuid, request_id: Uuid, from: DateTime<Utc>, to: DateTime<Utc>) -> Tlv2Cred {
        Tlv2Cred {
            item_id,
            order_id,
            request_id,
            issuer_id: "brave.com?sku=premium".into(),
            valid_from: from,
            valid_to: to,
            blinded_creds: vec!["AAAA".into()],
            signed_creds: vec!["BBBB".into()],
            batch_proof: "proof".into(),
            public_key: "pk".into(),
        }
    }

    #[tokio::test]
    #[ignore]
    async fn postgres_duplicate_interval_is_dropped_silently() {
        let mut db = RawPgConnection::connect("postgresql://").await.unwrap();
        let mut db = db.begin().await.unwrap();
        crate::clear_DANGER_(&mut db).await.unwrap();

        let order_id = Uuid::new_v4();
        let item_id = Uuid::new_v4();
        let from = Utc::now();
        let to = from + chrono::Duration::days(1);

        let first = sample(order_id, item_id, Uuid::new_v4(), from, to);
        insert(&mut db, &first).await.unwrap();
        let second = sample(order_id, item_id, Uuid::new_v4(), from, to);
        insert(&mut db, &second).await.unwrap();

        let rows = list_for_request(&mut db, order_id, item_id, first.request_id).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].request_id, first.request_id);
    }
}
