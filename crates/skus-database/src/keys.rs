//! Persistence for the `api_keys` table (spec §3 "Key", §4.3).

use {chrono::{DateTime, Utc}, skus_model::Key, sqlx::PgConnection, uuid::Uuid};

#[derive(sqlx::FromRow)]
struct KeyRow {
    id: Uuid,
    name: String,
    merchant_id: String,
    encrypted_secret_key: String,
    nonce: String,
    created_at: DateTime<Utc>,
    expiry: Option<DateTime<Utc>>,
}

impl From<KeyRow> for Key {
    fn from(row: KeyRow) -> Self {
        Key {
            id: row.id,
            name: row.name,
            merchant_id: row.merchant_id,
            encrypted_secret_key: row.encrypted_secret_key,
            nonce: row.nonce,
            created_at: row.created_at,
            expiry: row.expiry,
        }
    }
}

pub async fn create(ex: &mut PgConnection, key: &Key) -> Result<(), sqlx::Error> {
    const QUERY: &str = r#"
INSERT INTO api_keys (id, name, merchant_id, encrypted_secret_key, nonce, created_at, expiry)
VALUES ($1, $2, $3, $4, $5, $6, $7)
    "#;
    sqlx::query(QUERY)
        .bind(key.id)
        .bind(&key.name)
        .bind(&key.merchant_id)
        .bind(&key.encrypted_secret_key)
        .bind(&key.nonce)
        .bind(key.created_at)
        .bind(key.expiry)
        .execute(ex)
        .await?;
    Ok(())
}

pub async fn get(ex: &mut PgConnection, id: Uuid) -> Result<Option<Key>, sqlx::Error> {
    const QUERY: &str = "SELECT * FROM api_keys WHERE id = $1";
    let row: Option<KeyRow> = sqlx::query_as(QUERY).bind(id).fetch_optional(ex).await?;
    Ok(row.map(Key::from))
}

/// All of a merchant's keys, newest first. TLV1 derivation (spec §4.8) uses
/// the first entry to sign and all entries to verify, since a merchant may
/// rotate keys without invalidating credentials issued under an older one.
pub async fn list_by_merchant(ex: &mut PgConnection, merchant_id: &str) -> Result<Vec<Key>, sqlx::Error> {
    const QUERY: &str = "SELECT * FROM api_keys WHERE merchant_id = $1 ORDER BY created_at DESC";
    let rows: Vec<KeyRow> = sqlx::query_as(QUERY).bind(merchant_id).fetch_all(ex).await?;
    Ok(rows.into_iter().map(Key::from).collect())
}
