//! Persistence for the `issuers` table (spec §3 "Issuer", §4.1). The unique
//! index named in spec §6 is `issuers(merchant_id)`; that physical column
//! holds the canonical encoded issuer name (see DESIGN.md "Issuer row
//! naming"), decoded into `Issuer::merchant_id`/sku at the application layer.

use {skus_model::issuer::decode_issuer, sqlx::PgConnection};

#[derive(sqlx::FromRow)]
struct IssuerRow {
    merchant_id: String,
    public_key: String,
}

pub struct Issuer {
    pub id: String,
    pub merchant_id: String,
    pub public_key: String,
}

fn from_row(row: IssuerRow) -> Result<Issuer, sqlx::Error> {
    let (merchant_id, _sku) = decode_issuer(&row.merchant_id)
        .ok_or_else(|| sqlx::Error::Decode("issuer name is not a valid canonical encoding".into()))?;
    Ok(Issuer { id: row.merchant_id, merchant_id, public_key: row.public_key })
}

/// Inserts a new issuer row, silently succeeding if one with this name
/// already exists (spec §4.1 step 2: idempotent on conflict).
pub async fn create(ex: &mut PgConnection, name: &str, public_key: &str) -> Result<(), sqlx::Error> {
    const QUERY: &str = "INSERT INTO issuers (merchant_id, public_key) VALUES ($1, $2) ON CONFLICT (merchant_id) DO NOTHING";
    sqlx::query(QUERY).bind(name).bind(public_key).execute(ex).await?;
    Ok(())
}

pub async fn get_by_name(ex: &mut PgConnection, name: &str) -> Result<Option<Issuer>, sqlx::Error> {
    const QUERY: &str = "SELECT * FROM issuers WHERE merchant_id = $1";
    let row: Option<IssuerRow> = sqlx::query_as(QUERY).bind(name).fetch_optional(ex).await?;
    row.map(from_row).transpose()
}
