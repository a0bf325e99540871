//! Persistence for the `order_items` table (spec §3 "OrderItem").

use {
    bigdecimal::BigDecimal,
    skus_model::{CredentialType, IssuerConfig, OrderItem, iso8601},
    sqlx::PgConnection,
    std::str::FromStr,
    uuid::Uuid,
};

#[derive(sqlx::FromRow)]
struct OrderItemRow {
    id: Uuid,
    order_id: Uuid,
    sku: String,
    credential_type: String,
    quantity: i32,
    price: BigDecimal,
    subtotal: BigDecimal,
    valid_for_iso: String,
    each_credential_valid_for_iso: Option<String>,
    issuance_interval_iso: String,
    issuer_buffer: i32,
    issuer_overlap: i32,
}

impl TryFrom<OrderItemRow> for OrderItem {
    type Error = sqlx::Error;

    fn try_from(row: OrderItemRow) -> Result<Self, Self::Error> {
        let decode = |s: &str| iso8601::parse(s).map_err(|err| sqlx::Error::Decode(Box::new(err)));
        Ok(OrderItem {
            id: row.id,
            order_id: row.order_id,
            sku: row.sku,
            credential_type: CredentialType::from_str(&row.credential_type)
                .map_err(|err| sqlx::Error::Decode(Box::new(err)))?,
            quantity: row.quantity as u32,
            price: row.price,
            subtotal: row.subtotal,
            valid_for_iso: decode(&row.valid_for_iso)?,
            each_credential_valid_for_iso: row.each_credential_valid_for_iso.as_deref().map(decode).transpose()?,
            issuance_interval_iso: decode(&row.issuance_interval_iso)?,
            issuer_config: IssuerConfig {
                buffer: row.issuer_buffer as u32,
                overlap: row.issuer_overlap as u32,
            },
        })
    }
}

pub async fn insert(ex: &mut PgConnection, item: &OrderItem) -> Result<(), sqlx::Error> {
    const QUERY: &str = r#"
INSERT INTO order_items (
    id, order_id, sku, credential_type, quantity, price, subtotal,
    valid_for_iso, each_credential_valid_for_iso, issuance_interval_iso,
    issuer_buffer, issuer_overlap
)
VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
    "#;
    sqlx::query(QUERY)
        .bind(item.id)
        .bind(item.order_id)
        .bind(&item.sku)
        .bind(item.credential_type.to_string())
        .bind(item.quantity as i32)
        .bind(&item.price)
        .bind(&item.subtotal)
        .bind(item.valid_for_iso.to_string())
        .bind(item.each_credential_valid_for_iso.map(|d| d.to_string()))
        .bind(item.issuance_interval_iso.to_string())
        .bind(item.issuer_config.buffer as i32)
        .bind(item.issuer_config.overlap as i32)
        .execute(ex)
        .await?;
    Ok(())
}

pub async fn get(ex: &mut PgConnection, id: Uuid) -> Result<Option<OrderItem>, sqlx::Error> {
    const QUERY: &str = "SELECT * FROM order_items WHERE id = $1";
    let row: Option<OrderItemRow> = sqlx::query_as(QUERY).bind(id).fetch_optional(ex).await?;
    row.map(OrderItem::try_from).transpose()
}

pub async fn list_for_order(ex: &mut PgConnection, order_id: Uuid) -> Result<Vec<OrderItem>, sqlx::Error> {
    const QUERY: &str = "SELECT * FROM order_items WHERE order_id = $1 ORDER BY id";
    let rows: Vec<OrderItemRow> = sqlx::query_as(QUERY).bind(order_id).fetch_all(ex).await?;
    rows.into_iter().map(OrderItem::try_from).collect()
}
