pub mod issuers;
pub mod keys;
pub mod order_items;
pub mod orders;
pub mod outbox;
pub mod payment_history;
pub mod single_use_creds;
pub mod tlv2_creds;

use sqlx::Executor;

// Design (same as the teacher's `database` crate):
//
// Functions that must execute inside a larger transaction take
// `&mut PgTransaction` or a generic `&mut PgConnection`; functions that are
// always a single standalone statement take `&mut PgConnection`. Callers
// compose multiple calls under one transaction and are responsible for
// calling `commit`. For tests, start a transaction, run everything against
// it, and let it roll back on drop instead of truncating tables.

pub type PgTransaction<'a> = sqlx::Transaction<'a, sqlx::Postgres>;
pub use sqlx::PgPool;

pub const ALL_TABLES: &[&str] = &[
    "orders",
    "order_items",
    "issuers",
    "api_keys",
    "outbox",
    "single_use_creds",
    "tlv2_creds",
    "order_payment_history",
];

/// Deletes all data in the database. Only used by tests.
#[allow(non_snake_case)]
pub async fn clear_DANGER_(ex: &mut PgTransaction<'_>) -> sqlx::Result<()> {
    for table in ALL_TABLES {
        ex.execute(format!("TRUNCATE {table} CASCADE;").as_str()).await?;
    }
    Ok(())
}

pub fn is_duplicate_record_error(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23505"))
}
