//! Outbox (C4): durable queue of signing requests, de-duplicated by
//! request-id (spec §4.4), plus the rolling `AvgDurationSeconds` statistic
//! (SPEC_FULL §C.3).

use {
    chrono::{DateTime, Duration, Utc},
    skus_database::{outbox, tlv2_creds, PgTransaction},
    skus_model::Error,
    sqlx::PgConnection,
    std::sync::RwLock,
    uuid::Uuid,
};

const DEFAULT_BATCH_SIZE: i64 = 10;
const AVG_DURATION_SAMPLE: i64 = 10;
const FALLBACK_RETRY_AFTER: Duration = Duration::seconds(5);

/// Guards the last-computed average completion duration the way the
/// teacher's `alerter` guards its matchable-order timestamp with a
/// `RwLock`, refreshed by [`refresh_avg_duration`] after every completion.
pub struct AvgDuration(RwLock<Duration>);

impl Default for AvgDuration {
    fn default() -> Self {
        Self(RwLock::new(FALLBACK_RETRY_AFTER))
    }
}

impl AvgDuration {
    pub fn get(&self) -> Duration {
        *self.0.read().expect("AvgDuration lock is never held across a panic")
    }

    fn set(&self, value: Duration) {
        *self.0.write().expect("AvgDuration lock is never held across a panic") = value;
    }
}

pub async fn insert(ex: &mut PgConnection, request_id: Uuid, order_id: Uuid, item_id: Uuid, message: &serde_json::Value) -> Result<(), Error> {
    outbox::insert(ex, request_id, order_id, item_id, message).await.map_err(|err| {
        if skus_database::is_duplicate_record_error(&err) {
            Error::DupRequest
        } else {
            anyhow::Error::from(err).into()
        }
    })
}

/// Same as [`insert`], but first enforces `maxTLV2ActiveDailyItemCreds`
/// (spec §5) by counting the batches already claimed for `(order_id,
/// item_id)` on the same UTC calendar day as `valid_from` via
/// [`tlv2_creds::uniq_batches`]. This is the natural choke point for the
/// bound: every TLV2 outbox row is expected to go through it before the
/// producer ever sees it, the same way `insert` is the only way a row
/// enters the table at all.
pub async fn insert_tlv2(
    ex: &mut PgConnection,
    request_id: Uuid,
    order_id: Uuid,
    item_id: Uuid,
    message: &serde_json::Value,
    valid_from: DateTime<Utc>,
    max_active_daily_item_creds: i64,
) -> Result<(), Error> {
    let day_start = valid_from.date_naive().and_hms_opt(0, 0, 0).expect("midnight is always valid").and_utc();
    let day_end = day_start + Duration::days(1);
    let active = tlv2_creds::uniq_batches(ex, order_id, item_id, day_start, day_end).await.map_err(anyhow::Error::from)?;
    if active >= max_active_daily_item_creds {
        return Err(Error::TooManyActiveBatches);
    }
    insert(ex, request_id, order_id, item_id, message).await
}

pub async fn get_by_request_id(ex: &mut PgConnection, request_id: Uuid) -> Result<outbox::OutboxRow, Error> {
    outbox::get_by_request_id(ex, request_id).await.map_err(anyhow::Error::from)?.ok_or(Error::NotFound)
}

pub async fn next_batch(tx: &mut PgTransaction<'_>) -> Result<Vec<outbox::OutboxRow>, Error> {
    outbox::next_batch(tx, DEFAULT_BATCH_SIZE).await.map_err(|err| anyhow::Error::from(err).into())
}

/// Refreshes the `outbox_pending` gauge from the current backlog count.
pub async fn refresh_pending_gauge(ex: &mut PgConnection) -> Result<(), Error> {
    let pending = outbox::count_pending(ex).await.map_err(anyhow::Error::from)?;
    crate::metrics::Metrics::get().outbox_pending.set(pending);
    Ok(())
}

pub async fn mark_completed(ex: &mut PgConnection, request_id: Uuid, when: chrono::DateTime<chrono::Utc>, avg: &AvgDuration) -> Result<(), Error> {
    outbox::mark_completed(ex, request_id, when).await.map_err(anyhow::Error::from)?;
    refresh_avg_duration(ex, avg).await?;
    Ok(())
}

pub async fn mark_failed(ex: &mut PgConnection, request_id: Uuid, when: chrono::DateTime<chrono::Utc>, reason: &str, avg: &AvgDuration) -> Result<(), Error> {
    outbox::mark_failed(ex, request_id, when, reason).await.map_err(anyhow::Error::from)?;
    refresh_avg_duration(ex, avg).await?;
    Ok(())
}

pub async fn delete_by_order(ex: &mut PgConnection, order_id: Uuid) -> Result<(), Error> {
    outbox::delete_by_order(ex, order_id).await.map_err(|err| anyhow::Error::from(err).into())
}

async fn refresh_avg_duration(ex: &mut PgConnection, avg: &AvgDuration) -> Result<(), Error> {
    let durations = outbox::recent_durations(ex, AVG_DURATION_SAMPLE).await.map_err(anyhow::Error::from)?;
    if durations.is_empty() {
        return Ok(());
    }
    let total_millis: i64 = durations.iter().map(|d| d.num_milliseconds()).sum();
    let average = Duration::milliseconds(total_millis / durations.len() as i64);
    avg.set(average);
    crate::metrics::Metrics::get().record_avg_duration(average);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use {
        skus_model::{Order, OrderStatus},
        sqlx::Connection,
        std::collections::{HashMap, HashSet},
    };

    #[test]
    fn default_avg_duration_is_the_fallback() {
        let avg = AvgDuration::default();
        assert_eq!(avg.get(), FALLBACK_RETRY_AFTER);
    }

    fn sample_order(id: Uuid) -> Order {
        Order {
            id,
            merchant_id: "brave.com".into(),
            currency: "USD".into(),
            status: OrderStatus::Paid,
            total_price: "9.99".parse().unwrap(),
            location: None,
            allowed_payment_methods: HashSet::from(["stripe".to_string()]),
            valid_for: Duration::days(30),
            created_at: Utc::now(),
            last_paid_at: None,
            expires_at: None,
            metadata: HashMap::new(),
            external_id: None,
        }
    }

    #[tokio::test]
    #[ignore]
    async fn postgres_insert_tlv2_rejects_once_the_daily_cap_is_reached() {
        let mut db = sqlx::PgConnection::connect("postgresql://").await.unwrap();
        let mut tx = db.begin().await.unwrap();
        skus_database::clear_DANGER_(&mut tx).await.unwrap();

        let order_id = Uuid::new_v4();
        let item_id = Uuid::new_v4();
        skus_database::orders::create(&mut tx, &sample_order(order_id)).await.unwrap();

        // Simulate a batch already signed and recorded earlier today.
        let valid_from = Utc::now();
        let valid_to = valid_from + Duration::hours(1);
        tlv2_creds::insert(
            &mut tx,
            &tlv2_creds::Tlv2Cred {
                item_id,
                order_id,
                request_id: Uuid::new_v4(),
                issuer_id: "brave.com?sku=premium".into(),
                valid_from,
                valid_to,
                blinded_creds: vec!["AAAA".into()],
                signed_creds: vec!["BBBB".into()],
                batch_proof: "proof".into(),
                public_key: "pk".into(),
            },
        )
        .await
        .unwrap();

        let err = insert_tlv2(&mut tx, Uuid::new_v4(), order_id, item_id, &serde_json::json!({}), valid_from, 1)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::TooManyActiveBatches));

        insert_tlv2(&mut tx, Uuid::new_v4(), order_id, item_id, &serde_json::json!({}), valid_from, 2).await.unwrap();
    }
}
