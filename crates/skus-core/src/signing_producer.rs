//! Signing Order Producer (C5): claims a batch from the outbox and publishes
//! it to `unsigned-order-creds` before committing, so a crash between publish
//! and commit merely redelivers the batch rather than losing it (spec §4.5).

use {
    skus_database::{outbox as db_outbox, PgPool},
    skus_messaging::{producer::SigningProducer as Publisher, types::SigningOrderRequest},
    std::time::Duration,
    tokio::sync::broadcast,
};

const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(100);

pub struct SigningProducerTask {
    pool: PgPool,
    publisher: Publisher,
}

impl SigningProducerTask {
    pub fn new(pool: PgPool, publisher: Publisher) -> Self {
        Self { pool, publisher }
    }

    /// Ticks every [`DEFAULT_TICK_INTERVAL`] until `shutdown` fires, mirroring
    /// `autopilot::shutdown_controller::ShutdownController`'s `select!`-on-signal
    /// idiom. Errors are logged and the loop continues; a stuck row is
    /// retried on the next tick rather than blocking the whole batch.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        let mut interval = tokio::time::interval(DEFAULT_TICK_INTERVAL);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(err) = self.tick().await {
                        tracing::warn!(?err, "signing producer tick failed");
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!("signing producer shutting down");
                    return;
                }
            }
        }
    }

    async fn tick(&self) -> anyhow::Result<()> {
        let mut tx = self.pool.begin().await?;
        let batch = db_outbox::next_batch(&mut tx, 10).await?;
        if batch.is_empty() {
            tx.commit().await?;
            return Ok(());
        }

        for row in &batch {
            let request: SigningOrderRequest = serde_json::from_value(row.message.clone())?;
            self.publisher.publish(&request).await?;
        }

        crate::outbox::refresh_pending_gauge(&mut tx).await.map_err(anyhow::Error::from)?;
        tx.commit().await?;
        tracing::debug!(batch_size = batch.len(), "published outbox batch");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_tick_interval_is_short() {
        assert!(DEFAULT_TICK_INTERVAL <= Duration::from_millis(200));
    }
}
