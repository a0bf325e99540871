//! Signing Consumer (C6): drains `signed-order-creds`, inserting credential
//! rows and retiring the matching outbox entry (spec §4.6).

use {
    crate::outbox::{self as core_outbox, AvgDuration},
    skus_database::{outbox as db_outbox, single_use_creds, tlv2_creds, PgPool},
    skus_messaging::{
        consumer::{self, DeadLetterProducer, SigningConsumer},
        types::{AssociatedData, SignedOrder, SigningOrderResult, SigningStatus},
    },
    skus_model::CredentialType,
    rdkafka::{
        consumer::Consumer,
        message::Message,
    },
    tokio::sync::broadcast,
    uuid::Uuid,
};

pub struct SigningConsumerTask {
    pool: PgPool,
    consumer: SigningConsumer,
    dead_letter: DeadLetterProducer,
    avg_duration: AvgDuration,
}

impl SigningConsumerTask {
    pub fn new(pool: PgPool, consumer: SigningConsumer, dead_letter: DeadLetterProducer) -> Self {
        Self { pool, consumer, dead_letter, avg_duration: AvgDuration::default() }
    }

    /// Drains the topic until `shutdown` fires, `select!`-ing the same way
    /// `autopilot::shutdown_controller::ShutdownController` races a signal
    /// against the work it guards.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        loop {
            tokio::select! {
                message = self.consumer.consumer.recv() => {
                    match message {
                        Ok(message) => {
                            if let Err(err) = self.handle(&message).await {
                                tracing::warn!(?err, "signing consumer failed to process message, will redeliver");
                                continue;
                            }
                            if let Err(err) = self.consumer.consumer.store_offset_from_message(&message) {
                                tracing::warn!(?err, "failed to store kafka offset");
                            }
                        }
                        Err(err) => tracing::warn!(?err, "kafka recv error"),
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!("signing consumer shutting down");
                    return;
                }
            }
        }
    }

    async fn handle(&self, message: &rdkafka::message::BorrowedMessage<'_>) -> anyhow::Result<()> {
        let payload = message.payload().unwrap_or_default();
        let result = match consumer::decode_signing_order_result(payload) {
            Ok(result) => result,
            Err(err) => {
                let (partition, offset) = consumer::source_coordinates(message);
                self.dead_letter
                    .publish(payload, message.key(), &err.to_string(), message.topic(), partition, offset)
                    .await?;
                crate::metrics::Metrics::get().signing_dead_letters.inc();
                return Ok(());
            }
        };
        self.process(result).await
    }

    async fn process(&self, result: SigningOrderResult) -> anyhow::Result<()> {
        let request_id: Uuid = result.request_id.parse()?;
        let mut tx = self.pool.begin().await?;

        let Some(row) = db_outbox::get_by_request_id(&mut tx, request_id).await? else {
            tx.commit().await?;
            return Ok(());
        };
        if row.completed_at.is_some() {
            tx.commit().await?;
            return Ok(());
        }

        for data in &result.data {
            if !matches!(data.status, SigningStatus::Ok) {
                core_outbox::mark_failed(&mut tx, request_id, chrono::Utc::now(), "signing failed upstream", &self.avg_duration)
                    .await
                    .map_err(anyhow::Error::from)?;
                tx.commit().await?;
                crate::metrics::Metrics::get().record_signing_outcome("failed");
                return Ok(());
            }
            self.insert_credential(&mut tx, request_id, data).await?;
        }

        core_outbox::mark_completed(&mut tx, request_id, chrono::Utc::now(), &self.avg_duration)
            .await
            .map_err(anyhow::Error::from)?;
        tx.commit().await?;
        crate::metrics::Metrics::get().record_signing_outcome("completed");
        Ok(())
    }

    async fn insert_credential(
        &self,
        tx: &mut skus_database::PgTransaction<'_>,
        request_id: Uuid,
        data: &SignedOrder,
    ) -> anyhow::Result<()> {
        let associated: AssociatedData = data.associated_data()?;
        match associated.credential_type {
            CredentialType::SingleUse => {
                single_use_creds::insert(
                    tx,
                    &single_use_creds::OrderCreds {
                        item_id: associated.item_id,
                        order_id: associated.order_id,
                        issuer_id: associated.issuer_id,
                        blinded_creds: data.blinded_tokens.clone(),
                        signed_creds: data.signed_tokens.clone(),
                        batch_proof: data.proof.clone(),
                        public_key: data.public_key.clone(),
                    },
                )
                .await?;
            }
            CredentialType::TimeLimitedV2 => {
                let valid_from: chrono::DateTime<chrono::Utc> =
                    data.valid_from.as_deref().ok_or_else(|| anyhow::anyhow!("tlv2 result missing valid_from"))?.parse()?;
                let valid_to: chrono::DateTime<chrono::Utc> =
                    data.valid_to.as_deref().ok_or_else(|| anyhow::anyhow!("tlv2 result missing valid_to"))?.parse()?;
                tlv2_creds::insert(
                    tx,
                    &tlv2_creds::Tlv2Cred {
                        item_id: associated.item_id,
                        order_id: associated.order_id,
                        request_id,
                        issuer_id: associated.issuer_id,
                        valid_from,
                        valid_to,
                        blinded_creds: data.blinded_tokens.clone(),
                        signed_creds: data.signed_tokens.clone(),
                        batch_proof: data.proof.clone(),
                        public_key: data.public_key.clone(),
                    },
                )
                .await?;
            }
            CredentialType::TimeLimited => {
                anyhow::bail!("TimeLimited credentials are never routed through the signing pipeline");
            }
        }
        Ok(())
    }
}
