//! Reads signed results from `signed-order-creds` and, on fatal decode
//! failure, republishes to `signed-order-creds-dlq` (spec §4.6, §6, and
//! SPEC_FULL §C.4 for the extra DLQ headers).

use {
    crate::{schema, types::SigningOrderResult},
    anyhow::{Context, Result},
    apache_avro::from_avro_datum,
    rdkafka::{
        consumer::{Consumer, StreamConsumer},
        message::{Headers, Message, OwnedHeaders},
        producer::{FutureProducer, FutureRecord},
        ClientConfig,
    },
    std::time::Duration,
    thiserror::Error,
};

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("avro decode failed: {0}")]
    Avro(#[source] apache_avro::Error),
    #[error("avro value did not match SigningOrderResult: {0}")]
    Schema(#[source] apache_avro::Error),
}

pub fn decode_signing_order_result(mut payload: &[u8]) -> Result<SigningOrderResult, DecodeError> {
    let schema = schema::signing_order_result_schema();
    let value = from_avro_datum(&schema, &mut payload, None).map_err(DecodeError::Avro)?;
    apache_avro::from_value(&value).map_err(DecodeError::Schema)
}

pub struct SigningConsumer {
    pub consumer: StreamConsumer,
}

impl SigningConsumer {
    pub fn new(brokers: &str, group_id: &str, topic: &str) -> Result<Self> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("group.id", group_id)
            .set("enable.auto.commit", "false")
            .create()
            .context("building kafka consumer")?;
        consumer.subscribe(&[topic]).context("subscribing to signing result topic")?;
        Ok(Self { consumer })
    }
}

pub struct DeadLetterProducer {
    producer: FutureProducer,
    topic: String,
}

impl DeadLetterProducer {
    pub fn new(brokers: &str, topic: String) -> Result<Self> {
        let producer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", "30000")
            .create()
            .context("building kafka dead-letter producer")?;
        Ok(Self { producer, topic })
    }

    /// Republishes a record that failed to decode, carrying the required
    /// `error-message` header plus the source coordinates (SPEC_FULL §C.4).
    pub async fn publish(
        &self,
        payload: &[u8],
        key: Option<&[u8]>,
        error_message: &str,
        source_topic: &str,
        source_partition: i32,
        source_offset: i64,
    ) -> Result<()> {
        let headers = OwnedHeaders::new()
            .insert(rdkafka::message::Header { key: "error-message", value: Some(error_message.as_bytes()) })
            .insert(rdkafka::message::Header { key: "source-topic", value: Some(source_topic.as_bytes()) })
            .insert(rdkafka::message::Header {
                key: "source-partition",
                value: Some(source_partition.to_string().as_bytes()),
            })
            .insert(rdkafka::message::Header { key: "source-offset", value: Some(source_offset.to_string().as_bytes()) });

        let mut record = FutureRecord::to(&self.topic).payload(payload).headers(headers);
        if let Some(key) = key {
            record = record.key(key);
        }

        self.producer
            .send(record, Duration::from_secs(30))
            .await
            .map_err(|(err, _msg)| err)
            .context("publishing to dead-letter topic")?;
        Ok(())
    }
}

/// Extracts the coordinates of a consumed message for dead-lettering.
pub fn source_coordinates(message: &rdkafka::message::BorrowedMessage<'_>) -> (i32, i64) {
    (message.partition(), message.offset())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{SignedOrder, SigningStatus};

    #[test]
    fn decode_rejects_garbage() {
        let err = decode_signing_order_result(b"not avro").unwrap_err();
        assert!(matches!(err, DecodeError::Avro(_)));
    }

    #[test]
    fn decode_round_trips_a_valid_result() {
        let schema = schema::signing_order_result_schema();
        let result = SigningOrderResult {
            request_id: "11111111-1111-1111-1111-111111111111".into(),
            data: vec![SignedOrder {
                public_key: "pk".into(),
                proof: "proof".into(),
                status: SigningStatus::Ok,
                blinded_tokens: vec!["AAAA".into()],
                signed_tokens: vec!["BBBB".into()],
                valid_from: None,
                valid_to: None,
                associated_data: vec![1, 2, 3],
            }],
        };
        let value = apache_avro::to_value(&result).unwrap();
        let datum = apache_avro::to_avro_datum(&schema, value).unwrap();

        let decoded = decode_signing_order_result(&datum).unwrap();
        assert_eq!(decoded, result);
    }
}
