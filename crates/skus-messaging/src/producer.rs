//! Publishes signing requests to `unsigned-order-creds` (spec §4.5, §6).

use {
    crate::{schema, types::SigningOrderRequest},
    anyhow::{Context, Result},
    apache_avro::{to_avro_datum, types::Value},
    rdkafka::{
        producer::{FutureProducer, FutureRecord},
        ClientConfig,
    },
    std::time::Duration,
};

pub struct SigningProducer {
    producer: FutureProducer,
    topic: String,
    schema: apache_avro::Schema,
}

impl SigningProducer {
    pub fn new(brokers: &str, topic: String) -> Result<Self> {
        let producer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", "30000")
            .create()
            .context("building kafka producer")?;
        Ok(Self { producer, topic, schema: schema::signing_order_request_schema() })
    }

    /// Encodes `request` and publishes it keyed by its `request_id`, as spec
    /// §6 requires ("Kafka message key for producer is the request-id raw
    /// bytes").
    pub async fn publish(&self, request: &SigningOrderRequest) -> Result<()> {
        let value = apache_avro::to_value(request).context("converting SigningOrderRequest to avro value")?;
        let datum = encode(&self.schema, value)?;
        let key = request.request_id.as_bytes();

        self.producer
            .send(FutureRecord::to(&self.topic).key(key).payload(&datum), Duration::from_secs(30))
            .await
            .map_err(|(err, _msg)| err)
            .context("publishing SigningOrderRequest")?;
        Ok(())
    }
}

fn encode(schema: &apache_avro::Schema, value: Value) -> Result<Vec<u8>> {
    to_avro_datum(schema, value).context("encoding avro datum")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SigningOrder;

    #[test]
    fn request_encodes_to_a_nonempty_datum() {
        let schema = schema::signing_order_request_schema();
        let request = SigningOrderRequest {
            request_id: "11111111-1111-1111-1111-111111111111".into(),
            data: vec![SigningOrder {
                issuer_type: "brave.com?sku=premium".into(),
                issuer_cohort: 1,
                blinded_tokens: vec!["AAAA".into()],
                associated_data: vec![1, 2, 3],
            }],
        };
        let value = apache_avro::to_value(&request).unwrap();
        let datum = encode(&schema, value).unwrap();
        assert!(!datum.is_empty());
    }
}
