//! Rust-side mirrors of the Avro records in [`crate::schema`], plus the JSON
//! shape carried inside `associated_data` (spec §4.6 step 6: credential rows
//! are keyed by `associated_data.item_id`).

use {
    serde::{Deserialize, Serialize},
    skus_model::CredentialType,
    uuid::Uuid,
};

/// The JSON the producer embeds in `associated_data` and the consumer echoes
/// back verbatim (spec §4.6 step 1).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssociatedData {
    pub order_id: Uuid,
    pub item_id: Uuid,
    pub issuer_id: String,
    pub credential_type: CredentialType,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SigningOrder {
    pub issuer_type: String,
    pub issuer_cohort: i32,
    pub blinded_tokens: Vec<String>,
    pub associated_data: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SigningOrderRequest {
    pub request_id: String,
    pub data: Vec<SigningOrder>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SigningStatus {
    Ok,
    Error,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SignedOrder {
    pub public_key: String,
    pub proof: String,
    pub status: SigningStatus,
    pub blinded_tokens: Vec<String>,
    pub signed_tokens: Vec<String>,
    pub valid_from: Option<String>,
    pub valid_to: Option<String>,
    pub associated_data: Vec<u8>,
}

impl SignedOrder {
    pub fn associated_data(&self) -> Result<AssociatedData, serde_json::Error> {
        serde_json::from_slice(&self.associated_data)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SigningOrderResult {
    pub request_id: String,
    pub data: Vec<SignedOrder>,
}

impl AssociatedData {
    pub fn to_bytes(&self) -> Vec<u8> {
        serde_json::to_vec(self).expect("AssociatedData always serializes")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn associated_data_round_trips_through_bytes() {
        let data = AssociatedData {
            order_id: Uuid::new_v4(),
            item_id: Uuid::new_v4(),
            issuer_id: "brave.com?sku=premium".into(),
            credential_type: CredentialType::TimeLimitedV2,
        };
        let order = SignedOrder {
            public_key: "pk".into(),
            proof: "proof".into(),
            status: SigningStatus::Ok,
            blinded_tokens: vec!["a".into()],
            signed_tokens: vec!["b".into()],
            valid_from: None,
            valid_to: None,
            associated_data: data.to_bytes(),
        };
        assert_eq!(order.associated_data().unwrap(), data);
    }
}
