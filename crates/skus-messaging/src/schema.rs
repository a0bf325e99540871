//! Avro schemas for the `unsigned-order-creds` and `signed-order-creds`
//! topics, verbatim from spec §6.

use apache_avro::Schema;

pub const SIGNING_ORDER_REQUEST: &str = r#"
{
  "type": "record",
  "name": "SigningOrderRequest",
  "fields": [
    { "name": "request_id", "type": "string" },
    {
      "name": "data",
      "type": {
        "type": "array",
        "items": {
          "type": "record",
          "name": "SigningOrder",
          "fields": [
            { "name": "issuer_type", "type": "string" },
            { "name": "issuer_cohort", "type": "int" },
            { "name": "blinded_tokens", "type": { "type": "array", "items": "string" } },
            { "name": "associated_data", "type": "bytes" }
          ]
        }
      }
    }
  ]
}
"#;

pub const SIGNING_ORDER_RESULT: &str = r#"
{
  "type": "record",
  "name": "SigningOrderResult",
  "fields": [
    { "name": "request_id", "type": "string" },
    {
      "name": "data",
      "type": {
        "type": "array",
        "items": {
          "type": "record",
          "name": "SignedOrder",
          "fields": [
            { "name": "public_key", "type": "string" },
            { "name": "proof", "type": "string" },
            { "name": "status", "type": { "type": "enum", "name": "SigningResultStatus", "symbols": ["ok", "error"] } },
            { "name": "blinded_tokens", "type": { "type": "array", "items": "string" } },
            { "name": "signed_tokens", "type": { "type": "array", "items": "string" } },
            { "name": "valid_from", "type": ["null", "string"], "default": null },
            { "name": "valid_to", "type": ["null", "string"], "default": null },
            { "name": "associated_data", "type": "bytes" }
          ]
        }
      }
    }
  ]
}
"#;

pub fn signing_order_request_schema() -> Schema {
    Schema::parse_str(SIGNING_ORDER_REQUEST).expect("static SigningOrderRequest schema is valid")
}

pub fn signing_order_result_schema() -> Schema {
    Schema::parse_str(SIGNING_ORDER_RESULT).expect("static SigningOrderResult schema is valid")
}
