//! Avro wire types and broker plumbing for the two signing topics (spec §6).

pub mod consumer;
pub mod producer;
pub mod schema;
pub mod types;

pub use types::{SignedOrder, SigningOrder, SigningOrderRequest, SigningOrderResult, SigningStatus};
