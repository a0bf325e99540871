//! Service-layer components (spec §4): business logic over the
//! `skus-database`/`skus-crypto`/`skus-messaging`/`skus-vendor`/`skus-cbr`
//! primitives, organized one module per component (C1-C10).

pub mod auth;
pub mod credentials;
pub mod issuer_registry;
pub mod metrics;
pub mod orders;
pub mod outbox;
pub mod receipts;
pub mod renewals;
pub mod signing_consumer;
pub mod signing_producer;
pub mod tlv1;
