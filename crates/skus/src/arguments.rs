//! CLI configuration, `#[clap(flatten)]`-composed the way
//! `autopilot::arguments::Arguments` assembles its sub-structs (spec §6
//! "Environment variables", SPEC_FULL §B).

use std::{net::SocketAddr, time::Duration};

#[derive(clap::Parser)]
pub struct Arguments {
    #[clap(flatten)]
    pub database: DatabaseArguments,

    #[clap(flatten)]
    pub broker: BrokerArguments,

    #[clap(flatten)]
    pub cbr: CbrArguments,

    #[clap(flatten)]
    pub vendor: VendorArguments,

    #[clap(flatten)]
    pub http: HttpArguments,

    /// Prefixes broker topic names, as `ENV` does for the teacher's services.
    #[clap(long, env, default_value = "local")]
    pub env: String,

    /// Raw 32-byte key (hex-encoded) used to encrypt merchant API secrets at
    /// rest (spec §6 "ENCRYPTION_KEY").
    #[clap(long, env)]
    pub encryption_key: String,

    /// Bearer tokens accepted by the legacy (unsigned) auth path.
    #[clap(long, env, use_value_delimiter = true)]
    pub legacy_bearer_tokens: Vec<String>,

    /// Number of parallel signing-consumer loops (spec §5 "one-or-more
    /// signing-consumer loops (count from configuration)").
    #[clap(long, env, default_value = "1")]
    pub signing_consumer_workers: u16,

    /// Emit JSON-formatted logs instead of human-readable ones.
    #[clap(long, env)]
    pub log_json: bool,
}

#[derive(clap::Parser)]
pub struct DatabaseArguments {
    /// Url of the Postgres database.
    #[clap(long, env, default_value = "postgresql://")]
    pub db_url: url::Url,

    #[clap(long, env, default_value = "10")]
    pub db_max_connections: u32,
}

#[derive(clap::Parser)]
pub struct BrokerArguments {
    #[clap(long, env, default_value = "localhost:9092")]
    pub kafka_brokers: String,

    #[clap(long, env, default_value = "unsigned-order-creds")]
    pub signing_request_topic: String,

    #[clap(long, env, default_value = "signed-order-creds")]
    pub signing_result_topic: String,

    #[clap(long, env, default_value = "signed-order-creds-dlq")]
    pub signing_result_dlq_topic: String,

    #[clap(long, env, default_value = "skus-signing-consumer")]
    pub signing_consumer_group_id: String,
}

#[derive(clap::Parser)]
pub struct CbrArguments {
    #[clap(long, env, default_value = "http://localhost:2000")]
    pub cbr_base_url: url::Url,

    #[clap(long, env, default_value = "30s", value_parser = humantime::parse_duration)]
    pub cbr_timeout: Duration,
}

#[derive(clap::Parser)]
pub struct VendorArguments {
    #[clap(long, env, default_value = "https://buy.itunes.apple.com/verifyReceipt")]
    pub apple_receipt_url: url::Url,

    #[clap(long, env, default_value = "https://androidpublisher.googleapis.com/")]
    pub google_play_base_url: url::Url,

    #[clap(long, env, default_value = "30s", value_parser = humantime::parse_duration)]
    pub vendor_timeout: Duration,

    /// Expected audience of the Pub/Sub push OIDC id-token.
    #[clap(long, env, default_value = "")]
    pub google_push_audience: String,

    /// Expected issuer of the Pub/Sub push OIDC id-token.
    #[clap(long, env, default_value = "https://accounts.google.com")]
    pub google_push_issuer: String,

    /// PEM-encoded EC public key Apple's notification JWS leaf is verified
    /// against (provisioned out of band; see `skus_vendor::apple`).
    #[clap(long, env, default_value = "")]
    pub apple_notification_public_key_pem: String,

    /// PEM-encoded RSA public key the Pub/Sub push OIDC id-token is verified
    /// against.
    #[clap(long, env, default_value = "")]
    pub google_push_public_key_pem: String,

    /// Notifications signed before this RFC3339 timestamp are dropped (spec
    /// §4.9 "cutoff"). Defaults to the Unix epoch (accept everything).
    #[clap(long, env, default_value = "1970-01-01T00:00:00Z")]
    pub notification_cutoff: chrono::DateTime<chrono::Utc>,
}

#[derive(clap::Parser)]
pub struct HttpArguments {
    #[clap(long, env, default_value = "0.0.0.0:9050")]
    pub bind_address: SocketAddr,

    #[clap(long, env, default_value = "0.0.0.0:9051")]
    pub metrics_address: SocketAddr,
}

impl std::fmt::Display for Arguments {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "db_url: SECRET")?;
        writeln!(f, "db_max_connections: {}", self.database.db_max_connections)?;
        writeln!(f, "kafka_brokers: {}", self.broker.kafka_brokers)?;
        writeln!(f, "signing_request_topic: {}", self.broker.signing_request_topic)?;
        writeln!(f, "signing_result_topic: {}", self.broker.signing_result_topic)?;
        writeln!(f, "signing_result_dlq_topic: {}", self.broker.signing_result_dlq_topic)?;
        writeln!(f, "signing_consumer_group_id: {}", self.broker.signing_consumer_group_id)?;
        writeln!(f, "cbr_base_url: {}", self.cbr.cbr_base_url)?;
        writeln!(f, "cbr_timeout: {:?}", self.cbr.cbr_timeout)?;
        writeln!(f, "apple_receipt_url: {}", self.vendor.apple_receipt_url)?;
        writeln!(f, "google_play_base_url: {}", self.vendor.google_play_base_url)?;
        writeln!(f, "vendor_timeout: {:?}", self.vendor.vendor_timeout)?;
        writeln!(f, "bind_address: {}", self.http.bind_address)?;
        writeln!(f, "metrics_address: {}", self.http.metrics_address)?;
        writeln!(f, "env: {}", self.env)?;
        writeln!(f, "encryption_key: SECRET")?;
        writeln!(f, "legacy_bearer_tokens: {} configured", self.legacy_bearer_tokens.len())?;
        writeln!(f, "signing_consumer_workers: {}", self.signing_consumer_workers)?;
        writeln!(f, "log_json: {}", self.log_json)?;
        Ok(())
    }
}

/// Decodes the `--encryption-key` hex string into the fixed-size key the
/// crypto layer expects.
pub fn parse_encryption_key(hex_key: &str) -> anyhow::Result<skus_crypto::secret::EncryptionKey> {
    let bytes = hex::decode(hex_key)?;
    let bytes: [u8; 32] = bytes.try_into().map_err(|_| anyhow::anyhow!("ENCRYPTION_KEY must decode to exactly 32 bytes"))?;
    Ok(skus_crypto::secret::EncryptionKey::from_bytes(bytes))
}
