//! Process wiring: database pool, broker producer/consumer tasks, vendor/CBR
//! clients, and the HTTP surface, raced together the way
//! `autopilot::run::run` assembles its subsystems and serves them until
//! shutdown.

use {
    crate::{api, arguments::Arguments},
    skus_cbr::client::HttpCbrClient,
    skus_core::signing_consumer::SigningConsumerTask,
    skus_core::signing_producer::SigningProducerTask,
    skus_vendor::client::{HttpAppleReceiptClient, HttpGoogleReceiptClient},
    std::sync::Arc,
    tokio::sync::broadcast,
};

pub struct AppState {
    pub pool: skus_database::PgPool,
    pub encryption_key: skus_crypto::secret::EncryptionKey,
    pub cbr: Arc<dyn skus_cbr::CbrClient>,
    pub apple_receipt: Arc<dyn skus_vendor::AppleReceiptClient>,
    pub google_receipt: Arc<dyn skus_vendor::GoogleReceiptClient>,
    pub apple_notification_key: Option<jsonwebtoken::DecodingKey>,
    pub google_push_key: Option<jsonwebtoken::DecodingKey>,
    pub google_push_audience: String,
    pub google_push_issuer: String,
    pub notification_cutoff: chrono::DateTime<chrono::Utc>,
    pub legacy_bearer_tokens: Vec<String>,
    pub avg_retry_after: Arc<skus_core::outbox::AvgDuration>,
}

pub async fn run(args: Arguments) -> anyhow::Result<()> {
    tracing::info!(%args, "starting skus");

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(args.database.db_max_connections)
        .connect(args.database.db_url.as_str())
        .await?;

    let encryption_key = crate::arguments::parse_encryption_key(&args.encryption_key)?;

    let cbr: Arc<dyn skus_cbr::CbrClient> = Arc::new(HttpCbrClient::new(args.cbr.cbr_base_url.clone(), args.cbr.cbr_timeout));
    let apple_receipt: Arc<dyn skus_vendor::AppleReceiptClient> =
        Arc::new(HttpAppleReceiptClient::new(args.vendor.apple_receipt_url.clone(), args.vendor.vendor_timeout));
    let google_receipt: Arc<dyn skus_vendor::GoogleReceiptClient> =
        Arc::new(HttpGoogleReceiptClient::new(args.vendor.google_play_base_url.clone(), args.vendor.vendor_timeout));

    let apple_notification_key = decoding_key(&args.vendor.apple_notification_public_key_pem, jsonwebtoken::DecodingKey::from_ec_pem)?;
    let google_push_key = decoding_key(&args.vendor.google_push_public_key_pem, jsonwebtoken::DecodingKey::from_rsa_pem)?;

    let state = Arc::new(AppState {
        pool: pool.clone(),
        encryption_key,
        cbr,
        apple_receipt,
        google_receipt,
        apple_notification_key,
        google_push_key,
        google_push_audience: args.vendor.google_push_audience.clone(),
        google_push_issuer: args.vendor.google_push_issuer.clone(),
        notification_cutoff: args.vendor.notification_cutoff,
        legacy_bearer_tokens: args.legacy_bearer_tokens.clone(),
        avg_retry_after: Arc::new(skus_core::outbox::AvgDuration::default()),
    });

    // Broadcast rather than oneshot: the producer ticker and every consumer
    // worker each need their own subscription, mirroring how
    // `autopilot::shutdown_controller::ShutdownController` hands a receiver
    // to every task that must race a signal against its own work.
    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    tokio::spawn(propagate_os_signal(shutdown_tx.clone()));

    let producer_topic = prefixed(&args.env, &args.broker.signing_request_topic);
    let publisher = skus_messaging::producer::SigningProducer::new(&args.broker.kafka_brokers, producer_topic)?;
    let producer_task = SigningProducerTask::new(pool.clone(), publisher);
    let mut producer_handle = tokio::spawn(producer_task.run(shutdown_tx.subscribe()));

    let mut consumer_handles = Vec::new();
    for worker in 0..args.signing_consumer_workers.max(1) {
        let result_topic = prefixed(&args.env, &args.broker.signing_result_topic);
        let dlq_topic = prefixed(&args.env, &args.broker.signing_result_dlq_topic);
        let consumer = skus_messaging::consumer::SigningConsumer::new(
            &args.broker.kafka_brokers,
            &args.broker.signing_consumer_group_id,
            &result_topic,
        )?;
        let dead_letter = skus_messaging::consumer::DeadLetterProducer::new(&args.broker.kafka_brokers, dlq_topic)?;
        let consumer_task = SigningConsumerTask::new(pool.clone(), consumer, dead_letter);
        tracing::debug!(worker, "starting signing consumer");
        consumer_handles.push(tokio::spawn(consumer_task.run(shutdown_tx.subscribe())));
    }

    let liveness: Arc<dyn observe::metrics::LivenessChecking> = Arc::new(DbLiveness { pool: pool.clone() });
    let metrics_server = observe::metrics::serve_metrics(liveness, args.http.metrics_address);

    let app = api::router(state);
    let listener = tokio::net::TcpListener::bind(args.http.bind_address).await?;
    tracing::info!(addr = %args.http.bind_address, "serving http");
    let http_server = axum::serve(listener, app).with_graceful_shutdown(wait_for_shutdown(shutdown_tx.subscribe()));

    // The producer task only ever returns once its shutdown receiver fires
    // (a stuck tick is logged and retried, never propagated out of `run`),
    // so its completion here is as much a legitimate exit as the other two
    // branches, not a failure case to special-case.
    let mut producer_done = false;
    tokio::select! {
        result = http_server => result.map_err(anyhow::Error::from)?,
        result = metrics_server => result.map_err(anyhow::Error::from)?,
        result = &mut producer_handle => {
            producer_done = true;
            result?;
        }
    }

    // Whichever branch above returned, make sure every task sees the signal
    // (the OS-signal path already broadcast it; the other two branches
    // didn't) and then join them instead of aborting mid-transaction.
    let _ = shutdown_tx.send(());
    if !producer_done {
        producer_handle.await?;
    }
    for handle in consumer_handles {
        handle.await?;
    }
    Ok(())
}

fn prefixed(env: &str, topic: &str) -> String {
    format!("{env}-{topic}")
}

fn decoding_key<F>(pem: &str, from_pem: F) -> anyhow::Result<Option<jsonwebtoken::DecodingKey>>
where
    F: Fn(&[u8]) -> jsonwebtoken::errors::Result<jsonwebtoken::DecodingKey>,
{
    if pem.is_empty() {
        return Ok(None);
    }
    Ok(Some(from_pem(pem.as_bytes())?))
}

async fn propagate_os_signal(shutdown_tx: broadcast::Sender<()>) {
    wait_for_os_signal().await;
    let _ = shutdown_tx.send(());
}

#[cfg(unix)]
async fn wait_for_os_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    let mut sigint = signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");
    tokio::select! {
        _ = sigterm.recv() => tracing::info!("received SIGTERM signal, initiating graceful shutdown"),
        _ = sigint.recv() => tracing::info!("received SIGINT signal, initiating graceful shutdown"),
    }
}

#[cfg(not(unix))]
async fn wait_for_os_signal() {
    tokio::signal::ctrl_c().await.expect("failed to install CTRL+C handler");
    tracing::info!("received CTRL+C signal, initiating graceful shutdown");
}

async fn wait_for_shutdown(mut shutdown: broadcast::Receiver<()>) {
    let _ = shutdown.recv().await;
}

struct DbLiveness {
    pool: skus_database::PgPool,
}

#[async_trait::async_trait]
impl observe::metrics::LivenessChecking for DbLiveness {
    async fn is_alive(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}
