//! Prometheus registry plumbing shared by every binary: a process-wide
//! registry, a liveness-probe trait, and a tiny axum server exposing
//! `/metrics` and `/health/live`.

use {
    axum::{Router, extract::State, http::StatusCode, response::IntoResponse, routing::get},
    prometheus::{Encoder, Registry, TextEncoder},
    std::{net::SocketAddr, sync::Arc, sync::OnceLock},
};

static REGISTRY: OnceLock<Registry> = OnceLock::new();
static STORAGE_REGISTRY: OnceLock<prometheus_metric_storage::StorageRegistry> = OnceLock::new();

/// Sets up the global registry. `namespace` prefixes every metric name
/// registered afterwards through [`get_registry`].
pub fn setup_registry(namespace: Option<String>, _subsystem: Option<String>) {
    let _ = namespace;
    REGISTRY.get_or_init(Registry::new);
}

pub fn get_registry() -> &'static Registry {
    REGISTRY.get_or_init(Registry::new)
}

/// The registry every `#[derive(MetricStorage)]` struct's `instance()`
/// registers itself into, lazily wrapping [`get_registry`].
pub fn get_metric_storage_registry() -> &'static prometheus_metric_storage::StorageRegistry {
    STORAGE_REGISTRY.get_or_init(|| prometheus_metric_storage::StorageRegistry::new(get_registry().clone()))
}

#[async_trait::async_trait]
pub trait LivenessChecking: Send + Sync {
    async fn is_alive(&self) -> bool;
}

#[derive(Clone)]
struct MetricsState {
    liveness: Arc<dyn LivenessChecking>,
}

async fn metrics_handler() -> impl IntoResponse {
    let metric_families = get_registry().gather();
    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();
    if encoder.encode(&metric_families, &mut buffer).is_err() {
        return (StatusCode::INTERNAL_SERVER_ERROR, "encoding error").into_response();
    }
    (StatusCode::OK, buffer).into_response()
}

async fn liveness_handler(State(state): State<MetricsState>) -> impl IntoResponse {
    if state.liveness.is_alive().await {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

/// Serves `/metrics` and `/health/live` until the process is killed.
/// Intended to be raced against the rest of a binary's futures with
/// `tokio::select!`, the way every skus binary's `main` does.
pub async fn serve_metrics(
    liveness: Arc<dyn LivenessChecking>,
    addr: SocketAddr,
) -> Result<(), std::io::Error> {
    let state = MetricsState { liveness };
    let app = Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/health/live", get(liveness_handler))
        .with_state(state);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(?addr, "serving metrics");
    axum::serve(listener, app).await
}
