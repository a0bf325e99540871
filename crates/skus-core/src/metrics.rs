//! Prometheus gauges for the outbox and signing pipeline (SPEC_FULL §C.6).

#[derive(prometheus_metric_storage::MetricStorage, Clone, Debug)]
#[metric(subsystem = "skus")]
pub struct Metrics {
    /// Rows currently waiting on `submitted_at` (claimed by a producer tick
    /// but not yet published is excluded; this counts unclaimed rows only).
    pub outbox_pending: prometheus::IntGauge,

    /// Rolling average of `completed_at - submitted_at` over the last 10
    /// completions, in milliseconds, mirrored from `crate::outbox::AvgDuration`.
    pub outbox_avg_duration_ms: prometheus::IntGauge,

    /// Outcomes observed by the signing consumer.
    #[metric(labels("outcome"))]
    pub signing_results: prometheus::IntCounterVec,

    /// Messages that failed to decode and were dead-lettered.
    pub signing_dead_letters: prometheus::IntCounter,
}

impl Metrics {
    pub fn get() -> &'static Self {
        Self::instance(observe::metrics::get_metric_storage_registry()).expect("metrics registration cannot fail twice")
    }

    pub fn record_avg_duration(&self, avg: chrono::Duration) {
        self.outbox_avg_duration_ms.set(avg.num_milliseconds());
    }

    pub fn record_signing_outcome(&self, outcome: &str) {
        self.signing_results.with_label_values(&[outcome]).inc();
    }
}
