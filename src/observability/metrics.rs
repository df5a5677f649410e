use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry};
use tracing::info;
use std::sync::Arc;
use tokio::sync::OnceCell;


static METRICS_INSTANCE: OnceCell<Arc<Metrics>> = OnceCell::const_new();

/// Lazily initializes the process-wide metrics registry.
pub async fn get_metrics() -> &'static Arc<Metrics> {
    METRICS_INSTANCE.get_or_init(|| async {
        info!("Initializing Metrics ...");
        Metrics::new()}
    ).await
}


#[derive(Clone)]
pub struct Metrics {
    pub registry: Registry,

    // Dispatch metrics
    pub dispatch_requests: IntCounterVec,
    pub publish_attempts: IntCounterVec,
    pub publish_outcomes: IntCounterVec,
    pub publish_duration: HistogramVec,

    // Token metrics
    pub token_refreshes: IntCounterVec,
    pub token_refresh_duration: HistogramVec,

    // Collaborators
    pub hosting_uploads: IntCounterVec,
    pub inbound_updates: IntCounter,

    // Config/runtime
    pub config_validation_errors: IntCounter,
    pub up: IntGauge,
}

impl Metrics {
    fn new() -> Arc<Self> {
        let registry = Registry::new_custom(Some("postrelay".into()), None).unwrap();

        let metrics: Arc<Metrics> = Arc::new(Self {
            // Dispatch
            dispatch_requests: IntCounterVec::new(Opts::new("dispatch_requests_total", "Inbound messages dispatched by payload kind"),&["kind"],).unwrap(),
            publish_attempts: IntCounterVec::new(Opts::new("publish_attempts_total", "Publish calls per target, retries included"),&["target"],).unwrap(),
            publish_outcomes: IntCounterVec::new(Opts::new("publish_outcomes_total", "Final outcome per target"),&["target", "status"],).unwrap(),
            publish_duration: HistogramVec::new(HistogramOpts::new("publish_duration_seconds", "Time from task start to final outcome").buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),&["target"],).unwrap(),

            // Token
            token_refreshes: IntCounterVec::new(Opts::new("token_refresh_total", "Refresh grants by identity and result"),&["identity", "result"],).unwrap(),
            token_refresh_duration: HistogramVec::new(HistogramOpts::new("token_refresh_duration_seconds", "Refresh grant duration seconds").buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),&["identity"],).unwrap(),

            // Collaborators
            hosting_uploads: IntCounterVec::new(Opts::new("hosting_uploads_total", "Image hosting uploads by result"),&["result"],).unwrap(),
            inbound_updates: IntCounter::new("inbound_updates_total", "Updates received from the chat transport").unwrap(),

            // Config/runtime
            config_validation_errors: IntCounter::new("config_validation_errors_total","Validation errors during startup",).unwrap(),
            up: IntGauge::new("up", "1 if service is healthy").unwrap(),

            registry,
        });

        let reg = &metrics.registry;
        reg.register(Box::new(metrics.dispatch_requests.clone())).unwrap();
        reg.register(Box::new(metrics.publish_attempts.clone())).unwrap();
        reg.register(Box::new(metrics.publish_outcomes.clone())).unwrap();
        reg.register(Box::new(metrics.publish_duration.clone())).unwrap();
        reg.register(Box::new(metrics.token_refreshes.clone())).unwrap();
        reg.register(Box::new(metrics.token_refresh_duration.clone())).unwrap();
        reg.register(Box::new(metrics.hosting_uploads.clone())).unwrap();
        reg.register(Box::new(metrics.inbound_updates.clone())).unwrap();
        reg.register(Box::new(metrics.config_validation_errors.clone())).unwrap();
        reg.register(Box::new(metrics.up.clone())).unwrap();

        metrics
    }
}
