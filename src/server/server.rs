use anyhow::{Context, Result};
use axum::Router;
use tracing::info;
use crate::config::settings::SettingsConfig;
use crate::observability::metrics::{get_metrics, Metrics};
use crate::observability::routes::MetricsState;

#[derive(Clone)]
pub struct AppState {
    pub metrics_state: MetricsState,
}

impl AppState {
    pub fn new(metrics: &Metrics) -> Self {
        Self {
            metrics_state: MetricsState::new(metrics.registry.clone()),
        }
    }
}

pub fn router(settings_config: &SettingsConfig, state: AppState) -> Router {
    Router::new()
        .merge(state.metrics_state.router(&settings_config.metrics))
        .with_state(state)
}

/// Serves `/healthz` and, when enabled, the prometheus scrape path.
/// Without a `server` section nothing is bound.
pub async fn start(settings_config: &SettingsConfig) -> Result<()> {
    let metrics = get_metrics().await;
    metrics.up.set(1);

    let Some(server) = &settings_config.server else {
        return Ok(());
    };

    let app = router(settings_config, AppState::new(metrics));
    let bind_addr = format!("{}:{}", server.host, server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding {}", bind_addr))?;
    info!("http server listening on {}", bind_addr);
    axum::serve(listener, app).await?;
    Ok(())
}
