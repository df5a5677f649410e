use std::sync::Arc;

use anyhow::{anyhow, Result};
use clap::Parser;
use post_relay::dispatch::coordinator::DispatchCoordinator;
use post_relay::helpers::http::build_client;
use post_relay::hosting::cloudinary::CloudinaryHost;
use post_relay::inbound::telegram::TelegramInbound;
use post_relay::server;
use post_relay::targets::build_targets;
use post_relay::utils::config_loader;
use post_relay::utils::logging;
use post_relay::utils::logging::LogLevel;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, env = "CONFIG", default_value = "post-relay.yaml")]
    config: String,
    #[arg(long, env = "LOG_LEVEL", value_enum)]
    log_level: Option<LogLevel>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // -------------------------------
    // 1. Load YAML config
    // -------------------------------

    let service_config = config_loader::run(&args.config).await?;
    logging::run(&service_config.settings, args.log_level);

    // -------------------------------
    // 2. Create request client
    // -------------------------------

    let client = build_client(service_config.settings.request_timeout())?;

    // -------------------------------
    // 3. Build publish targets and the coordinator
    // -------------------------------

    let targets = build_targets(&service_config, &client).await?;
    let hosting = service_config
        .hosting
        .cloudinary
        .as_ref()
        .and_then(|cfg| CloudinaryHost::from_config(cfg, &client));
    if hosting.is_none() {
        warn!("image hosting is not configured, instagram and facebook cannot publish images");
    }
    let coordinator = DispatchCoordinator::new(targets, hosting, &service_config.settings);
    if coordinator.enabled_targets() == 0 {
        return Err(anyhow!("no publish target is enabled"));
    }

    // -------------------------------
    // 4. Connect the inbound transport
    // -------------------------------

    let telegram = service_config
        .inbound
        .telegram
        .as_ref()
        .ok_or_else(|| anyhow!("inbound.telegram is not configured"))?;
    let inbound = TelegramInbound::connect(telegram, client.clone(), service_config.settings.temp_dir()).await?;

    // -------------------------------
    // 5. Start http server with health and metrics routes
    // -------------------------------

    let settings = service_config.settings.clone();
    tokio::spawn(async move {
        if let Err(err) = server::server::start(&settings).await {
            error!("http server stopped: {:#}", err);
        }
    });

    // -------------------------------
    // 6. Poll until a shutdown signal arrives
    // -------------------------------

    info!("Service starting with {} enabled targets...", coordinator.enabled_targets());
    inbound.run(Arc::new(coordinator)).await?;
    info!("Service stopped");
    Ok(())
}
