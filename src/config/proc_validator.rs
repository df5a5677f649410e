//! Configuration validation with aggregated errors.
//! Every issue is collected so one start attempt reports all of them.

use tracing::{error, info};

use crate::config::collaborators::{HostingConfig, InboundConfig};
use crate::config::settings::SettingsConfig;
use crate::config::targets::{AspectRatioConfig, TargetsConfig};
use crate::config::ServiceConfig;
use crate::observability::metrics::get_metrics;

/// Public entrypoint: returns Ok(()) or Err(Vec<String>) containing all issues.
pub async fn validate_service_config(cfg: &ServiceConfig) -> Result<(), Vec<String>> {
    let mut errors: Vec<String> = Vec::new();

    validate_settings(&cfg.settings, &mut errors);
    validate_inbound(&cfg.inbound, &cfg.settings, &mut errors);
    validate_hosting(&cfg.hosting, &mut errors);
    validate_targets(&cfg.targets, &cfg.inbound, &mut errors);

    if errors.is_empty() {
        info!("config valid");
        Ok(())
    } else {
        error!("configuration validation errors ({}):", errors.len());
        for e in &errors {
            error!(" - {}", e);
        }
        get_metrics().await.config_validation_errors.inc_by(errors.len() as u64);
        Err(errors)
    }
}

/// SETTINGS VALIDATION
fn validate_settings(settings: &SettingsConfig, errors: &mut Vec<String>) {
    if settings.request_timeout_seconds == 0 {
        errors.push("settings.request_timeout_seconds must be > 0".to_owned());
    }
    if let Some(deadline) = settings.dispatch_deadline_seconds {
        if deadline < settings.request_timeout_seconds {
            errors.push(format!(
                "settings.dispatch_deadline_seconds ({}) must be >= request_timeout_seconds ({})",
                deadline, settings.request_timeout_seconds
            ));
        }
    }
    if let Some(s) = settings.safety_margin_seconds {
        if s > 60 * 60 * 24 {
            errors.push(format!("settings.safety_margin_seconds ({}) is unreasonably large", s));
        }
    }

    let metrics = &settings.metrics;
    if !metrics.path.starts_with('/') {
        errors.push(format!("settings.metrics.path '{}' must start with '/'", metrics.path));
    }
    if metrics.is_enabled && settings.server.is_none() {
        errors.push("settings.metrics.is_enabled requires settings.server".to_owned());
    }
    if let Some(server) = &settings.server {
        if server.host.is_empty() {
            errors.push("settings.server.host must not be empty".to_owned());
        }
        if server.port.parse::<u16>().is_err() {
            errors.push(format!("settings.server.port '{}' must be a port number", server.port));
        }
    }

    if let Some(logging) = &settings.logging {
        let valid = ["trace", "debug", "info", "warn", "error"];
        if !valid.contains(&logging.level.as_str()) {
            errors.push(format!(
                "settings.logging.level '{}' invalid; allowed: {:?}",
                logging.level, valid
            ));
        }
    }
}

fn validate_inbound(inbound: &InboundConfig, settings: &SettingsConfig, errors: &mut Vec<String>) {
    let Some(telegram) = &inbound.telegram else {
        errors.push("inbound.telegram is required".to_owned());
        return;
    };
    if inbound.bot_token().is_none() {
        errors.push("inbound.telegram.bot_token must be set".to_owned());
    }
    validate_url("inbound.telegram.api_base", &telegram.api_base, errors);
    if telegram.poll_timeout_seconds >= settings.request_timeout_seconds {
        errors.push(format!(
            "inbound.telegram.poll_timeout_seconds ({}) must be < settings.request_timeout_seconds ({})",
            telegram.poll_timeout_seconds, settings.request_timeout_seconds
        ));
    }
}

fn validate_hosting(hosting: &HostingConfig, errors: &mut Vec<String>) {
    if let Some(cloudinary) = &hosting.cloudinary {
        validate_url("hosting.cloudinary.api_base", &cloudinary.api_base, errors);
    }
}

/// Incomplete targets are allowed (they are reported as skipped); having none at all is not.
fn validate_targets(targets: &TargetsConfig, inbound: &InboundConfig, errors: &mut Vec<String>) {
    let mut complete = 0;

    if let Some(twitter) = &targets.twitter {
        validate_url("targets.twitter.token_url", &twitter.token_url, errors);
        validate_url("targets.twitter.api_base", &twitter.api_base, errors);
        complete += twitter.missing().is_empty() as usize;
    }
    if let Some(instagram) = &targets.instagram {
        validate_url("targets.instagram.graph_base", &instagram.graph_base, errors);
        validate_ratio("targets.instagram.feed_aspect_ratio", &instagram.feed_aspect_ratio, errors);
        complete += instagram.missing().is_empty() as usize;
    }
    if let Some(facebook) = &targets.facebook {
        validate_url("targets.facebook.graph_base", &facebook.graph_base, errors);
        complete += facebook.missing().is_empty() as usize;
    }
    if let Some(channel) = &targets.telegram_channel {
        validate_url("targets.telegram_channel.api_base", &channel.api_base, errors);
        complete += channel.missing(inbound.bot_token()).is_empty() as usize;
    }

    if complete == 0 {
        errors.push("no publish target has complete credentials, nothing to do".to_owned());
    }
}

fn validate_url(path: &str, url: &str, errors: &mut Vec<String>) {
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        errors.push(format!("{} '{}' must be an http(s) url", path, url));
    }
}

fn validate_ratio(path: &str, ratio: &AspectRatioConfig, errors: &mut Vec<String>) {
    if ratio.min <= 0.0 || ratio.max < ratio.min {
        errors.push(format!(
            "{}: expected 0 < min <= max, got [{}, {}]",
            path, ratio.min, ratio.max
        ));
    }
}
