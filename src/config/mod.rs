use serde::Deserialize;

pub mod collaborators;
pub mod proc_loader;
pub mod proc_validator;
pub mod settings;
pub mod targets;

use collaborators::{HostingConfig, InboundConfig};
use settings::SettingsConfig;
use targets::TargetsConfig;

/// ================================
/// Full service configuration
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    pub settings: SettingsConfig,
    #[serde(default)]
    pub inbound: InboundConfig,
    #[serde(default)]
    pub hosting: HostingConfig,
    #[serde(default)]
    pub targets: TargetsConfig,
}

/// Unset `${VAR}` placeholders expand to "", which counts as absent.
pub fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}
