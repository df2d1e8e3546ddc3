use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::sentry::LabelRule;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub service: ServiceConfig,
    pub relay: RelayConfig,
    pub storage: StorageConfig,
    pub sentry: SentryConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "beacon-relay".to_string(),
            http: HttpConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 10000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Frames buffered per connection before it counts as unreachable
    pub outbound_queue: usize,
    /// WebSocket ping period in seconds, 0 disables
    pub heartbeat_secs: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            outbound_queue: 256,
            heartbeat_secs: 30,
        }
    }
}

impl RelayConfig {
    pub fn heartbeat(&self) -> Option<Duration> {
        (self.heartbeat_secs > 0).then(|| Duration::from_secs(self.heartbeat_secs))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub recordings_path: String,
    /// URL path the recordings directory is served under
    pub url_prefix: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            recordings_path: "recordings".to_string(),
            url_prefix: "/recordings".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SentryConfig {
    /// Classifier labels that raise an alert, in reporting order
    pub labels: Vec<LabelRule>,
    /// Vision model behind `/analyze-frame`; unset leaves it unavailable
    pub vision: Option<VisionConfig>,
}

impl Default for SentryConfig {
    fn default() -> Self {
        Self {
            labels: vec![
                LabelRule::new("SUSPECT", "Suspect Detected"),
                LabelRule::new("GUN", "NERF Toy Blaster Detected"),
            ],
            vision: None,
        }
    }
}

/// OpenAI-compatible chat completions endpoint with image input
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VisionConfig {
    pub endpoint: String,
    pub model: String,
    /// Environment variable holding the bearer token
    pub api_key_env: String,
    pub timeout_secs: u64,
    /// Instruction sent with every frame; the model must answer with
    /// comma-separated labels or `NONE`
    pub prompt: String,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://openrouter.ai/api/v1/chat/completions".to_string(),
            model: "openai/gpt-4o".to_string(),
            api_key_env: "OPENROUTER_API_KEY".to_string(),
            timeout_secs: 30,
            prompt: "Analyze this image. List ALL that are visible: \
                     1) GUN - a NERF toy blaster, \
                     2) SUSPECT - a person wearing a GREY hoodie or jacket and clear rectangular glasses. \
                     Reply with a comma-separated list (e.g. 'GUN,SUSPECT' or 'GUN') or 'NONE' if nothing is detected."
                .to_string(),
        }
    }
}

impl VisionConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Config {
    /// Load from an optional config file, then `BEACON__*` environment
    /// variables (e.g. `BEACON__SERVICE__HTTP__PORT=8080`). Anything unset
    /// keeps its default.
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix("BEACON")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("Failed to load config from {}", path))?;

        Ok(settings.try_deserialize()?)
    }
}
