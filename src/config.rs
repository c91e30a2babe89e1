//! Runtime settings loaded from the environment (and `.env`, if present).

use anyhow::{Context, Result};
use std::time::Duration;
use tracing::{info, warn};

use crate::provider::ProviderKind;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
const DEFAULT_TIMEOUT_SECS: u64 = 120;
const DEFAULT_STROKE_WIDTH: u32 = 3;
const DEFAULT_RESULT_CAPACITY: usize = 64;

/// Credentials and model choice for one provider.
#[derive(Clone)]
pub struct ProviderSettings {
    pub kind: ProviderKind,
    pub api_key: String,
    pub model: String,
}

impl std::fmt::Debug for ProviderSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderSettings")
            .field("kind", &self.kind)
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub bind_addr: String,
    pub request_timeout: Duration,
    pub stroke_width: u32,
    /// Most recent results kept for the download and overlay endpoints.
    pub result_capacity: usize,
    pub default_provider: Option<ProviderKind>,
    /// Providers with a configured API key. May be empty; the registry rejects that.
    pub providers: Vec<ProviderSettings>,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from any key lookup. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let request_timeout = match get("VISION_REQUEST_TIMEOUT_SECS") {
            Some(v) => Duration::from_secs(
                v.parse()
                    .with_context(|| format!("Invalid VISION_REQUEST_TIMEOUT_SECS: {:?}", v))?,
            ),
            None => Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        };

        let stroke_width = match get("OVERLAY_STROKE_WIDTH") {
            Some(v) => v
                .parse()
                .with_context(|| format!("Invalid OVERLAY_STROKE_WIDTH: {:?}", v))?,
            None => DEFAULT_STROKE_WIDTH,
        };

        let result_capacity = match get("RESULT_STORE_CAPACITY") {
            Some(v) => v
                .parse()
                .ok()
                .filter(|n: &usize| *n > 0)
                .with_context(|| format!("Invalid RESULT_STORE_CAPACITY: {:?}", v))?,
            None => DEFAULT_RESULT_CAPACITY,
        };

        let default_provider = match get("DEFAULT_PROVIDER") {
            Some(v) => Some(
                ProviderKind::from_str(&v)
                    .with_context(|| format!("Unknown DEFAULT_PROVIDER: {}", v))?,
            ),
            None => None,
        };

        let mut providers = Vec::new();
        for kind in ProviderKind::ALL {
            match get(kind.api_key_var()) {
                Some(api_key) => {
                    let model = get(kind.model_var())
                        .unwrap_or_else(|| kind.default_model().to_string());
                    info!("Provider {} enabled (model: {})", kind.as_str(), model);
                    providers.push(ProviderSettings {
                        kind,
                        api_key,
                        model,
                    });
                }
                None => warn!(
                    "Provider {} disabled: {} not set",
                    kind.as_str(),
                    kind.api_key_var()
                ),
            }
        }

        Ok(Self {
            bind_addr: get("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            request_timeout,
            stroke_width,
            result_capacity,
            default_provider,
            providers,
        })
    }
}
