//! Vision model providers and the invocation adapter around them.
//!
//! Defines the [`VisionModel`] trait so different backends (Gemini, Groq,
//! OpenRouter) can be swapped via query parameter. Each backend is constructed
//! once at startup and wrapped in a [`ModelAdapter`] that owns its prompt,
//! response mode and timeout.

pub mod gemini;
pub mod openai_compat;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info};

use crate::config::Settings;
use crate::error::PipelineError;
use crate::image_codec::EncodedImagePayload;
use crate::prompt;

/// Whether the provider is asked to constrain its own output to JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseMode {
    FreeText,
    JsonMode,
}

/// One outbound vision request.
#[derive(Debug, Clone, Copy)]
pub struct VisionRequest<'a> {
    pub model_id: &'a str,
    pub prompt: &'a str,
    pub image: &'a EncodedImagePayload,
    pub mode: ResponseMode,
}

/// Async trait implemented by each provider backend.
///
/// Implementations return the text content of the reply, or an empty string
/// when the provider answered without any.
#[async_trait::async_trait]
pub trait VisionModel: Send + Sync {
    fn name(&self) -> &str;
    async fn submit(&self, request: &VisionRequest<'_>) -> anyhow::Result<String>;
}

/// Known provider identifiers used for registry lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    Gemini,
    Groq,
    #[serde(rename = "openrouter")]
    OpenRouter,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 3] = [Self::Gemini, Self::Groq, Self::OpenRouter];

    /// Parse a query-parameter string into a provider kind.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "gemini" => Some(Self::Gemini),
            "groq" => Some(Self::Groq),
            "openrouter" => Some(Self::OpenRouter),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Gemini => "gemini",
            Self::Groq => "groq",
            Self::OpenRouter => "openrouter",
        }
    }

    pub fn api_key_var(self) -> &'static str {
        match self {
            Self::Gemini => "GEMINI_API_KEY",
            Self::Groq => "GROQ_API_KEY",
            Self::OpenRouter => "OPENROUTER_API_KEY",
        }
    }

    pub fn model_var(self) -> &'static str {
        match self {
            Self::Gemini => "GEMINI_MODEL",
            Self::Groq => "GROQ_MODEL",
            Self::OpenRouter => "OPENROUTER_MODEL",
        }
    }

    pub fn default_model(self) -> &'static str {
        match self {
            Self::Gemini => "gemini-flash-latest",
            Self::Groq => "meta-llama/llama-4-maverick-17b-128e-instruct",
            Self::OpenRouter => "qwen/qwen-2.5-vl-7b-instruct:free",
        }
    }

    pub fn mode(self) -> ResponseMode {
        match self {
            Self::Gemini | Self::Groq => ResponseMode::JsonMode,
            Self::OpenRouter => ResponseMode::FreeText,
        }
    }

    pub fn prompt(self) -> &'static str {
        match self {
            Self::Gemini => prompt::GROUNDED_EXTRACTION_PROMPT,
            Self::Groq => prompt::COMPACT_GROUNDED_PROMPT,
            Self::OpenRouter => prompt::STRUCTURED_EXTRACTION_PROMPT,
        }
    }

    /// Whether `model_id` can be sent to this provider as given. Gemini puts
    /// the id into the URL path, so it must stay a single path segment.
    pub fn accepts_model_id(self, model_id: &str) -> bool {
        let plain = !model_id.is_empty()
            && !model_id.contains("..")
            && model_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || "-._:/".contains(c));
        match self {
            Self::Gemini => plain && !model_id.contains(['/', ':']),
            Self::Groq | Self::OpenRouter => plain,
        }
    }

    /// Whether results from this provider get a box overlay.
    pub fn grounded(self) -> bool {
        !matches!(self, Self::OpenRouter)
    }
}

/// A provider backend bound to its prompt, response mode and timeout.
#[derive(Clone)]
pub struct ModelAdapter {
    kind: ProviderKind,
    model: Arc<dyn VisionModel>,
    default_model_id: String,
    timeout: Duration,
}

impl ModelAdapter {
    pub fn new(
        kind: ProviderKind,
        model: Arc<dyn VisionModel>,
        default_model_id: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            kind,
            model,
            default_model_id: default_model_id.into(),
            timeout,
        }
    }

    pub fn kind(&self) -> ProviderKind {
        self.kind
    }

    pub fn mode(&self) -> ResponseMode {
        self.kind.mode()
    }

    pub fn default_model_id(&self) -> &str {
        &self.default_model_id
    }

    /// Send one request and return the raw reply text. No retries.
    pub async fn invoke(
        &self,
        prompt: &str,
        image: &EncodedImagePayload,
        model_id: &str,
    ) -> Result<String, PipelineError> {
        let request = VisionRequest {
            model_id,
            prompt,
            image,
            mode: self.mode(),
        };

        info!(
            "{}: invoking model={} mode={:?} ({} base64 chars, {})",
            self.model.name(),
            model_id,
            request.mode,
            image.base64.len(),
            image.media_type
        );

        let raw = tokio::time::timeout(self.timeout, self.model.submit(&request))
            .await
            .map_err(|_| {
                PipelineError::ModelInvocation(format!(
                    "{} timed out after {}s",
                    self.model.name(),
                    self.timeout.as_secs()
                ))
            })?
            .map_err(|e| PipelineError::ModelInvocation(format!("{:#}", e)))?;

        if raw.trim().is_empty() {
            return Err(PipelineError::EmptyResponse);
        }

        debug!(
            "{}: raw response ({} bytes): {}",
            self.model.name(),
            raw.len(),
            raw.chars().take(500).collect::<String>()
        );

        Ok(raw)
    }
}

/// Public description of a registered provider.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderInfo {
    pub name: ProviderKind,
    pub default_model: String,
    pub mode: ResponseMode,
    pub overlay: bool,
}

/// Adapters for every provider whose credentials are configured.
pub struct ProviderRegistry {
    adapters: HashMap<ProviderKind, ModelAdapter>,
    default_kind: ProviderKind,
}

impl ProviderRegistry {
    /// Build one client per configured provider. Fails when none are configured.
    pub fn from_settings(settings: &Settings) -> Result<Self, PipelineError> {
        let http = reqwest::Client::new();
        let mut adapters = Vec::new();

        for provider in &settings.providers {
            let model: Arc<dyn VisionModel> = match provider.kind {
                ProviderKind::Gemini => Arc::new(gemini::GeminiClient::new(
                    http.clone(),
                    provider.api_key.clone(),
                )),
                ProviderKind::Groq => Arc::new(openai_compat::ChatVisionClient::groq(
                    http.clone(),
                    provider.api_key.clone(),
                )),
                ProviderKind::OpenRouter => Arc::new(openai_compat::ChatVisionClient::openrouter(
                    http.clone(),
                    provider.api_key.clone(),
                )),
            };
            adapters.push(ModelAdapter::new(
                provider.kind,
                model,
                provider.model.clone(),
                settings.request_timeout,
            ));
        }

        Self::new(adapters, settings.default_provider)
    }

    /// Build from ready-made adapters.
    pub fn new(
        adapters: Vec<ModelAdapter>,
        preferred: Option<ProviderKind>,
    ) -> Result<Self, PipelineError> {
        let adapters: HashMap<ProviderKind, ModelAdapter> =
            adapters.into_iter().map(|a| (a.kind(), a)).collect();

        let default_kind = preferred
            .filter(|k| adapters.contains_key(k))
            .or_else(|| ProviderKind::ALL.into_iter().find(|k| adapters.contains_key(k)))
            .ok_or_else(|| {
                PipelineError::MissingCredential(format!(
                    "none of {} is set",
                    ProviderKind::ALL.map(|k| k.api_key_var()).join(", ")
                ))
            })?;

        Ok(Self {
            adapters,
            default_kind,
        })
    }

    /// Look up the adapter for `kind`, or the default provider when `None`.
    pub fn get(&self, kind: Option<ProviderKind>) -> Result<&ModelAdapter, PipelineError> {
        let kind = kind.unwrap_or(self.default_kind);
        self.adapters
            .get(&kind)
            .ok_or_else(|| PipelineError::MissingCredential(kind.api_key_var().to_string()))
    }

    pub fn default_kind(&self) -> ProviderKind {
        self.default_kind
    }

    pub fn list(&self) -> Vec<ProviderInfo> {
        ProviderKind::ALL
            .into_iter()
            .filter_map(|k| self.adapters.get(&k))
            .map(|a| ProviderInfo {
                name: a.kind(),
                default_model: a.default_model_id().to_string(),
                mode: a.mode(),
                overlay: a.kind().grounded(),
            })
            .collect()
    }
}
