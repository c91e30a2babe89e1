//! OpenAI-compatible chat completions client, used for Groq and OpenRouter.

use super::{ResponseMode, VisionModel, VisionRequest};
use anyhow::Context;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

const GROQ_API_URL: &str = "https://api.groq.com/openai/v1/chat/completions";
const OPENROUTER_API_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

/// Chat completions client for one OpenAI-compatible endpoint.
#[derive(Clone)]
pub struct ChatVisionClient {
    name: &'static str,
    client: Client,
    url: &'static str,
    api_key: String,
    temperature: Option<f32>,
    extra_headers: Vec<(&'static str, &'static str)>,
}

impl ChatVisionClient {
    /// Groq endpoint. Deterministic sampling for steadier coordinates.
    pub fn groq(client: Client, api_key: String) -> Self {
        Self {
            name: "groq",
            client,
            url: GROQ_API_URL,
            api_key,
            temperature: Some(0.0),
            extra_headers: Vec::new(),
        }
    }

    /// OpenRouter endpoint. Attribution headers are required by OpenRouter.
    pub fn openrouter(client: Client, api_key: String) -> Self {
        Self {
            name: "openrouter",
            client,
            url: OPENROUTER_API_URL,
            api_key,
            temperature: None,
            extra_headers: vec![
                ("HTTP-Referer", "http://localhost:3000"),
                ("X-Title", "Visual Extractor"),
            ],
        }
    }

    fn build_request(&self, request: &VisionRequest<'_>) -> ChatCompletionRequest {
        let response_format = match request.mode {
            ResponseMode::JsonMode => Some(ResponseFormat::JsonObject),
            ResponseMode::FreeText => None,
        };

        ChatCompletionRequest {
            model: request.model_id.to_string(),
            messages: vec![Message::user_with_image(
                request.prompt,
                request.image.data_url(),
            )],
            temperature: self.temperature,
            response_format,
        }
    }
}

#[async_trait::async_trait]
impl VisionModel for ChatVisionClient {
    fn name(&self) -> &str {
        self.name
    }

    async fn submit(&self, request: &VisionRequest<'_>) -> anyhow::Result<String> {
        let body = self.build_request(request);
        debug!("Sending request to {}: model={}", self.name, body.model);

        let mut builder = self
            .client
            .post(self.url)
            .bearer_auth(&self.api_key)
            .json(&body);
        for (name, value) in &self.extra_headers {
            builder = builder.header(*name, *value);
        }

        let response = builder
            .send()
            .await
            .with_context(|| format!("Failed to send request to {}", self.name))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("{} API error ({}): {}", self.name, status, error_text);
        }

        let response: ChatCompletionResponse = response
            .json()
            .await
            .with_context(|| format!("Failed to parse {} response", self.name))?;

        if let Some(usage) = &response.usage {
            info!(
                "{} response: {} tokens (prompt: {}, completion: {})",
                self.name, usage.total_tokens, usage.prompt_tokens, usage.completion_tokens
            );
        }

        Ok(response.into_content())
    }
}

// ============================================================================
// Request/Response types
// ============================================================================

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ResponseFormat {
    JsonObject,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

impl ChatCompletionResponse {
    /// First choice's content, empty when the provider sent none.
    fn into_content(self) -> String {
        self.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default()
    }
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

// ============================================================================
// Message types
// ============================================================================

#[derive(Debug, Clone, Serialize)]
struct Message {
    role: &'static str,
    content: Vec<ContentPart>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, Serialize)]
struct ImageUrl {
    url: String,
}

impl Message {
    /// User message carrying the prompt followed by one image data URL.
    fn user_with_image(text: impl Into<String>, data_url: String) -> Self {
        Self {
            role: "user",
            content: vec![
                ContentPart::Text { text: text.into() },
                ContentPart::ImageUrl {
                    image_url: ImageUrl { url: data_url },
                },
            ],
        }
    }
}
