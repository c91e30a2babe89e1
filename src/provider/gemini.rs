//! Google Gemini provider (Generative Language `generateContent` API).

use super::{ProviderKind, ResponseMode, VisionModel, VisionRequest};
use serde::{Deserialize, Serialize};
use tracing::info;

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

pub struct GeminiClient {
    api_key: String,
    client: reqwest::Client,
}

impl GeminiClient {
    pub fn new(client: reqwest::Client, api_key: String) -> Self {
        Self { api_key, client }
    }
}

// ── Gemini API request/response types ───────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part<'a> {
    Text {
        text: &'a str,
    },
    #[serde(rename_all = "camelCase")]
    InlineData {
        inline_data: InlineData<'a>,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData<'a> {
    mime_type: &'a str,
    data: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: &'static str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
    #[serde(default)]
    total_token_count: u32,
}

fn build_request<'a>(request: &'a VisionRequest<'a>) -> GenerateContentRequest<'a> {
    let generation_config = match request.mode {
        ResponseMode::JsonMode => Some(GenerationConfig {
            response_mime_type: "application/json",
        }),
        ResponseMode::FreeText => None,
    };

    GenerateContentRequest {
        contents: vec![Content {
            parts: vec![
                Part::Text {
                    text: request.prompt,
                },
                Part::InlineData {
                    inline_data: InlineData {
                        mime_type: request.image.media_type,
                        data: &request.image.base64,
                    },
                },
            ],
        }],
        generation_config,
    }
}

/// Concatenated text of the first candidate, empty when there is none.
fn response_text(response: GenerateContentResponse) -> String {
    response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|c| {
            c.parts
                .into_iter()
                .filter_map(|p| p.text)
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default()
}

// ── Provider implementation ─────────────────────────────────────────────────

#[async_trait::async_trait]
impl VisionModel for GeminiClient {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn submit(&self, request: &VisionRequest<'_>) -> anyhow::Result<String> {
        anyhow::ensure!(
            ProviderKind::Gemini.accepts_model_id(request.model_id),
            "Invalid Gemini model id: {:?}",
            request.model_id
        );
        let body = build_request(request);
        let url = format!("{}/{}:generateContent", GEMINI_API_BASE, request.model_id);

        let resp = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            anyhow::bail!("Gemini API error ({}): {}", status, text);
        }

        let response: GenerateContentResponse = resp.json().await?;

        if let Some(usage) = &response.usage_metadata {
            info!(
                "Gemini response: {} tokens (prompt: {}, completion: {})",
                usage.total_token_count, usage.prompt_token_count, usage.candidates_token_count
            );
        }

        Ok(response_text(response))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image_codec::EncodedImagePayload;
    use serde_json::json;

    #[test]
    fn test_request_shape_json_mode() {
        let image = EncodedImagePayload {
            media_type: "image/png",
            base64: "AAAA".to_string(),
        };
        let request = VisionRequest {
            model_id: "gemini-flash-latest",
            prompt: "extract",
            image: &image,
            mode: ResponseMode::JsonMode,
        };

        let body = serde_json::to_value(build_request(&request)).unwrap();
        assert_eq!(
            body,
            json!({
                "contents": [{
                    "parts": [
                        {"text": "extract"},
                        {"inlineData": {"mimeType": "image/png", "data": "AAAA"}}
                    ]
                }],
                "generationConfig": {"responseMimeType": "application/json"}
            })
        );
    }

    #[test]
    fn test_request_shape_free_text_omits_config() {
        let image = EncodedImagePayload {
            media_type: "image/jpeg",
            base64: String::new(),
        };
        let request = VisionRequest {
            model_id: "m",
            prompt: "p",
            image: &image,
            mode: ResponseMode::FreeText,
        };
        let body = serde_json::to_value(build_request(&request)).unwrap();
        assert!(body.get("generationConfig").is_none());
    }

    #[test]
    fn test_response_text_joins_parts() {
        let response: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{"content": {"parts": [{"text": "{\"a\":"}, {"text": "1}"}]}}],
            "usageMetadata": {"promptTokenCount": 10, "candidatesTokenCount": 2, "totalTokenCount": 12}
        }))
        .unwrap();
        assert_eq!(response_text(response), "{\"a\":1}");
    }

    #[test]
    fn test_response_without_candidates_is_empty() {
        let response: GenerateContentResponse =
            serde_json::from_value(json!({"promptFeedback": {"blockReason": "SAFETY"}})).unwrap();
        assert_eq!(response_text(response), "");
    }
}
