//! Failure taxonomy for a single extraction request.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;

/// Every way one pipeline invocation can fail.
///
/// Failures are reported at the boundary of the request that produced them;
/// nothing here is carried over into the next request.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// A provider was requested whose API key is not configured.
    #[error("missing credential: {0}")]
    MissingCredential(String),

    /// The uploaded bytes could not be decoded as an image.
    #[error("unsupported image format: {0}")]
    UnsupportedImageFormat(String),

    /// Transport or service failure reported by the provider.
    #[error("model invocation failed: {0}")]
    ModelInvocation(String),

    /// The provider answered successfully but without usable content.
    #[error("model returned an empty response")]
    EmptyResponse,

    /// The response could not be parsed as JSON. `raw` is the untouched text.
    #[error("malformed JSON in model response: {reason}")]
    MalformedJson { reason: String, raw: String },
}

impl PipelineError {
    /// Raw provider text, when the failure kept it around for inspection.
    pub fn raw_text(&self) -> Option<&str> {
        match self {
            Self::MalformedJson { raw, .. } => Some(raw),
            _ => None,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::MissingCredential(_) => "missing_credential",
            Self::UnsupportedImageFormat(_) => "unsupported_image_format",
            Self::ModelInvocation(_) => "model_invocation_error",
            Self::EmptyResponse => "empty_response",
            Self::MalformedJson { .. } => "malformed_json",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::MissingCredential(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::UnsupportedImageFormat(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Self::ModelInvocation(_) => StatusCode::BAD_GATEWAY,
            Self::EmptyResponse | Self::MalformedJson { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        }
    }
}

impl IntoResponse for PipelineError {
    fn into_response(self) -> Response {
        let level = match self {
            Self::EmptyResponse => "warning",
            _ => "error",
        };
        let body = json!({
            "error": self.kind(),
            "level": level,
            "message": self.to_string(),
            "raw": self.raw_text(),
        });
        (self.status(), Json(body)).into_response()
    }
}
