//! Visual Extractor - document image to structured JSON with grounding overlays.

mod config;
mod error;
mod extractor;
mod geometry;
mod image_codec;
mod parser;
mod prompt;
mod provider;
mod render;
mod schema;
mod store;

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use config::Settings;
use extractor::Extractor;
use image_codec::SourceImage;
use provider::{ProviderInfo, ProviderKind, ProviderRegistry};
use render::OverlayStyle;
use schema::ExtractionResult;
use std::sync::Arc;
use store::ExtractionStore;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Application state shared across handlers.
#[derive(Clone)]
struct AppState {
    extractions: Arc<ExtractionStore>,
    providers: Arc<ProviderRegistry>,
    style: OverlayStyle,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "visual_extractor=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = Settings::from_env()?;
    let providers = ProviderRegistry::from_settings(&settings)?;
    info!(
        "Providers ready: {:?} (default: {})",
        providers.list().iter().map(|p| p.name.as_str()).collect::<Vec<_>>(),
        providers.default_kind().as_str()
    );

    // Build application state
    let state = AppState {
        extractions: Arc::new(ExtractionStore::new(settings.result_capacity)),
        providers: Arc::new(providers),
        style: OverlayStyle {
            stroke_width: settings.stroke_width,
            ..OverlayStyle::default()
        },
    };

    // Run server
    let listener = tokio::net::TcpListener::bind(&settings.bind_addr).await?;
    info!("Server listening on http://{}", settings.bind_addr);
    axum::serve(listener, app(state)).await?;

    Ok(())
}

fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/providers", get(list_providers))
        .route("/extract", post(extract_image))
        .route("/extractions/:id", get(get_extraction))
        .route("/extractions/:id/data", get(get_structured_data))
        .route("/extractions/:id/download", get(download_raw))
        .route("/extractions/:id/overlay.png", get(get_overlay))
        .layer(DefaultBodyLimit::max(100 * 1024 * 1024)) // 100MB
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint.
async fn health() -> &'static str {
    "ok"
}

/// List configured providers.
async fn list_providers(State(state): State<AppState>) -> Json<Vec<ProviderInfo>> {
    Json(state.providers.list())
}

#[derive(serde::Deserialize)]
struct ExtractQuery {
    provider: Option<String>,
    model: Option<String>,
}

/// Upload an image and extract its structured data.
async fn extract_image(
    State(state): State<AppState>,
    Query(query): Query<ExtractQuery>,
    mut multipart: Multipart,
) -> Result<Json<ExtractionResult>, Response> {
    let kind = match query.provider.as_deref() {
        Some(name) => Some(ProviderKind::from_str(name).ok_or_else(|| {
            (
                StatusCode::BAD_REQUEST,
                format!(
                    "Unknown provider: {}. Available: {:?}",
                    name,
                    ProviderKind::ALL.map(|k| k.as_str())
                ),
            )
                .into_response()
        })?),
        None => None,
    };
    let adapter = state.providers.get(kind).map_err(IntoResponse::into_response)?;
    if let Some(model) = query.model.as_deref() {
        if !adapter.kind().accepts_model_id(model) {
            return Err((
                StatusCode::BAD_REQUEST,
                format!("Invalid model id for {}: {:?}", adapter.kind().as_str(), model),
            )
                .into_response());
        }
    }

    // Read the uploaded file
    let mut filename = String::new();
    let mut file_data = Vec::new();

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        (StatusCode::BAD_REQUEST, format!("Multipart error: {}", e)).into_response()
    })? {
        if field.name() == Some("file") {
            filename = field.file_name().unwrap_or("image").to_string();
            file_data = field
                .bytes()
                .await
                .map_err(|e| {
                    (StatusCode::BAD_REQUEST, format!("Failed to read file: {}", e))
                        .into_response()
                })?
                .to_vec();
            break;
        }
    }

    if file_data.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "No file uploaded".to_string()).into_response());
    }

    info!("Received file: {} ({} bytes)", filename, file_data.len());

    let source = SourceImage::new(filename, file_data);
    let extraction = Extractor::new(adapter, state.style)
        .extract(&source, query.model.as_deref())
        .await
        .map_err(|e| {
            error!("Extraction failed: {}", e);
            e.into_response()
        })?;

    state.extractions.insert(extraction.clone());
    debug!("{} extractions held", state.extractions.len());

    Ok(Json(extraction))
}

/// Get an extraction summary by ID.
async fn get_extraction(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ExtractionResult>, StatusCode> {
    state
        .extractions
        .get(&id)
        .map(|e| Json(e.as_ref().clone()))
        .ok_or(StatusCode::NOT_FOUND)
}

/// Get only the structured data of an extraction, without grounding.
async fn get_structured_data(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    state
        .extractions
        .get(&id)
        .map(|e| Json(e.clean_view().clone()))
        .ok_or(StatusCode::NOT_FOUND)
}

/// Download the provider's raw response verbatim.
async fn download_raw(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, StatusCode> {
    let extraction = state.extractions.get(&id).ok_or(StatusCode::NOT_FOUND)?;

    Ok((
        [
            (header::CONTENT_TYPE, "application/json"),
            (header::CONTENT_DISPOSITION, "attachment; filename=\"ocr_result.json\""),
        ],
        extraction.full_view().to_string(),
    )
        .into_response())
}

/// Get the annotated image as PNG.
async fn get_overlay(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, StatusCode> {
    let png = state
        .extractions
        .get(&id)
        .and_then(|e| e.overlay_png().map(<[u8]>::to_vec))
        .ok_or(StatusCode::NOT_FOUND)?;

    Ok(([(header::CONTENT_TYPE, "image/png")], png).into_response())
}
