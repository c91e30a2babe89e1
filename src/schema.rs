//! Packaged extraction results.
//!
//! One result holds two independent views of a single model reply: the clean
//! `structured_data` for display and the verbatim raw text for download.

use serde::Serialize;
use serde_json::Value;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

use crate::geometry::PixelRect;
use crate::image_codec::SourceImage;
use crate::parser::{LayoutItem, ParsedPayload};
use crate::provider::ProviderKind;

/// Generate ISO8601 timestamp for current time.
pub fn now_iso8601() -> String {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    format_iso8601(secs)
}

/// Format seconds since the epoch as `YYYY-MM-DDTHH:MM:SSZ`.
fn format_iso8601(secs: u64) -> String {
    let days_since_epoch = secs / 86400;
    let time_of_day = secs % 86400;
    let hours = time_of_day / 3600;
    let minutes = (time_of_day % 3600) / 60;
    let seconds = time_of_day % 60;

    let mut year = 1970i32;
    let mut remaining_days = days_since_epoch as i32;

    loop {
        let days_in_year = if is_leap_year(year) { 366 } else { 365 };
        if remaining_days < days_in_year {
            break;
        }
        remaining_days -= days_in_year;
        year += 1;
    }

    let days_in_months: [i32; 12] = if is_leap_year(year) {
        [31, 29, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31]
    } else {
        [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31]
    };

    let mut month = 1;
    for days in days_in_months {
        if remaining_days < days {
            break;
        }
        remaining_days -= days;
        month += 1;
    }
    let day = remaining_days + 1;

    format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}Z",
        year, month, day, hours, minutes, seconds
    )
}

fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || (year % 400 == 0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

/// What decoding the upload produced: its size always, plus the drawn boxes
/// and PNG overlay when the provider is grounded.
#[derive(Debug, Clone)]
pub struct Annotation {
    pub size: ImageSize,
    pub boxes: Vec<PixelRect>,
    pub png: Option<Vec<u8>>,
}

/// Root extraction result.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionResult {
    pub id: String,
    pub extracted_at: String, // ISO8601 timestamp
    pub extractor_version: String,
    pub provider: ProviderKind,
    pub model: String,
    pub source_file: String,
    pub image_sha256: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_size: Option<ImageSize>,
    pub structured_data: Value,
    pub layout: Vec<LayoutItem>,
    /// Pixel rectangles in the same order as `layout`.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub boxes: Vec<PixelRect>,
    pub overlay_available: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    #[serde(skip)]
    raw_response: String,
    #[serde(skip)]
    overlay_png: Option<Vec<u8>>,
}

impl ExtractionResult {
    /// Assemble both views from one parsed reply.
    pub fn package(
        source: &SourceImage,
        provider: ProviderKind,
        model: &str,
        raw_response: String,
        parsed: ParsedPayload,
        annotation: Option<Annotation>,
        warnings: Vec<String>,
    ) -> Self {
        let (image_size, boxes, overlay_png) = match annotation {
            Some(a) => (Some(a.size), a.boxes, a.png),
            None => (None, Vec::new(), None),
        };

        Self {
            id: format!("ext_{}", Uuid::new_v4().simple()),
            extracted_at: now_iso8601(),
            extractor_version: env!("CARGO_PKG_VERSION").to_string(),
            provider,
            model: model.to_string(),
            source_file: source.filename.clone(),
            image_sha256: source.sha256(),
            image_size,
            structured_data: parsed.structured_data,
            layout: parsed.layout,
            boxes,
            overlay_available: overlay_png.is_some(),
            warnings,
            raw_response,
            overlay_png,
        }
    }

    /// Business data only, without grounding.
    pub fn clean_view(&self) -> &Value {
        &self.structured_data
    }

    /// Provider output exactly as received.
    pub fn full_view(&self) -> &str {
        &self.raw_response
    }

    pub fn overlay_png(&self) -> Option<&[u8]> {
        self.overlay_png.as_deref()
    }
}
