//! Extraction pipeline: encode, invoke, parse, then overlay and package.

use anyhow::Context;
use tracing::{info, warn};

use crate::error::PipelineError;
use crate::geometry::normalize;
use crate::image_codec::{self, SourceImage};
use crate::parser::{self, LayoutItem};
use crate::provider::ModelAdapter;
use crate::render::{render, OverlayStyle};
use crate::schema::{Annotation, ExtractionResult, ImageSize};

/// Extraction pipeline orchestrator.
pub struct Extractor<'a> {
    adapter: &'a ModelAdapter,
    style: OverlayStyle,
}

impl<'a> Extractor<'a> {
    pub fn new(adapter: &'a ModelAdapter, style: OverlayStyle) -> Self {
        Self { adapter, style }
    }

    /// Run one extraction. `model_override` replaces the provider's default
    /// model id for this call only.
    pub async fn extract(
        &self,
        source: &SourceImage,
        model_override: Option<&str>,
    ) -> Result<ExtractionResult, PipelineError> {
        let kind = self.adapter.kind();
        let model_id = model_override.unwrap_or(self.adapter.default_model_id());

        info!(
            "Starting extraction for: {} ({} bytes) with provider={} model={}",
            source.filename,
            source.bytes.len(),
            kind.as_str(),
            model_id
        );

        let payload = image_codec::encode(&source.bytes);
        let raw = self.adapter.invoke(kind.prompt(), &payload, model_id).await?;
        let parsed = parser::parse(&raw, self.adapter.mode())?;

        info!("Parsed response: {} layout items", parsed.layout.len());

        let mut warnings = Vec::new();
        let annotation = match self.annotate(source, &parsed.layout, kind.grounded()).await {
            Ok(annotation) => Some(annotation),
            Err(e) => {
                warn!("Image not decoded for {}: {:#}", source.filename, e);
                let lost = if kind.grounded() {
                    "overlay"
                } else {
                    "image size"
                };
                warnings.push(format!("{} unavailable: {:#}", lost, e));
                None
            }
        };

        let result = ExtractionResult::package(
            source,
            kind,
            model_id,
            raw,
            parsed,
            annotation,
            warnings,
        );

        info!("Extraction complete: {}", result.id);
        Ok(result)
    }

    /// Decode the upload off the async runtime. Boxes are drawn only when
    /// `draw` is set; the image size is reported either way.
    async fn annotate(
        &self,
        source: &SourceImage,
        layout: &[LayoutItem],
        draw: bool,
    ) -> anyhow::Result<Annotation> {
        let bytes = source.bytes.clone();
        let boxes: Vec<[i64; 4]> = layout.iter().map(|item| item.box_2d).collect();
        let style = self.style;

        let annotation = tokio::task::spawn_blocking(move || {
            annotate_blocking(&bytes, &boxes, draw, &style)
        })
        .await
        .context("drawing task failed")??;
        Ok(annotation)
    }
}

fn annotate_blocking(
    bytes: &[u8],
    boxes: &[[i64; 4]],
    draw: bool,
    style: &OverlayStyle,
) -> Result<Annotation, PipelineError> {
    let image = image_codec::decode_for_drawing(bytes)?;
    let (width, height) = image.dimensions();
    let size = ImageSize { width, height };

    if !draw {
        return Ok(Annotation {
            size,
            boxes: Vec::new(),
            png: None,
        });
    }

    let boxes: Vec<_> = boxes
        .iter()
        .map(|&box_2d| normalize(box_2d, width, height))
        .collect();
    let annotated = render(&image, &boxes, style);
    let png = image_codec::to_png(&annotated).map_err(|e| {
        PipelineError::UnsupportedImageFormat(format!("PNG encoding failed: {}", e))
    })?;

    Ok(Annotation {
        size,
        boxes,
        png: Some(png),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::PixelRect;
    use crate::provider::tests::FakeModel;
    use crate::provider::ProviderKind;
    use image::{DynamicImage, ImageOutputFormat, Rgb, RgbImage};
    use serde_json::json;
    use std::io::Cursor;
    use std::sync::Arc;
    use std::time::Duration;

    fn png_of(image: &RgbImage) -> Vec<u8> {
        let mut buf = Vec::new();
        DynamicImage::ImageRgb8(image.clone())
            .write_to(&mut Cursor::new(&mut buf), ImageOutputFormat::Png)
            .unwrap();
        buf
    }

    fn adapter(kind: ProviderKind, reply: &str) -> ModelAdapter {
        ModelAdapter::new(
            kind,
            Arc::new(FakeModel::replying(reply)),
            kind.default_model(),
            Duration::from_secs(5),
        )
    }

    #[tokio::test]
    async fn test_end_to_end_invoice() {
        let raw = r#"{"structured_data":{"invoice":"A1"},"layout":[{"text":"Invoice","box_2d":[0,0,100,500]}]}"#;
        let white = Rgb([255, 255, 255]);
        let source_pixels = RgbImage::from_pixel(2000, 2000, white);
        let source = SourceImage::new("invoice.png", png_of(&source_pixels));

        let adapter = adapter(ProviderKind::Gemini, raw);
        let result = Extractor::new(&adapter, OverlayStyle::default())
            .extract(&source, None)
            .await
            .unwrap();

        assert_eq!(result.clean_view(), &json!({"invoice": "A1"}));
        assert_eq!(result.full_view(), raw);
        assert_eq!(
            result.boxes,
            vec![PixelRect {
                x1: 0.0,
                y1: 0.0,
                x2: 1000.0,
                y2: 200.0
            }]
        );

        let overlay = image::load_from_memory(result.overlay_png().unwrap())
            .unwrap()
            .to_rgb8();
        let red = Rgb([255, 0, 0]);
        assert_eq!(overlay.get_pixel(0, 0), &red);
        assert_eq!(overlay.get_pixel(1000, 200), &red);
        assert_eq!(overlay.get_pixel(1000, 100), &red);
        assert_eq!(overlay.get_pixel(500, 200), &red);
        assert_eq!(overlay.get_pixel(500, 100), &white);
        assert_eq!(overlay.get_pixel(1001, 100), &white);
        assert_eq!(overlay.get_pixel(500, 201), &white);
        assert_eq!(
            result.image_size,
            Some(ImageSize {
                width: 2000,
                height: 2000
            })
        );
    }

    #[tokio::test]
    async fn test_structured_only_provider_has_no_overlay() {
        let raw = "Here you go:\n```json\n{\"structured_data\": {\"total\": 12.5}, \"layout\": []}\n```";
        let source = SourceImage::new("scan.jpg", png_of(&RgbImage::new(30, 20)));

        let adapter = adapter(ProviderKind::OpenRouter, raw);
        let result = Extractor::new(&adapter, OverlayStyle::default())
            .extract(&source, Some("custom/vision"))
            .await
            .unwrap();

        assert_eq!(result.clean_view(), &json!({"total": 12.5}));
        assert_eq!(result.model, "custom/vision");
        assert_eq!(
            result.image_size,
            Some(ImageSize {
                width: 30,
                height: 20
            })
        );
        assert!(!result.overlay_available);
        assert!(result.boxes.is_empty());
        assert!(result.warnings.is_empty());
    }

    #[tokio::test]
    async fn test_structured_only_provider_with_undecodable_image() {
        let raw = "{\"structured_data\": {\"total\": 1}}";
        let source = SourceImage::new("scan.bin", b"not an image".to_vec());

        let adapter = adapter(ProviderKind::OpenRouter, raw);
        let result = Extractor::new(&adapter, OverlayStyle::default())
            .extract(&source, None)
            .await
            .unwrap();

        assert_eq!(result.clean_view(), &json!({"total": 1}));
        assert!(result.image_size.is_none());
        assert_eq!(result.warnings.len(), 1);
        assert!(result.warnings[0].starts_with("image size unavailable"));
    }

    #[tokio::test]
    async fn test_undecodable_image_still_returns_data() {
        let raw = r#"{"structured_data":{"a":1},"layout":[{"text":"A","box_2d":[1,1,2,2]}]}"#;
        let source = SourceImage::new("broken.png", b"not an image".to_vec());

        let adapter = adapter(ProviderKind::Groq, raw);
        let result = Extractor::new(&adapter, OverlayStyle::default())
            .extract(&source, None)
            .await
            .unwrap();

        assert_eq!(result.clean_view(), &json!({"a": 1}));
        assert_eq!(result.layout.len(), 1);
        assert!(!result.overlay_available);
        assert!(result.image_size.is_none());
        assert_eq!(result.warnings.len(), 1);
        assert!(result.warnings[0].starts_with("overlay unavailable"));
    }

    #[tokio::test]
    async fn test_malformed_reply_surfaces_raw_text() {
        let source = SourceImage::new("scan.png", png_of(&RgbImage::new(4, 4)));
        let adapter = adapter(ProviderKind::Gemini, "I cannot read this image.");

        let err = Extractor::new(&adapter, OverlayStyle::default())
            .extract(&source, None)
            .await
            .unwrap_err();
        assert_eq!(err.raw_text(), Some("I cannot read this image."));
    }

    #[tokio::test]
    async fn test_source_bytes_unchanged() {
        let raw = r#"{"structured_data":{},"layout":[{"text":"A","box_2d":[0,0,1000,1000]}]}"#;
        let source = SourceImage::new("scan.png", png_of(&RgbImage::new(16, 16)));
        let before = source.sha256();

        let adapter = adapter(ProviderKind::Gemini, raw);
        let extractor = Extractor::new(&adapter, OverlayStyle::default());
        let first = extractor.extract(&source, None).await.unwrap();
        let second = extractor.extract(&source, None).await.unwrap();

        assert_eq!(source.sha256(), before);
        assert_eq!(first.overlay_png(), second.overlay_png());
        assert_ne!(first.id, second.id);
    }
}
