//! Image transport encoding and decoding for drawing.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use image::{DynamicImage, ImageFormat, ImageOutputFormat, RgbImage};
use sha2::{Digest, Sha256};
use std::io::Cursor;

use crate::error::PipelineError;

/// Media type declared when the bytes are not recognised.
const FALLBACK_MEDIA_TYPE: &str = "image/jpeg";

/// An uploaded image, exactly as received.
#[derive(Debug, Clone)]
pub struct SourceImage {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl SourceImage {
    pub fn new(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            bytes,
        }
    }

    /// Hex SHA-256 of the uploaded bytes.
    pub fn sha256(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(&self.bytes);
        format!("{:x}", hasher.finalize())
    }
}

/// Base64 payload plus the media type it is declared as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImagePayload {
    pub media_type: &'static str,
    pub base64: String,
}

impl EncodedImagePayload {
    /// `data:` URL form used by OpenAI-compatible chat APIs.
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.media_type, self.base64)
    }
}

/// Encode arbitrary bytes for transport. Never fails; validating the image is
/// left to the model.
pub fn encode(bytes: &[u8]) -> EncodedImagePayload {
    EncodedImagePayload {
        media_type: media_type_of(bytes),
        base64: BASE64.encode(bytes),
    }
}

/// Sniff the media type from magic bytes.
pub fn media_type_of(bytes: &[u8]) -> &'static str {
    match image::guess_format(bytes) {
        Ok(ImageFormat::Png) => "image/png",
        Ok(ImageFormat::Jpeg) => "image/jpeg",
        Ok(ImageFormat::WebP) => "image/webp",
        Ok(ImageFormat::Gif) => "image/gif",
        Ok(ImageFormat::Bmp) => "image/bmp",
        Ok(ImageFormat::Tiff) => "image/tiff",
        _ => FALLBACK_MEDIA_TYPE,
    }
}

/// Decode into an 8-bit RGB buffer regardless of the source color model, so
/// overlay colors come out the same for paletted, grey or alpha inputs.
pub fn decode_for_drawing(bytes: &[u8]) -> Result<RgbImage, PipelineError> {
    let decoded = image::load_from_memory(bytes)
        .map_err(|e| PipelineError::UnsupportedImageFormat(e.to_string()))?;
    Ok(decoded.to_rgb8())
}

/// Encode a drawn buffer as PNG for display.
pub fn to_png(image: &RgbImage) -> anyhow::Result<Vec<u8>> {
    let mut buf = Vec::new();
    DynamicImage::ImageRgb8(image.clone())
        .write_to(&mut Cursor::new(&mut buf), ImageOutputFormat::Png)?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma, Rgb, Rgba, RgbaImage};

    fn png_bytes(image: DynamicImage) -> Vec<u8> {
        let mut buf = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut buf), ImageOutputFormat::Png)
            .unwrap();
        buf
    }

    #[test]
    fn test_encode_is_total() {
        let payload = encode(b"definitely not an image");
        assert_eq!(payload.media_type, "image/jpeg");
        assert_eq!(payload.base64, "ZGVmaW5pdGVseSBub3QgYW4gaW1hZ2U=");
        assert!(encode(&[]).base64.is_empty());
    }

    #[test]
    fn test_encode_detects_png() {
        let bytes = png_bytes(DynamicImage::ImageRgb8(RgbImage::new(4, 4)));
        let payload = encode(&bytes);
        assert_eq!(payload.media_type, "image/png");
        assert!(payload.data_url().starts_with("data:image/png;base64,iVBOR"));
    }

    #[test]
    fn test_encode_then_decode() {
        let mut source = RgbImage::new(8, 5);
        source.put_pixel(3, 2, Rgb([10, 20, 30]));
        let bytes = png_bytes(DynamicImage::ImageRgb8(source.clone()));

        let _ = encode(&bytes);
        let decoded = decode_for_drawing(&bytes).unwrap();
        assert_eq!(decoded.dimensions(), (8, 5));
        assert_eq!(decoded, source);
    }

    #[test]
    fn test_grayscale_normalized_to_rgb() {
        let gray = GrayImage::from_pixel(3, 3, Luma([200]));
        let bytes = png_bytes(DynamicImage::ImageLuma8(gray));

        let decoded = decode_for_drawing(&bytes).unwrap();
        assert_eq!(decoded.get_pixel(1, 1), &Rgb([200, 200, 200]));
    }

    #[test]
    fn test_alpha_dropped_when_normalized_to_rgb() {
        let mut rgba = RgbaImage::from_pixel(4, 2, Rgba([255, 255, 255, 255]));
        rgba.put_pixel(1, 1, Rgba([10, 20, 30, 128]));
        let bytes = png_bytes(DynamicImage::ImageRgba8(rgba));

        let decoded = decode_for_drawing(&bytes).unwrap();
        assert_eq!(decoded.dimensions(), (4, 2));
        assert_eq!(decoded.get_pixel(1, 1), &Rgb([10, 20, 30]));
        assert_eq!(decoded.get_pixel(0, 0), &Rgb([255, 255, 255]));
    }

    #[test]
    fn test_undecodable_bytes() {
        let err = decode_for_drawing(b"plain text").unwrap_err();
        assert!(matches!(err, PipelineError::UnsupportedImageFormat(_)));
    }

    #[test]
    fn test_sha256_is_stable() {
        let a = SourceImage::new("a.png", b"abc".to_vec());
        assert_eq!(
            a.sha256(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
