//! Draw grounding rectangles onto a copy of the source image.

use image::{Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;

use crate::geometry::PixelRect;

/// Outline color and thickness for overlay boxes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverlayStyle {
    pub color: Rgb<u8>,
    pub stroke_width: u32,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            color: Rgb([255, 0, 0]),
            stroke_width: 3,
        }
    }
}

/// Return a new image with one unfilled rectangle per `rect`, drawn in order.
/// The source buffer is never written to.
pub fn render(source: &RgbImage, rects: &[PixelRect], style: &OverlayStyle) -> RgbImage {
    let mut canvas = source.clone();
    for rect in rects {
        draw_outline(&mut canvas, rect, style);
    }
    canvas
}

/// Both corners are inclusive pixels and the stroke grows inward from the
/// rectangle edge. Degenerate boxes still get a one pixel mark.
fn draw_outline(canvas: &mut RgbImage, rect: &PixelRect, style: &OverlayStyle) {
    let (width, height) = canvas.dimensions();
    // Edges beyond the canvas are invisible anyway; pulling them in just past
    // the border keeps the line iterators short for absurd coordinates.
    let margin = i64::from(style.stroke_width) + 1;
    let clip = |v: f64, limit: u32| (v.round() as i64).clamp(-margin, i64::from(limit) + margin);

    let x1 = clip(rect.x1, width);
    let y1 = clip(rect.y1, height);
    let w = (clip(rect.x2, width) - x1 + 1).max(1);
    let h = (clip(rect.y2, height) - y1 + 1).max(1);

    for t in 0..i64::from(style.stroke_width.max(1)) {
        let (inner_w, inner_h) = (w - 2 * t, h - 2 * t);
        if inner_w <= 0 || inner_h <= 0 {
            break;
        }
        let outline = Rect::at((x1 + t) as i32, (y1 + t) as i32)
            .of_size(inner_w as u32, inner_h as u32);
        draw_hollow_rect_mut(canvas, outline, style.color);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::normalize;
    use sha2::{Digest, Sha256};

    const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
    const RED: Rgb<u8> = Rgb([255, 0, 0]);

    fn digest(image: &RgbImage) -> Vec<u8> {
        Sha256::digest(image.as_raw()).to_vec()
    }

    #[test]
    fn test_source_untouched() {
        let source = RgbImage::from_pixel(50, 40, WHITE);
        let before = digest(&source);

        let rects = [normalize([100, 100, 500, 500], 50, 40)];
        let annotated = render(&source, &rects, &OverlayStyle::default());

        assert_eq!(digest(&source), before);
        assert_ne!(digest(&annotated), before);
    }

    #[test]
    fn test_rendering_is_idempotent() {
        let source = RgbImage::from_pixel(64, 64, WHITE);
        let rects = [
            normalize([0, 0, 500, 500], 64, 64),
            normalize([900, 900, 200, 300], 64, 64),
        ];
        let style = OverlayStyle::default();
        let a = render(&source.clone(), &rects, &style);
        let b = render(&source.clone(), &rects, &style);
        assert_eq!(a, b);
    }

    #[test]
    fn test_outline_only() {
        let source = RgbImage::from_pixel(100, 100, WHITE);
        let rect = PixelRect {
            x1: 10.0,
            y1: 20.0,
            x2: 60.0,
            y2: 70.0,
        };
        let out = render(&source, &[rect], &OverlayStyle::default());

        // Outer edge, both corners included, and the two inner stroke rows.
        assert_eq!(out.get_pixel(10, 20), &RED);
        assert_eq!(out.get_pixel(60, 70), &RED);
        assert_eq!(out.get_pixel(60, 45), &RED);
        assert_eq!(out.get_pixel(35, 70), &RED);
        assert_eq!(out.get_pixel(12, 40), &RED);
        assert_eq!(out.get_pixel(58, 40), &RED);
        // Interior and outside stay untouched.
        assert_eq!(out.get_pixel(13, 40), &WHITE);
        assert_eq!(out.get_pixel(57, 40), &WHITE);
        assert_eq!(out.get_pixel(35, 45), &WHITE);
        assert_eq!(out.get_pixel(61, 45), &WHITE);
        assert_eq!(out.get_pixel(35, 71), &WHITE);
        assert_eq!(out.get_pixel(9, 20), &WHITE);
    }

    #[test]
    fn test_degenerate_and_offscreen_boxes_do_not_panic() {
        let source = RgbImage::from_pixel(20, 20, WHITE);
        let rects = [
            PixelRect { x1: 5.0, y1: 5.0, x2: 5.0, y2: 5.0 },
            PixelRect { x1: -1e12, y1: -50.0, x2: 1e12, y2: 400.0 },
            PixelRect { x1: 100.0, y1: 100.0, x2: 200.0, y2: 200.0 },
        ];
        let out = render(&source, &rects, &OverlayStyle::default());
        assert_eq!(out.get_pixel(5, 5), &RED);
        assert_eq!(out.dimensions(), (20, 20));
    }

    #[test]
    fn test_custom_style() {
        let source = RgbImage::from_pixel(10, 10, WHITE);
        let style = OverlayStyle {
            color: Rgb([0, 0, 255]),
            stroke_width: 1,
        };
        let rect = PixelRect { x1: 0.0, y1: 0.0, x2: 9.0, y2: 9.0 };
        let out = render(&source, &[rect], &style);
        assert_eq!(out.get_pixel(0, 0), &Rgb([0, 0, 255]));
        assert_eq!(out.get_pixel(9, 9), &Rgb([0, 0, 255]));
        assert_eq!(out.get_pixel(1, 1), &WHITE);
        assert_eq!(out.get_pixel(8, 8), &WHITE);
    }
}
