//! Conversion from the model's 0-1000 box space to image pixels.

use serde::Serialize;

/// Side length of the normalized coordinate space used by `box_2d`.
pub const NORMALIZED_SCALE: f64 = 1000.0;

/// Axis-aligned rectangle in pixel space with `x1 <= x2` and `y1 <= y2`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PixelRect {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

/// Map `[ymin, xmin, ymax, xmax]` onto an image of the given size.
///
/// Swapped corners are reordered first. Values outside 0-1000 are scaled
/// proportionally, not clamped.
pub fn normalize(box_2d: [i64; 4], width: u32, height: u32) -> PixelRect {
    let [ymin, xmin, ymax, xmax] = box_2d;
    let (ymin, ymax) = (ymin.min(ymax), ymin.max(ymax));
    let (xmin, xmax) = (xmin.min(xmax), xmin.max(xmax));

    let scale_x = |v: i64| v as f64 * f64::from(width) / NORMALIZED_SCALE;
    let scale_y = |v: i64| v as f64 * f64::from(height) / NORMALIZED_SCALE;

    PixelRect {
        x1: scale_x(xmin),
        y1: scale_y(ymin),
        x2: scale_x(xmax),
        y2: scale_y(ymax),
    }
}
