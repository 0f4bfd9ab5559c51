//! Utility functions for image processing and coordinate transformations.

pub mod image_conversion;
pub mod safe_cast;

use crate::{landmarks::PixelPoint, Error, Result};
use safe_cast::clamp_to_extent;

/// Axis-aligned crop region in pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropBox {
    /// Left edge (inclusive)
    pub x: u32,
    /// Top edge (inclusive)
    pub y: u32,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

/// Tight bounding box `[min_x, max_x) x [min_y, max_y)` of a point set,
/// clamped to the image boundaries
///
/// The maximum coordinate is exclusive, so the extreme points themselves
/// fall on the box edge and outside the crop.
///
/// # Errors
///
/// Returns an error if the point set is empty or the clamped box has no area
pub fn bounding_box(points: &[PixelPoint], max_width: u32, max_height: u32) -> Result<CropBox> {
    let first = points
        .first()
        .ok_or_else(|| Error::InvalidInput("Cannot bound an empty point set".to_string()))?;

    let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
    for point in &points[1..] {
        min_x = min_x.min(point.x);
        min_y = min_y.min(point.y);
        max_x = max_x.max(point.x);
        max_y = max_y.max(point.y);
    }

    let left = clamp_to_extent(min_x, max_width);
    let top = clamp_to_extent(min_y, max_height);
    let right = clamp_to_extent(max_x, max_width);
    let bottom = clamp_to_extent(max_y, max_height);

    if right <= left || bottom <= top {
        return Err(Error::InvalidInput(format!(
            "Empty crop region x={min_x}..{max_x} y={min_y}..{max_y} in {max_width}x{max_height} frame"
        )));
    }

    Ok(CropBox {
        x: left,
        y: top,
        width: right - left,
        height: bottom - top,
    })
}
