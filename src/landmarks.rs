//! Face mesh landmarks and the detector capability.
//!
//! A [`LandmarkDetector`] turns an RGB frame into at most one set of normalized
//! landmarks. [`MeshPoints`] holds those landmarks scaled to integer pixel
//! coordinates, the form every downstream computation works in.

use crate::{utils::safe_cast::normalized_to_pixel, Error, Result};
use image::RgbImage;
use nalgebra::Point2;

/// Landmark in pixel coordinates
pub type PixelPoint = Point2<i32>;

/// Landmark normalized to `[0, 1]` of the frame width and height
///
/// Points slightly outside the frame produce values outside that range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizedPoint {
    /// Horizontal position as a fraction of frame width
    pub x: f32,
    /// Vertical position as a fraction of frame height
    pub y: f32,
}

impl NormalizedPoint {
    /// Create a normalized point
    #[must_use]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Face landmark detector
///
/// Implementations may keep state between frames (tracking), so a detector
/// is driven through `&mut self` and never shared between extractors.
pub trait LandmarkDetector {
    /// Detect the landmarks of the first face in an RGB frame
    ///
    /// Returns `Ok(None)` when no face is present.
    ///
    /// # Errors
    ///
    /// Returns an error if inference itself fails
    fn detect(&mut self, rgb: &RgbImage) -> Result<Option<Vec<NormalizedPoint>>>;

    /// Release model resources. Called exactly once by the owning extractor.
    fn close(&mut self) {}
}

/// Landmarks of one face in integer pixel coordinates
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeshPoints {
    points: Vec<PixelPoint>,
}

impl MeshPoints {
    /// Scale normalized landmarks by the frame size and truncate to pixels
    ///
    /// # Errors
    ///
    /// Returns an error if a landmark is not finite
    pub fn from_normalized(points: &[NormalizedPoint], width: u32, height: u32) -> Result<Self> {
        let points = points
            .iter()
            .map(|p| Ok(PixelPoint::new(normalized_to_pixel(p.x, width)?, normalized_to_pixel(p.y, height)?)))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { points })
    }

    /// Wrap landmarks that are already in pixel coordinates
    #[must_use]
    pub fn from_pixels(points: Vec<PixelPoint>) -> Self {
        Self { points }
    }

    /// Number of landmarks
    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether the mesh has no landmarks
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Landmark at a mesh index
    ///
    /// # Errors
    ///
    /// Returns an error if the mesh is too short for the index
    pub fn get(&self, index: usize) -> Result<PixelPoint> {
        self.points.get(index).copied().ok_or_else(|| {
            Error::ModelOutputError(format!(
                "Landmark {index} requested from a mesh of {} points",
                self.points.len()
            ))
        })
    }

    /// Landmarks at a list of mesh indices, in list order
    ///
    /// # Errors
    ///
    /// Returns an error if any index is out of range
    pub fn select(&self, indices: &[usize]) -> Result<Vec<PixelPoint>> {
        indices.iter().map(|&i| self.get(i)).collect()
    }

    /// All landmarks
    #[must_use]
    pub fn points(&self) -> &[PixelPoint] {
        &self.points
    }
}

/// Minimum enclosing circle of a small point cluster, as (centre, radius)
///
/// Checks every circle through two or three of the points and keeps the
/// smallest one that contains all of them; intended for iris clusters of a
/// handful of points.
///
/// # Errors
///
/// Returns an error if the cluster is empty
pub fn enclosing_circle(points: &[PixelPoint]) -> Result<(Point2<f64>, f64)> {
    let pts: Vec<Point2<f64>> = points.iter().map(|p| Point2::new(f64::from(p.x), f64::from(p.y))).collect();

    let first = *pts
        .first()
        .ok_or_else(|| Error::InvalidInput("Cannot enclose an empty point set".to_string()))?;
    if pts.len() == 1 {
        return Ok((first, 0.0));
    }

    let contains_all = |center: &Point2<f64>, radius: f64| {
        pts.iter().all(|p| nalgebra::distance(p, center) <= radius + 1e-9)
    };

    let mut best: Option<(Point2<f64>, f64)> = None;
    let mut consider = |center: Point2<f64>, radius: f64| {
        if best.map_or(true, |(_, r)| radius < r) && contains_all(&center, radius) {
            best = Some((center, radius));
        }
    };

    for i in 0..pts.len() {
        for j in (i + 1)..pts.len() {
            let center = nalgebra::center(&pts[i], &pts[j]);
            consider(center, nalgebra::distance(&pts[i], &pts[j]) / 2.0);

            for k in (j + 1)..pts.len() {
                if let Some(center) = circumcenter(&pts[i], &pts[j], &pts[k]) {
                    consider(center, nalgebra::distance(&center, &pts[i]));
                }
            }
        }
    }

    best.ok_or_else(|| Error::InvalidInput("No enclosing circle found".to_string()))
}

/// Circumcentre of a triangle, `None` for collinear points
fn circumcenter(a: &Point2<f64>, b: &Point2<f64>, c: &Point2<f64>) -> Option<Point2<f64>> {
    let d = 2.0 * (a.x * (b.y - c.y) + b.x * (c.y - a.y) + c.x * (a.y - b.y));
    if d.abs() < f64::EPSILON {
        return None;
    }

    let a2 = a.x * a.x + a.y * a.y;
    let b2 = b.x * b.x + b.y * b.y;
    let c2 = c.x * c.x + c.y * c.y;
    let ux = (a2 * (b.y - c.y) + b2 * (c.y - a.y) + c2 * (a.y - b.y)) / d;
    let uy = (a2 * (c.x - b.x) + b2 * (a.x - c.x) + c2 * (b.x - a.x)) / d;

    Some(Point2::new(ux, uy))
}
