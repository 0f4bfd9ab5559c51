//! Eye geometry features.
//!
//! The feature vector is the model input, so its column order is part of the
//! on-disk format:
//!
//! | columns | content |
//! |---------|---------|
//! | 0..16   | distance from each `LEFT_EYE` contour point to the left iris centre |
//! | 16..32  | distance from each `RIGHT_EYE` contour point to the right iris centre |
//! | 32      | distance between `RIGHT_EYE[0]` and `LEFT_EYE[0]` |

use crate::{
    constants::{
        EYE_CONTOUR_POINTS, LEFT_EYE, LEFT_IRIS, LEFT_IRIS_CENTER, NUM_EYE_METRICS, RIGHT_EYE, RIGHT_IRIS,
        RIGHT_IRIS_CENTER,
    },
    landmarks::{enclosing_circle, MeshPoints, PixelPoint},
    utils::safe_cast::f64_to_i32,
    Error, Result,
};
use nalgebra::Point2;
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Fixed-length eye metrics vector
#[derive(Debug, Clone, PartialEq)]
pub struct EyeMetrics {
    values: [f64; NUM_EYE_METRICS],
}

/// Where the iris centre of each eye is taken from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IrisCenter {
    /// The dedicated iris centre landmark
    #[default]
    Landmark,
    /// Centre of the enclosing circle of the four iris boundary landmarks,
    /// truncated to whole pixels
    Cluster,
}

impl IrisCenter {
    /// Left and right iris centres of a mesh
    ///
    /// # Errors
    ///
    /// Returns an error if the mesh lacks the iris landmarks
    pub fn locate(self, mesh: &MeshPoints) -> Result<(PixelPoint, PixelPoint)> {
        match self {
            Self::Landmark => Ok((mesh.get(LEFT_IRIS_CENTER)?, mesh.get(RIGHT_IRIS_CENTER)?)),
            Self::Cluster => Ok((cluster_center(mesh, &LEFT_IRIS)?, cluster_center(mesh, &RIGHT_IRIS)?)),
        }
    }
}

impl FromStr for IrisCenter {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "landmark" => Ok(Self::Landmark),
            "cluster" => Ok(Self::Cluster),
            other => Err(Error::InvalidInput(format!(
                "Unknown iris centre mode '{other}', expected 'landmark' or 'cluster'"
            ))),
        }
    }
}

fn cluster_center(mesh: &MeshPoints, indices: &[usize]) -> Result<PixelPoint> {
    let (center, _) = enclosing_circle(&mesh.select(indices)?)?;
    Ok(PixelPoint::new(f64_to_i32(center.x)?, f64_to_i32(center.y)?))
}

impl EyeMetrics {
    /// Compute the metrics from a face mesh using the single-landmark iris centres
    ///
    /// # Errors
    ///
    /// Returns an error if the mesh lacks any of the eye or iris landmarks
    pub fn from_mesh(mesh: &MeshPoints) -> Result<Self> {
        Self::from_mesh_with(mesh, IrisCenter::Landmark)
    }

    /// Compute the metrics with iris centres located by `iris_center`
    ///
    /// # Errors
    ///
    /// Returns an error if the mesh lacks any of the eye or iris landmarks
    pub fn from_mesh_with(mesh: &MeshPoints, iris_center: IrisCenter) -> Result<Self> {
        let (left_center, right_center) = iris_center.locate(mesh)?;
        Self::with_centers(mesh, to_f64(left_center), to_f64(right_center))
    }

    fn with_centers(mesh: &MeshPoints, left_center: Point2<f64>, right_center: Point2<f64>) -> Result<Self> {
        let left = mesh.select(&LEFT_EYE)?;
        let right = mesh.select(&RIGHT_EYE)?;

        let mut values = [0.0; NUM_EYE_METRICS];
        for (slot, point) in values[..EYE_CONTOUR_POINTS].iter_mut().zip(&left) {
            *slot = nalgebra::distance(&to_f64(*point), &left_center);
        }
        for (slot, point) in values[EYE_CONTOUR_POINTS..2 * EYE_CONTOUR_POINTS].iter_mut().zip(&right) {
            *slot = nalgebra::distance(&to_f64(*point), &right_center);
        }
        values[2 * EYE_CONTOUR_POINTS] = nalgebra::distance(&to_f64(right[0]), &to_f64(left[0]));

        Ok(Self { values })
    }

    /// Build metrics from a stored row
    ///
    /// # Errors
    ///
    /// Returns an error if the slice does not hold exactly 33 values
    pub fn from_slice(values: &[f64]) -> Result<Self> {
        let values: [f64; NUM_EYE_METRICS] = values.try_into().map_err(|_| {
            Error::InvalidInput(format!("Expected {NUM_EYE_METRICS} eye metrics, got {}", values.len()))
        })?;
        Ok(Self { values })
    }

    /// Distances from the left contour to the left iris centre
    #[must_use]
    pub fn left(&self) -> &[f64] {
        &self.values[..EYE_CONTOUR_POINTS]
    }

    /// Distances from the right contour to the right iris centre
    #[must_use]
    pub fn right(&self) -> &[f64] {
        &self.values[EYE_CONTOUR_POINTS..2 * EYE_CONTOUR_POINTS]
    }

    /// Distance between the inner corners of both eyes
    #[must_use]
    pub fn inter_eye(&self) -> f64 {
        self.values[2 * EYE_CONTOUR_POINTS]
    }

    /// All values in column order
    #[must_use]
    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    /// Values as an ndarray row
    #[must_use]
    pub fn to_array(&self) -> Array1<f64> {
        Array1::from(self.values.to_vec())
    }
}

fn to_f64(point: PixelPoint) -> Point2<f64> {
    Point2::new(f64::from(point.x), f64::from(point.y))
}
