//! Safe casting utilities for pixel coordinates and image extents

use crate::{Error, Result};

/// Safely convert u32 to i32 with overflow checking
///
/// # Errors
///
/// Returns an error if the value exceeds i32::MAX
pub fn u32_to_i32(value: u32) -> Result<i32> {
    value
        .try_into()
        .map_err(|_| Error::InvalidInput(format!("Value {value} too large to fit in i32")))
}

/// Safely convert f32 to i32 with bounds checking, truncating toward zero
///
/// # Errors
///
/// Returns an error if the value is not finite or outside i32 range
#[allow(clippy::cast_precision_loss)] // MIN/MAX bounds checking is approximate
#[allow(clippy::cast_possible_truncation)] // Truncation after bounds check is intended
pub fn f32_to_i32(value: f32) -> Result<i32> {
    if value.is_finite() && value >= i32::MIN as f32 && value <= i32::MAX as f32 {
        Ok(value as i32)
    } else {
        Err(Error::InvalidInput(format!(
            "Value {value} cannot be safely converted to i32"
        )))
    }
}

/// Safely convert f64 to i64 with bounds checking, truncating toward zero
///
/// # Errors
///
/// Returns an error if the value is not finite or outside i64 range
#[allow(clippy::cast_precision_loss)]
#[allow(clippy::cast_possible_truncation)]
pub fn f64_to_i64(value: f64) -> Result<i64> {
    if value.is_finite() && value >= i64::MIN as f64 && value <= i64::MAX as f64 {
        Ok(value as i64)
    } else {
        Err(Error::InvalidInput(format!(
            "Value {value} cannot be safely converted to i64"
        )))
    }
}

/// Safely convert f64 to i32 with bounds checking, truncating toward zero
///
/// # Errors
///
/// Returns an error if the value is not finite or outside i32 range
#[allow(clippy::cast_possible_truncation)]
pub fn f64_to_i32(value: f64) -> Result<i32> {
    if value.is_finite() && value >= f64::from(i32::MIN) && value <= f64::from(i32::MAX) {
        Ok(value as i32)
    } else {
        Err(Error::InvalidInput(format!(
            "Value {value} cannot be safely converted to i32"
        )))
    }
}

/// Scale a normalized coordinate by an image extent and truncate to a pixel index
///
/// The product is taken in f64; f32 rounds values just below an integer up.
/// Out-of-frame landmarks are legal, so the result is not clamped.
///
/// # Errors
///
/// Returns an error if the scaled value is not finite or overflows i32
pub fn normalized_to_pixel(value: f32, extent: u32) -> Result<i32> {
    f64_to_i32(f64::from(value) * f64::from(extent))
}

/// Clamp a signed pixel coordinate into `0..=extent`
#[must_use]
#[allow(clippy::cast_sign_loss)] // Negative values are clamped first
pub fn clamp_to_extent(value: i32, extent: u32) -> u32 {
    if value <= 0 {
        0
    } else {
        (value as u32).min(extent)
    }
}

/// Clamp an i64 into `min..=max` and narrow to u32
#[must_use]
#[allow(clippy::cast_possible_truncation)]
#[allow(clippy::cast_sign_loss)]
pub fn i64_to_u32_clamp(value: i64, min: u32, max: u32) -> u32 {
    let (min, max) = if min <= max { (min, max) } else { (max, min) };
    value.clamp(i64::from(min), i64::from(max)) as u32
}
