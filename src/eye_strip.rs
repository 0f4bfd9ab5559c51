//! Eye strip crop and normalization to the fixed 40x120 model input.

use crate::{
    constants::{EYE_STRIP, EYE_STRIP_HEIGHT, EYE_STRIP_WIDTH},
    landmarks::MeshPoints,
    utils::{
        bounding_box,
        safe_cast::{f64_to_i64, i64_to_u32_clamp},
    },
    Result,
};
use image::{imageops, imageops::FilterType, GrayImage, Luma};

/// Crop the grayscale frame to the tight bounding box of the eye strip landmarks
///
/// # Errors
///
/// Returns an error if the mesh lacks eye strip landmarks or the box is empty
pub fn crop_eye_strip(frame: &GrayImage, mesh: &MeshPoints) -> Result<GrayImage> {
    let strip = mesh.select(&EYE_STRIP)?;
    let bbox = bounding_box(&strip, frame.width(), frame.height())?;

    Ok(imageops::crop_imm(frame, bbox.x, bbox.y, bbox.width, bbox.height).to_image())
}

/// Size of a crop after the aspect-ratio step, as (height, width)
///
/// Each axis gets a percentage change relative to the target that would make
/// it hit the target exactly. The smaller percentage wins and is applied, as
/// a fraction of the *target* extent, to both axes. The winning axis lands on
/// its target and the other stays inside it. Results are clamped to
/// `1..=target` so slivers never collapse to zero.
///
/// # Errors
///
/// Returns an error if the intermediate arithmetic is not finite
#[allow(clippy::cast_lossless)]
pub fn scaled_dimensions(height: u32, width: u32) -> Result<(u32, u32)> {
    let target_height = f64::from(EYE_STRIP_HEIGHT);
    let target_width = f64::from(EYE_STRIP_WIDTH);

    let height_perc = (target_height - f64::from(height)) * 100.0 / target_height;
    let width_perc = (target_width - f64::from(width)) * 100.0 / target_width;
    let scale_perc = if height_perc < width_perc { height_perc } else { width_perc };

    let new_width = i64::from(width) + f64_to_i64(target_width * scale_perc / 100.0)?;
    let new_height = i64::from(height) + f64_to_i64(target_height * scale_perc / 100.0)?;

    Ok((
        i64_to_u32_clamp(new_height, 1, EYE_STRIP_HEIGHT),
        i64_to_u32_clamp(new_width, 1, EYE_STRIP_WIDTH),
    ))
}

/// Resize a crop with [`scaled_dimensions`] and pad it to exactly 40x120
///
/// # Errors
///
/// Returns an error if the crop is empty
pub fn resize_aspect_ratio(image: &GrayImage) -> Result<GrayImage> {
    if image.width() == 0 || image.height() == 0 {
        return Err(crate::Error::InvalidInput("Cannot resize an empty eye strip".to_string()));
    }

    let (height, width) = scaled_dimensions(image.height(), image.width())?;
    let resized = imageops::resize(image, width, height, FilterType::Triangle);
    log::trace!(
        "Eye strip {}x{} resized to {}x{}",
        image.width(),
        image.height(),
        width,
        height
    );

    Ok(pad_to_target(&resized))
}

/// Pad the bottom and right edges with black up to 40x120
///
/// Content beyond the target is cut off, so the output size is exact.
#[must_use]
pub fn pad_to_target(image: &GrayImage) -> GrayImage {
    let mut padded = GrayImage::from_pixel(EYE_STRIP_WIDTH, EYE_STRIP_HEIGHT, Luma([0]));
    let visible = imageops::crop_imm(
        image,
        0,
        0,
        image.width().min(EYE_STRIP_WIDTH),
        image.height().min(EYE_STRIP_HEIGHT),
    )
    .to_image();
    imageops::replace(&mut padded, &visible, 0, 0);
    padded
}

/// Stretch a stored crop to exactly 40x120, ignoring aspect ratio
///
/// # Errors
///
/// Returns an error if the crop is empty
pub fn resize_exact(image: &GrayImage) -> Result<GrayImage> {
    if image.width() == 0 || image.height() == 0 {
        return Err(crate::Error::InvalidInput("Cannot resize an empty eye strip".to_string()));
    }

    Ok(imageops::resize(image, EYE_STRIP_WIDTH, EYE_STRIP_HEIGHT, FilterType::Triangle))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{constants::NUM_FACE_MESH_LANDMARKS, landmarks::PixelPoint};
    use proptest::prelude::*;

    #[test]
    fn test_scaled_dimensions_shrink_wide() {
        // Width needs -66.7 %, height -25 %: width binds
        assert_eq!(scaled_dimensions(50, 200).unwrap(), (24, 120));
    }

    #[test]
    fn test_scaled_dimensions_grow() {
        assert_eq!(scaled_dimensions(20, 60).unwrap(), (40, 120));
        // Height needs +25 %, width +50 %: height binds
        assert_eq!(scaled_dimensions(30, 60).unwrap(), (40, 90));
    }

    #[test]
    fn test_scaled_dimensions_mixed() {
        // Height must shrink while width could grow: height binds
        assert_eq!(scaled_dimensions(50, 100).unwrap(), (40, 70));
    }

    #[test]
    fn test_scaled_dimensions_sliver_clamped() {
        let (height, width) = scaled_dimensions(5, 1000).unwrap();
        assert_eq!(height, 1);
        assert_eq!(width, 120);
    }

    #[test]
    fn test_pad_to_target_keeps_top_left() {
        let image = GrayImage::from_pixel(100, 30, Luma([200]));

        let padded = pad_to_target(&image);

        assert_eq!(padded.dimensions(), (EYE_STRIP_WIDTH, EYE_STRIP_HEIGHT));
        assert_eq!(padded.get_pixel(0, 0)[0], 200);
        assert_eq!(padded.get_pixel(99, 29)[0], 200);
        assert_eq!(padded.get_pixel(100, 0)[0], 0);
        assert_eq!(padded.get_pixel(0, 30)[0], 0);
    }

    #[test]
    fn test_resize_exact() {
        let image = GrayImage::from_pixel(37, 91, Luma([9]));
        let resized = resize_exact(&image).unwrap();
        assert_eq!(resized.dimensions(), (EYE_STRIP_WIDTH, EYE_STRIP_HEIGHT));
        assert!(resize_exact(&GrayImage::new(0, 0)).is_err());
    }

    #[test]
    fn test_crop_eye_strip_bounds() {
        let mut points = vec![PixelPoint::new(100, 100); NUM_FACE_MESH_LANDMARKS];
        for (n, &i) in EYE_STRIP.iter().enumerate() {
            let n = n as i32;
            points[i] = PixelPoint::new(60 + n * 4, 80 + (n % 5) * 5);
        }
        let frame = GrayImage::from_fn(320, 240, |x, _| Luma([(x % 256) as u8]));

        let crop = crop_eye_strip(&frame, &MeshPoints::from_pixels(points)).unwrap();

        // x spans 60..=184, y spans 80..=100, max edge exclusive
        assert_eq!(crop.dimensions(), (124, 20));
        assert_eq!(crop.get_pixel(0, 0)[0], 60);
    }

    proptest! {
        #[test]
        fn prop_scaled_dimensions_within_target(height in 1u32..2000, width in 1u32..2000) {
            let (h, w) = scaled_dimensions(height, width).unwrap();
            prop_assert!((1..=EYE_STRIP_HEIGHT).contains(&h));
            prop_assert!((1..=EYE_STRIP_WIDTH).contains(&w));
        }

        #[test]
        fn prop_resize_aspect_ratio_exact_shape(height in 1u32..300, width in 1u32..600) {
            let image = GrayImage::from_pixel(width, height, Luma([128]));
            let out = resize_aspect_ratio(&image).unwrap();
            prop_assert_eq!(out.dimensions(), (EYE_STRIP_WIDTH, EYE_STRIP_HEIGHT));
        }
    }
}
