//! Image conversion utilities between camera frames, `image` buffers and ndarray.

use crate::Result;
use image::{imageops, GrayImage, ImageBuffer, Luma, Rgb, RgbImage};
use ndarray::Array2;

/// Camera frame with the channel order B, G, R stored in an `Rgb<u8>` buffer
pub type BgrImage = ImageBuffer<Rgb<u8>, Vec<u8>>;

/// `OpenCV` luma weights for the BGR to grayscale conversion
const GRAY_WEIGHT_B: f32 = 0.114;
const GRAY_WEIGHT_G: f32 = 0.587;
const GRAY_WEIGHT_R: f32 = 0.299;

/// Mirror a frame horizontally (selfie view)
#[must_use]
pub fn mirror(frame: &BgrImage) -> BgrImage {
    imageops::flip_horizontal(frame)
}

/// Swap the B and R channels, producing RGB order for inference
#[must_use]
pub fn bgr_to_rgb(frame: &BgrImage) -> RgbImage {
    let mut rgb = frame.clone();
    for pixel in rgb.pixels_mut() {
        pixel.0.swap(0, 2);
    }
    rgb
}

/// Swap the R and B channels of a decoded RGB image, producing camera order
#[must_use]
pub fn rgb_to_bgr(image: &RgbImage) -> BgrImage {
    let mut bgr = image.clone();
    for pixel in bgr.pixels_mut() {
        pixel.0.swap(0, 2);
    }
    bgr
}

/// Convert a BGR frame to single-channel grayscale
#[must_use]
#[allow(clippy::cast_possible_truncation)]
#[allow(clippy::cast_sign_loss)]
pub fn bgr_to_gray(frame: &BgrImage) -> GrayImage {
    GrayImage::from_fn(frame.width(), frame.height(), |x, y| {
        let [b, g, r] = frame.get_pixel(x, y).0;
        let luma = GRAY_WEIGHT_B * f32::from(b) + GRAY_WEIGHT_G * f32::from(g) + GRAY_WEIGHT_R * f32::from(r);
        Luma([luma.round().clamp(0.0, 255.0) as u8])
    })
}

/// Convert a grayscale image to a (height, width) array
#[must_use]
#[allow(clippy::cast_possible_truncation)] // Indices come from u32 dimensions
pub fn gray_to_array2(image: &GrayImage) -> Array2<u8> {
    let (width, height) = image.dimensions();
    Array2::from_shape_fn((height as usize, width as usize), |(row, col)| {
        image.get_pixel(col as u32, row as u32)[0]
    })
}

/// Convert a (height, width) array back to a grayscale image
///
/// # Errors
///
/// Returns an error if either dimension does not fit in u32
pub fn array2_to_gray(array: &Array2<u8>) -> Result<GrayImage> {
    let (rows, cols) = array.dim();
    let height = u32::try_from(rows)
        .map_err(|_| crate::error::Error::InvalidInput(format!("Image height {rows} too large")))?;
    let width = u32::try_from(cols)
        .map_err(|_| crate::error::Error::InvalidInput(format!("Image width {cols} too large")))?;

    Ok(GrayImage::from_fn(width, height, |x, y| Luma([array[[y as usize, x as usize]]])))
}

/// Convert an `OpenCV` 8-bit BGR Mat into a frame buffer
///
/// # Errors
///
/// Returns an error if the Mat is not 8-bit 3-channel or its data cannot be accessed
#[cfg(feature = "camera")]
#[allow(clippy::cast_sign_loss)]
pub fn mat_to_bgr_image(mat: &opencv::core::Mat) -> Result<BgrImage> {
    use opencv::core::{MatTraitConst, Vec3b};

    let rows = mat.rows();
    let cols = mat.cols();
    let channels = mat.channels();

    if rows <= 0 || cols <= 0 || channels != 3 {
        return Err(crate::error::Error::InvalidInput(format!(
            "Invalid camera frame dimensions: {rows}x{cols}x{channels}"
        )));
    }

    let mut frame = BgrImage::new(cols as u32, rows as u32);
    for row in 0..rows {
        for col in 0..cols {
            let pixel = mat.at_2d::<Vec3b>(row, col)?;
            frame.put_pixel(col as u32, row as u32, Rgb([pixel[0], pixel[1], pixel[2]]));
        }
    }

    Ok(frame)
}

/// Convert a grayscale image into an `OpenCV` Mat for display
///
/// # Errors
///
/// Returns an error if Mat creation fails
#[cfg(feature = "camera")]
pub fn gray_image_to_mat(image: &GrayImage) -> Result<opencv::core::Mat> {
    use crate::utils::safe_cast::u32_to_i32;
    use opencv::core::{Mat, MatTrait, Scalar, CV_8UC1};

    let height = u32_to_i32(image.height())?;
    let width = u32_to_i32(image.width())?;
    let mut mat = Mat::new_rows_cols_with_default(height, width, CV_8UC1, Scalar::default())?;

    for (x, y, pixel) in image.enumerate_pixels() {
        *mat.at_2d_mut::<u8>(u32_to_i32(y)?, u32_to_i32(x)?)? = pixel[0];
    }

    Ok(mat)
}
