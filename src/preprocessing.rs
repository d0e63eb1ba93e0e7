// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Image preprocessing for the landmark model.
//!
//! The whole image is letterboxed into the model input: resized with its
//! aspect ratio preserved, centered, and padded with gray. The returned
//! [`Letterbox`] maps model pixel coordinates back into image-normalized
//! coordinates.

use fast_image_resize::{FilterType, PixelType, ResizeAlg, ResizeOptions, Resizer, images::Image};
use image::{DynamicImage, GenericImageView};
use ndarray::Array4;

use crate::error::{PoseError, Result};

/// Default letterbox padding color (gray).
pub const LETTERBOX_COLOR: [u8; 3] = [114, 114, 114];

/// Reciprocal of 255 for normalization.
const INV_255: f32 = 1.0 / 255.0;

/// Channel layout of the model input tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TensorLayout {
    /// `[1, 3, H, W]`.
    Nchw,
    /// `[1, H, W, 3]`.
    Nhwc,
}

impl TensorLayout {
    /// Infer the layout from a declared 4D input shape.
    ///
    /// A trailing dimension of 3 means channels-last; anything else is
    /// treated as channels-first.
    #[must_use]
    pub fn from_shape(dims: &[i64]) -> Self {
        if dims.len() == 4 && dims[3] == 3 {
            Self::Nhwc
        } else {
            Self::Nchw
        }
    }
}

/// Letterbox transform between the original image and the model input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
    /// Original image dimensions (height, width).
    pub orig_shape: (u32, u32),
    /// Resized content dimensions (height, width).
    pub new_shape: (u32, u32),
    /// Scale factors applied (`scale_y`, `scale_x`).
    pub scale: (f32, f32),
    /// Padding applied (`pad_top`, `pad_left`).
    pub padding: (u32, u32),
}

impl Letterbox {
    /// Compute the transform fitting `orig_width × orig_height` into `target_size`.
    ///
    /// # Arguments
    ///
    /// * `orig_width` - Original image width.
    /// * `orig_height` - Original image height.
    /// * `target_size` - Target size as (height, width).
    #[must_use]
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn new(orig_width: u32, orig_height: u32, target_size: (usize, usize)) -> Self {
        let (target_h, target_w) = (target_size.0 as f32, target_size.1 as f32);
        let (orig_h, orig_w) = (orig_height.max(1) as f32, orig_width.max(1) as f32);

        let scale = (target_h / orig_h).min(target_w / orig_w);
        let new_w = ((orig_w * scale).round() as u32).clamp(1, target_size.1 as u32);
        let new_h = ((orig_h * scale).round() as u32).clamp(1, target_size.0 as u32);

        let pad_left = (target_size.1 as u32).saturating_sub(new_w) / 2;
        let pad_top = (target_size.0 as u32).saturating_sub(new_h) / 2;

        Self {
            orig_shape: (orig_height, orig_width),
            new_shape: (new_h, new_w),
            scale: (new_h as f32 / orig_h, new_w as f32 / orig_w),
            padding: (pad_top, pad_left),
        }
    }

    /// Map a point in model input pixels to image-normalized `[0, 1]` coordinates.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn to_normalized(&self, x: f32, y: f32) -> (f32, f32) {
        let (scale_y, scale_x) = self.scale;
        let (pad_top, pad_left) = (self.padding.0 as f32, self.padding.1 as f32);
        let (orig_h, orig_w) = (self.orig_shape.0.max(1) as f32, self.orig_shape.1.max(1) as f32);
        (
            (x - pad_left) / scale_x / orig_w,
            (y - pad_top) / scale_y / orig_h,
        )
    }
}

/// Result of preprocessing an image, containing the tensor and transform info.
#[derive(Debug, Clone)]
pub struct PreprocessResult {
    /// Image tensor in the requested layout, normalized to [0, 1].
    pub tensor: Array4<f32>,
    /// Transform needed to map model outputs back to the image.
    pub letterbox: Letterbox,
}

/// Letterbox an image into a normalized model input tensor.
///
/// # Arguments
///
/// * `image` - Input image.
/// * `target_size` - Target size as (height, width).
/// * `layout` - Channel layout expected by the model.
///
/// # Errors
///
/// Returns [`PoseError::ImageError`] if the image is empty or cannot be resized.
pub fn preprocess_image(
    image: &DynamicImage,
    target_size: (usize, usize),
    layout: TensorLayout,
) -> Result<PreprocessResult> {
    let (orig_width, orig_height) = image.dimensions();
    if orig_width == 0 || orig_height == 0 {
        return Err(PoseError::ImageError("Image has zero size".to_string()));
    }

    let letterbox = Letterbox::new(orig_width, orig_height, target_size);
    let (new_h, new_w) = letterbox.new_shape;
    let resized = resize_rgb(image, new_w, new_h)?;

    let (target_h, target_w) = target_size;
    let pad = f32::from(LETTERBOX_COLOR[0]) * INV_255;
    let mut tensor = match layout {
        TensorLayout::Nchw => Array4::<f32>::from_elem((1, 3, target_h, target_w), pad),
        TensorLayout::Nhwc => Array4::<f32>::from_elem((1, target_h, target_w, 3), pad),
    };

    let (pad_top, pad_left) = (letterbox.padding.0 as usize, letterbox.padding.1 as usize);
    let row_len = new_w as usize * 3;
    for (y, row) in resized.chunks_exact(row_len).enumerate() {
        let ty = y + pad_top;
        for (x, px) in row.chunks_exact(3).enumerate() {
            let tx = x + pad_left;
            for (c, &v) in px.iter().enumerate() {
                let value = f32::from(v) * INV_255;
                match layout {
                    TensorLayout::Nchw => tensor[[0, c, ty, tx]] = value,
                    TensorLayout::Nhwc => tensor[[0, ty, tx, c]] = value,
                }
            }
        }
    }

    Ok(PreprocessResult { tensor, letterbox })
}

/// Bilinear resize to packed RGB8 bytes.
fn resize_rgb(image: &DynamicImage, width: u32, height: u32) -> Result<Vec<u8>> {
    let (src_w, src_h) = image.dimensions();
    let src_rgb = image.to_rgb8();
    if (src_w, src_h) == (width, height) {
        return Ok(src_rgb.into_raw());
    }

    let src_image = Image::from_vec_u8(src_w, src_h, src_rgb.into_raw(), PixelType::U8x3)
        .map_err(|e| PoseError::ImageError(format!("Failed to create source image: {e}")))?;
    let mut dst_image = Image::new(width, height, PixelType::U8x3);

    let mut resizer = Resizer::new();
    let options =
        ResizeOptions::new().resize_alg(ResizeAlg::Convolution(FilterType::Bilinear));
    resizer
        .resize(&src_image, &mut dst_image, Some(&options))
        .map_err(|e| PoseError::ImageError(format!("Failed to resize image: {e}")))?;

    Ok(dst_image.into_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn test_letterbox_square() {
        let lb = Letterbox::new(640, 640, (256, 256));
        assert_eq!(lb.new_shape, (256, 256));
        assert_eq!(lb.padding, (0, 0));
    }

    #[test]
    fn test_letterbox_wide_pads_vertically() {
        let lb = Letterbox::new(1280, 720, (256, 256));
        assert_eq!(lb.new_shape, (144, 256));
        assert_eq!(lb.padding, (56, 0));
    }

    #[test]
    fn test_to_normalized_inverts_letterbox() {
        let lb = Letterbox::new(1280, 720, (256, 256));
        let (x, y) = lb.to_normalized(128.0, 56.0 + 72.0);
        assert!((x - 0.5).abs() < 1e-4);
        assert!((y - 0.5).abs() < 1e-4);

        let (x, y) = lb.to_normalized(0.0, 56.0);
        assert!(x.abs() < 1e-4 && y.abs() < 1e-4);
    }

    #[test]
    fn test_layout_from_shape() {
        assert_eq!(TensorLayout::from_shape(&[1, 256, 256, 3]), TensorLayout::Nhwc);
        assert_eq!(TensorLayout::from_shape(&[1, 3, 256, 256]), TensorLayout::Nchw);
        assert_eq!(TensorLayout::from_shape(&[-1, 3, -1, -1]), TensorLayout::Nchw);
    }

    #[test]
    fn test_preprocess_pads_and_normalizes() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(40, 20, Rgb([255, 0, 0])));
        let result = preprocess_image(&img, (32, 32), TensorLayout::Nhwc).unwrap();
        assert_eq!(result.tensor.shape(), &[1, 32, 32, 3]);
        assert_eq!(result.letterbox.padding, (8, 0));

        // Padding row is gray, content is red.
        let gray = 114.0 / 255.0;
        assert!((result.tensor[[0, 0, 0, 0]] - gray).abs() < 1e-6);
        assert!((result.tensor[[0, 16, 16, 0]] - 1.0).abs() < 1e-6);
        assert!(result.tensor[[0, 16, 16, 1]].abs() < 1e-6);

        let nchw = preprocess_image(&img, (32, 32), TensorLayout::Nchw).unwrap();
        assert_eq!(nchw.tensor.shape(), &[1, 3, 32, 32]);
        assert!((nchw.tensor[[0, 0, 16, 16]] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_preprocess_rejects_empty() {
        let img = DynamicImage::new_rgb8(0, 0);
        assert!(preprocess_image(&img, (32, 32), TensorLayout::Nchw).is_err());
    }
}
