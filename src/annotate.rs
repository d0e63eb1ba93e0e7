// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Skeleton rendering and result annotation.
//!
//! [`render`] always works on a copy: the input image is never touched and
//! the output has the same dimensions. Keypoints below the visibility floor
//! are still drawn, faded and hollow, so uncertainty stays visible instead
//! of looking like absence.

use std::path::{Path, PathBuf};

use image::{DynamicImage, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_hollow_circle_mut, draw_line_segment_mut};

use crate::config::{MAX_DRAWING_SIZE, PipelineConfig};
use crate::skeleton::Skeleton;
use crate::visualizer::Color;
use crate::visualizer::skeleton::{KPT_COLOR_INDICES, LIMB_COLOR_INDICES};

/// How strongly low-visibility elements are blended towards gray.
const LOW_VISIBILITY_FADE: f32 = 0.6;

/// Draw the skeleton of `skeleton` onto a copy of `image`.
#[must_use]
pub fn render(image: &DynamicImage, skeleton: &Skeleton, config: &PipelineConfig) -> DynamicImage {
    let mut img = image.to_rgb8();
    let (width, height) = img.dimensions();
    let floor = config.visibility_floor;
    let keypoints = skeleton.keypoints();
    #[allow(clippy::cast_possible_wrap)]
    let radius = config.marker_radius.clamp(1, MAX_DRAWING_SIZE as i32);

    for (i, &[a, b]) in Skeleton::connections().iter().enumerate() {
        let (ka, kb) = (&keypoints[a], &keypoints[b]);
        let mut color = Color::from_pose_index(LIMB_COLOR_INDICES[i]);
        if !ka.is_visible(floor) || !kb.is_visible(floor) {
            color = color.faded(LOW_VISIBILITY_FADE);
        }
        draw_thick_line(
            &mut img,
            ka.to_pixel(width, height),
            kb.to_pixel(width, height),
            config.line_thickness,
            color,
        );
    }

    for (i, kp) in keypoints.iter().enumerate() {
        let (x, y) = kp.to_pixel(width, height);
        #[allow(clippy::cast_possible_truncation)]
        let center = (x.round() as i32, y.round() as i32);
        let color = Color::from_pose_index(KPT_COLOR_INDICES[i]);

        if kp.is_visible(floor) {
            draw_filled_circle_mut(&mut img, center, radius, color.to_rgb());
        } else {
            draw_hollow_circle_mut(
                &mut img,
                center,
                radius,
                color.faded(LOW_VISIBILITY_FADE).to_rgb(),
            );
        }
    }

    DynamicImage::ImageRgb8(img)
}

/// Draw a line of the given thickness as parallel one-pixel segments.
#[allow(clippy::cast_precision_loss)]
fn draw_thick_line(
    img: &mut RgbImage,
    start: (f32, f32),
    end: (f32, f32),
    thickness: u32,
    color: Color,
) {
    let (dx, dy) = (end.0 - start.0, end.1 - start.1);
    let len = dx.hypot(dy);
    let (nx, ny) = if len > f32::EPSILON {
        (-dy / len, dx / len)
    } else {
        (0.0, 0.0)
    };

    let thickness = thickness.clamp(1, MAX_DRAWING_SIZE);
    let half = (thickness - 1) as f32 / 2.0;
    for t in 0..thickness {
        let offset = t as f32 - half;
        draw_line_segment_mut(
            img,
            (start.0 + nx * offset, start.1 + ny * offset),
            (end.0 + nx * offset, end.1 + ny * offset),
            color.to_rgb(),
        );
    }
}

/// Find the next available run directory (predict, predict2, predict3, etc.)
#[must_use]
pub fn find_next_run_dir<P: AsRef<Path>>(base: P, prefix: &str) -> PathBuf {
    let base_path = base.as_ref();

    let first = base_path.join(prefix);
    if !first.exists() {
        return first;
    }

    (2..)
        .map(|i| base_path.join(format!("{prefix}{i}")))
        .find(|p| !p.exists())
        .unwrap_or(first)
}

#[cfg(feature = "annotate")]
pub use caption::{CaptionFont, draw_caption};

#[cfg(feature = "annotate")]
mod caption {
    use std::path::{Path, PathBuf};

    use ab_glyph::{FontVec, PxScale};
    use image::DynamicImage;
    use imageproc::drawing::{draw_filled_rect_mut, draw_text_mut, text_size};
    use imageproc::rect::Rect;

    use crate::error::{PoseError, Result};
    use crate::visualizer::Color;

    /// Config subdirectory searched for caption fonts.
    const FONT_DIR: &str = "YogaPose";

    /// TrueType font used for result captions, loaded once.
    pub struct CaptionFont {
        font: FontVec,
    }

    impl CaptionFont {
        /// Load a font file.
        ///
        /// # Errors
        ///
        /// Returns [`PoseError::IoError`] if the file is missing or not a font.
        pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
            let path = path.as_ref();
            let data = std::fs::read(path)
                .map_err(|e| PoseError::IoError(format!("{}: {e}", path.display())))?;
            let font = FontVec::try_from_vec(data)
                .map_err(|e| PoseError::IoError(format!("{}: {e}", path.display())))?;
            Ok(Self { font })
        }

        /// Look for `name` in the user config directory.
        ///
        /// Fonts are never downloaded; returns `None` if the font is absent.
        #[must_use]
        pub fn find(name: &str) -> Option<Self> {
            let path = font_path(name)?;
            Self::load(path).ok()
        }
    }

    impl std::fmt::Debug for CaptionFont {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("CaptionFont").finish_non_exhaustive()
        }
    }

    fn font_path(name: &str) -> Option<PathBuf> {
        let file_name = Path::new(name).file_name()?;
        let path = dirs::config_dir()?.join(FONT_DIR).join(file_name);
        path.exists().then_some(path)
    }

    /// Draw `text` on a dark banner in the top-left corner.
    #[must_use]
    pub fn draw_caption(image: DynamicImage, text: &str, font: &CaptionFont) -> DynamicImage {
        let mut img = image.to_rgb8();
        let (width, height) = img.dimensions();
        if width == 0 || height == 0 {
            return DynamicImage::ImageRgb8(img);
        }

        #[allow(clippy::cast_precision_loss)]
        let px = (height as f32 / 30.0).clamp(14.0, 48.0);
        let scale = PxScale::from(px);
        let (text_w, text_h) = text_size(scale, &font.font, text);
        let pad = 4;

        let banner = Rect::at(0, 0).of_size(
            (text_w + 2 * pad).min(width),
            (text_h + 2 * pad).min(height),
        );
        draw_filled_rect_mut(&mut img, banner, Color::BLACK.to_rgb());
        #[allow(clippy::cast_possible_wrap)]
        let pad = pad as i32;
        draw_text_mut(&mut img, Color::WHITE.to_rgb(), pad, pad, scale, &font.font, text);

        DynamicImage::ImageRgb8(img)
    }
}
