// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Window for displaying annotated poses.

use std::time::{Duration, Instant};

use image::DynamicImage;
use minifb::{Key, Window, WindowOptions};

use crate::error::{PoseError, Result};

/// A simple image viewer using minifb.
pub struct Viewer {
    window: Window,
    /// Current buffer width in pixels.
    pub width: usize,
    /// Current buffer height in pixels.
    pub height: usize,
    buffer: Vec<u32>,
}

impl Viewer {
    /// Create a new viewer window.
    ///
    /// # Errors
    ///
    /// Returns [`PoseError::VisualizerError`] if the window cannot be created.
    pub fn new(title: &str, width: usize, height: usize) -> Result<Self> {
        let mut window = Window::new(
            title,
            width,
            height,
            WindowOptions {
                resize: true,
                ..WindowOptions::default()
            },
        )
        .map_err(|e| PoseError::VisualizerError(format!("Failed to create window: {e}")))?;

        window.set_target_fps(60);

        Ok(Self {
            window,
            width,
            height,
            buffer: Vec::new(),
        })
    }

    fn closed(&self) -> bool {
        !self.window.is_open()
            || self.window.is_key_down(Key::Escape)
            || self.window.is_key_down(Key::Q)
    }

    /// Show an image. Returns `false` once the user has closed the window.
    ///
    /// # Errors
    ///
    /// Returns [`PoseError::VisualizerError`] if the window cannot be redrawn.
    pub fn update(&mut self, image: &DynamicImage) -> Result<bool> {
        if self.closed() {
            return Ok(false);
        }

        let rgb = image.to_rgb8();
        self.width = rgb.width() as usize;
        self.height = rgb.height() as usize;

        // minifb wants one 0x00RRGGBB word per pixel
        self.buffer.clear();
        self.buffer.extend(
            rgb.pixels()
                .map(|p| (u32::from(p[0]) << 16) | (u32::from(p[1]) << 8) | u32::from(p[2])),
        );

        self.window
            .update_with_buffer(&self.buffer, self.width, self.height)
            .map_err(|e| PoseError::VisualizerError(format!("Failed to update window: {e}")))?;

        Ok(true)
    }

    /// Keep the current image on screen for `duration`, or until the window
    /// closes. A zero duration waits for the user to close the window.
    ///
    /// # Errors
    ///
    /// Returns [`PoseError::VisualizerError`] if the window cannot be redrawn.
    pub fn wait(&mut self, duration: Duration) -> Result<bool> {
        if self.buffer.is_empty() {
            return Ok(true);
        }

        let start = Instant::now();
        while duration.is_zero() || start.elapsed() < duration {
            if self.closed() {
                return Ok(false);
            }
            self.window
                .update_with_buffer(&self.buffer, self.width, self.height)
                .map_err(|e| PoseError::VisualizerError(format!("Failed to update window: {e}")))?;
        }
        Ok(true)
    }
}
