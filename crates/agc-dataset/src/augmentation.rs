//! Data augmentation for training flows.
//!
//! Augmented flows mirror images horizontally at random and jitter
//! brightness within a fixed multiplicative range. Validation and test flows
//! never augment.

use agc_core::AugmentationConfig;
use image::{DynamicImage, ImageBuffer, Rgb};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Seeded augmentation pipeline.
///
/// Cloning clones the RNG state, so a clone continues the exact draw
/// sequence of its source.
#[derive(Debug, Clone)]
pub struct Augmenter {
    config: AugmentationConfig,
    rng: ChaCha8Rng,
}

impl Augmenter {
    pub fn new(config: AugmentationConfig, seed: u64) -> Self {
        Self {
            config,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Applies one random draw of the pipeline to an image
    pub fn apply(&mut self, image: &DynamicImage) -> DynamicImage {
        let mut augmented = image.clone();

        if self.config.horizontal_flip && self.rng.gen_bool(0.5) {
            augmented = flip_horizontal(&augmented);
        }

        let (lo, hi) = self.config.brightness_range;
        if (lo, hi) != (1.0, 1.0) {
            let factor = self.rng.gen_range(lo..=hi);
            augmented = adjust_brightness(&augmented, factor);
        }

        augmented
    }
}

fn flip_horizontal(image: &DynamicImage) -> DynamicImage {
    DynamicImage::ImageRgb8(image::imageops::flip_horizontal(&image.to_rgb8()))
}

fn adjust_brightness(image: &DynamicImage, factor: f32) -> DynamicImage {
    let rgb = image.to_rgb8();
    let (width, height) = rgb.dimensions();

    let adjusted = ImageBuffer::from_fn(width, height, |x, y| {
        let pixel = rgb.get_pixel(x, y);
        Rgb([
            (pixel[0] as f32 * factor).clamp(0.0, 255.0) as u8,
            (pixel[1] as f32 * factor).clamp(0.0, 255.0) as u8,
            (pixel[2] as f32 * factor).clamp(0.0, 255.0) as u8,
        ])
    });

    DynamicImage::ImageRgb8(adjusted)
}
