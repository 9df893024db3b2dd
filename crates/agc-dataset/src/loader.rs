//! Image loading and preprocessing.
//!
//! Every flow decodes through one of these: open, resize to the configured
//! square resolution, rescale pixel intensities to the unit range.

use agc_core::{Error, ImageDimensions, Result};
use image::{imageops::FilterType, DynamicImage};
use std::path::Path;

/// Decodes images and converts them into normalized pixel buffers.
#[derive(Debug, Clone)]
pub struct ImageLoader {
    target: ImageDimensions,
}

impl ImageLoader {
    pub fn new(target: ImageDimensions) -> Self {
        Self { target }
    }

    pub fn target(&self) -> ImageDimensions {
        self.target
    }

    /// Loads an image from disk
    pub fn load_image(&self, path: &Path) -> Result<DynamicImage> {
        if !path.exists() {
            return Err(Error::NotFound(format!(
                "Image file not found: {}",
                path.display()
            )));
        }

        image::open(path)
            .map_err(|e| Error::Image(format!("Failed to load image {}: {}", path.display(), e)))
    }

    /// Resizes to the target resolution and rescales intensities to [0, 1].
    ///
    /// The returned buffer is laid out HWC, `height * width * 3` values.
    pub fn to_pixels(&self, image: &DynamicImage) -> Vec<f32> {
        let resized = image.resize_exact(self.target.width, self.target.height, FilterType::Triangle);
        resized
            .to_rgb8()
            .into_raw()
            .into_iter()
            .map(|v| v as f32 / 255.0)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn create_test_image(path: &Path, value: u8) {
        let img = ImageBuffer::from_fn(8, 8, |_, _| Rgb([value, value, value]));
        img.save(path).unwrap();
    }

    #[test]
    fn test_load_image_not_found() {
        let loader = ImageLoader::new(ImageDimensions::imagenet());
        let result = loader.load_image(&PathBuf::from("/nonexistent.png"));
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[test]
    fn test_pixels_are_rescaled_to_unit_range() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("white.png");
        create_test_image(&path, 255);

        let loader = ImageLoader::new(ImageDimensions::new(4, 4, 3));
        let image = loader.load_image(&path).unwrap();
        let pixels = loader.to_pixels(&image);

        assert_eq!(pixels.len(), 4 * 4 * 3);
        assert!(pixels.iter().all(|&p| (p - 1.0).abs() < 1e-6));
    }

    #[test]
    fn test_pixels_resized_to_target() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("gray.png");
        create_test_image(&path, 128);

        let loader = ImageLoader::new(ImageDimensions::new(16, 16, 3));
        let image = loader.load_image(&path).unwrap();
        let pixels = loader.to_pixels(&image);

        assert_eq!(pixels.len(), 16 * 16 * 3);
        assert!(pixels.iter().all(|&p| p >= 0.0 && p <= 1.0));
    }
}
