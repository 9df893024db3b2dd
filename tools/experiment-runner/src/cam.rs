//! Center-crop stand-in for activation-map guided cropping.
//!
//! A real deployment derives each crop window from the global model's class
//! activation map. Without a network to read activations from, this provider
//! crops a fixed central fraction of every image, which keeps the dual-branch
//! pipeline runnable end to end with the same file layout.

use agc_core::{Error, Manifest, ManifestEntry, Result};
use agc_training::{CamProvider, PredictiveModel};
use image::GenericImageView;
use std::fs;
use std::path::Path;
use tracing::info;

/// Crops the central region of every image.
pub struct CenterCropCam {
    fraction: f32,
}

impl CenterCropCam {
    pub fn new() -> Self {
        Self { fraction: 0.5 }
    }

    /// Side length of the crop relative to the source image, in (0, 1]
    pub fn with_fraction(fraction: f32) -> Result<Self> {
        if !(fraction > 0.0 && fraction <= 1.0) {
            return Err(Error::InvalidArgument(format!(
                "crop fraction must be in (0, 1], got {fraction}"
            )));
        }
        Ok(Self { fraction })
    }
}

impl Default for CenterCropCam {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: PredictiveModel> CamProvider<M> for CenterCropCam {
    fn draw_class_activation_map(
        &self,
        _model: &M,
        manifest: &Manifest,
        output_dir: &Path,
    ) -> Result<()> {
        fs::create_dir_all(output_dir)?;

        for (i, entry) in manifest.entries().iter().enumerate() {
            let image = image::open(&entry.path).map_err(|e| {
                Error::Image(format!("Failed to load image {}: {}", entry.path.display(), e))
            })?;

            // Stand-in heat map: everything outside the attended window is
            // dimmed, leaving the region a real CAM would highlight.
            let (width, height) = image.dimensions();
            let crop_width = ((width as f32 * self.fraction) as u32).max(1);
            let crop_height = ((height as f32 * self.fraction) as u32).max(1);
            let x0 = (width - crop_width) / 2;
            let y0 = (height - crop_height) / 2;

            let mut canvas = image.to_rgb8();
            for (x, y, pixel) in canvas.enumerate_pixels_mut() {
                let inside = x >= x0 && x < x0 + crop_width && y >= y0 && y < y0 + crop_height;
                if !inside {
                    for channel in pixel.0.iter_mut() {
                        *channel = (*channel as f32 * 0.4) as u8;
                    }
                }
            }
            canvas.save(output_dir.join(format!("cam_{i}.png")))?;
        }

        info!(
            rows = manifest.len(),
            dir = %output_dir.display(),
            "wrote class activation maps"
        );
        Ok(())
    }

    fn crop_to_attention(
        &self,
        _model: &M,
        manifest: &Manifest,
        output_dir: &Path,
    ) -> Result<Manifest> {
        fs::create_dir_all(output_dir)?;

        let mut entries = Vec::with_capacity(manifest.len());
        for (i, entry) in manifest.entries().iter().enumerate() {
            let image = image::open(&entry.path).map_err(|e| {
                Error::Image(format!("Failed to load image {}: {}", entry.path.display(), e))
            })?;

            let (width, height) = image.dimensions();
            let crop_width = ((width as f32 * self.fraction) as u32).max(1);
            let crop_height = ((height as f32 * self.fraction) as u32).max(1);
            let x = (width - crop_width) / 2;
            let y = (height - crop_height) / 2;

            let cropped = image.crop_imm(x, y, crop_width, crop_height);
            let path = output_dir.join(format!("crop_{i}.png"));
            cropped.save(&path)?;

            // Row order and labels carry over so flows stay synchronized.
            entries.push(ManifestEntry::new(path, entry.label));
        }

        info!(
            rows = entries.len(),
            dir = %output_dir.display(),
            "wrote attention crops"
        );
        Ok(Manifest::new(entries))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::baseline::PriorModel;
    use image::{ImageBuffer, Rgb};
    use tempfile::TempDir;

    fn seed_manifest(dir: &Path, labels: &[i64]) -> Manifest {
        labels
            .iter()
            .enumerate()
            .map(|(i, &label)| {
                let path = dir.join(format!("img_{i}.png"));
                let img = ImageBuffer::from_fn(8, 8, |_, _| Rgb([100u8, 0u8, 0u8]));
                img.save(&path).unwrap();
                ManifestEntry::new(path, label)
            })
            .collect()
    }

    fn dummy_model() -> PriorModel {
        PriorModel {
            priors: vec![0.5, 0.5],
            trained_at: String::new(),
        }
    }

    #[test]
    fn test_crops_preserve_order_and_labels() {
        let temp_dir = TempDir::new().unwrap();
        let manifest = seed_manifest(temp_dir.path(), &[1, 0, 1]);
        let out_dir = temp_dir.path().join("crops");

        let cropped = CenterCropCam::new()
            .crop_to_attention(&dummy_model(), &manifest, &out_dir)
            .unwrap();

        assert_eq!(cropped.len(), 3);
        assert_eq!(cropped.labels(), manifest.labels());
        for entry in cropped.entries() {
            assert!(entry.path.starts_with(&out_dir));
            let image = image::open(&entry.path).unwrap();
            assert_eq!(image.dimensions(), (4, 4));
        }
    }

    #[test]
    fn test_draw_writes_one_artifact_per_row() {
        let temp_dir = TempDir::new().unwrap();
        let manifest = seed_manifest(temp_dir.path(), &[0, 1]);
        let out_dir = temp_dir.path().join("cams");

        CenterCropCam::new()
            .draw_class_activation_map(&dummy_model(), &manifest, &out_dir)
            .unwrap();

        for i in 0..2 {
            let artifact = image::open(out_dir.join(format!("cam_{i}.png"))).unwrap();
            // Artifacts keep the source resolution.
            assert_eq!(artifact.dimensions(), (8, 8));
        }
    }

    #[test]
    fn test_rejects_out_of_range_fraction() {
        assert!(CenterCropCam::with_fraction(0.0).is_err());
        assert!(CenterCropCam::with_fraction(1.5).is_err());
        assert!(CenterCropCam::with_fraction(1.0).is_ok());
    }
}
