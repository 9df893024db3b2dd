//! Batch flows over labeled manifests, and the fused-flow adapter for
//! dual-branch models.

use crate::augmentation::Augmenter;
use crate::loader::ImageLoader;
use crate::split::stratified_holdout;
use agc_core::{
    ClassMode, Error, ExperimentConfig, ImageDimensions, Manifest, ManifestEntry, Result,
};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeMap;

/// One batch drawn from a flow.
///
/// Images are packed `[batch, height, width, channel]` into a flat buffer;
/// labels are a scalar per sample in binary mode and a one-hot row per
/// sample in categorical mode.
#[derive(Debug, Clone)]
pub struct Batch {
    pub images: Vec<f32>,
    pub labels: Vec<f32>,
    pub len: usize,
    pub image_dims: ImageDimensions,
    pub label_width: usize,
}

/// A batch from the fused adapter: the image batch of each source flow and
/// the label batch of the first.
#[derive(Debug, Clone)]
pub struct FusedBatch {
    pub first: Batch,
    pub second: Batch,
}

impl FusedBatch {
    /// Shared label batch; always the first flow's
    pub fn labels(&self) -> &[f32] {
        &self.first.labels
    }
}

/// Construction options for a flow.
#[derive(Debug, Clone)]
pub struct FlowOptions {
    pub mode: ClassMode,
    pub seed: u64,
    pub batch_size: usize,
    pub shuffle: bool,
    pub augmenter: Option<Augmenter>,
    pub image_size: ImageDimensions,
}

/// Restartable, finite batch iterator over a split.
///
/// The sample order is fixed at construction (shuffled once with the seed
/// when requested), so two flows built from manifests with matching label
/// sequences and the same seed stay synchronized draw for draw.
pub struct Flow {
    entries: Vec<ManifestEntry>,
    order: Vec<usize>,
    class_indices: BTreeMap<i64, usize>,
    loader: ImageLoader,
    augmenter: Option<Augmenter>,
    mode: ClassMode,
    batch_size: usize,
    cursor: usize,
}

// Augmenter carries its RNG, so give FlowOptions a hand-rolled constructor
// rather than Default.
impl FlowOptions {
    pub fn new(mode: ClassMode, seed: u64, batch_size: usize, image_size: ImageDimensions) -> Self {
        Self {
            mode,
            seed,
            batch_size,
            shuffle: true,
            augmenter: None,
            image_size,
        }
    }

    pub fn shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }

    pub fn augmenter(mut self, augmenter: Option<Augmenter>) -> Self {
        self.augmenter = augmenter;
        self
    }
}

impl Flow {
    pub fn new(manifest: &Manifest, options: FlowOptions) -> Result<Self> {
        if manifest.is_empty() {
            return Err(Error::Dataset(
                "cannot build a flow over an empty manifest".to_string(),
            ));
        }
        if options.batch_size == 0 {
            return Err(Error::InvalidArgument(
                "flow batch size must be greater than 0".to_string(),
            ));
        }

        let class_indices: BTreeMap<i64, usize> = manifest
            .distinct_labels()
            .into_iter()
            .enumerate()
            .map(|(index, label)| (label, index))
            .collect();

        if options.mode.is_binary() && class_indices.len() > 2 {
            return Err(Error::Dataset(format!(
                "binary flow over {} distinct labels",
                class_indices.len()
            )));
        }

        let mut order: Vec<usize> = (0..manifest.len()).collect();
        if options.shuffle {
            let mut rng = ChaCha8Rng::seed_from_u64(options.seed);
            order.shuffle(&mut rng);
        }

        let mut flow = Self {
            entries: manifest.entries().to_vec(),
            order,
            class_indices,
            loader: ImageLoader::new(options.image_size),
            augmenter: options.augmenter,
            mode: options.mode,
            batch_size: options.batch_size,
            cursor: 0,
        };
        flow.reset();
        Ok(flow)
    }

    /// Number of samples
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of batches in one full pass
    pub fn steps(&self) -> usize {
        self.len().div_ceil(self.batch_size)
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn mode(&self) -> ClassMode {
        self.mode
    }

    /// Label-to-encoded-index table, ascending by label
    pub fn class_indices(&self) -> &BTreeMap<i64, usize> {
        &self.class_indices
    }

    /// Encoded class index of every sample, in iteration order
    pub fn classes(&self) -> Vec<i64> {
        self.order
            .iter()
            .map(|&i| self.class_indices[&self.entries[i].label] as i64)
            .collect()
    }

    /// File names in iteration order, for reporting
    pub fn filenames(&self) -> Vec<String> {
        self.order
            .iter()
            .map(|&i| self.entries[i].path.display().to_string())
            .collect()
    }

    /// Rewinds the internal cursor to the first batch
    pub fn reset(&mut self) {
        self.cursor = 0;
    }

    /// Draws the next batch; `None` once the pass is complete.
    pub fn next_batch(&mut self) -> Result<Option<Batch>> {
        let start = self.cursor * self.batch_size;
        if start >= self.len() {
            return Ok(None);
        }
        let end = (start + self.batch_size).min(self.len());
        self.cursor += 1;

        let label_width = match self.mode {
            ClassMode::Binary => 1,
            ClassMode::Categorical => self.class_indices.len(),
        };

        let dims = self.loader.target();
        let mut images = Vec::with_capacity((end - start) * dims.total_pixels() as usize);
        let mut labels = Vec::with_capacity((end - start) * label_width);

        for &entry_idx in &self.order[start..end] {
            let entry = &self.entries[entry_idx];
            let mut image = self.loader.load_image(&entry.path)?;
            if let Some(augmenter) = self.augmenter.as_mut() {
                image = augmenter.apply(&image);
            }
            images.extend(self.loader.to_pixels(&image));

            let encoded = self.class_indices[&entry.label];
            match self.mode {
                ClassMode::Binary => labels.push(encoded as f32),
                ClassMode::Categorical => {
                    let mut one_hot = vec![0.0; label_width];
                    one_hot[encoded] = 1.0;
                    labels.extend(one_hot);
                }
            }
        }

        Ok(Some(Batch {
            images,
            labels,
            len: end - start,
            image_dims: dims,
            label_width,
        }))
    }
}

/// Builds a flow the way every driver does: decode, resize, rescale, with
/// optional augmentation for training passes.
pub fn create_flow(
    manifest: &Manifest,
    config: &ExperimentConfig,
    batch_size: usize,
    shuffle: bool,
    data_augmentation: bool,
) -> Result<Flow> {
    let augmenter = data_augmentation
        .then(|| Augmenter::new(config.augmentation.clone(), config.seed));

    Flow::new(
        manifest,
        FlowOptions::new(config.class_mode, config.seed, batch_size, config.image_size)
            .shuffle(shuffle)
            .augmenter(augmenter),
    )
}

/// Stratified train/validation flows from one manifest.
///
/// The same seed is reused for the split and for both derived flows, so a
/// rebuilt pair enumerates identically. The validation flow uses batch size
/// one and never augments.
pub fn training_validation_flows(
    manifest: &Manifest,
    config: &ExperimentConfig,
) -> Result<(Flow, Flow)> {
    let (train, validation) =
        stratified_holdout(manifest, config.validation_fraction, config.seed)?;

    let train_flow = create_flow(
        &train,
        config,
        config.batch_size,
        true,
        config.data_augmentation,
    )?;
    let validation_flow = create_flow(&validation, config, 1, true, false)?;

    Ok((train_flow, validation_flow))
}

/// Pairs two flows into one infinite dual-input sequence.
///
/// Each pull yields both flows' image batches and the FIRST flow's label
/// batch. Both flows are reset when the adapter is built, and rewound
/// whenever they run out, so pulling never ends.
///
/// Precondition: the flows must enumerate the same label sequence in the
/// same order (same manifest labels, same seed, same shuffle policy). The
/// adapter does not verify this.
pub struct FusedFlow<'a> {
    first: &'a mut Flow,
    second: &'a mut Flow,
}

impl<'a> FusedFlow<'a> {
    pub fn new(first: &'a mut Flow, second: &'a mut Flow) -> Self {
        first.reset();
        second.reset();
        Self { first, second }
    }

    /// Length of one pass of the first flow
    pub fn steps(&self) -> usize {
        self.first.steps()
    }

    pub fn next_batch(&mut self) -> Result<FusedBatch> {
        let first = match self.first.next_batch()? {
            Some(batch) => batch,
            None => {
                self.first.reset();
                self.second.reset();
                self.first
                    .next_batch()?
                    .ok_or_else(|| Error::Dataset("first flow is empty".to_string()))?
            }
        };

        let second = match self.second.next_batch()? {
            Some(batch) => batch,
            None => {
                self.second.reset();
                self.second
                    .next_batch()?
                    .ok_or_else(|| Error::Dataset("second flow is empty".to_string()))?
            }
        };

        Ok(FusedBatch { first, second })
    }
}
