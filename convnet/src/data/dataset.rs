use std::path::{Path, PathBuf};

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

use super::{IMAGE_PIXELS, IMAGE_SIDE, NUM_CLASSES, idx};
use crate::error::{MlErr, Result};

/// An in-memory labeled image set, pixels already normalized.
#[derive(Debug, Clone)]
pub struct Dataset {
    images: Vec<f32>,
    labels: Vec<u8>,
}

impl Dataset {
    /// # Panics
    /// - if the pixel buffer is not `labels.len() * 784` long
    pub fn new(images: Vec<f32>, labels: Vec<u8>) -> Self {
        assert_eq!(
            images.len(),
            labels.len() * IMAGE_PIXELS,
            "images and labels must agree"
        );
        Self { images, labels }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Flat pixels of one image (panics if out of bounds).
    #[inline]
    pub fn image(&self, idx: usize) -> &[f32] {
        &self.images[idx * IMAGE_PIXELS..(idx + 1) * IMAGE_PIXELS]
    }

    #[inline]
    pub fn label(&self, idx: usize) -> u8 {
        self.labels[idx]
    }

    /// Loads one split of an on-disk MNIST distribution.
    ///
    /// # Arguments
    /// * `dir` - Directory holding the four idx files under their standard
    ///   names (`train-images-idx3-ubyte`, ...).
    /// * `train` - Which split to read.
    pub fn mnist(dir: &Path, train: bool) -> Result<Self> {
        let (images_name, labels_name) = if train {
            ("train-images-idx3-ubyte", "train-labels-idx1-ubyte")
        } else {
            ("t10k-images-idx3-ubyte", "t10k-labels-idx1-ubyte")
        };

        let (images, count) = idx::read_images(&dir.join(images_name))?;
        let labels = idx::read_labels(&dir.join(labels_name))?;
        if count != labels.len() {
            return Err(MlErr::SizeMismatch {
                what: "mnist split",
                got: labels.len(),
                expected: count,
            });
        }
        Ok(Self { images, labels })
    }

    /// Deterministic stand-in for MNIST: gaussian noise plus a bright
    /// vertical band whose position encodes the label. Useful for smoke
    /// runs and tests where the real files are not on disk.
    pub fn synthetic(len: usize, seed: u64) -> Result<Self> {
        let noise = Normal::new(0.0, 0.3)?;
        let mut rng = StdRng::seed_from_u64(seed);

        let mut images = Vec::with_capacity(len * IMAGE_PIXELS);
        let mut labels = Vec::with_capacity(len);
        for i in 0..len {
            let label = (i % NUM_CLASSES) as u8;
            let band = 2 + 2 * label as usize;

            let start = images.len();
            images.extend((0..IMAGE_PIXELS).map(|_| noise.sample(&mut rng)));
            for y in 6..22 {
                for x in band..band + 4 {
                    images[start + y * IMAGE_SIDE + x] += 2.0;
                }
            }
            labels.push(label);
        }
        Ok(Self { images, labels })
    }
}

/// Where a run's train and test splits come from.
///
/// Serialized into worker specs so every child process rebuilds exactly the
/// same dataset as its parent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DataSource {
    /// MNIST idx files under a directory.
    Mnist { dir: PathBuf },
    /// Generated patterns, no files needed.
    Synthetic {
        train_len: usize,
        test_len: usize,
        seed: u64,
    },
}

impl DataSource {
    pub fn load_train(&self) -> Result<Dataset> {
        match self {
            DataSource::Mnist { dir } => Dataset::mnist(dir, true),
            DataSource::Synthetic {
                train_len, seed, ..
            } => Dataset::synthetic(*train_len, *seed),
        }
    }

    pub fn load_test(&self) -> Result<Dataset> {
        match self {
            DataSource::Mnist { dir } => Dataset::mnist(dir, false),
            DataSource::Synthetic { test_len, seed, .. } => {
                // offset keeps the test split disjoint from training noise
                Dataset::synthetic(*test_len, seed.wrapping_add(1))
            }
        }
    }
}
