use ndarray::Array4;
use rand::Rng;
use rand::seq::SliceRandom;

use super::dataset::Dataset;
use super::{IMAGE_PIXELS, IMAGE_SIDE};

/// An owned batch of images and labels, shaped for the network.
#[derive(Debug, Clone)]
pub struct Batch {
    /// `[b, 1, 28, 28]` normalized pixels.
    pub images: Array4<f32>,
    pub labels: Vec<u8>,
}

impl Batch {
    #[inline]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// Batch producer over a dataset, reshuffling the visit order each epoch.
///
/// The final batch of an epoch is smaller when the dataset size is not a
/// multiple of the batch size; nothing is dropped.
#[derive(Debug, Clone)]
pub struct DataLoader<'a> {
    dataset: &'a Dataset,
    indices: Vec<usize>,
    batch_size: usize,
    shuffle: bool,
}

impl<'a> DataLoader<'a> {
    /// # Panics
    /// - if `batch_size == 0`
    pub fn new(dataset: &'a Dataset, batch_size: usize, shuffle: bool) -> Self {
        assert!(batch_size > 0, "batch_size must be > 0");

        Self {
            dataset,
            indices: (0..dataset.len()).collect(),
            batch_size,
            shuffle,
        }
    }

    #[inline]
    pub fn dataset_len(&self) -> usize {
        self.dataset.len()
    }

    /// Number of batches one epoch yields.
    pub fn num_batches(&self) -> usize {
        self.dataset.len().div_ceil(self.batch_size)
    }

    /// Starts a new epoch over the dataset.
    pub fn epoch<R: Rng>(&mut self, rng: &mut R) -> Batches<'_, 'a> {
        if self.shuffle {
            self.indices.shuffle(rng);
        }
        Batches {
            loader: self,
            cursor: 0,
        }
    }

    fn gather(&self, indices: &[usize]) -> Batch {
        let n = indices.len();
        let mut pixels = Vec::with_capacity(n * IMAGE_PIXELS);
        let mut labels = Vec::with_capacity(n);
        for &idx in indices {
            pixels.extend_from_slice(self.dataset.image(idx));
            labels.push(self.dataset.label(idx));
        }

        let images = Array4::from_shape_vec((n, 1, IMAGE_SIDE, IMAGE_SIDE), pixels).unwrap();
        Batch { images, labels }
    }
}

/// Iterator over one epoch's batches.
pub struct Batches<'l, 'a> {
    loader: &'l DataLoader<'a>,
    cursor: usize,
}

impl Iterator for Batches<'_, '_> {
    type Item = Batch;

    fn next(&mut self) -> Option<Batch> {
        if self.cursor >= self.loader.indices.len() {
            return None;
        }

        let end = (self.cursor + self.loader.batch_size).min(self.loader.indices.len());
        let batch = self.loader.gather(&self.loader.indices[self.cursor..end]);
        self.cursor = end;
        Some(batch)
    }
}
