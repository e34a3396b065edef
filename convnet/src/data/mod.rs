pub mod dataset;
pub mod idx;
pub mod loader;

pub use dataset::{DataSource, Dataset};
pub use loader::{Batch, DataLoader};

/// MNIST images are 28x28 single-channel.
pub const IMAGE_SIDE: usize = 28;
pub const IMAGE_PIXELS: usize = IMAGE_SIDE * IMAGE_SIDE;
pub const NUM_CLASSES: usize = 10;

/// Dataset-wide pixel statistics used to normalize inputs.
pub const MNIST_MEAN: f32 = 0.1307;
pub const MNIST_STD: f32 = 0.3081;
