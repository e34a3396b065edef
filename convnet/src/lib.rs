//! Small convolutional network for MNIST digit classification.
//!
//! All trainable parameters live in a single flat `f32` buffer owned by the
//! caller. The network only ever *views* that buffer, so the same forward and
//! backward code runs against process-local memory or a shared region mapped
//! by several processes at once.

pub mod data;
pub mod error;
pub mod init;
pub mod layers;
pub mod layout;
pub mod loss;
pub mod model;
pub mod optim;

pub use error::{MlErr, Result};
pub use layout::{ParamEntry, ParamLayout};
pub use model::{Mode, Net, PARAM_COUNT};
