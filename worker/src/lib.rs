//! The training side of a Hogwild run.
//!
//! Each worker process attaches to the parameter buffer its parent shared,
//! builds its own network, optimizer and data order from a rank-offset seed,
//! and applies SGD updates straight into the shared memory. No worker ever
//! waits for another one.

pub mod error;
pub mod loop_;
pub mod metrics;
pub mod spec;

pub use error::{Result, WorkerErr};
pub use loop_::TrainLoop;
pub use metrics::WorkerMetrics;
pub use spec::WorkerSpec;
