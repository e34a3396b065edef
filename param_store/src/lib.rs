//! Lock-free parameter sharing between training processes.
//!
//! One process creates a file-backed region and fills it with the initial
//! model parameters; every trainer maps the same file and updates it in
//! place without any synchronization. Races are part of the deal: lost and
//! torn updates are accepted, and the training algorithm absorbs them.

pub mod error;
pub mod region;
pub mod store;

pub use error::{Result, StoreErr};
pub use region::SharedRegion;
pub use store::SharedParams;
