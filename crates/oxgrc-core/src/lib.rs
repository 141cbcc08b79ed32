//! Domain operations on top of the storage layer: control mapping,
//! test/issue lifecycle and dashboard aggregation.

pub mod error;
pub mod lifecycle;
pub mod mapping;
pub mod stats;


pub use error::{CoreError, Result};
