//! Persistence layer for the GRC entity collections.
//!
//! All collections live in a single SQLite database behind [`store::GrcStore`]
//! (WAL mode, one `Mutex<Connection>`). List-valued fields are stored as JSON
//! text columns; timestamps are stored as Unix seconds.

pub mod error;
pub mod store;

#[cfg(test)]
mod tests;

pub use error::{Result, StorageError};
pub use store::GrcStore;
