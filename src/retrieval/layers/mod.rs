//! Concrete search layers
//!
//! - `FtsIndexLayer` - SQLite FTS5 index built by `credence index`
//! - `MemoryLayer` - in-memory fallback, always available

mod fts;
mod memory;

pub use fts::FtsIndexLayer;
pub use memory::MemoryLayer;
