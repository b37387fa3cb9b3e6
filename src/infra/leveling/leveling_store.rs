// Implementations for the leveling system.
#![allow(unused_imports)]

pub mod in_memory;
pub mod sqlite_store;

// Re-export for convenience
pub use in_memory::InMemoryScoreStore;
pub use sqlite_store::SqliteScoreStore;
