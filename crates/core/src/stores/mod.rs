pub mod disk;
pub mod memory;

pub use disk::DiskIndex;
pub use memory::{InMemoryIndex, IndexEntry};
