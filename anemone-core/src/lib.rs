pub mod common_tests;
pub mod pool;
pub mod reclaim;
pub mod sequence;

// Re-export the main types for convenience
pub use pool::BufferPool;
pub use reclaim::{DropReclaim, Reclaim};
pub use sequence::{SortedBuffer, SortedSequence};
