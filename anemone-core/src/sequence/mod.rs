//! The sorted sequence container and its snapshot buffers.
//!
//! # Organization
//!
//! - [`sorted_buffer`] - `SortedBuffer`, the ascending buffer a snapshot is made of
//! - [`sorted_sequence`] - `SortedSequence`, the copy-modify-publish container
//!
//! # Usage
//!
//! The container is generic over reclamation strategy `R: Reclaim`:
//!
//! ```ignore
//! use anemone_core::{DropReclaim, SortedSequence};
//!
//! let seq: SortedSequence<DropReclaim> = SortedSequence::new();
//! seq.insert(42);
//! assert_eq!(seq.read(0), 42);
//! ```

pub mod sorted_buffer;
pub mod sorted_sequence;

pub use sorted_buffer::SortedBuffer;
pub use sorted_sequence::SortedSequence;
