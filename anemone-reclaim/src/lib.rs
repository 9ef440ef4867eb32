//! Grace-period reclamation for anemone sequences.
//!
//! This crate provides `GraceReclaimer`, the production implementation of
//! the `Reclaim` trait: retired snapshot buffers are destroyed by a
//! background worker once a fixed grace interval has elapsed since their
//! retirement.
//!
//! # Usage
//!
//! ```ignore
//! use anemone_reclaim::GraceSequence;
//!
//! let seq = GraceSequence::new();
//! seq.insert(42);
//! assert_eq!(seq.read(0), 42);
//! // Dropping the sequence retires the final snapshot and shuts the
//! // reclaimer down in order.
//! ```

pub mod grace_reclaimer;

pub use grace_reclaimer::GraceReclaimer;

use anemone_core::SortedSequence;

/// The assembled production container: a sorted sequence whose retired
/// snapshots are destroyed after a grace period.
pub type GraceSequence = SortedSequence<GraceReclaimer>;
