//! # sbn-core
//!
//! Shared vocabulary of the SBN reweighting crates: the event-record view
//! ([`SliceRecord`]), selection cuts, the [`Systematic`] contract and the
//! common [`Error`] type.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cut;
pub mod error;
pub mod traits;
pub mod types;

pub use cut::Cut;
pub use error::{Error, Result};
pub use traits::{SliceRecord, Systematic};
pub use types::{Multiverse, Slice, SliceTruth};

/// Crate version, shared by the workspace.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
