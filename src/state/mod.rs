//! State module for catalog entry lifecycle
//!
//! # Components
//!
//! - `LifecycleStatus`: the review/import stage of a catalog entry (new, updated, inactive, imported)

mod lifecycle;

pub use lifecycle::LifecycleStatus;
