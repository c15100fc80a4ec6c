//! Catalog domain: records, fingerprints and the lifecycle state machine
//!
//! This module owns every decision about what gets written to the catalog:
//! - `CandidateRecord` / `CatalogEntry` data types
//! - content fingerprints for change detection
//! - the reconciler deciding create / update / touch
//! - the operator import action and the staleness sweep

mod fingerprint;
mod import;
mod reconcile;
mod record;
mod sweep;

pub use fingerprint::{fingerprint, fingerprint_fields, Fingerprint};
pub use import::{import_entry, Actor, ImportError};
pub use reconcile::{
    reconcile, reconcile_and_store, ApplyError, ReconcileAction, ReconcileContext,
    ReconcileError, Reconciliation, MAX_WRITE_ATTEMPTS,
};
pub use record::{CandidateRecord, CatalogEntry};
pub use sweep::{sweep_stale, SweepError};
