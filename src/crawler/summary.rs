//! Per-link outcomes and the run summary they fold into

use crate::catalog::ReconcileAction;
use crate::crawler::{FetchError, UnusableReason};
use std::fmt;

/// What happened to one discovered link
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkOutcome {
    /// Reconciled and written
    Stored(ReconcileAction),

    /// Page fetched but yielded no candidate record
    Unusable(UnusableReason),

    /// Page could not be fetched
    FetchFailed(FetchError),

    /// Candidate could not be written
    StoreFailed(String),

    /// Not started before the run deadline
    Deferred,
}

/// Counts of link outcomes for one run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Detail links discovered on the listing page, before bounding
    pub discovered: usize,
    pub created: usize,
    pub updated: usize,
    pub touched: usize,
    pub skipped: usize,
    pub failed: usize,
    pub deferred: usize,
}

impl RunSummary {
    pub fn record(&mut self, outcome: &LinkOutcome) {
        match outcome {
            LinkOutcome::Stored(ReconcileAction::Create) => self.created += 1,
            LinkOutcome::Stored(ReconcileAction::Update) => self.updated += 1,
            LinkOutcome::Stored(ReconcileAction::Touch) => self.touched += 1,
            LinkOutcome::Unusable(_) => self.skipped += 1,
            LinkOutcome::FetchFailed(_) | LinkOutcome::StoreFailed(_) => self.failed += 1,
            LinkOutcome::Deferred => self.deferred += 1,
        }
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "discovered={} created={} updated={} touched={} skipped={} failed={} deferred={}",
            self.discovered,
            self.created,
            self.updated,
            self.touched,
            self.skipped,
            self.failed,
            self.deferred
        )
    }
}
