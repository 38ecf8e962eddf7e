//! Per-unit progress tracking and the run report.
//!
//! Each (user, domain) unit of work moves through a small state machine;
//! `Committed` means every write for the window succeeded, so the
//! destination's high-water mark has effectively advanced. Any earlier
//! stop leaves the prior mark intact and the next run re-fetches the
//! same window.

use crate::Domain;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Phase of a sync unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UnitPhase {
    Idle,
    WindowComputed,
    Fetching,
    Normalizing,
    Writing,
    Committed,
    Failed,
}

impl fmt::Display for UnitPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            UnitPhase::Idle => "idle",
            UnitPhase::WindowComputed => "window-computed",
            UnitPhase::Fetching => "fetching",
            UnitPhase::Normalizing => "normalizing",
            UnitPhase::Writing => "writing",
            UnitPhase::Committed => "committed",
            UnitPhase::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Record counts accumulated while processing one unit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitCounts {
    /// Raw plays fetched from the source
    pub fetched: u64,
    /// Rows inserted
    pub created: u64,
    /// Rows updated with a field-level diff
    pub updated: u64,
    /// Rows already in the desired state
    pub unchanged: u64,
    /// Records skipped for a missing natural key
    pub skipped: u64,
    /// Plays flagged as duplicate source emissions
    pub duplicates: u64,
    /// Records the destination rejected as invalid
    pub rejected: u64,
}

/// Outcome of one (user, domain) sync unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitSummary {
    pub user: String,
    pub domain: Domain,
    pub phase: UnitPhase,
    pub counts: UnitCounts,
    /// Error detail when the unit failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl UnitSummary {
    /// A unit that has not started yet.
    pub fn new(user: impl Into<String>, domain: Domain) -> Self {
        Self {
            user: user.into(),
            domain,
            phase: UnitPhase::Idle,
            counts: UnitCounts::default(),
            error: None,
        }
    }

    /// Mark the unit failed with an error description.
    pub fn fail(&mut self, error: impl fmt::Display) {
        self.phase = UnitPhase::Failed;
        self.error = Some(error.to_string());
    }

    pub fn is_failed(&self) -> bool {
        self.phase == UnitPhase::Failed
    }
}

/// Aggregated outcome of a whole run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub units: Vec<UnitSummary>,
}

impl RunReport {
    /// Whether any unit ended in `Failed`.
    ///
    /// Drives the process exit status: one failed unit makes the run
    /// non-zero even when every other unit committed.
    pub fn any_failed(&self) -> bool {
        self.units.iter().any(UnitSummary::is_failed)
    }

    /// Counts summed across all units.
    pub fn totals(&self) -> UnitCounts {
        let mut totals = UnitCounts::default();
        for unit in &self.units {
            totals.fetched += unit.counts.fetched;
            totals.created += unit.counts.created;
            totals.updated += unit.counts.updated;
            totals.unchanged += unit.counts.unchanged;
            totals.skipped += unit.counts.skipped;
            totals.duplicates += unit.counts.duplicates;
            totals.rejected += unit.counts.rejected;
        }
        totals
    }
}
