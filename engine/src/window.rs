//! Overlap detection: fetch-window computation and page scanning.
//!
//! Two pieces bound what a sync run downloads without ever missing a new
//! play. [`fetch_window`] turns the destination's high-water mark into a
//! minimum date (mark minus a safety margin, because the source can emit
//! records slightly out of chronological order). [`OverlapScan`] then
//! walks newest-first pages and stops at the first page that overlaps
//! plays already stored, so deep history is not re-downloaded on every
//! run. Over-fetching inside the margin is fine; idempotent upsert
//! resolves it downstream.

use crate::{PlayId, RawPlay};
use chrono::{Days, NaiveDate};
use std::collections::BTreeSet;

/// The date window a run fetches: `[min_date, now]`.
///
/// An unbounded window (no `min_date`) means full history and is used
/// only on first sync or by explicit operator choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchWindow {
    /// Earliest date to request, or `None` for full history
    pub min_date: Option<NaiveDate>,
}

impl FetchWindow {
    /// Full-history window.
    pub fn unbounded() -> Self {
        Self { min_date: None }
    }

    pub fn is_unbounded(&self) -> bool {
        self.min_date.is_none()
    }
}

/// Compute the fetch window from the destination's high-water mark.
///
/// The window never excludes a play that is new relative to the
/// destination: any record dated after `high_water - margin_days` falls
/// inside it.
pub fn fetch_window(high_water: Option<NaiveDate>, margin_days: u32) -> FetchWindow {
    match high_water {
        None => FetchWindow::unbounded(),
        Some(mark) => FetchWindow {
            // An out-of-range subtraction would only happen for marks at
            // the calendar minimum; fall back to full history there.
            min_date: mark.checked_sub_days(Days::new(u64::from(margin_days))),
        },
    }
}

/// Outcome of absorbing one page into an [`OverlapScan`].
#[derive(Debug, Clone, PartialEq)]
pub struct PageScan {
    /// Plays on the page not yet present in the destination
    pub fresh: Vec<RawPlay>,
    /// How many plays on the page were already stored
    pub overlap: usize,
    /// Whether this page ends the user's history (short or empty page)
    pub last_page: bool,
}

/// Iterate-until-overlap scanner over newest-first pages.
///
/// Seeded with the play ids most recently stored for the sync unit.
/// Pagination can stop as soon as a page overlaps that set or history
/// runs out; every play before the stop point is guaranteed new.
#[derive(Debug, Clone)]
pub struct OverlapScan {
    known: BTreeSet<PlayId>,
    page_size: usize,
    finished: bool,
}

impl OverlapScan {
    /// Create a scanner over the given set of already-stored play ids.
    ///
    /// `page_size` is the source service's fixed page length; a page
    /// shorter than it signals the end of history.
    pub fn new(known: impl IntoIterator<Item = PlayId>, page_size: usize) -> Self {
        Self {
            known: known.into_iter().collect(),
            page_size,
            finished: false,
        }
    }

    /// Whether pagination can stop.
    pub fn finished(&self) -> bool {
        self.finished
    }

    /// Absorb one page, newest first, returning the plays that are new.
    ///
    /// Plays without an id pass through as fresh; the normalizer skips
    /// and counts them later.
    pub fn absorb_page(&mut self, page: Vec<RawPlay>) -> PageScan {
        let last_page = page.len() < self.page_size;
        let mut fresh = Vec::with_capacity(page.len());
        let mut overlap = 0;

        for play in page {
            let seen = play
                .play_id
                .as_ref()
                .is_some_and(|id| self.known.contains(id));
            if seen {
                overlap += 1;
            } else {
                fresh.push(play);
            }
        }

        if overlap > 0 || last_page {
            self.finished = true;
        }

        PageScan {
            fresh,
            overlap,
            last_page,
        }
    }
}
