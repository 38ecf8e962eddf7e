//! # Playlog Engine
//!
//! The deterministic core of the Playlog sync pipeline.
//!
//! This crate turns raw play records from a play-tracking service into a
//! normalized relational shape (items, players, plays, player-plays) and
//! decides what a sync run needs to fetch and write. It performs no IO:
//! the HTTP clients and the orchestrator live in the `playlog-sync`
//! binary and feed this crate plain data.
//!
//! ## Design Principles
//!
//! - **No IO**: the engine has no knowledge of HTTP, files, or clocks
//! - **Deterministic**: identical raw input always yields identical output
//! - **Testable**: pure logic, no mocks needed
//!
//! ## Core Concepts
//!
//! ### Raw records
//!
//! [`RawPlay`] mirrors what the source service emits: every field that the
//! service may omit is an `Option`, and an absent value stays absent.
//! The engine never invents identifiers or guesses defaults.
//!
//! ### Normalization
//!
//! [`normalize_batch`] maps a window of raw plays into four entity sets
//! keyed by their source-assigned natural keys. Records missing a natural
//! key are skipped and reported, never silently dropped.
//!
//! ### Overlap detection
//!
//! [`fetch_window`] bounds a run by the destination's high-water mark
//! minus a safety margin, and [`OverlapScan`] walks newest-first pages
//! until they overlap plays that are already stored.
//!
//! ### Merge planning
//!
//! [`changed_fields`] computes the minimal field-level update for an
//! upsert, so destination-side manual edits on untouched columns survive.

pub mod domain;
pub mod error;
pub mod merge;
pub mod model;
pub mod normalize;
pub mod raw;
pub mod summary;
pub mod window;

// Re-export main types at crate root
pub use domain::{Domain, Table};
pub use error::Error;
pub use merge::{changed_fields, FieldMap};
pub use model::{Item, Play, Player, PlayerPlay};
pub use normalize::{normalize_batch, normalize_play, NormalizedBatch, PlayBundle};
pub use raw::{RawItem, RawPlay, RawPlayer};
pub use summary::{RunReport, UnitCounts, UnitPhase, UnitSummary};
pub use window::{fetch_window, FetchWindow, OverlapScan, PageScan};

/// Type aliases for clarity
pub type PlayId = String;
pub type ItemId = String;
pub type UserId = String;
/// Row identifier assigned by the destination store (not a natural key).
pub type RowId = i64;
