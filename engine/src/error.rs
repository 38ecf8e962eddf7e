//! Error types for the Playlog engine.

use crate::PlayId;
use thiserror::Error;

/// All possible errors from the Playlog engine.
///
/// Every variant is a normalization failure: a raw record is missing the
/// source-assigned natural key (or the date used for windowing) that
/// referential integrity depends on. These are per-record errors; the
/// caller skips and counts the record, they never abort a run.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("play record has no play id")]
    MissingPlayId,

    #[error("play {0} has no item id")]
    MissingItemId(PlayId),

    #[error("play {0} has no date")]
    MissingDate(PlayId),

    #[error("player '{name}' in play {play_id} has no user id")]
    MissingPlayerId { play_id: PlayId, name: String },
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;
