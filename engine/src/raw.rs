//! Raw play records as the source service emits them.
//!
//! These types sit between the wire decoder (which lives in the sync
//! binary) and the normalizer. Anything the service may omit is an
//! `Option`, and stays `None` when absent; the engine never substitutes
//! defaults for missing values. Natural keys are kept as strings exactly
//! as assigned by the source.

use crate::{ItemId, PlayId, UserId};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// The game or RPG a play was logged against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawItem {
    /// Source-assigned item identifier (natural key)
    pub item_id: Option<ItemId>,
    /// Human-readable item name
    pub name: String,
    /// Source object type (e.g. "thing", "family")
    pub kind: String,
    /// Source subtype (e.g. "boardgame", "rpgitem")
    pub subtype: String,
}

/// One participant sub-record nested in a play.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPlayer {
    /// Source-assigned user identifier (natural key)
    pub user_id: Option<UserId>,
    /// Account username, absent for anonymous players
    pub username: Option<String>,
    /// Display name as entered by the logger
    pub name: Option<String>,
    /// Seating or turn-order position
    pub start_position: Option<String>,
    /// Color or faction played
    pub color: Option<String>,
    /// Final score
    pub score: Option<f64>,
    /// Rating the player gave the item for this play
    pub rating: Option<f64>,
    /// First play of this item for the player
    pub new: Option<bool>,
    /// Whether the player won
    pub win: Option<bool>,
}

impl RawPlayer {
    /// A player with only a user id set, for building test fixtures.
    pub fn with_user_id(user_id: impl Into<UserId>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            username: None,
            name: None,
            start_position: None,
            color: None,
            score: None,
            rating: None,
            new: None,
            win: None,
        }
    }
}

/// One raw play record from the source service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPlay {
    /// Source-assigned play identifier (natural key)
    pub play_id: Option<PlayId>,
    /// Date the play happened
    pub date: Option<NaiveDate>,
    /// Number of games played in this record
    pub quantity: Option<u32>,
    /// Play length in minutes
    pub length_minutes: Option<u32>,
    /// Marked incomplete by the logger
    pub incomplete: Option<bool>,
    /// Excluded from win statistics by the logger
    pub no_win_stats: Option<bool>,
    /// Where the play happened
    pub location: Option<String>,
    /// Free-text comment
    pub comment: Option<String>,
    /// The item played
    pub item: RawItem,
    /// Participant sub-records (may be empty)
    pub players: Vec<RawPlayer>,
}
