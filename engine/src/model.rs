//! Normalized entities written to the destination store.
//!
//! Four entity kinds form a strict dependency chain: Item and Player are
//! independent, a Play references its Item, and a PlayerPlay references
//! both its Play and its Player. References here are by natural key; the
//! destination client resolves them to row ids at write time, after the
//! referenced rows exist.

use crate::{Domain, ItemId, PlayId, UserId};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A board game or RPG, keyed by its source-assigned `ItemID`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    /// Natural key
    pub item_id: ItemId,
    pub name: String,
    /// Source object type (e.g. "thing")
    pub kind: String,
    /// Source subtype (e.g. "boardgame", "rpgitem")
    pub subtype: String,
}

/// A person who appeared in at least one play, keyed by `UserID`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    /// Natural key
    pub user_id: UserId,
    pub username: Option<String>,
    pub name: Option<String>,
}

/// A logged play, keyed by `PlayID` and referencing its [`Item`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Play {
    /// Natural key
    pub play_id: PlayId,
    /// Natural key of the item played; resolved to a row ref at write time
    pub item_id: ItemId,
    /// The configured user this play was synced for
    pub sync_user: String,
    /// The sync unit's domain
    pub domain: Domain,
    pub date: NaiveDate,
    pub quantity: Option<u32>,
    pub length_minutes: Option<u32>,
    pub location: Option<String>,
    pub comment: Option<String>,
    /// True when more than one source record was observed for this
    /// `PlayID`. Recomputed by the pipeline, never trusted from input.
    pub is_duplicate: bool,
}

/// One player's participation in one play; composite key (PlayRef, PlayerRef).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerPlay {
    /// Natural key of the owning play
    pub play_id: PlayId,
    /// Natural key of the participating player
    pub user_id: UserId,
    pub start_position: Option<String>,
    pub color: Option<String>,
    pub score: Option<f64>,
    pub rating: Option<f64>,
    pub new: Option<bool>,
    pub win: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialization_roundtrip() {
        let play = Play {
            play_id: "123".into(),
            item_id: "174430".into(),
            sync_user: "alice".into(),
            domain: Domain::BoardGame,
            date: NaiveDate::from_ymd_opt(2026, 3, 14).unwrap(),
            quantity: Some(1),
            length_minutes: None,
            location: None,
            comment: Some("tight endgame".into()),
            is_duplicate: false,
        };

        let json = serde_json::to_string(&play).unwrap();
        assert!(json.contains("\"playId\":\"123\""));
        assert!(json.contains("\"domain\":\"boardgame\""));

        let parsed: Play = serde_json::from_str(&json).unwrap();
        assert_eq!(play, parsed);
    }
}
