//! Play-log domains and destination tables.
//!
//! A domain partitions a user's play history into independent sync units:
//! board game plays and tabletop RPG plays are fetched, windowed, and
//! written separately even for the same user.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The play-log category a sync unit covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    /// Board game plays
    #[serde(rename = "boardgame")]
    BoardGame,
    /// Tabletop role-playing game plays
    Rpg,
}

impl Domain {
    /// All domains, in the order units are scheduled for a bare user.
    pub const ALL: [Domain; 2] = [Domain::BoardGame, Domain::Rpg];

    /// Canonical lowercase name, also the stored `Domain` column value.
    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::BoardGame => "boardgame",
            Domain::Rpg => "rpg",
        }
    }

    /// The `subtype` value the source service filters plays by.
    pub fn source_subtype(&self) -> &'static str {
        match self {
            Domain::BoardGame => "boardgame",
            Domain::Rpg => "rpgitem",
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Domain {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "boardgame" => Ok(Domain::BoardGame),
            "rpg" | "rpgitem" => Ok(Domain::Rpg),
            other => Err(format!("unknown domain: {other}")),
        }
    }
}

/// The four destination tables, in referential write order.
///
/// Items and Players have no references; Plays reference Items;
/// PlayerPlays reference both Plays and Players. The orchestrator writes
/// tables in this order so a referencing row never lands before the row
/// it points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Table {
    Items,
    Players,
    Plays,
    PlayerPlays,
}

impl Table {
    /// Table identifier in the destination store.
    pub fn name(&self) -> &'static str {
        match self {
            Table::Items => "Items",
            Table::Players => "Players",
            Table::Plays => "Plays",
            Table::PlayerPlays => "PlayerPlays",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
