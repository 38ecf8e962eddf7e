//! Mapping between engine entities and destination table rows.
//!
//! Each builder produces the full desired field map for one row; the
//! upsert layer diffs it against what is stored and writes only the
//! changed subset. Absent values map to JSON null so a field cleared at
//! the source clears at the destination too. Cross-table links are row
//! ids, which is why plays and player-plays take resolved row ids here.

use chrono::NaiveDate;
use playlog_engine::{FieldMap, Item, Play, Player, PlayerPlay, RowId};
use serde_json::{json, Value};

/// One row as the destination store returns it.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRecord {
    pub id: RowId,
    pub fields: FieldMap,
}

impl StoredRecord {
    pub fn new(id: RowId, fields: FieldMap) -> Self {
        Self { id, fields }
    }
}

/// Read a string column, treating null and absence alike.
pub fn str_field<'a>(record: &'a StoredRecord, name: &str) -> Option<&'a str> {
    record.fields.get(name).and_then(Value::as_str)
}

/// Read an ISO-date column.
pub fn date_field(record: &StoredRecord, name: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(str_field(record, name)?, "%Y-%m-%d").ok()
}

fn fields(value: Value) -> FieldMap {
    match value {
        Value::Object(map) => map,
        _ => unreachable!("field builders always produce objects"),
    }
}

// ============================================================================
// Items
// ============================================================================

pub fn item_key(item: &Item) -> FieldMap {
    fields(json!({ "ItemID": item.item_id }))
}

pub fn item_fields(item: &Item) -> FieldMap {
    fields(json!({
        "ItemID": item.item_id,
        "Name": item.name,
        "Type": item.kind,
        "Subtype": item.subtype,
    }))
}

// ============================================================================
// Players
// ============================================================================

pub fn player_key(player: &Player) -> FieldMap {
    fields(json!({ "UserID": player.user_id }))
}

pub fn player_fields(player: &Player) -> FieldMap {
    fields(json!({
        "UserID": player.user_id,
        "Username": player.username,
        "Name": player.name,
    }))
}

// ============================================================================
// Plays
// ============================================================================

pub fn play_key(play: &Play) -> FieldMap {
    fields(json!({ "PlayID": play.play_id }))
}

/// Full desired fields for a play row. `item_row` is the already-upserted
/// item this play links to.
pub fn play_fields(play: &Play, item_row: RowId) -> FieldMap {
    fields(json!({
        "PlayID": play.play_id,
        "Item": item_row,
        "SyncUser": play.sync_user,
        "Domain": play.domain.as_str(),
        "Date": play.date.format("%Y-%m-%d").to_string(),
        "Quantity": play.quantity,
        "LengthMinutes": play.length_minutes,
        "Location": play.location,
        "Comment": play.comment,
        "IsDuplicate": play.is_duplicate,
    }))
}

// ============================================================================
// Player-plays
// ============================================================================

pub fn player_play_key(play_row: RowId, player_row: RowId) -> FieldMap {
    fields(json!({ "Play": play_row, "Player": player_row }))
}

pub fn player_play_fields(pp: &PlayerPlay, play_row: RowId, player_row: RowId) -> FieldMap {
    fields(json!({
        "Play": play_row,
        "Player": player_row,
        "StartPosition": pp.start_position,
        "Color": pp.color,
        "Score": pp.score,
        "Rating": pp.rating,
        "New": pp.new,
        "Win": pp.win,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use playlog_engine::Domain;

    fn play() -> Play {
        Play {
            play_id: "90001".into(),
            item_id: "174430".into(),
            sync_user: "alice".into(),
            domain: Domain::BoardGame,
            date: NaiveDate::from_ymd_opt(2026, 3, 14).unwrap(),
            quantity: Some(2),
            length_minutes: None,
            location: Some("Home".into()),
            comment: None,
            is_duplicate: false,
        }
    }

    #[test]
    fn play_fields_carry_link_and_absent_columns() {
        let map = play_fields(&play(), 17);
        assert_eq!(map["Item"], json!(17));
        assert_eq!(map["Date"], json!("2026-03-14"));
        assert_eq!(map["Quantity"], json!(2));
        // Absent values become explicit nulls, so clearing propagates.
        assert_eq!(map["LengthMinutes"], Value::Null);
        assert_eq!(map["Comment"], Value::Null);
    }

    #[test]
    fn stored_field_readers() {
        let record = StoredRecord::new(3, play_fields(&play(), 17));
        assert_eq!(str_field(&record, "PlayID"), Some("90001"));
        assert_eq!(str_field(&record, "Comment"), None);
        assert_eq!(
            date_field(&record, "Date"),
            NaiveDate::from_ymd_opt(2026, 3, 14)
        );
    }

    #[test]
    fn keys_are_minimal() {
        assert_eq!(play_key(&play()).len(), 1);
        assert_eq!(player_play_key(1, 2).len(), 2);
    }
}
