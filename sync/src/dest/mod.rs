//! Destination side: the table store client and record field mapping.

mod client;
mod records;

pub use client::{upsert_with, HttpTableStore, ListOptions, TableStore, UpsertOutcome};
pub use records::{
    date_field, item_fields, item_key, play_fields, play_key, player_fields, player_key,
    player_play_fields, player_play_key, str_field, StoredRecord,
};
