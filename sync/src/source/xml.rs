//! Decoding of the source service's XML play pages.
//!
//! The wire shape is attribute-heavy XML with loose typing: absent data
//! shows up as empty-string attributes, booleans are `"0"`/`"1"`, and
//! the anonymous-player user id is `"0"`. Everything is decoded into
//! owned strings first and cleaned into [`RawPlay`] here, so the engine
//! only ever sees real absence as `None`.

use crate::error::{Result, SyncError};
use chrono::NaiveDate;
use playlog_engine::{RawItem, RawPlay, RawPlayer};
use serde::Deserialize;

/// One decoded page of plays, newest first.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayPage {
    /// Total plays matching the query, across all pages
    pub total: u32,
    /// One-based page number this response covers
    pub page: u32,
    pub plays: Vec<RawPlay>,
}

/// Decode one `<plays>` response body.
pub fn parse_plays_page(body: &str) -> Result<PlayPage> {
    let doc: XmlPlays = quick_xml::de::from_str(body)
        .map_err(|err| SyncError::SourceMalformed(err.to_string()))?;

    Ok(PlayPage {
        total: doc.total.unwrap_or(0),
        page: doc.page.unwrap_or(1),
        plays: doc.play.iter().map(raw_play).collect(),
    })
}

// ============================================================================
// Wire structs
// ============================================================================

#[derive(Debug, Deserialize)]
struct XmlPlays {
    #[serde(rename = "@total")]
    total: Option<u32>,
    #[serde(rename = "@page")]
    page: Option<u32>,
    #[serde(default)]
    play: Vec<XmlPlay>,
}

#[derive(Debug, Deserialize)]
struct XmlPlay {
    #[serde(rename = "@id")]
    id: Option<String>,
    #[serde(rename = "@date")]
    date: Option<String>,
    #[serde(rename = "@quantity")]
    quantity: Option<String>,
    #[serde(rename = "@length")]
    length: Option<String>,
    #[serde(rename = "@incomplete")]
    incomplete: Option<String>,
    #[serde(rename = "@nowinstats")]
    nowinstats: Option<String>,
    #[serde(rename = "@location")]
    location: Option<String>,
    item: XmlItem,
    comments: Option<String>,
    players: Option<XmlPlayers>,
}

#[derive(Debug, Deserialize)]
struct XmlItem {
    #[serde(rename = "@name")]
    name: Option<String>,
    #[serde(rename = "@objecttype")]
    objecttype: Option<String>,
    #[serde(rename = "@objectid")]
    objectid: Option<String>,
    subtypes: Option<XmlSubtypes>,
}

#[derive(Debug, Deserialize)]
struct XmlSubtypes {
    #[serde(default)]
    subtype: Vec<XmlSubtype>,
}

#[derive(Debug, Deserialize)]
struct XmlSubtype {
    #[serde(rename = "@value")]
    value: Option<String>,
}

#[derive(Debug, Deserialize)]
struct XmlPlayers {
    #[serde(default)]
    player: Vec<XmlPlayer>,
}

#[derive(Debug, Deserialize)]
struct XmlPlayer {
    #[serde(rename = "@username")]
    username: Option<String>,
    #[serde(rename = "@userid")]
    userid: Option<String>,
    #[serde(rename = "@name")]
    name: Option<String>,
    #[serde(rename = "@startposition")]
    startposition: Option<String>,
    #[serde(rename = "@color")]
    color: Option<String>,
    #[serde(rename = "@score")]
    score: Option<String>,
    #[serde(rename = "@new")]
    new: Option<String>,
    #[serde(rename = "@rating")]
    rating: Option<String>,
    #[serde(rename = "@win")]
    win: Option<String>,
}

// ============================================================================
// Cleaning
// ============================================================================

fn raw_play(play: &XmlPlay) -> RawPlay {
    RawPlay {
        play_id: clean(&play.id),
        date: clean(&play.date).and_then(|d| NaiveDate::parse_from_str(&d, "%Y-%m-%d").ok()),
        quantity: number(&play.quantity),
        length_minutes: number(&play.length),
        incomplete: flag(&play.incomplete),
        no_win_stats: flag(&play.nowinstats),
        location: clean(&play.location),
        comment: clean(&play.comments),
        item: raw_item(&play.item),
        players: play
            .players
            .as_ref()
            .map(|ps| ps.player.iter().map(raw_player).collect())
            .unwrap_or_default(),
    }
}

fn raw_item(item: &XmlItem) -> RawItem {
    RawItem {
        item_id: clean(&item.objectid),
        name: clean(&item.name).unwrap_or_default(),
        kind: clean(&item.objecttype).unwrap_or_default(),
        subtype: item
            .subtypes
            .as_ref()
            .and_then(|s| s.subtype.first())
            .and_then(|s| clean(&s.value))
            .unwrap_or_default(),
    }
}

fn raw_player(player: &XmlPlayer) -> RawPlayer {
    RawPlayer {
        user_id: user_id(&player.userid),
        username: clean(&player.username),
        name: clean(&player.name),
        start_position: clean(&player.startposition),
        color: clean(&player.color),
        score: number(&player.score),
        rating: number(&player.rating),
        new: flag(&player.new),
        win: flag(&player.win),
    }
}

/// Empty-string attributes mean absent.
fn clean(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// User id `"0"` marks an anonymous player; treat it as absent.
fn user_id(value: &Option<String>) -> Option<String> {
    clean(value).filter(|v| v != "0")
}

fn flag(value: &Option<String>) -> Option<bool> {
    match clean(value)?.as_str() {
        "1" => Some(true),
        "0" => Some(false),
        _ => None,
    }
}

/// Lenient numeric parse; garbage in an optional field reads as absent.
fn number<T: std::str::FromStr>(value: &Option<String>) -> Option<T> {
    clean(value)?.parse().ok()
}
