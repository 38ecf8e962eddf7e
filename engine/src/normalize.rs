//! Normalization of raw plays into the relational entity sets.
//!
//! Pure and deterministic: the same raw input always produces the same
//! normalized output. Entity sets use ordered maps keyed by natural key
//! so iteration order never depends on hashing.
//!
//! A raw play missing its `PlayID`, `ItemID`, or date is skipped as a
//! whole and reported. A player sub-record missing its `UserID` drops
//! only that player-play; the play itself still normalizes.

use crate::error::{Error, Result};
use crate::{Domain, Item, ItemId, Play, PlayId, Player, PlayerPlay, RawPlay, UserId};
use std::collections::{BTreeMap, BTreeSet};

/// The normalized form of a single raw play.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayBundle {
    /// Stub for the item the play references
    pub item: Item,
    /// Stubs for every identified participant
    pub players: Vec<Player>,
    pub play: Play,
    pub player_plays: Vec<PlayerPlay>,
    /// Player sub-records dropped for a missing user id
    pub dropped_players: Vec<Error>,
}

/// The normalized form of a fetch window, with entity stubs deduplicated
/// across plays.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedBatch {
    /// Unique items, keyed by `ItemID`
    pub items: BTreeMap<ItemId, Item>,
    /// Unique players, keyed by `UserID`
    pub players: BTreeMap<UserId, Player>,
    /// Plays in input order, one per `PlayID`
    pub plays: Vec<Play>,
    /// Player-plays in input order, one per (`PlayID`, `UserID`)
    pub player_plays: Vec<PlayerPlay>,
    /// Per-record normalization failures, in input order
    pub skipped: Vec<Error>,
}

impl NormalizedBatch {
    /// Number of records (plays or player sub-records) skipped.
    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }

    /// Number of plays flagged as duplicate source emissions.
    pub fn duplicate_count(&self) -> usize {
        self.plays.iter().filter(|p| p.is_duplicate).count()
    }
}

/// Normalize one raw play into its entity bundle.
///
/// `user` and `domain` identify the sync unit the play was fetched for;
/// they are carried on the [`Play`] so the destination's high-water mark
/// stays derivable per unit.
pub fn normalize_play(user: &str, domain: Domain, raw: &RawPlay) -> Result<PlayBundle> {
    let play_id: PlayId = match &raw.play_id {
        Some(id) if !id.is_empty() => id.clone(),
        _ => return Err(Error::MissingPlayId),
    };
    let item_id: ItemId = match &raw.item.item_id {
        Some(id) if !id.is_empty() => id.clone(),
        _ => return Err(Error::MissingItemId(play_id)),
    };
    let date = raw.date.ok_or_else(|| Error::MissingDate(play_id.clone()))?;

    let item = Item {
        item_id: item_id.clone(),
        name: raw.item.name.clone(),
        kind: raw.item.kind.clone(),
        subtype: raw.item.subtype.clone(),
    };

    let play = Play {
        play_id: play_id.clone(),
        item_id,
        sync_user: user.to_string(),
        domain,
        date,
        quantity: raw.quantity,
        length_minutes: raw.length_minutes,
        location: raw.location.clone(),
        comment: raw.comment.clone(),
        is_duplicate: false,
    };

    let mut players = Vec::new();
    let mut player_plays = Vec::new();
    let mut dropped_players = Vec::new();

    for raw_player in &raw.players {
        let user_id: UserId = match &raw_player.user_id {
            Some(id) if !id.is_empty() => id.clone(),
            _ => {
                dropped_players.push(Error::MissingPlayerId {
                    play_id: play_id.clone(),
                    name: raw_player
                        .name
                        .clone()
                        .or_else(|| raw_player.username.clone())
                        .unwrap_or_else(|| "?".to_string()),
                });
                continue;
            }
        };

        players.push(Player {
            user_id: user_id.clone(),
            username: raw_player.username.clone(),
            name: raw_player.name.clone(),
        });
        player_plays.push(PlayerPlay {
            play_id: play_id.clone(),
            user_id,
            start_position: raw_player.start_position.clone(),
            color: raw_player.color.clone(),
            score: raw_player.score,
            rating: raw_player.rating,
            new: raw_player.new,
            win: raw_player.win,
        });
    }

    Ok(PlayBundle {
        item,
        players,
        play,
        player_plays,
        dropped_players,
    })
}

/// Normalize a whole fetch window.
///
/// Item and Player stubs are deduplicated by natural key (first occurrence
/// wins). Plays collapsing more than one raw record with the same `PlayID`
/// are kept once and flagged `is_duplicate` to surface the source-side
/// anomaly. Skipped records are counted, never fatal.
pub fn normalize_batch(user: &str, domain: Domain, raws: &[RawPlay]) -> NormalizedBatch {
    let mut batch = NormalizedBatch::default();
    let mut occurrences: BTreeMap<PlayId, usize> = BTreeMap::new();
    let mut bundles = Vec::new();

    for raw in raws {
        match normalize_play(user, domain, raw) {
            Ok(bundle) => {
                *occurrences.entry(bundle.play.play_id.clone()).or_insert(0) += 1;
                bundles.push(bundle);
            }
            Err(err) => batch.skipped.push(err),
        }
    }

    let mut seen_plays: BTreeSet<PlayId> = BTreeSet::new();
    let mut seen_player_plays: BTreeSet<(PlayId, UserId)> = BTreeSet::new();

    for bundle in bundles {
        batch.skipped.extend(bundle.dropped_players);
        batch
            .items
            .entry(bundle.item.item_id.clone())
            .or_insert(bundle.item);
        for player in bundle.players {
            batch
                .players
                .entry(player.user_id.clone())
                .or_insert(player);
        }

        // Repeated PlayIDs collapse to the first occurrence.
        if !seen_plays.insert(bundle.play.play_id.clone()) {
            continue;
        }
        let mut play = bundle.play;
        play.is_duplicate = occurrences.get(&play.play_id).copied().unwrap_or(0) > 1;
        batch.plays.push(play);

        for pp in bundle.player_plays {
            if seen_player_plays.insert((pp.play_id.clone(), pp.user_id.clone())) {
                batch.player_plays.push(pp);
            }
        }
    }

    batch
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raw::{RawItem, RawPlayer};
    use chrono::NaiveDate;

    fn raw_play(play_id: &str, item_id: &str, date: (i32, u32, u32)) -> RawPlay {
        RawPlay {
            play_id: Some(play_id.into()),
            date: NaiveDate::from_ymd_opt(date.0, date.1, date.2),
            quantity: Some(1),
            length_minutes: Some(60),
            incomplete: Some(false),
            no_win_stats: None,
            location: Some("Home".into()),
            comment: None,
            item: RawItem {
                item_id: Some(item_id.into()),
                name: "Gloomhaven".into(),
                kind: "thing".into(),
                subtype: "boardgame".into(),
            },
            players: vec![],
        }
    }

    #[test]
    fn normalize_single_play() {
        let mut raw = raw_play("1", "174430", (2026, 3, 14));
        raw.players.push(RawPlayer {
            username: Some("alice".into()),
            name: Some("Alice".into()),
            win: Some(true),
            ..RawPlayer::with_user_id("7")
        });

        let bundle = normalize_play("alice", Domain::BoardGame, &raw).unwrap();
        assert_eq!(bundle.play.play_id, "1");
        assert_eq!(bundle.play.item_id, "174430");
        assert_eq!(bundle.item.name, "Gloomhaven");
        assert_eq!(bundle.players.len(), 1);
        assert_eq!(bundle.player_plays.len(), 1);
        assert_eq!(bundle.player_plays[0].win, Some(true));
        assert!(bundle.dropped_players.is_empty());
        assert!(!bundle.play.is_duplicate);
    }

    #[test]
    fn missing_play_id_is_error() {
        let mut raw = raw_play("1", "174430", (2026, 3, 14));
        raw.play_id = None;
        assert_eq!(
            normalize_play("alice", Domain::BoardGame, &raw),
            Err(Error::MissingPlayId)
        );
    }

    #[test]
    fn missing_item_id_is_error() {
        let mut raw = raw_play("9", "174430", (2026, 3, 14));
        raw.item.item_id = None;
        assert_eq!(
            normalize_play("alice", Domain::BoardGame, &raw),
            Err(Error::MissingItemId("9".into()))
        );
    }

    #[test]
    fn missing_date_is_error() {
        let mut raw = raw_play("9", "174430", (2026, 3, 14));
        raw.date = None;
        assert_eq!(
            normalize_play("alice", Domain::BoardGame, &raw),
            Err(Error::MissingDate("9".into()))
        );
    }

    #[test]
    fn player_without_user_id_dropped_not_fatal() {
        let mut raw = raw_play("1", "174430", (2026, 3, 14));
        raw.players.push(RawPlayer {
            user_id: None,
            name: Some("Anonymous".into()),
            ..RawPlayer::with_user_id("ignored")
        });
        raw.players.push(RawPlayer::with_user_id("7"));

        let bundle = normalize_play("alice", Domain::BoardGame, &raw).unwrap();
        assert_eq!(bundle.player_plays.len(), 1);
        assert_eq!(bundle.dropped_players.len(), 1);
        assert_eq!(
            bundle.dropped_players[0],
            Error::MissingPlayerId {
                play_id: "1".into(),
                name: "Anonymous".into()
            }
        );
    }

    #[test]
    fn batch_dedups_items_and_players() {
        let mut a = raw_play("1", "174430", (2026, 3, 14));
        a.players.push(RawPlayer::with_user_id("7"));
        let mut b = raw_play("2", "174430", (2026, 3, 15));
        b.players.push(RawPlayer::with_user_id("7"));
        b.players.push(RawPlayer::with_user_id("8"));

        let batch = normalize_batch("alice", Domain::BoardGame, &[a, b]);
        assert_eq!(batch.items.len(), 1);
        assert_eq!(batch.players.len(), 2);
        assert_eq!(batch.plays.len(), 2);
        assert_eq!(batch.player_plays.len(), 3);
        assert_eq!(batch.skipped_count(), 0);
    }

    #[test]
    fn batch_flags_duplicate_play_ids() {
        let a = raw_play("123", "174430", (2026, 3, 14));
        let b = raw_play("123", "174430", (2026, 3, 14));

        let batch = normalize_batch("alice", Domain::BoardGame, &[a, b]);
        assert_eq!(batch.plays.len(), 1);
        assert!(batch.plays[0].is_duplicate);
        assert_eq!(batch.duplicate_count(), 1);
    }

    #[test]
    fn batch_skips_bad_records_and_continues() {
        let mut bad = raw_play("1", "174430", (2026, 3, 14));
        bad.item.item_id = None;
        let good = raw_play("2", "555", (2026, 3, 15));

        let batch = normalize_batch("alice", Domain::BoardGame, &[bad, good]);
        assert_eq!(batch.plays.len(), 1);
        assert_eq!(batch.plays[0].play_id, "2");
        assert_eq!(batch.skipped, vec![Error::MissingItemId("1".into())]);
    }

    #[test]
    fn batch_deterministic() {
        let mut a = raw_play("1", "174430", (2026, 3, 14));
        a.players.push(RawPlayer::with_user_id("7"));
        let b = raw_play("2", "555", (2026, 3, 15));

        let first = normalize_batch("alice", Domain::BoardGame, &[a.clone(), b.clone()]);
        let second = normalize_batch("alice", Domain::BoardGame, &[a, b]);
        assert_eq!(first, second);
    }
}
