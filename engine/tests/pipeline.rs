//! Pipeline tests for playlog-engine
//!
//! These exercise the pure pieces end to end: window computation, the
//! overlap scan, normalization, and merge planning working together the
//! way the orchestrator drives them.

use chrono::NaiveDate;
use playlog_engine::{
    changed_fields, fetch_window, normalize_batch, Domain, FieldMap, OverlapScan, RawItem, RawPlay,
    RawPlayer,
};
use proptest::prelude::*;
use serde_json::{json, Value};

fn raw_play(play_id: &str, item_id: &str, date: NaiveDate) -> RawPlay {
    RawPlay {
        play_id: Some(play_id.into()),
        date: Some(date),
        quantity: Some(1),
        length_minutes: Some(45),
        incomplete: Some(false),
        no_win_stats: None,
        location: Some("Home".into()),
        comment: None,
        item: RawItem {
            item_id: Some(item_id.into()),
            name: format!("Item {item_id}"),
            kind: "thing".into(),
            subtype: "boardgame".into(),
        },
        players: vec![RawPlayer::with_user_id("7")],
    }
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

// ============================================================================
// Window + scan interplay
// ============================================================================

#[test]
fn incremental_run_fetches_only_new_plays() {
    // Destination already holds plays 1..=3, newest dated March 14.
    let window = fetch_window(Some(date(2026, 3, 14)), 1);
    assert_eq!(window.min_date, Some(date(2026, 3, 13)));

    // Source returns newest first; page two overlaps stored history.
    let mut scan = OverlapScan::new((1..=3).map(|n| n.to_string()), 2);
    let page1 = scan.absorb_page(vec![
        raw_play("5", "10", date(2026, 3, 16)),
        raw_play("4", "10", date(2026, 3, 15)),
    ]);
    assert!(!scan.finished());

    let page2 = scan.absorb_page(vec![
        raw_play("3", "10", date(2026, 3, 14)),
        raw_play("2", "11", date(2026, 3, 13)),
    ]);
    assert!(scan.finished());

    let mut fresh = page1.fresh;
    fresh.extend(page2.fresh);
    let ids: Vec<_> = fresh.iter().filter_map(|p| p.play_id.clone()).collect();
    assert_eq!(ids, vec!["5", "4"]);
}

#[test]
fn first_sync_walks_full_history() {
    let window = fetch_window(None, 1);
    assert!(window.is_unbounded());

    let mut scan = OverlapScan::new([], 2);
    scan.absorb_page(vec![
        raw_play("2", "10", date(2026, 1, 2)),
        raw_play("1", "10", date(2026, 1, 1)),
    ]);
    assert!(!scan.finished());

    // History ends with a short page.
    let tail = scan.absorb_page(vec![raw_play("0", "10", date(2025, 12, 30))]);
    assert!(tail.last_page);
    assert!(scan.finished());
}

// ============================================================================
// Duplicate emissions
// ============================================================================

#[test]
fn duplicate_emission_collapses_to_one_flagged_play() {
    let twice = vec![
        raw_play("123", "10", date(2026, 3, 14)),
        raw_play("123", "10", date(2026, 3, 14)),
    ];
    let batch = normalize_batch("alice", Domain::BoardGame, &twice);

    assert_eq!(batch.plays.len(), 1);
    assert_eq!(batch.plays[0].play_id, "123");
    assert!(batch.plays[0].is_duplicate);
    // The collapsed play keeps a single set of player-plays.
    assert_eq!(batch.player_plays.len(), 1);
}

// ============================================================================
// Skip behavior
// ============================================================================

#[test]
fn bad_record_does_not_block_the_window() {
    let mut missing_item = raw_play("1", "10", date(2026, 3, 14));
    missing_item.item.item_id = None;

    let raws = vec![
        missing_item,
        raw_play("2", "10", date(2026, 3, 15)),
        raw_play("3", "11", date(2026, 3, 16)),
    ];
    let batch = normalize_batch("alice", Domain::BoardGame, &raws);

    assert_eq!(batch.plays.len(), 2);
    assert_eq!(batch.skipped_count(), 1);
}

// ============================================================================
// Merge convergence
// ============================================================================

fn play_fields(name: &str, quantity: u32) -> FieldMap {
    match json!({"Name": name, "Quantity": quantity, "Location": "Home"}) {
        Value::Object(map) => map,
        _ => unreachable!(),
    }
}

#[test]
fn second_application_is_a_no_op() {
    let desired = play_fields("Gloomhaven", 2);

    // First application: row absent, everything is an insert.
    let stored = FieldMap::new();
    let first = changed_fields(&stored, &desired);
    assert_eq!(first.len(), 3);

    // Apply, then diff again: nothing left to write.
    let mut stored = stored;
    stored.extend(first);
    assert!(changed_fields(&stored, &desired).is_empty());
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #[test]
    fn prop_normalization_deterministic(
        ids in proptest::collection::vec("[0-9]{1,6}", 1..20),
    ) {
        let raws: Vec<_> = ids
            .iter()
            .map(|id| raw_play(id, "10", date(2026, 3, 14)))
            .collect();

        let first = normalize_batch("alice", Domain::BoardGame, &raws);
        let second = normalize_batch("alice", Domain::BoardGame, &raws);
        prop_assert_eq!(first, second);
    }

    #[test]
    fn prop_one_play_per_id(
        ids in proptest::collection::vec("[0-9]{1,3}", 1..30),
    ) {
        let raws: Vec<_> = ids
            .iter()
            .map(|id| raw_play(id, "10", date(2026, 3, 14)))
            .collect();

        let batch = normalize_batch("alice", Domain::BoardGame, &raws);
        let mut seen = std::collections::BTreeSet::new();
        for play in &batch.plays {
            prop_assert!(seen.insert(play.play_id.clone()), "duplicate row for {}", play.play_id);
        }
    }

    #[test]
    fn prop_scan_never_drops_unknown_plays(
        known in proptest::collection::btree_set("[0-9]{1,3}", 0..20),
        page in proptest::collection::vec("[0-9]{1,3}", 0..20),
    ) {
        let mut scan = OverlapScan::new(known.iter().cloned(), 100);
        let raws: Vec<_> = page
            .iter()
            .map(|id| raw_play(id, "10", date(2026, 3, 14)))
            .collect();

        let result = scan.absorb_page(raws);
        for id in &page {
            let kept = result.fresh.iter().any(|p| p.play_id.as_deref() == Some(id));
            prop_assert_eq!(kept, !known.contains(id));
        }
    }

    #[test]
    fn prop_window_never_excludes_new_plays(
        mark_offset in 0i64..3000,
        margin in 0u32..30,
    ) {
        let mark = date(2020, 1, 1) + chrono::Duration::days(mark_offset);
        let window = fetch_window(Some(mark), margin);
        let min = window.min_date.unwrap();

        // Anything newer than the mark is always inside the window.
        prop_assert!(min <= mark);
        // The margin is exact: the window starts margin days early.
        prop_assert_eq!(mark - min, chrono::Duration::days(i64::from(margin)));
    }
}
