//! Per-unit sync orchestration.
//!
//! Each (user, domain) unit runs the same pipeline: derive the fetch
//! window from what the destination already holds, page newest-first
//! until the overlap scan says stop, normalize, then upsert in
//! referential order (items and players, plays, player-plays). Units are
//! isolated; one failing leaves the others untouched and only flips the
//! process exit status at the end.
//!
//! There is no separate checkpoint: the high-water mark is re-derived
//! from stored plays on every run, so a crash mid-write costs nothing
//! but a re-fetch of the same window, which the idempotent upsert
//! absorbs.

use crate::config::{Config, SyncUnit};
use crate::dest::{
    date_field, item_fields, item_key, play_fields, play_key, player_fields, player_key,
    player_play_fields, player_play_key, str_field, upsert_with, ListOptions, TableStore,
    UpsertOutcome,
};
use crate::error::{Result, SyncError};
use crate::retry::with_retry;
use crate::source::PlaySource;
use dashmap::DashMap;
use playlog_engine::{
    fetch_window, normalize_batch, FetchWindow, ItemId, NormalizedBatch, OverlapScan, PlayId,
    RawPlay, RowId, RunReport, Table, UnitCounts, UnitPhase, UnitSummary, UserId,
};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};

pub struct Orchestrator {
    source: Arc<dyn PlaySource>,
    store: Arc<dyn TableStore>,
    config: Arc<Config>,
    /// Ignore the high-water mark and walk full history
    full_refetch: bool,
    /// Serializes upserts per player across concurrent units
    player_locks: DashMap<UserId, Arc<tokio::sync::Mutex<()>>>,
    cancelled: Arc<AtomicBool>,
}

impl Orchestrator {
    pub fn new(
        source: Arc<dyn PlaySource>,
        store: Arc<dyn TableStore>,
        config: Arc<Config>,
        full_refetch: bool,
        cancelled: Arc<AtomicBool>,
    ) -> Self {
        Self {
            source,
            store,
            config,
            full_refetch,
            player_locks: DashMap::new(),
            cancelled,
        }
    }

    /// Run every configured unit and report the aggregate outcome.
    pub async fn run(&self) -> RunReport {
        let mut units: Vec<UnitSummary> = stream::iter(self.config.units.clone())
            .map(|unit| self.sync_unit(unit))
            .buffer_unordered(self.config.max_concurrent_units.max(1))
            .collect()
            .await;

        // Concurrency scrambles completion order; report in a stable one.
        units.sort_by(|a, b| {
            (a.user.as_str(), a.domain.as_str()).cmp(&(b.user.as_str(), b.domain.as_str()))
        });
        RunReport { units }
    }

    async fn sync_unit(&self, unit: SyncUnit) -> UnitSummary {
        let mut summary = UnitSummary::new(&unit.user, unit.domain);
        match self.run_unit(&unit, &mut summary).await {
            Ok(()) => {
                summary.phase = UnitPhase::Committed;
                tracing::info!(
                    user = %unit.user,
                    domain = %unit.domain,
                    fetched = summary.counts.fetched,
                    created = summary.counts.created,
                    updated = summary.counts.updated,
                    unchanged = summary.counts.unchanged,
                    skipped = summary.counts.skipped,
                    rejected = summary.counts.rejected,
                    "unit committed"
                );
            }
            Err(err) => {
                tracing::error!(user = %unit.user, domain = %unit.domain, error = %err, "unit failed");
                summary.fail(err);
            }
        }
        summary
    }

    async fn run_unit(&self, unit: &SyncUnit, summary: &mut UnitSummary) -> Result<()> {
        let (window, known) = self.derive_window(unit).await?;
        summary.phase = UnitPhase::WindowComputed;
        tracing::debug!(
            user = %unit.user,
            domain = %unit.domain,
            min_date = ?window.min_date,
            known = known.len(),
            "fetch window computed"
        );

        summary.phase = UnitPhase::Fetching;
        let fresh = self.fetch_history(unit, window, known, &mut summary.counts).await?;

        summary.phase = UnitPhase::Normalizing;
        let batch = normalize_batch(&unit.user, unit.domain, &fresh);
        summary.counts.skipped += batch.skipped_count() as u64;
        summary.counts.duplicates += batch.duplicate_count() as u64;
        for err in &batch.skipped {
            tracing::warn!(user = %unit.user, domain = %unit.domain, error = %err, "record skipped");
        }

        summary.phase = UnitPhase::Writing;
        self.write_batch(&batch, &mut summary.counts).await?;
        Ok(())
    }

    /// Derive the fetch window and the overlap seed from stored plays.
    ///
    /// A destination that cannot be read fails the unit; falling back to
    /// full history here would silently re-walk everything.
    async fn derive_window(&self, unit: &SyncUnit) -> Result<(FetchWindow, Vec<PlayId>)> {
        if self.full_refetch {
            tracing::warn!(user = %unit.user, domain = %unit.domain, "full refetch requested, walking full history");
            return Ok((FetchWindow::unbounded(), Vec::new()));
        }

        let recent = with_retry(&self.config.retry, "recent-plays", || {
            let filter = match json!({
                "SyncUser": unit.user,
                "Domain": unit.domain.as_str(),
            }) {
                serde_json::Value::Object(map) => map,
                _ => unreachable!(),
            };
            let opts = ListOptions {
                filter: Some(filter),
                sort: Some("-Date".into()),
                limit: Some(self.config.overlap_scan_limit),
            };
            async move { self.store.list(Table::Plays, opts).await }
        })
        .await?;

        let high_water = recent.iter().filter_map(|r| date_field(r, "Date")).max();
        let known = recent
            .iter()
            .filter_map(|r| str_field(r, "PlayID").map(str::to_string))
            .collect();

        Ok((fetch_window(high_water, self.config.overlap_margin_days), known))
    }

    /// Page newest-first until the overlap scan says stop.
    async fn fetch_history(
        &self,
        unit: &SyncUnit,
        window: FetchWindow,
        known: Vec<PlayId>,
        counts: &mut UnitCounts,
    ) -> Result<Vec<RawPlay>> {
        // A zero page length cannot bound pagination; clamp it so a
        // misbehaving source implementation cannot divide by zero below.
        let page_size = self.source.page_size().max(1);
        let mut scan = OverlapScan::new(known, page_size);
        let mut fresh = Vec::new();
        let mut page = 1u32;
        let mut last_known_page = u32::MAX;

        while !scan.finished() && page <= last_known_page {
            self.check_cancelled()?;
            let response = with_retry(&self.config.retry, "fetch-page", || {
                self.source
                    .fetch_page(&unit.user, unit.domain, page, window.min_date)
            })
            .await?;

            // The reported total bounds pagination even if the service
            // keeps serving full pages past the end.
            last_known_page = (response.total.max(1)).div_ceil(page_size as u32);
            counts.fetched += response.plays.len() as u64;

            let result = scan.absorb_page(response.plays);
            tracing::debug!(
                user = %unit.user,
                domain = %unit.domain,
                page,
                fresh = result.fresh.len(),
                overlap = result.overlap,
                last_page = result.last_page,
                "page absorbed"
            );
            fresh.extend(result.fresh);
            page += 1;

            if !scan.finished() && page <= last_known_page {
                tokio::time::sleep(Duration::from_millis(self.config.source.page_delay_ms)).await;
            }
        }

        Ok(fresh)
    }

    /// Upsert the batch in referential order.
    ///
    /// A rejected record is counted and its dependents skipped; the rest
    /// of the batch still lands.
    async fn write_batch(&self, batch: &NormalizedBatch, counts: &mut UnitCounts) -> Result<()> {
        let mut item_rows: BTreeMap<ItemId, RowId> = BTreeMap::new();
        for item in batch.items.values() {
            self.check_cancelled()?;
            match self
                .upsert(Table::Items, item_key(item), item_fields(item))
                .await
            {
                Ok(outcome) => {
                    tally(counts, outcome);
                    item_rows.insert(item.item_id.clone(), outcome.row());
                }
                Err(err) => reject(counts, Table::Items, err)?,
            }
        }

        let mut player_rows: BTreeMap<UserId, RowId> = BTreeMap::new();
        for player in batch.players.values() {
            self.check_cancelled()?;
            let lock = self.player_lock(&player.user_id);
            let _guard = lock.lock().await;
            match self
                .upsert(Table::Players, player_key(player), player_fields(player))
                .await
            {
                Ok(outcome) => {
                    tally(counts, outcome);
                    player_rows.insert(player.user_id.clone(), outcome.row());
                }
                Err(err) => reject(counts, Table::Players, err)?,
            }
        }

        let mut play_rows: BTreeMap<PlayId, RowId> = BTreeMap::new();
        for play in &batch.plays {
            self.check_cancelled()?;
            let Some(&item_row) = item_rows.get(&play.item_id) else {
                // Item rejected upstream; this play cannot link anywhere.
                counts.rejected += 1;
                continue;
            };

            let result = with_retry(&self.config.retry, "upsert-play", || {
                let key = play_key(play);
                async move {
                    upsert_with(self.store.as_ref(), Table::Plays, key, |matches| {
                        let mut fields = play_fields(play, item_row);
                        // More than one stored row for this PlayID means
                        // duplicate emissions already reached the store.
                        if play.is_duplicate || matches.len() > 1 {
                            fields.insert("IsDuplicate".into(), json!(true));
                        }
                        fields
                    })
                    .await
                }
            })
            .await;

            match result {
                Ok(outcome) => {
                    tally(counts, outcome);
                    play_rows.insert(play.play_id.clone(), outcome.row());
                }
                Err(err) => reject(counts, Table::Plays, err)?,
            }
        }

        for pp in &batch.player_plays {
            self.check_cancelled()?;
            let (Some(&play_row), Some(&player_row)) =
                (play_rows.get(&pp.play_id), player_rows.get(&pp.user_id))
            else {
                counts.rejected += 1;
                continue;
            };

            match self
                .upsert(
                    Table::PlayerPlays,
                    player_play_key(play_row, player_row),
                    player_play_fields(pp, play_row, player_row),
                )
                .await
            {
                Ok(outcome) => tally(counts, outcome),
                Err(err) => reject(counts, Table::PlayerPlays, err)?,
            }
        }

        Ok(())
    }

    async fn upsert(
        &self,
        table: Table,
        key: playlog_engine::FieldMap,
        desired: playlog_engine::FieldMap,
    ) -> Result<UpsertOutcome> {
        with_retry(&self.config.retry, table.name(), || {
            let key = key.clone();
            let desired = desired.clone();
            async move {
                upsert_with(self.store.as_ref(), table, key, move |_| desired).await
            }
        })
        .await
    }

    fn player_lock(&self, user_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.player_locks
            .entry(user_id.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    fn check_cancelled(&self) -> Result<()> {
        if self.cancelled.load(Ordering::Relaxed) {
            Err(SyncError::Cancelled)
        } else {
            Ok(())
        }
    }
}

fn tally(counts: &mut UnitCounts, outcome: UpsertOutcome) {
    match outcome {
        UpsertOutcome::Created(_) => counts.created += 1,
        UpsertOutcome::Updated(_) => counts.updated += 1,
        UpsertOutcome::Unchanged(_) => counts.unchanged += 1,
    }
}

/// Count a per-record rejection; anything else still fails the unit.
fn reject(counts: &mut UnitCounts, table: Table, err: SyncError) -> Result<()> {
    match err {
        SyncError::WriteRejected(detail) => {
            tracing::warn!(table = table.name(), detail = %detail, "record rejected");
            counts.rejected += 1;
            Ok(())
        }
        other => Err(other),
    }
}
