//! Table store client and the idempotent upsert built on top of it.

use crate::config::DestConfig;
use crate::error::{Result, SyncError};
use async_trait::async_trait;
use playlog_engine::{changed_fields, FieldMap, RowId, Table};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

use super::records::StoredRecord;

/// Query options for [`TableStore::list`].
#[derive(Debug, Clone, Default)]
pub struct ListOptions {
    /// Exact-match column filter
    pub filter: Option<FieldMap>,
    /// Sort spec, e.g. `-Date` for newest first
    pub sort: Option<String>,
    pub limit: Option<usize>,
}

impl ListOptions {
    pub fn filtered(filter: FieldMap) -> Self {
        Self {
            filter: Some(filter),
            ..Self::default()
        }
    }
}

/// A document of records tables keyed by row id.
///
/// The orchestrator and the upsert layer only talk to this trait; tests
/// swap in an in-memory implementation.
#[async_trait]
pub trait TableStore: Send + Sync {
    async fn list(&self, table: Table, opts: ListOptions) -> Result<Vec<StoredRecord>>;

    async fn create(&self, table: Table, fields: FieldMap) -> Result<RowId>;

    async fn update(&self, table: Table, row: RowId, fields: FieldMap) -> Result<()>;
}

/// What an upsert did to the destination row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created(RowId),
    Updated(RowId),
    Unchanged(RowId),
}

impl UpsertOutcome {
    pub fn row(&self) -> RowId {
        match self {
            UpsertOutcome::Created(row)
            | UpsertOutcome::Updated(row)
            | UpsertOutcome::Unchanged(row) => *row,
        }
    }
}

/// Idempotent field-merge upsert.
///
/// Looks up the rows matching `key`, hands them to `make_desired` (so the
/// caller can finalize fields that depend on what is stored), and writes
/// only the changed subset. When several rows match the key, the oldest
/// (lowest row id) is the one maintained; duplicates are never created
/// here. Running the same upsert twice writes nothing the second time.
pub async fn upsert_with<F>(
    store: &dyn TableStore,
    table: Table,
    key: FieldMap,
    make_desired: F,
) -> Result<UpsertOutcome>
where
    F: FnOnce(&[StoredRecord]) -> FieldMap,
{
    let mut matches = store.list(table, ListOptions::filtered(key)).await?;
    matches.sort_by_key(|record| record.id);

    let desired = make_desired(&matches);
    match matches.first() {
        None => {
            let row = store.create(table, desired).await?;
            Ok(UpsertOutcome::Created(row))
        }
        Some(existing) => {
            let delta = changed_fields(&existing.fields, &desired);
            if delta.is_empty() {
                Ok(UpsertOutcome::Unchanged(existing.id))
            } else {
                store.update(table, existing.id, delta).await?;
                Ok(UpsertOutcome::Updated(existing.id))
            }
        }
    }
}

/// [`TableStore`] backed by the destination's records HTTP API.
pub struct HttpTableStore {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    doc_id: String,
}

impl HttpTableStore {
    pub fn new(config: &DestConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|err| SyncError::DestinationUnavailable(err.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            doc_id: config.doc_id.clone(),
        })
    }

    fn records_url(&self, table: Table) -> String {
        format!(
            "{}/api/docs/{}/tables/{}/records",
            self.base_url,
            self.doc_id,
            table.name()
        )
    }

    /// Map a non-success response to the error taxonomy.
    async fn fail(&self, response: reqwest::Response) -> SyncError {
        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = crate::source::retry_after_secs(&response);
            return SyncError::RateLimited { retry_after };
        }
        let body = response.text().await.unwrap_or_default();
        if status.is_server_error() {
            SyncError::DestinationUnavailable(format!("{status}: {body}"))
        } else {
            SyncError::WriteRejected(format!("{status}: {body}"))
        }
    }
}

#[derive(Debug, Deserialize)]
struct RecordsResponse {
    records: Vec<RecordBody>,
}

#[derive(Debug, Deserialize)]
struct RecordBody {
    id: RowId,
    #[serde(default)]
    fields: FieldMap,
}

/// The API's filter parameter: each column maps to a list of accepted values.
fn encode_filter(filter: &FieldMap) -> String {
    let wrapped: FieldMap = filter
        .iter()
        .map(|(col, value)| (col.clone(), Value::Array(vec![value.clone()])))
        .collect();
    Value::Object(wrapped).to_string()
}

#[async_trait]
impl TableStore for HttpTableStore {
    async fn list(&self, table: Table, opts: ListOptions) -> Result<Vec<StoredRecord>> {
        let mut params: Vec<(&str, String)> = Vec::new();
        if let Some(filter) = &opts.filter {
            params.push(("filter", encode_filter(filter)));
        }
        if let Some(sort) = &opts.sort {
            params.push(("sort", sort.clone()));
        }
        if let Some(limit) = opts.limit {
            params.push(("limit", limit.to_string()));
        }

        let response = self
            .client
            .get(self.records_url(table))
            .query(&params)
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|err| SyncError::DestinationUnavailable(err.to_string()))?;

        if !response.status().is_success() {
            return Err(self.fail(response).await);
        }

        let body: RecordsResponse = response
            .json()
            .await
            .map_err(|err| SyncError::DestinationUnavailable(err.to_string()))?;
        Ok(body
            .records
            .into_iter()
            .map(|r| StoredRecord::new(r.id, r.fields))
            .collect())
    }

    async fn create(&self, table: Table, fields: FieldMap) -> Result<RowId> {
        let response = self
            .client
            .post(self.records_url(table))
            .bearer_auth(&self.api_key)
            .json(&json!({ "records": [{ "fields": fields }] }))
            .send()
            .await
            .map_err(|err| SyncError::DestinationUnavailable(err.to_string()))?;

        if !response.status().is_success() {
            return Err(self.fail(response).await);
        }

        let body: RecordsResponse = response
            .json()
            .await
            .map_err(|err| SyncError::DestinationUnavailable(err.to_string()))?;
        body.records
            .first()
            .map(|r| r.id)
            .ok_or_else(|| SyncError::DestinationUnavailable("create returned no record".into()))
    }

    async fn update(&self, table: Table, row: RowId, fields: FieldMap) -> Result<()> {
        let response = self
            .client
            .patch(self.records_url(table))
            .bearer_auth(&self.api_key)
            .json(&json!({ "records": [{ "id": row, "fields": fields }] }))
            .send()
            .await
            .map_err(|err| SyncError::DestinationUnavailable(err.to_string()))?;

        if !response.status().is_success() {
            return Err(self.fail(response).await);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_wraps_values_in_lists() {
        let mut filter = FieldMap::new();
        filter.insert("PlayID".into(), json!("90001"));
        assert_eq!(encode_filter(&filter), r#"{"PlayID":["90001"]}"#);
    }

    #[test]
    fn outcome_row_accessor() {
        assert_eq!(UpsertOutcome::Created(3).row(), 3);
        assert_eq!(UpsertOutcome::Updated(4).row(), 4);
        assert_eq!(UpsertOutcome::Unchanged(5).row(), 5);
    }
}
