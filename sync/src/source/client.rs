//! HTTP client for the source play-tracking service.

use crate::config::SourceConfig;
use crate::error::{Result, SyncError};
use async_trait::async_trait;
use chrono::NaiveDate;
use playlog_engine::Domain;
use reqwest::StatusCode;
use std::time::Duration;

use super::xml::{parse_plays_page, PlayPage};

/// Anything that serves paginated play history, newest first.
///
/// The orchestrator only talks to this trait; tests swap in scripted
/// implementations.
#[async_trait]
pub trait PlaySource: Send + Sync {
    /// Fetch one page of plays for a sync unit.
    ///
    /// `page` is one-based. `min_date` bounds the query when the run is
    /// incremental.
    async fn fetch_page(
        &self,
        user: &str,
        domain: Domain,
        page: u32,
        min_date: Option<NaiveDate>,
    ) -> Result<PlayPage>;

    /// The service's fixed page length.
    fn page_size(&self) -> usize;
}

/// [`PlaySource`] backed by the real XML API.
pub struct HttpPlaySource {
    client: reqwest::Client,
    base_url: String,
    token: String,
    page_size: usize,
}

impl HttpPlaySource {
    pub fn new(config: &SourceConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|err| SyncError::SourceUnavailable(err.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
            page_size: config.page_size,
        })
    }
}

#[async_trait]
impl PlaySource for HttpPlaySource {
    async fn fetch_page(
        &self,
        user: &str,
        domain: Domain,
        page: u32,
        min_date: Option<NaiveDate>,
    ) -> Result<PlayPage> {
        let url = format!("{}/plays", self.base_url);
        let page_param = page.to_string();
        let mut params = vec![
            ("username", user.to_string()),
            ("subtype", domain.source_subtype().to_string()),
            ("page", page_param),
        ];
        if let Some(min) = min_date {
            params.push(("mindate", min.format("%Y-%m-%d").to_string()));
        }

        let response = self
            .client
            .get(&url)
            .query(&params)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|err| SyncError::SourceUnavailable(err.to_string()))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(SyncError::SourceRateLimited {
                retry_after: retry_after_secs(&response),
            });
        }
        if status.is_server_error() {
            return Err(SyncError::SourceUnavailable(format!(
                "{url} returned {status}"
            )));
        }
        if !status.is_success() {
            return Err(SyncError::SourceMalformed(format!(
                "{url} returned {status}"
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|err| SyncError::SourceUnavailable(err.to_string()))?;
        parse_plays_page(&body)
    }

    fn page_size(&self) -> usize {
        self.page_size
    }
}

/// Parse a Retry-After header carrying whole seconds.
pub(crate) fn retry_after_secs(response: &reqwest::Response) -> Option<u64> {
    response
        .headers()
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}
