// src/client.rs
//! Remote scraping API: the one external collaborator the dashboard polls.

use std::future::Future;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::types::{CollectionStats, ItemRecord, SessionRecord};

/// Default page size when walking the whole item collection.
pub const DEFAULT_ITEMS_PER_PAGE: usize = 100;
/// Page ceiling for a full-collection walk.
pub const DEFAULT_MAX_ITEM_PAGES: usize = 50;
/// Upper bound the API accepts for `per_page`.
pub const MAX_PER_PAGE: usize = 100;

const RETRY_DELAY: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ItemQuery {
    pub page: usize,
    pub per_page: usize,
    #[serde(rename = "scraper", skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(rename = "categoria", skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(rename = "artista", skip_serializing_if = "Option::is_none")]
    pub artist: Option<String>,
}

impl ItemQuery {
    pub fn page(page: usize, per_page: usize) -> Self {
        Self {
            page,
            per_page,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionQuery {
    pub page: usize,
    pub per_page: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(rename = "scraper", skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl SessionQuery {
    pub fn latest(per_page: usize) -> Self {
        Self {
            page: 1,
            per_page,
            ..Self::default()
        }
    }
}

#[async_trait]
pub trait CollectionSource: Send + Sync {
    async fn fetch_stats(&self) -> Result<CollectionStats>;
    async fn fetch_items(&self, query: &ItemQuery) -> Result<Vec<ItemRecord>>;
    async fn fetch_sessions(&self, query: &SessionQuery) -> Result<Vec<SessionRecord>>;
    fn name(&self) -> &str;
}

// The items endpoint answers either a bare array or `{ "obras": [...] }`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ItemsPayload {
    Bare(Vec<ItemRecord>),
    Wrapped { obras: Vec<ItemRecord> },
}

impl ItemsPayload {
    fn into_items(self) -> Vec<ItemRecord> {
        match self {
            Self::Bare(v) | Self::Wrapped { obras: v } => v,
        }
    }
}

/// reqwest-backed client for the `/api/v1` scraping API.
#[derive(Clone)]
pub struct HttpCollectionSource {
    base_url: String,
    client: Client,
}

impl HttpCollectionSource {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("build http client")?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

#[async_trait]
impl CollectionSource for HttpCollectionSource {
    async fn fetch_stats(&self) -> Result<CollectionStats> {
        self.client
            .get(self.url("stats"))
            .send()
            .await
            .context("fetch /stats")?
            .error_for_status()
            .context("/stats non-2xx")?
            .json()
            .await
            .context("parse /stats JSON")
    }

    async fn fetch_items(&self, query: &ItemQuery) -> Result<Vec<ItemRecord>> {
        let payload: ItemsPayload = self
            .client
            .get(self.url("obras"))
            .query(query)
            .send()
            .await
            .context("fetch /obras")?
            .error_for_status()
            .context("/obras non-2xx")?
            .json()
            .await
            .context("parse /obras JSON")?;
        Ok(payload.into_items())
    }

    async fn fetch_sessions(&self, query: &SessionQuery) -> Result<Vec<SessionRecord>> {
        self.client
            .get(self.url("sessions"))
            .query(query)
            .send()
            .await
            .context("fetch /sessions")?
            .error_for_status()
            .context("/sessions non-2xx")?
            .json()
            .await
            .context("parse /sessions JSON")
    }

    fn name(&self) -> &str {
        &self.base_url
    }
}

/// Walk the item collection until a short page or the page ceiling.
///
/// Fails as a whole when any page fails, so callers never aggregate a
/// truncated collection.
pub async fn fetch_all_items(
    source: &dyn CollectionSource,
    per_page: usize,
    max_pages: usize,
) -> Result<Vec<ItemRecord>> {
    let per_page = per_page.clamp(1, MAX_PER_PAGE);
    let mut all = Vec::new();
    for page in 1..=max_pages.max(1) {
        let batch = source
            .fetch_items(&ItemQuery::page(page, per_page))
            .await
            .with_context(|| format!("items page {page}"))?;
        let short = batch.len() < per_page;
        all.extend(batch);
        if short {
            return Ok(all);
        }
    }
    tracing::debug!(target: "client", pages = max_pages, items = all.len(), "page ceiling reached");
    Ok(all)
}

/// Run `op`, reattempting up to `retries` more times after a short pause.
pub async fn with_retry<T, F, Fut>(label: &str, retries: u8, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt: u16 = 0;
    loop {
        attempt += 1;
        match op().await {
            Ok(v) => return Ok(v),
            Err(e) if attempt <= u16::from(retries) => {
                tracing::debug!(target: "client", attempt, "{label} failed, retrying: {e:#}");
                tokio::time::sleep(RETRY_DELAY).await;
            }
            Err(e) => return Err(e),
        }
    }
}
