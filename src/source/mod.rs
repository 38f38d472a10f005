//! Paginated list fetching.
//!
//! A view asks its list endpoint for page 1 and shows it straight away; the
//! remaining pages are then requested one after the other, with a pause between
//! requests, and merged into the accumulated list until the server reports no
//! `next` page.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info, warn};
use reqwest::Client;
use thiserror::Error;

use crate::core::list_merge::{PagedList, SourceResponse};
use crate::core::record::DEFAULT_ID_FIELD;

/// Errors that can occur while fetching list pages
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("API request failed: {0}")]
    RequestError(#[from] reqwest::Error),
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Anything that can answer a list URL with one page
#[async_trait]
pub trait PageSource {
    async fn fetch(&self, url: &str) -> Result<SourceResponse, SourceError>;
}

/// List endpoint reached over HTTP
pub struct HttpPageSource {
    /// HTTP client
    client: Client,
    /// Bearer token, if the API requires one
    api_token: Option<String>,
}

impl HttpPageSource {
    pub fn new(api_token: Option<String>) -> Self {
        Self {
            client: Client::new(),
            api_token,
        }
    }
}

#[async_trait]
impl PageSource for HttpPageSource {
    async fn fetch(&self, url: &str) -> Result<SourceResponse, SourceError> {
        let mut request = self.client.get(url).header("Accept", "application/json");
        if let Some(token) = &self.api_token {
            request = request.header("Authorization", format!("Bearer {}", token));
        }

        let response = request.send().await?.error_for_status()?;
        let body: serde_json::Value = response.json().await?;
        serde_json::from_value(body)
            .map_err(|e| SourceError::InvalidResponse(format!("{}: {}", url, e)))
    }
}

/// Backfill tuning
#[derive(Debug, Clone)]
pub struct BackfillOptions {
    /// Pause before each request after the first
    pub delay: Duration,
    /// Stop after this many pages
    pub max_pages: Option<usize>,
    /// Field identifying a record
    pub id_field: String,
}

impl Default for BackfillOptions {
    fn default() -> Self {
        Self {
            delay: Duration::from_millis(500),
            max_pages: None,
            id_field: DEFAULT_ID_FIELD.to_string(),
        }
    }
}

/// Join an API base URL and an endpoint path
pub fn endpoint_url(base_url: &str, endpoint: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        endpoint.trim_start_matches('/')
    )
}

/// Fetch every page reachable from `first_url`.
pub async fn backfill<S>(source: &S, first_url: &str, options: &BackfillOptions) -> Result<PagedList, SourceError>
where
    S: PageSource + ?Sized,
{
    backfill_with(source, first_url, options, |_| {}).await
}

/// Like [`backfill`], calling `on_page` with the accumulated list after every
/// merged page.
///
/// A failure on the first page is returned. A failure on a later page ends the
/// backfill with whatever was accumulated so far.
pub async fn backfill_with<S, F>(
    source: &S,
    first_url: &str,
    options: &BackfillOptions,
    mut on_page: F,
) -> Result<PagedList, SourceError>
where
    S: PageSource + ?Sized,
    F: FnMut(&PagedList),
{
    let first = source.fetch(first_url).await?;
    let mut list = PagedList::default().absorb_with(first, &options.id_field);
    on_page(&list);

    let mut pages = 1usize;
    let mut visited: HashSet<String> = HashSet::new();
    visited.insert(first_url.to_string());
    while let Some(next) = list.next.clone() {
        if options.max_pages.map_or(false, |max| pages >= max) {
            info!("Stopping backfill of {} after {} pages", first_url, pages);
            break;
        }
        if !visited.insert(next.clone()) {
            warn!("Backfill of {} looped back to already fetched page {}", first_url, next);
            break;
        }

        tokio::time::sleep(options.delay).await;
        match source.fetch(&next).await {
            Ok(response) => {
                list = list.absorb_with(response, &options.id_field);
                pages += 1;
                debug!("Merged page {} from {}: {} records", pages, next, list.records.len());
                on_page(&list);
            }
            Err(e) => {
                warn!("Backfill of {} stopped at {}: {}", first_url, next, e);
                break;
            }
        }
    }

    info!(
        "Backfilled {} records ({} reported) from {} in {} pages",
        list.records.len(),
        list.count,
        first_url,
        pages
    );
    Ok(list)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::list_merge::{Page, PageMeta};
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Serves canned pages by URL and records the requested URLs
    struct FakeSource {
        pages: HashMap<String, SourceResponse>,
        requested: Mutex<Vec<String>>,
    }

    impl FakeSource {
        fn new(pages: Vec<(&str, SourceResponse)>) -> Self {
            Self {
                pages: pages.into_iter().map(|(url, page)| (url.to_string(), page)).collect(),
                requested: Mutex::new(Vec::new()),
            }
        }

        fn requested(&self) -> Vec<String> {
            self.requested.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PageSource for FakeSource {
        async fn fetch(&self, url: &str) -> Result<SourceResponse, SourceError> {
            self.requested.lock().unwrap().push(url.to_string());
            self.pages
                .get(url)
                .cloned()
                .ok_or_else(|| SourceError::InvalidResponse(format!("no page at {}", url)))
        }
    }

    fn page(ids: &[i64], count: usize, next: Option<&str>) -> SourceResponse {
        SourceResponse::Paginated(Page {
            results: ids.iter().map(|id| json!({"id": id})).collect(),
            meta: PageMeta {
                count: Some(count),
                next: next.map(str::to_string),
                previous: None,
            },
        })
    }

    fn options() -> BackfillOptions {
        BackfillOptions {
            delay: Duration::ZERO,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_backfill_follows_next_until_exhausted() {
        let source = FakeSource::new(vec![
            ("p1", page(&[1, 2], 5, Some("p2"))),
            ("p2", page(&[2, 3, 4], 5, Some("p3"))),
            ("p3", page(&[5], 5, None)),
        ]);

        let mut sizes = Vec::new();
        let list = backfill_with(&source, "p1", &options(), |list| sizes.push(list.records.len()))
            .await
            .unwrap();

        let ids: Vec<i64> = list.records.iter().filter_map(|r| r["id"].as_i64()).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
        assert_eq!(list.count, 5);
        assert!(list.next.is_none());
        assert_eq!(sizes, vec![2, 4, 5]);
        assert_eq!(source.requested(), vec!["p1", "p2", "p3"]);
    }

    #[tokio::test]
    async fn test_backfill_respects_page_cap() {
        let source = FakeSource::new(vec![
            ("p1", page(&[1], 3, Some("p2"))),
            ("p2", page(&[2], 3, Some("p3"))),
            ("p3", page(&[3], 3, None)),
        ]);
        let options = BackfillOptions {
            max_pages: Some(2),
            ..options()
        };

        let list = backfill(&source, "p1", &options).await.unwrap();
        assert_eq!(list.records.len(), 2);
        assert_eq!(list.next.as_deref(), Some("p3"));
    }

    #[tokio::test]
    async fn test_later_page_failure_keeps_accumulated() {
        let source = FakeSource::new(vec![("p1", page(&[1, 2], 10, Some("missing")))]);
        let list = backfill(&source, "p1", &options()).await.unwrap();
        assert_eq!(list.records.len(), 2);
        assert_eq!(list.count, 10);
    }

    #[tokio::test]
    async fn test_first_page_failure_is_returned() {
        let source = FakeSource::new(Vec::new());
        assert!(matches!(
            backfill(&source, "p1", &options()).await,
            Err(SourceError::InvalidResponse(_))
        ));
    }

    #[tokio::test]
    async fn test_self_referencing_next_stops() {
        let source = FakeSource::new(vec![("p1", page(&[1], 1, Some("p1")))]);
        let list = backfill(&source, "p1", &options()).await.unwrap();
        assert_eq!(list.records.len(), 1);
        assert_eq!(source.requested(), vec!["p1"]);
    }

    #[tokio::test]
    async fn test_two_page_cycle_stops() {
        let source = FakeSource::new(vec![
            ("p1", page(&[1], 2, Some("p2"))),
            ("p2", page(&[2], 2, Some("p1"))),
        ]);
        let list = backfill(&source, "p1", &options()).await.unwrap();
        let ids: Vec<i64> = list.records.iter().filter_map(|r| r["id"].as_i64()).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(source.requested(), vec!["p1", "p2"]);
    }

    #[tokio::test]
    async fn test_bare_array_endpoint() {
        let source = FakeSource::new(vec![(
            "all",
            SourceResponse::Bare(vec![json!({"id": 1}), json!({"id": 2})]),
        )]);
        let list = backfill(&source, "all", &options()).await.unwrap();
        assert_eq!(list.count, 2);
        assert!(list.next.is_none());
    }

    #[test]
    fn test_endpoint_url() {
        assert_eq!(endpoint_url("https://api.example.com/", "/alerts/"), "https://api.example.com/alerts/");
        assert_eq!(endpoint_url("https://api.example.com", "keywords"), "https://api.example.com/keywords");
    }
}
