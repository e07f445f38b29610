//! Catalog extraction: render the catalog page, replay its data API when one
//! shows up, and fall back to scraping the markup otherwise.

use crate::api_detector::{ApiCandidateDetector, DEFAULT_MIN_SAMPLE_ITEMS};
use crate::api_replay::{replay_catalog_api, ApiReplayOptions, DEFAULT_PAGE_SIZE};
use crate::browser::{BrowserSession, WaitUntil};
use crate::dom_scrape::{container_selector_union, scrape_dom, DomScrapeOptions};
use crate::http::{redact_url_for_log, HttpClient, RetryPolicy};
use crate::listing::Listing;
use crate::snapshot::{CatalogSnapshot, ExtractionMode};
use crate::{EngineError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use std::time::Duration;
use url::Url;

pub const DEFAULT_CATALOG_URL_TEMPLATE: &str =
    "https://encoreauctions.hibid.com/catalog/{auction_id}/";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogOptions {
    /// `{auction_id}` is substituted.
    pub catalog_url_template: String,
    pub render_timeout_ms: u64,
    pub settle_ms: u64,
    pub min_api_sample_items: usize,
    pub max_api_pages: u64,
    pub default_page_size: u64,
    pub dom: DomScrapeOptions,
}

impl Default for CatalogOptions {
    fn default() -> Self {
        Self {
            catalog_url_template: DEFAULT_CATALOG_URL_TEMPLATE.to_string(),
            render_timeout_ms: 30_000,
            settle_ms: 2_000,
            min_api_sample_items: DEFAULT_MIN_SAMPLE_ITEMS,
            max_api_pages: 1_000,
            default_page_size: DEFAULT_PAGE_SIZE,
            dom: DomScrapeOptions::default(),
        }
    }
}

/// Pulls the numeric auction id out of a catalog URL.
pub fn auction_id_from_url(url: &str) -> Option<String> {
    static CATALOG_PATH_RE: OnceLock<Regex> = OnceLock::new();
    static AUCTION_QUERY_RE: OnceLock<Regex> = OnceLock::new();

    let path_re = CATALOG_PATH_RE.get_or_init(|| Regex::new(r"/catalog/(\d+)").expect("regex"));
    let query_re =
        AUCTION_QUERY_RE.get_or_init(|| Regex::new(r"auctionId=(\d+)").expect("regex"));

    path_re
        .captures(url)
        .or_else(|| query_re.captures(url))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogRequest {
    pub auction_id: String,
    pub catalog_url: String,
    pub label: Option<String>,
}

impl CatalogRequest {
    /// Accepts an explicit id, a catalog URL, or both. Without a URL the
    /// catalog URL comes from `template`.
    pub fn resolve(
        auction_id: Option<&str>,
        catalog_url: Option<&str>,
        label: Option<&str>,
        template: &str,
    ) -> Result<Self> {
        let given_id = auction_id.map(str::trim).filter(|id| !id.is_empty());
        let given_url = catalog_url.map(str::trim).filter(|url| !url.is_empty());

        let auction_id = match (given_id, given_url) {
            (Some(id), _) => id.to_string(),
            (None, Some(url)) => auction_id_from_url(url).ok_or_else(|| {
                EngineError::Configuration(format!(
                    "could not find an auction id in url: {url}"
                ))
            })?,
            (None, None) => {
                return Err(EngineError::Configuration(
                    "an auction id or catalog url is required".to_string(),
                ))
            }
        };

        let catalog_url = match given_url {
            Some(url) => url.to_string(),
            None => template.replace("{auction_id}", &auction_id),
        };
        Url::parse(&catalog_url).map_err(|err| {
            EngineError::Configuration(format!("invalid catalog url {catalog_url}: {err}"))
        })?;

        Ok(Self {
            auction_id,
            catalog_url,
            label: label
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string),
        })
    }
}

pub struct CatalogExtractor {
    options: CatalogOptions,
    retry: RetryPolicy,
}

impl CatalogExtractor {
    pub fn new(options: CatalogOptions, retry: RetryPolicy) -> Self {
        Self { options, retry }
    }

    /// Renders the catalog and returns its deduplicated listings. Only a bad
    /// catalog URL or a failed initial navigation is an error; API trouble
    /// falls back to markup scraping, which never fails.
    pub fn extract<S, C>(
        &self,
        session: &mut S,
        client: &C,
        request: &CatalogRequest,
    ) -> Result<CatalogSnapshot>
    where
        S: BrowserSession,
        C: HttpClient + ?Sized,
    {
        let catalog_url = Url::parse(&request.catalog_url).map_err(|err| {
            EngineError::Configuration(format!(
                "invalid catalog url {}: {err}",
                request.catalog_url
            ))
        })?;
        let origin = catalog_url.join("/").map_err(|err| {
            EngineError::Configuration(format!("catalog url has no origin: {err}"))
        })?;
        let auction_id = request.auction_id.as_str();

        tracing::info!(
            auction_id,
            url = %redact_url_for_log(catalog_url.as_str()),
            "catalog_loading"
        );
        let mut detector = ApiCandidateDetector::new(self.options.min_api_sample_items);
        session.navigate(catalog_url.as_str(), WaitUntil::NetworkIdle, &mut detector)?;

        let timeout = Duration::from_millis(self.options.render_timeout_ms);
        if let Err(err) = session.wait_for_selector(&container_selector_union(), timeout) {
            tracing::warn!(auction_id, error = %err, "catalog_grid_not_found");
        }
        session.wait(Duration::from_millis(self.options.settle_ms));

        let captured = detector.candidates().len();
        let api_items = match detector.into_best() {
            Some(candidate) => {
                tracing::info!(
                    auction_id,
                    candidates = captured,
                    sample_items = candidate.sample_item_count,
                    "catalog_api_candidate_selected"
                );
                let cookies = session.cookies().unwrap_or_else(|err| {
                    tracing::warn!(auction_id, error = %err, "browser_cookies_unavailable");
                    Vec::new()
                });
                let options = ApiReplayOptions {
                    retry: self.retry,
                    default_page_size: self.options.default_page_size,
                    max_pages: self.options.max_api_pages,
                };
                match replay_catalog_api(client, &candidate, &cookies, auction_id, &origin, &options)
                {
                    Ok(items) => items,
                    Err(err) => {
                        tracing::warn!(auction_id, error = %err, "catalog_api_fallback");
                        Vec::new()
                    }
                }
            }
            None => Vec::new(),
        };

        let (mode, items): (ExtractionMode, Vec<Listing>) = if api_items.is_empty() {
            tracing::info!(auction_id, "catalog_dom_scrape_started");
            (
                ExtractionMode::Dom,
                scrape_dom(session, auction_id, &origin, &self.options.dom),
            )
        } else {
            (ExtractionMode::Api, api_items)
        };

        tracing::info!(
            auction_id,
            mode = ?mode,
            items = items.len(),
            "catalog_extracted"
        );
        Ok(CatalogSnapshot {
            auction_id: request.auction_id.clone(),
            scraped_at: chrono::Utc::now(),
            auction_label: request.label.clone(),
            mode: Some(mode),
            items,
        })
    }
}
