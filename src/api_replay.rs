//! Replays a captured catalog API request page by page.

use crate::api_detector::{parse_lot_page, ApiCandidate};
use crate::browser::BrowserCookie;
use crate::http::{redact_url_for_log, HttpClient, HttpRequest, RetryPolicy};
use crate::listing::{listing_from_api_item, Listing, ListingSet};
use crate::{EngineError, Result};
use serde_json::{Map, Value};
use std::thread;
use url::Url;

pub const PAGE_INDEX_KEYS: &[&str] = &["page", "pageIndex", "pageNumber", "pageNum", "pg"];
pub const OFFSET_KEYS: &[&str] = &["start", "offset"];
pub const PAGE_SIZE_KEYS: &[&str] = &["size", "pageSize", "limit", "perPage", "take"];

pub const DEFAULT_PAGE_SIZE: u64 = 100;
const DEFAULT_MAX_PAGES: u64 = 1_000;

#[derive(Debug, Clone, PartialEq)]
pub enum BodyParams {
    None,
    Json(Map<String, Value>),
    Form(Vec<(String, String)>),
}

/// Query-string and body parameters of a captured request.
#[derive(Debug, Clone, PartialEq)]
pub struct PaginationParams {
    pub query: Vec<(String, String)>,
    pub body: BodyParams,
}

fn first_value_pairs<'a, I>(pairs: I) -> Vec<(String, String)>
where
    I: IntoIterator<Item = (std::borrow::Cow<'a, str>, std::borrow::Cow<'a, str>)>,
{
    let mut out: Vec<(String, String)> = Vec::new();
    for (key, value) in pairs {
        if out.iter().any(|(existing, _)| existing.as_str() == key.as_ref()) {
            continue;
        }
        out.push((key.into_owned(), value.into_owned()));
    }
    out
}

fn rewritten_value(key: &str, page: u64, size: u64) -> Option<u64> {
    if PAGE_INDEX_KEYS.contains(&key) {
        Some(page)
    } else if OFFSET_KEYS.contains(&key) {
        Some(page.saturating_mul(size))
    } else if PAGE_SIZE_KEYS.contains(&key) {
        Some(size)
    } else {
        None
    }
}

pub fn rewrite_pairs(pairs: &mut [(String, String)], page: u64, size: u64) -> bool {
    let mut updated = false;
    for (key, value) in pairs.iter_mut() {
        if let Some(next) = rewritten_value(key, page, size) {
            *value = next.to_string();
            updated = true;
        }
    }
    updated
}

/// Numeric JSON values stay numeric; anything else is written as a string.
pub fn rewrite_json(map: &mut Map<String, Value>, page: u64, size: u64) -> bool {
    let mut updated = false;
    for (key, value) in map.iter_mut() {
        if let Some(next) = rewritten_value(key, page, size) {
            *value = if value.is_number() {
                Value::from(next)
            } else {
                Value::String(next.to_string())
            };
            updated = true;
        }
    }
    updated
}

impl PaginationParams {
    pub fn from_request(url: &Url, body: Option<&str>) -> Self {
        let query = first_value_pairs(url.query_pairs());
        let body = match body.map(str::trim).filter(|b| !b.is_empty()) {
            None => BodyParams::None,
            Some(raw) => match serde_json::from_str::<Value>(raw) {
                Ok(Value::Object(map)) => BodyParams::Json(map),
                _ => BodyParams::Form(first_value_pairs(url::form_urlencoded::parse(
                    raw.as_bytes(),
                ))),
            },
        };
        Self { query, body }
    }

    /// Page size from the first recognized size parameter; the body wins
    /// over the query string.
    pub fn detect_page_size(&self) -> Option<u64> {
        let from_query = PAGE_SIZE_KEYS.iter().find_map(|key| {
            self.query
                .iter()
                .find(|(k, _)| k == key)
                .and_then(|(_, v)| v.trim().parse::<u64>().ok())
        });
        let from_body = PAGE_SIZE_KEYS.iter().find_map(|key| match &self.body {
            BodyParams::None => None,
            BodyParams::Json(map) => map.get(*key).and_then(crate::api_detector::as_count),
            BodyParams::Form(pairs) => pairs
                .iter()
                .find(|(k, _)| k == key)
                .and_then(|(_, v)| v.trim().parse::<u64>().ok()),
        });
        from_body.or(from_query).filter(|size| *size > 0)
    }

    /// Points every recognized pagination parameter at `page`. False when
    /// neither the query nor the body had one.
    pub fn rewrite(&mut self, page: u64, size: u64) -> bool {
        let in_query = rewrite_pairs(&mut self.query, page, size);
        let in_body = match &mut self.body {
            BodyParams::None => false,
            BodyParams::Json(map) => rewrite_json(map, page, size),
            BodyParams::Form(pairs) => rewrite_pairs(pairs, page, size),
        };
        in_query || in_body
    }
}

pub fn cookie_header(cookies: &[BrowserCookie], target: &Url) -> Option<String> {
    let host = target.host_str().unwrap_or("").to_ascii_lowercase();
    let pairs: Vec<String> = cookies
        .iter()
        .filter(|cookie| {
            let name = cookie.name.trim();
            !name.is_empty() && !name.contains(';') && !name.contains('=')
        })
        .filter(|cookie| match cookie.domain.as_deref() {
            None | Some("") => true,
            Some(domain) => {
                let domain = domain.trim_start_matches('.').to_ascii_lowercase();
                host == domain || host.ends_with(&format!(".{domain}"))
            }
        })
        .map(|cookie| format!("{}={}", cookie.name.trim(), cookie.value.trim()))
        .collect();
    if pairs.is_empty() {
        None
    } else {
        Some(pairs.join("; "))
    }
}

pub fn build_page_request(
    candidate: &ApiCandidate,
    params: &PaginationParams,
    cookie: Option<&str>,
) -> Result<HttpRequest> {
    let mut url = Url::parse(&candidate.url).map_err(|err| {
        EngineError::Configuration(format!("captured api url is invalid: {err}"))
    })?;
    if params.query.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(params.query.iter());
    }

    let mut request = HttpRequest::new(&candidate.http_method, url.as_str());
    for (name, value) in &candidate.request_headers {
        request = request.header(name, value);
    }
    if let Some(cookie) = cookie {
        request = request.header("Cookie", cookie);
    }

    request = match &params.body {
        BodyParams::None => request,
        BodyParams::Json(map) => request.body("application/json", serde_json::to_vec(map)?),
        BodyParams::Form(pairs) => {
            let encoded = url::form_urlencoded::Serializer::new(String::new())
                .extend_pairs(pairs.iter())
                .finish();
            request.body("application/x-www-form-urlencoded", encoded.into_bytes())
        }
    };
    Ok(request)
}

#[derive(Debug, Clone)]
pub struct ApiReplayOptions {
    pub retry: RetryPolicy,
    pub default_page_size: u64,
    pub max_pages: u64,
}

impl Default for ApiReplayOptions {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            default_page_size: DEFAULT_PAGE_SIZE,
            max_pages: DEFAULT_MAX_PAGES,
        }
    }
}

fn fetch_page<C: HttpClient + ?Sized>(
    client: &C,
    request: &HttpRequest,
    auction_id: &str,
    base_url: &Url,
) -> Result<(Vec<Listing>, Option<u64>)> {
    let data = client.execute(request)?.json()?;
    let page = parse_lot_page(&data);
    let items = page
        .items
        .into_iter()
        .map(|raw| listing_from_api_item(raw, auction_id, base_url))
        .collect();
    Ok((items, page.total))
}

/// Walks the API's pages in order. Ends on a page with no new items, on
/// reaching the advertised total, or at the page cap. A page-0 miss probes
/// page 1 once for one-based APIs. Consecutive request or decode failures
/// back off and abort once the retry budget is spent.
pub fn replay_catalog_api<C: HttpClient + ?Sized>(
    client: &C,
    candidate: &ApiCandidate,
    cookies: &[BrowserCookie],
    auction_id: &str,
    base_url: &Url,
    options: &ApiReplayOptions,
) -> Result<Vec<Listing>> {
    let api_url = Url::parse(&candidate.url).map_err(|err| {
        EngineError::Configuration(format!("captured api url is invalid: {err}"))
    })?;
    let mut params = PaginationParams::from_request(&api_url, candidate.request_body.as_deref());
    let size = params
        .detect_page_size()
        .unwrap_or(options.default_page_size.max(1));
    let cookie = cookie_header(cookies, &api_url);
    let max_failures = options.retry.max_attempts.max(1);

    let mut listings = ListingSet::new();
    let mut page = 0_u64;
    let mut total_expected: Option<u64> = None;
    let mut failures = 0_u32;
    let mut probed_one_based = false;

    loop {
        if page >= options.max_pages {
            tracing::warn!(auction_id, page, "api_page_cap_reached");
            break;
        }
        if !params.rewrite(page, size) {
            return Err(EngineError::Configuration(
                "unable to adjust pagination parameters for api".to_string(),
            ));
        }
        let request = build_page_request(candidate, &params, cookie.as_deref())?;

        match fetch_page(client, &request, auction_id, base_url) {
            Ok((items, total)) => {
                failures = 0;
                if let Some(total) = total {
                    total_expected = Some(total);
                }
                if items.is_empty() && page == 0 && !probed_one_based {
                    probed_one_based = true;
                    page = 1;
                    continue;
                }

                let added = listings.extend(items);
                if added == 0 {
                    break;
                }
                tracing::info!(
                    auction_id,
                    page = page + 1,
                    added,
                    collected = listings.len(),
                    "catalog_api_page_fetched"
                );
                if total_expected.is_some_and(|total| total > 0 && listings.len() as u64 >= total)
                {
                    break;
                }
                page += 1;
            }
            Err(err) => {
                let retryable = err.is_transient() || matches!(err, EngineError::Json(_));
                failures += 1;
                if !retryable {
                    tracing::warn!(auction_id, page, error = %err, "catalog_api_page_rejected");
                    return Err(err);
                }
                if failures >= max_failures {
                    return Err(EngineError::TransientNetwork(format!(
                        "api pagination failed at page {page} ({}): {err}",
                        redact_url_for_log(&candidate.url)
                    )));
                }
                let wait = options.retry.delay_for(failures);
                tracing::warn!(
                    auction_id,
                    page,
                    failures,
                    wait_ms = wait.as_millis() as u64,
                    error = %err,
                    "catalog_api_retry"
                );
                if !wait.is_zero() {
                    thread::sleep(wait);
                }
            }
        }
    }

    Ok(listings.into_vec())
}
