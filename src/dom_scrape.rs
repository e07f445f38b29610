//! Heuristic catalog scraping from rendered markup: an infinite-scroll pass
//! followed by a pagination pass.

use crate::browser::BrowserSession;
use crate::listing::{normalize_url, Listing, ListingSet};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

pub const CONTAINER_SELECTORS: &[&str] = &[
    ".lot-tile",
    ".lot-item",
    ".lot-card",
    ".auction-lot-item",
    "[data-lot-id]",
];

const TITLE_SELECTORS: &[&str] = &[".lot-title", ".lot-desc", ".title", "h3", "h4"];
const LOT_NUMBER_SELECTORS: &[&str] = &[".lot-number", ".lot-num", ".lot-no"];

const NEXT_SELECTORS: &[&str] = &[
    "a[rel='next']",
    ".pagination .next a",
    ".pagination .next button",
    "button[aria-label='Next']",
];

/// Comma-joined container selectors, for a single wait-for-selector call.
pub fn container_selector_union() -> String {
    CONTAINER_SELECTORS.join(", ")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DomScrapeOptions {
    pub scroll_settle_ms: u64,
    pub stable_scroll_limit: u32,
    pub max_scroll_attempts: u32,
    pub page_settle_ms: u64,
    pub max_page_clicks: u32,
}

impl Default for DomScrapeOptions {
    fn default() -> Self {
        Self {
            scroll_settle_ms: 1_500,
            stable_scroll_limit: 3,
            max_scroll_attempts: 50,
            page_settle_ms: 2_000,
            max_page_clicks: 500,
        }
    }
}

/// Remembers the first container selector that matched so the rest of a
/// pass reads cards the same way.
#[derive(Default)]
struct CardLocator {
    locked: Option<&'static str>,
}

impl CardLocator {
    fn cards<S: BrowserSession>(&mut self, session: &mut S) -> Result<Vec<S::Element>> {
        if let Some(selector) = self.locked {
            return session.query_selector_all(selector);
        }
        for selector in CONTAINER_SELECTORS {
            let found = session.query_selector_all(selector)?;
            if !found.is_empty() {
                tracing::debug!(selector, cards = found.len(), "dom_container_locked");
                self.locked = Some(*selector);
                return Ok(found);
            }
        }
        Ok(Vec::new())
    }
}

fn first_text<S: BrowserSession>(
    session: &mut S,
    card: &S::Element,
    selectors: &[&str],
) -> Result<String> {
    for selector in selectors {
        if let Some(el) = session.query_within(card, selector)? {
            let text = session.inner_text(&el)?.trim().to_string();
            if !text.is_empty() {
                return Ok(text);
            }
        }
    }
    Ok(String::new())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn listing_from_card<S: BrowserSession>(
    session: &mut S,
    card: &S::Element,
    auction_id: &str,
    base_url: &Url,
) -> Result<Listing> {
    let title = first_text(session, card, TITLE_SELECTORS)?;

    let lot_id = match non_empty(session.attribute(card, "data-lot-id")?) {
        Some(id) => id,
        None => first_text(session, card, LOT_NUMBER_SELECTORS)?,
    };

    let lot_url = match session.query_within(card, "a")? {
        Some(anchor) => non_empty(session.attribute(&anchor, "href")?)
            .map(|href| normalize_url(base_url, &href))
            .unwrap_or_default(),
        None => String::new(),
    };

    let image_url = match session.query_within(card, "img")? {
        Some(img) => {
            let src = match non_empty(session.attribute(&img, "src")?) {
                Some(src) => Some(src),
                None => non_empty(session.attribute(&img, "data-src")?),
            };
            src.map(|src| normalize_url(base_url, &src))
                .unwrap_or_default()
        }
        None => String::new(),
    };

    Ok(Listing {
        auction_id: auction_id.to_string(),
        lot_id,
        title,
        lot_url,
        image_url,
        ..Listing::default()
    })
}

fn collect_cards<S: BrowserSession>(
    session: &mut S,
    locator: &mut CardLocator,
    auction_id: &str,
    base_url: &Url,
) -> Result<Vec<Listing>> {
    let cards = locator.cards(session)?;
    let mut out = Vec::with_capacity(cards.len());
    for card in &cards {
        out.push(listing_from_card(session, card, auction_id, base_url)?);
    }
    Ok(out)
}

fn find_next_control<S: BrowserSession>(session: &mut S) -> Result<Option<S::Element>> {
    for selector in NEXT_SELECTORS {
        for control in session.query_selector_all(selector)? {
            if !session.is_disabled(&control)? {
                return Ok(Some(control));
            }
        }
    }
    Ok(None)
}

fn scroll_pass<S: BrowserSession>(
    session: &mut S,
    listings: &mut ListingSet,
    auction_id: &str,
    base_url: &Url,
    options: &DomScrapeOptions,
) -> Result<()> {
    let mut locator = CardLocator::default();
    let mut stable = 0_u32;
    let mut attempts = 0_u32;
    loop {
        let added = listings.extend(collect_cards(session, &mut locator, auction_id, base_url)?);
        if added == 0 {
            stable += 1;
        } else {
            stable = 0;
        }
        if stable >= options.stable_scroll_limit || attempts >= options.max_scroll_attempts {
            break;
        }
        session.scroll_to_bottom()?;
        session.wait(Duration::from_millis(options.scroll_settle_ms));
        attempts += 1;
    }
    tracing::info!(
        auction_id,
        scrolls = attempts,
        collected = listings.len(),
        "dom_scroll_pass_complete"
    );
    Ok(())
}

fn pagination_pass<S: BrowserSession>(
    session: &mut S,
    listings: &mut ListingSet,
    auction_id: &str,
    base_url: &Url,
    options: &DomScrapeOptions,
) -> Result<()> {
    let mut locator = CardLocator::default();
    let mut clicks = 0_u32;
    while clicks < options.max_page_clicks {
        let Some(next) = find_next_control(session)? else {
            break;
        };
        session.click(&next)?;
        clicks += 1;
        session.wait(Duration::from_millis(options.page_settle_ms));
        let added = listings.extend(collect_cards(session, &mut locator, auction_id, base_url)?);
        tracing::info!(
            auction_id,
            page = clicks + 1,
            added,
            collected = listings.len(),
            "dom_page_scraped"
        );
    }
    Ok(())
}

/// Scrapes whatever the rendered catalog shows. Never fails: a browser
/// error ends the pass it happened in and the listings gathered so far are
/// returned.
pub fn scrape_dom<S: BrowserSession>(
    session: &mut S,
    auction_id: &str,
    base_url: &Url,
    options: &DomScrapeOptions,
) -> Vec<Listing> {
    let mut listings = ListingSet::new();

    if let Err(err) = scroll_pass(session, &mut listings, auction_id, base_url, options) {
        tracing::warn!(auction_id, error = %err, "dom_scroll_pass_aborted");
    }
    if let Err(err) = pagination_pass(session, &mut listings, auction_id, base_url, options) {
        tracing::warn!(auction_id, error = %err, "dom_pagination_pass_aborted");
    }

    listings.into_vec()
}
