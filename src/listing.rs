use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;
use url::Url;

/// One lot in a catalog.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Listing {
    #[serde(deserialize_with = "lenient_string")]
    pub auction_id: String,
    #[serde(deserialize_with = "lenient_string")]
    pub lot_id: String,
    #[serde(deserialize_with = "lenient_string")]
    pub title: String,
    #[serde(deserialize_with = "lenient_string")]
    pub subtitle: String,
    #[serde(deserialize_with = "lenient_string")]
    pub category: String,
    pub current_bid: Option<Value>,
    #[serde(deserialize_with = "lenient_string")]
    pub lot_url: String,
    #[serde(deserialize_with = "lenient_string")]
    pub image_url: String,
}

impl Listing {
    pub fn dedup_key(&self) -> (String, String) {
        (self.lot_id.clone(), self.lot_url.clone())
    }
}

fn lenient_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().map(value_to_text).unwrap_or_default())
}

/// Insertion-ordered listings, unique by `(lot_id, lot_url)`; the first
/// occurrence wins.
#[derive(Debug, Clone, Default)]
pub struct ListingSet {
    items: Vec<Listing>,
    seen: HashSet<(String, String)>,
}

impl ListingSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, listing: Listing) -> bool {
        if !self.seen.insert(listing.dedup_key()) {
            return false;
        }
        self.items.push(listing);
        true
    }

    /// Returns how many of `listings` were new.
    pub fn extend<I: IntoIterator<Item = Listing>>(&mut self, listings: I) -> usize {
        listings
            .into_iter()
            .map(|listing| self.insert(listing))
            .filter(|added| *added)
            .count()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn as_slice(&self) -> &[Listing] {
        &self.items
    }

    pub fn into_vec(self) -> Vec<Listing> {
        self.items
    }
}

/// Where a field's value may be found in a raw API item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldSource {
    Key(&'static str),
    /// `key`, or `key.inner` when `key` holds an object.
    KeyOrInner(&'static str, &'static str),
    /// `key`, but only when it holds a string.
    StringKey(&'static str),
}

impl FieldSource {
    pub fn resolve<'a>(&self, raw: &'a Map<String, Value>) -> Option<&'a Value> {
        match *self {
            FieldSource::Key(key) => raw.get(key).filter(|v| is_meaningful(v)),
            FieldSource::KeyOrInner(key, inner) => {
                let value = raw.get(key).filter(|v| is_meaningful(v))?;
                match value {
                    Value::Object(map) => map.get(inner),
                    other => Some(other),
                }
            }
            FieldSource::StringKey(key) => raw
                .get(key)
                .filter(|v| is_meaningful(v))
                .filter(|v| v.is_string()),
        }
    }
}

pub const LOT_ID_SOURCES: &[FieldSource] = &[
    FieldSource::KeyOrInner("lotNumber", "value"),
    FieldSource::KeyOrInner("lot_number", "value"),
    FieldSource::KeyOrInner("lotId", "value"),
    FieldSource::KeyOrInner("lot_id", "value"),
];

pub const TITLE_SOURCES: &[FieldSource] = &[
    FieldSource::Key("title"),
    FieldSource::Key("lotTitle"),
    FieldSource::Key("name"),
];

pub const SUBTITLE_SOURCES: &[FieldSource] = &[
    FieldSource::StringKey("subtitle"),
    FieldSource::StringKey("shortDescription"),
    FieldSource::StringKey("description"),
];

pub const LOT_URL_SOURCES: &[FieldSource] = &[
    FieldSource::Key("lotUrl"),
    FieldSource::Key("url"),
    FieldSource::Key("detailUrl"),
];

pub const IMAGE_URL_SOURCES: &[FieldSource] = &[
    FieldSource::Key("imageUrl"),
    FieldSource::Key("thumbnailUrl"),
    FieldSource::Key("image"),
];

pub const CURRENT_BID_SOURCES: &[FieldSource] = &[
    FieldSource::Key("currentBid"),
    FieldSource::Key("bid"),
    FieldSource::Key("price"),
];

pub const CATEGORY_SOURCES: &[FieldSource] = &[
    FieldSource::Key("category"),
    FieldSource::Key("categoryName"),
    FieldSource::Key("catalogCategory"),
];

pub fn first_match<'a>(raw: &'a Map<String, Value>, sources: &[FieldSource]) -> Option<&'a Value> {
    sources.iter().find_map(|source| source.resolve(raw))
}

fn text_field(raw: &Map<String, Value>, sources: &[FieldSource]) -> String {
    first_match(raw, sources)
        .map(value_to_text)
        .unwrap_or_default()
        .trim()
        .to_string()
}

/// Null, `false`, and empty strings or containers count as absent.
fn is_meaningful(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
        Value::Number(_) => true,
    }
}

pub(crate) fn value_to_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Maps a raw API item onto a listing using the field source tables.
pub fn listing_from_api_item(raw: &Map<String, Value>, auction_id: &str, base_url: &Url) -> Listing {
    Listing {
        auction_id: auction_id.to_string(),
        lot_id: text_field(raw, LOT_ID_SOURCES),
        title: text_field(raw, TITLE_SOURCES),
        subtitle: text_field(raw, SUBTITLE_SOURCES),
        category: text_field(raw, CATEGORY_SOURCES),
        current_bid: first_match(raw, CURRENT_BID_SOURCES).cloned(),
        lot_url: normalize_url(base_url, &text_field(raw, LOT_URL_SOURCES)),
        image_url: normalize_url(base_url, &text_field(raw, IMAGE_URL_SOURCES)),
    }
}

/// Resolves `href` against `base`; empty for blank, script, mail and
/// fragment-only links.
pub fn normalize_url(base: &Url, href: &str) -> String {
    let href = href.trim();
    if href.is_empty() {
        return String::new();
    }
    let lower = href.to_ascii_lowercase();
    if lower.starts_with("javascript:")
        || lower.starts_with("mailto:")
        || lower.starts_with("tel:")
        || lower.starts_with('#')
    {
        return String::new();
    }
    match base.join(href) {
        Ok(joined) => joined.to_string(),
        Err(_) => String::new(),
    }
}
