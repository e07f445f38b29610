//! Spots the catalog's backing data API among the responses a page makes
//! while it renders.

use crate::browser::{ObservedResponse, ResponseObserver};
use crate::http::redact_url_for_log;
use serde::Serialize;
use serde_json::{Map, Value};

pub const DEFAULT_MIN_SAMPLE_ITEMS: usize = 10;

/// Lower-cased keys that mark an object as a lot record.
const LOT_KEY_MARKERS: &[&str] = &["lotnumber", "lotid", "lot_id", "lot"];

const TOTAL_KEYS: &[&str] = &["totalLotCount", "total", "totalLots", "totalCount"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiCandidate {
    pub url: String,
    pub http_method: String,
    pub request_headers: Vec<(String, String)>,
    pub request_body: Option<String>,
    pub sample_item_count: usize,
}

/// Items and optional total count recognized in one API response body.
#[derive(Debug, Clone, Default)]
pub struct LotPage<'a> {
    pub items: Vec<&'a Map<String, Value>>,
    pub total: Option<u64>,
}

struct ArrayCandidate<'a> {
    items: &'a [Value],
}

impl ArrayCandidate<'_> {
    fn outranks(&self, other: &ArrayCandidate<'_>) -> bool {
        self.items.len() > other.items.len()
    }
}

fn looks_like_lot_array(items: &[Value]) -> bool {
    let Some(Value::Object(first)) = items.first() else {
        return false;
    };
    if !items.iter().all(Value::is_object) {
        return false;
    }
    first
        .keys()
        .any(|key| LOT_KEY_MARKERS.contains(&key.to_ascii_lowercase().as_str()))
}

fn collect_lot_arrays<'a>(value: &'a Value, out: &mut Vec<ArrayCandidate<'a>>) {
    match value {
        Value::Array(items) => {
            if looks_like_lot_array(items) {
                out.push(ArrayCandidate { items });
            }
            for item in items {
                collect_lot_arrays(item, out);
            }
        }
        Value::Object(map) => {
            for child in map.values() {
                collect_lot_arrays(child, out);
            }
        }
        _ => {}
    }
}

/// The longest array of lot-like objects anywhere in `data`; on ties the
/// first one found wins.
pub fn find_lot_items(data: &Value) -> Vec<&Map<String, Value>> {
    let mut candidates = Vec::new();
    collect_lot_arrays(data, &mut candidates);

    let mut best: Option<ArrayCandidate<'_>> = None;
    for candidate in candidates {
        let replace = match &best {
            None => true,
            Some(current) => candidate.outranks(current),
        };
        if replace {
            best = Some(candidate);
        }
    }

    best.map(|c| c.items.iter().filter_map(Value::as_object).collect())
        .unwrap_or_default()
}

pub(crate) fn as_count(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    }
}

fn total_in(map: &Map<String, Value>) -> Option<u64> {
    TOTAL_KEYS
        .iter()
        .find_map(|key| map.get(*key))
        .and_then(as_count)
}

/// Total-count field at the top level, else one level down.
pub fn find_total(data: &Value) -> Option<u64> {
    let Value::Object(map) = data else {
        return None;
    };
    total_in(map).or_else(|| {
        map.values()
            .filter_map(Value::as_object)
            .find_map(total_in)
    })
}

pub fn parse_lot_page(data: &Value) -> LotPage<'_> {
    LotPage {
        items: find_lot_items(data),
        total: find_total(data),
    }
}

/// Records every XHR/fetch JSON response that carries enough lot records.
pub struct ApiCandidateDetector {
    min_items: usize,
    candidates: Vec<ApiCandidate>,
}

impl Default for ApiCandidateDetector {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_SAMPLE_ITEMS)
    }
}

impl ApiCandidateDetector {
    pub fn new(min_items: usize) -> Self {
        Self {
            min_items,
            candidates: Vec::new(),
        }
    }

    pub fn candidates(&self) -> &[ApiCandidate] {
        &self.candidates
    }

    /// Highest `sample_item_count`; the earliest capture wins ties.
    pub fn into_best(self) -> Option<ApiCandidate> {
        let mut best: Option<ApiCandidate> = None;
        for candidate in self.candidates {
            let replace = match &best {
                None => true,
                Some(current) => candidate.sample_item_count > current.sample_item_count,
            };
            if replace {
                best = Some(candidate);
            }
        }
        best
    }
}

impl ResponseObserver for ApiCandidateDetector {
    fn observe(&mut self, response: &ObservedResponse) {
        if !response.resource_kind.is_data_request() {
            return;
        }
        if !response
            .content_type
            .to_ascii_lowercase()
            .contains("application/json")
        {
            return;
        }
        let Some(data) = response.json_body() else {
            return;
        };
        let count = find_lot_items(&data).len();
        if count < self.min_items {
            return;
        }

        tracing::debug!(
            url = %redact_url_for_log(&response.url),
            method = %response.method,
            items = count,
            "api_candidate_captured"
        );
        self.candidates.push(ApiCandidate {
            url: response.url.clone(),
            http_method: response.method.to_ascii_uppercase(),
            request_headers: vec![
                (
                    "User-Agent".to_string(),
                    response.request_header("user-agent").unwrap_or("").to_string(),
                ),
                ("Accept".to_string(), "application/json".to_string()),
                (
                    "Referer".to_string(),
                    response.request_header("referer").unwrap_or("").to_string(),
                ),
            ],
            request_body: response.request_body.clone(),
            sample_item_count: count,
        });
    }
}
