//! Picks the single best image URL from a lot detail page.

use crate::browser::parse_selector;
use regex::Regex;
use scraper::Html;
use serde_json::Value;
use std::sync::OnceLock;
use url::Url;

const META_IMAGE_KEYS: &[&str] = &["og:image", "twitter:image"];

/// Resolves `raw_url` against `base_url`; only http(s) results survive.
pub(crate) fn normalize_url_with_base(raw_url: &str, base_url: &Url) -> Option<String> {
    let raw_url = raw_url.trim();
    if raw_url.is_empty() {
        return None;
    }
    let lower = raw_url.to_ascii_lowercase();
    if lower.starts_with("javascript:") || lower.starts_with("data:") || lower.starts_with('#') {
        return None;
    }

    let mut joined = base_url.join(raw_url).ok()?;
    if !matches!(joined.scheme(), "http" | "https") {
        return None;
    }
    joined.set_fragment(None);
    Some(joined.to_string())
}

/// Widest `url <n>w` entry; unparseable widths count as 0 and ties keep
/// the earlier entry.
pub fn pick_srcset(srcset: &str) -> Option<String> {
    let mut best: Option<(i64, &str)> = None;
    for chunk in srcset.split(',') {
        let bits: Vec<&str> = chunk.split_whitespace().collect();
        let Some(url) = bits.first() else {
            continue;
        };
        let width = bits
            .get(1)
            .filter(|token| token.ends_with('w'))
            .and_then(|token| token.trim_end_matches('w').parse::<i64>().ok())
            .unwrap_or(0);
        if best.map_or(true, |(best_width, _)| width > best_width) {
            best = Some((width, *url));
        }
    }
    best.map(|(_, url)| url.to_string())
}

fn meta_candidates(document: &Html) -> Vec<String> {
    let mut out = Vec::new();
    for key in META_IMAGE_KEYS {
        let by_property = format!("meta[property='{key}']");
        let by_name = format!("meta[name='{key}']");
        for selector in [by_property, by_name] {
            let Ok(selector) = parse_selector(&selector) else {
                continue;
            };
            let content = document
                .select(&selector)
                .next()
                .and_then(|tag| tag.value().attr("content"))
                .map(str::trim)
                .filter(|c| !c.is_empty());
            if let Some(content) = content {
                out.push(content.to_string());
                break;
            }
        }
    }
    out
}

fn push_image_field(object: &serde_json::Map<String, Value>, out: &mut Vec<String>) {
    match object.get("image") {
        Some(Value::String(url)) => out.push(url.clone()),
        Some(Value::Array(entries)) => {
            out.extend(entries.iter().filter_map(Value::as_str).map(str::to_string));
        }
        _ => {}
    }
}

fn json_ld_candidates(document: &Html) -> Vec<String> {
    let mut out = Vec::new();
    let Ok(selector) = parse_selector("script[type='application/ld+json']") else {
        return out;
    };
    for script in document.select(&selector) {
        let raw: String = script.text().collect();
        let Ok(data) = serde_json::from_str::<Value>(raw.trim()) else {
            continue;
        };
        match &data {
            Value::Object(object) => push_image_field(object, &mut out),
            Value::Array(entries) => {
                for object in entries.iter().filter_map(Value::as_object) {
                    push_image_field(object, &mut out);
                }
            }
            _ => {}
        }
    }
    out
}

fn background_image(style: &str) -> Option<String> {
    static BACKGROUND_RE: OnceLock<Regex> = OnceLock::new();
    let re = BACKGROUND_RE.get_or_init(|| {
        Regex::new(r#"background-image:\s*url\(['"]?(.*?)['"]?\)"#).expect("regex")
    });
    re.captures(style)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

fn img_candidates(document: &Html) -> Vec<String> {
    let mut out = Vec::new();
    let Ok(selector) = parse_selector("img") else {
        return out;
    };
    for img in document.select(&selector) {
        let el = img.value();
        for attr in ["data-src", "src"] {
            if let Some(value) = el.attr(attr).filter(|v| !v.trim().is_empty()) {
                out.push(value.to_string());
            }
        }
        if let Some(best) = el.attr("srcset").and_then(pick_srcset) {
            out.push(best);
        }
        if let Some(url) = el.attr("style").and_then(background_image) {
            out.push(url);
        }
    }
    out
}

/// First usable candidate from meta tags, then JSON-LD, then `<img>`
/// elements, resolved against `base_url` (the detail page's origin).
pub fn resolve_image_url(html: &str, base_url: &Url) -> Option<String> {
    let document = Html::parse_document(html);
    let groups = [
        meta_candidates(&document),
        json_ld_candidates(&document),
        img_candidates(&document),
    ];
    groups
        .iter()
        .flatten()
        .find_map(|candidate| normalize_url_with_base(candidate, base_url))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page() -> Url {
        Url::parse("https://site.example/").expect("page origin")
    }

    #[test]
    fn srcset_prefers_widest_entry() {
        assert_eq!(
            pick_srcset("a.jpg 100w, b.jpg 400w, c.jpg 200w").as_deref(),
            Some("b.jpg")
        );
        assert_eq!(pick_srcset("a.jpg 2x, b.jpg").as_deref(), Some("a.jpg"));
        assert_eq!(pick_srcset(" , "), None);
    }

    #[test]
    fn meta_tags_win_over_everything_else() {
        let html = r#"<html><head>
            <meta name="twitter:image" content="/tw.jpg">
            <meta property="og:image" content="https://cdn.example/og.jpg">
            <script type="application/ld+json">{"image": "/ld.jpg"}</script>
            </head><body><img src="/img.jpg"></body></html>"#;
        assert_eq!(
            resolve_image_url(html, &page()).as_deref(),
            Some("https://cdn.example/og.jpg")
        );
    }

    #[test]
    fn twitter_meta_by_name_is_second() {
        let html = r#"<meta name="twitter:image" content="/tw.jpg"><img src="/img.jpg">"#;
        assert_eq!(
            resolve_image_url(html, &page()).as_deref(),
            Some("https://site.example/tw.jpg")
        );
    }

    #[test]
    fn json_ld_strings_and_arrays() {
        let html = r#"<script type="application/ld+json">{broken</script>
            <script type="application/ld+json">[{"@type":"Product","image":["pics/1.jpg","pics/2.jpg"]}]</script>
            <img src="/img.jpg">"#;
        assert_eq!(
            resolve_image_url(html, &page()).as_deref(),
            Some("https://site.example/pics/1.jpg")
        );
    }

    #[test]
    fn img_attributes_in_priority_order() {
        let html = r#"<img src="data:image/gif;base64,R0lGOD" data-src="/lazy.jpg">"#;
        assert_eq!(
            resolve_image_url(html, &page()).as_deref(),
            Some("https://site.example/lazy.jpg")
        );

        let srcset_only = r#"<img srcset="s.jpg 100w, l.jpg 900w">"#;
        assert_eq!(
            resolve_image_url(srcset_only, &page()).as_deref(),
            Some("https://site.example/l.jpg")
        );

        let styled = r#"<img style="background-image: url('/bg.png')">"#;
        assert_eq!(
            resolve_image_url(styled, &page()).as_deref(),
            Some("https://site.example/bg.png")
        );
    }

    #[test]
    fn no_candidates_yields_none() {
        assert_eq!(resolve_image_url("<p>sold</p>", &page()), None);
        assert_eq!(
            resolve_image_url(r#"<img src="javascript:void(0)">"#, &page()),
            None
        );
    }
}
