//! Browser collaborator seam.
//!
//! The catalog extractor drives a page through [`BrowserSession`]; a real
//! browser engine plugs in behind it. [`StaticHtmlSession`] is a
//! non-rendering implementation over plain HTTP, useful for server-rendered
//! catalogs and for tests.

use crate::http::{fetch_with_retry, redact_url_for_log, HttpClient, HttpRequest, RetryPolicy};
use crate::{EngineError, Result};
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Document,
    Xhr,
    Fetch,
    Script,
    Image,
    Other,
}

impl ResourceKind {
    pub fn is_data_request(self) -> bool {
        matches!(self, ResourceKind::Xhr | ResourceKind::Fetch)
    }
}

/// One network exchange seen while a page was loading.
#[derive(Debug, Clone)]
pub struct ObservedResponse {
    pub url: String,
    pub method: String,
    pub resource_kind: ResourceKind,
    pub status: u16,
    pub content_type: String,
    pub request_headers: Vec<(String, String)>,
    pub request_body: Option<String>,
    pub body: Option<String>,
}

impl ObservedResponse {
    pub fn request_header(&self, name: &str) -> Option<&str> {
        self.request_headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn json_body(&self) -> Option<serde_json::Value> {
        serde_json::from_str(self.body.as_deref()?).ok()
    }
}

pub trait ResponseObserver {
    fn observe(&mut self, response: &ObservedResponse);
}

pub struct NoopObserver;

impl ResponseObserver for NoopObserver {
    fn observe(&mut self, _response: &ObservedResponse) {}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrowserCookie {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub domain: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitUntil {
    Load,
    NetworkIdle,
}

/// A single rendered page. Operations run one at a time; callers never
/// overlap two calls on the same session.
pub trait BrowserSession {
    type Element;

    fn navigate(
        &mut self,
        url: &str,
        wait_until: WaitUntil,
        observer: &mut dyn ResponseObserver,
    ) -> Result<()>;

    /// Fails with [`EngineError::RenderTimeout`] when nothing matched in time.
    fn wait_for_selector(&mut self, selector: &str, timeout: Duration) -> Result<()>;

    fn query_selector(&mut self, selector: &str) -> Result<Option<Self::Element>>;

    fn query_selector_all(&mut self, selector: &str) -> Result<Vec<Self::Element>>;

    /// First descendant of `scope` matching `selector`.
    fn query_within(
        &mut self,
        scope: &Self::Element,
        selector: &str,
    ) -> Result<Option<Self::Element>>;

    fn attribute(&mut self, element: &Self::Element, name: &str) -> Result<Option<String>>;

    fn inner_text(&mut self, element: &Self::Element) -> Result<String>;

    fn is_disabled(&mut self, element: &Self::Element) -> Result<bool>;

    fn click(&mut self, element: &Self::Element) -> Result<()>;

    fn scroll_to_bottom(&mut self) -> Result<()>;

    fn wait(&mut self, duration: Duration);

    fn cookies(&mut self) -> Result<Vec<BrowserCookie>>;
}

pub(crate) fn parse_selector(selector: &str) -> Result<Selector> {
    Selector::parse(selector)
        .map_err(|err| EngineError::Browser(format!("invalid selector {selector:?}: {err:?}")))
}

/// Detached copy of an element: its outer HTML, collapsed text and attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticElement {
    html: String,
    text: String,
    attrs: Vec<(String, String)>,
}

impl StaticElement {
    fn from_ref(el: ElementRef<'_>) -> Self {
        Self {
            html: el.html(),
            text: collapse_whitespace(&el.text().collect::<Vec<_>>().join(" ")),
            attrs: el
                .value()
                .attrs()
                .map(|(name, value)| (name.to_string(), value.to_string()))
                .collect(),
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_disabled(&self) -> bool {
        if self.attr("disabled").is_some() {
            return true;
        }
        if self
            .attr("aria-disabled")
            .is_some_and(|v| v.trim().eq_ignore_ascii_case("true"))
        {
            return true;
        }
        self.attr("class")
            .is_some_and(|classes| classes.split_whitespace().any(|c| c == "disabled"))
    }

    pub fn select_first(&self, selector: &str) -> Result<Option<StaticElement>> {
        let selector = parse_selector(selector)?;
        let fragment = Html::parse_fragment(&self.html);
        let own_id = fragment
            .root_element()
            .children()
            .find_map(ElementRef::wrap)
            .map(|el| el.id());
        Ok(fragment
            .select(&selector)
            .find(|el| Some(el.id()) != own_id)
            .map(StaticElement::from_ref))
    }
}

pub struct HtmlDocument {
    html: Html,
}

impl HtmlDocument {
    pub fn parse(source: &str) -> Self {
        Self {
            html: Html::parse_document(source),
        }
    }

    pub fn select_all(&self, selector: &str) -> Result<Vec<StaticElement>> {
        let selector = parse_selector(selector)?;
        Ok(self
            .html
            .select(&selector)
            .map(StaticElement::from_ref)
            .collect())
    }

    pub fn select_first(&self, selector: &str) -> Result<Option<StaticElement>> {
        let selector = parse_selector(selector)?;
        Ok(self.html.select(&selector).next().map(StaticElement::from_ref))
    }

    pub fn contains(&self, selector: &str) -> Result<bool> {
        Ok(self.select_first(selector)?.is_some())
    }
}

pub(crate) fn collapse_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Fetches pages over HTTP and queries the served markup. No scripts run, so
/// no XHR traffic is ever observed, scrolling does nothing, and clicking
/// follows an element's `href` (each URL at most once).
pub struct StaticHtmlSession<C: HttpClient> {
    client: C,
    retry: RetryPolicy,
    current_url: Option<Url>,
    document: Option<HtmlDocument>,
    visited: HashSet<String>,
}

impl<C: HttpClient> StaticHtmlSession<C> {
    pub fn new(client: C, retry: RetryPolicy) -> Self {
        Self {
            client,
            retry,
            current_url: None,
            document: None,
            visited: HashSet::new(),
        }
    }

    fn document(&self) -> Result<&HtmlDocument> {
        self.document
            .as_ref()
            .ok_or_else(|| EngineError::Browser("no page loaded".to_string()))
    }
}

impl<C: HttpClient> BrowserSession for StaticHtmlSession<C> {
    type Element = StaticElement;

    fn navigate(
        &mut self,
        url: &str,
        _wait_until: WaitUntil,
        observer: &mut dyn ResponseObserver,
    ) -> Result<()> {
        let parsed = Url::parse(url)
            .map_err(|err| EngineError::Configuration(format!("invalid url {url}: {err}")))?;
        let request = HttpRequest::get(parsed.as_str())
            .header("Accept", "text/html,application/xhtml+xml");
        let response = fetch_with_retry(&self.client, &request, &self.retry, "page_fetch")?;
        let body = response.text();

        observer.observe(&ObservedResponse {
            url: parsed.to_string(),
            method: "GET".to_string(),
            resource_kind: ResourceKind::Document,
            status: response.status,
            content_type: response.content_type.clone(),
            request_headers: request.headers.clone(),
            request_body: None,
            body: Some(body.clone()),
        });

        tracing::debug!(url = %redact_url_for_log(parsed.as_str()), bytes = body.len(), "static_page_loaded");
        self.visited.insert(parsed.to_string());
        self.document = Some(HtmlDocument::parse(&body));
        self.current_url = Some(parsed);
        Ok(())
    }

    fn wait_for_selector(&mut self, selector: &str, _timeout: Duration) -> Result<()> {
        if self.document()?.contains(selector)? {
            Ok(())
        } else {
            Err(EngineError::RenderTimeout {
                selector: selector.to_string(),
            })
        }
    }

    fn query_selector(&mut self, selector: &str) -> Result<Option<StaticElement>> {
        self.document()?.select_first(selector)
    }

    fn query_selector_all(&mut self, selector: &str) -> Result<Vec<StaticElement>> {
        self.document()?.select_all(selector)
    }

    fn query_within(
        &mut self,
        scope: &StaticElement,
        selector: &str,
    ) -> Result<Option<StaticElement>> {
        scope.select_first(selector)
    }

    fn attribute(&mut self, element: &StaticElement, name: &str) -> Result<Option<String>> {
        Ok(element.attr(name).map(str::to_string))
    }

    fn inner_text(&mut self, element: &StaticElement) -> Result<String> {
        Ok(element.text().to_string())
    }

    fn is_disabled(&mut self, element: &StaticElement) -> Result<bool> {
        Ok(element.is_disabled())
    }

    fn click(&mut self, element: &StaticElement) -> Result<()> {
        let href = element
            .attr("href")
            .map(str::trim)
            .filter(|href| !href.is_empty() && !href.starts_with('#'))
            .ok_or_else(|| {
                EngineError::Browser("static session can only follow links with an href".to_string())
            })?;
        let base = self
            .current_url
            .as_ref()
            .ok_or_else(|| EngineError::Browser("no page loaded".to_string()))?;
        let mut target = base
            .join(href)
            .map_err(|err| EngineError::Browser(format!("bad link {href}: {err}")))?;
        target.set_fragment(None);
        if self.visited.contains(target.as_str()) {
            return Err(EngineError::Browser(format!(
                "link already visited: {}",
                redact_url_for_log(target.as_str())
            )));
        }
        self.navigate(target.as_str(), WaitUntil::Load, &mut NoopObserver)
    }

    fn scroll_to_bottom(&mut self) -> Result<()> {
        Ok(())
    }

    fn wait(&mut self, _duration: Duration) {}

    fn cookies(&mut self) -> Result<Vec<BrowserCookie>> {
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StubClient;

    #[test]
    fn scoped_query_skips_the_scope_element_itself() {
        let doc = HtmlDocument::parse(
            r#"<div class="lot-card"><a href="/outer">
                 <span class="title">Lamp</span></a></div>"#,
        );
        let card = doc
            .select_first(".lot-card")
            .expect("selector")
            .expect("card");
        let link = card.select_first("a").expect("selector").expect("anchor");
        assert_eq!(link.attr("href"), Some("/outer"));

        let anchor = doc.select_first("a").expect("selector").expect("anchor");
        assert!(anchor.select_first("a").expect("selector").is_none());
        assert_eq!(anchor.text(), "Lamp");
    }

    #[test]
    fn disabled_state_covers_attribute_aria_and_class() {
        let doc = HtmlDocument::parse(
            r#"<button id="a" disabled>Next</button>
               <a id="b" aria-disabled="true">Next</a>
               <a id="c" class="next disabled">Next</a>
               <a id="d" class="next">Next</a>"#,
        );
        for (id, expected) in [("#a", true), ("#b", true), ("#c", true), ("#d", false)] {
            let el = doc.select_first(id).expect("selector").expect("element");
            assert_eq!(el.is_disabled(), expected, "{id}");
        }
    }

    #[test]
    fn invalid_selector_is_a_browser_error() {
        let doc = HtmlDocument::parse("<p>hi</p>");
        assert!(matches!(
            doc.select_all("p[["),
            Err(EngineError::Browser(_))
        ));
    }

    #[test]
    fn static_session_follows_links_once() {
        let client = StubClient::new();
        client.set_html(
            "https://example.com/catalog/1/",
            r#"<a rel="next" href="?page=2">Next</a>"#,
        );
        client.set_html(
            "https://example.com/catalog/1/?page=2",
            r#"<a rel="next" href="/catalog/1/">Back</a>"#,
        );
        let mut session = StaticHtmlSession::new(client.clone(), RetryPolicy::immediate(1));
        session
            .navigate("https://example.com/catalog/1/", WaitUntil::NetworkIdle, &mut NoopObserver)
            .expect("navigate");
        assert!(session
            .wait_for_selector(".lot-card", Duration::from_secs(1))
            .is_err());

        let next = session
            .query_selector("a[rel='next']")
            .expect("query")
            .expect("next link");
        session.click(&next).expect("follow page 2");
        assert_eq!(client.request_count("https://example.com/catalog/1/?page=2"), 1);

        let back = session
            .query_selector("a[rel='next']")
            .expect("query")
            .expect("link");
        assert!(session.click(&back).is_err());
    }
}
