//! In-memory collaborators for unit tests.

use crate::browser::{
    BrowserCookie, BrowserSession, HtmlDocument, ObservedResponse, ResponseObserver,
    StaticElement, WaitUntil,
};
use crate::http::{HttpClient, HttpRequest, HttpResponse};
use crate::{EngineError, Result};
use std::collections::{HashMap, VecDeque};
use std::io::Cursor;
use std::sync::{Arc, Mutex};
use std::time::Duration;

type Handler = dyn Fn(&HttpRequest) -> Option<Result<HttpResponse>> + Send + Sync;

#[derive(Default)]
struct StubState {
    queued: HashMap<String, VecDeque<Result<HttpResponse>>>,
    fixed: HashMap<String, HttpResponse>,
    requests: Vec<HttpRequest>,
}

/// Serves queued responses per URL, then fixed ones, then an optional
/// handler; anything else is a 404.
#[derive(Clone, Default)]
pub struct StubClient {
    state: Arc<Mutex<StubState>>,
    handler: Option<Arc<Handler>>,
}

pub fn ok_response(content_type: &str, body: Vec<u8>) -> HttpResponse {
    HttpResponse {
        status: 200,
        content_type: content_type.to_string(),
        body,
    }
}

impl StubClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_handler<F>(handler: F) -> Self
    where
        F: Fn(&HttpRequest) -> Option<Result<HttpResponse>> + Send + Sync + 'static,
    {
        Self {
            state: Arc::default(),
            handler: Some(Arc::new(handler)),
        }
    }

    fn push(&self, url: &str, response: Result<HttpResponse>) {
        let mut state = self.state.lock().expect("stub lock");
        state
            .queued
            .entry(url.to_string())
            .or_default()
            .push_back(response);
    }

    pub fn push_status(&self, url: &str, status: u16) {
        self.push(
            url,
            Err(EngineError::HttpStatus {
                status,
                url: url.to_string(),
            }),
        );
    }

    pub fn push_html(&self, url: &str, html: &str) {
        self.push(url, Ok(ok_response("text/html", html.as_bytes().to_vec())));
    }

    pub fn set_html(&self, url: &str, html: &str) {
        self.set(url, ok_response("text/html", html.as_bytes().to_vec()));
    }

    pub fn set_bytes(&self, url: &str, content_type: &str, body: Vec<u8>) {
        self.set(url, ok_response(content_type, body));
    }

    fn set(&self, url: &str, response: HttpResponse) {
        let mut state = self.state.lock().expect("stub lock");
        state.fixed.insert(url.to_string(), response);
    }

    pub fn request_count(&self, url: &str) -> usize {
        let state = self.state.lock().expect("stub lock");
        state.requests.iter().filter(|r| r.url == url).count()
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.state.lock().expect("stub lock").requests.clone()
    }
}

impl HttpClient for StubClient {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse> {
        {
            let mut state = self.state.lock().expect("stub lock");
            state.requests.push(request.clone());
            if let Some(next) = state
                .queued
                .get_mut(&request.url)
                .and_then(VecDeque::pop_front)
            {
                return next;
            }
            if let Some(fixed) = state.fixed.get(&request.url) {
                return Ok(fixed.clone());
            }
        }
        if let Some(handler) = &self.handler {
            if let Some(result) = handler(request) {
                return result;
            }
        }
        Err(EngineError::HttpStatus {
            status: 404,
            url: request.url.clone(),
        })
    }
}

pub fn sample_png(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    });
    let mut out = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut out, image::ImageFormat::Png)
        .expect("encode png");
    out.into_inner()
}

/// Scripted page: every scroll reveals the next markup state; clicking an
/// element swaps in the page registered under its `href`.
#[derive(Default)]
pub struct ScriptedSession {
    states: Vec<String>,
    state_index: usize,
    linked_pages: HashMap<String, String>,
    responses: Vec<ObservedResponse>,
    cookies: Vec<BrowserCookie>,
    document: Option<HtmlDocument>,
    pub scrolls: usize,
    pub clicks: usize,
    pub navigations: Vec<String>,
}

impl ScriptedSession {
    pub fn new(states: Vec<&str>) -> Self {
        Self {
            states: states.into_iter().map(str::to_string).collect(),
            ..Self::default()
        }
    }

    pub fn with_linked_page(mut self, href: &str, html: &str) -> Self {
        self.linked_pages.insert(href.to_string(), html.to_string());
        self
    }

    pub fn with_response(mut self, response: ObservedResponse) -> Self {
        self.responses.push(response);
        self
    }

    pub fn with_cookie(mut self, name: &str, value: &str) -> Self {
        self.cookies.push(BrowserCookie {
            name: name.to_string(),
            value: value.to_string(),
            domain: None,
        });
        self
    }

    fn document(&self) -> Result<&HtmlDocument> {
        self.document
            .as_ref()
            .ok_or_else(|| EngineError::Browser("no page loaded".to_string()))
    }
}

impl BrowserSession for ScriptedSession {
    type Element = StaticElement;

    fn navigate(
        &mut self,
        url: &str,
        _wait_until: WaitUntil,
        observer: &mut dyn ResponseObserver,
    ) -> Result<()> {
        self.navigations.push(url.to_string());
        for response in &self.responses {
            observer.observe(response);
        }
        self.state_index = 0;
        let first = self.states.first().cloned().unwrap_or_default();
        self.document = Some(HtmlDocument::parse(&first));
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
        self.clicks += 1;
        let href = element.attr("href").unwrap_or_default();
        let page = self
            .linked_pages
            .get(href)
            .cloned()
            .ok_or_else(|| EngineError::Browser(format!("no scripted page for {href:?}")))?;
        self.document = Some(HtmlDocument::parse(&page));
        Ok(())
    }

    fn scroll_to_bottom(&mut self) -> Result<()> {
        self.scrolls += 1;
        if self.state_index + 1 < self.states.len() {
            self.state_index += 1;
            self.document = Some(HtmlDocument::parse(&self.states[self.state_index]));
        }
        Ok(())
    }

    fn wait(&mut self, _duration: Duration) {}

    fn cookies(&mut self) -> Result<Vec<BrowserCookie>> {
        Ok(self.cookies.clone())
    }
}
