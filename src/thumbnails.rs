//! Thumbnail acquisition: fetch each lot's detail page, pick its image,
//! download it and store a small WebP copy.

use crate::http::{fetch_with_retry, redact_url_for_log, HttpClient, HttpRequest, RetryPolicy};
use crate::image_resolver::resolve_image_url;
use crate::listing::Listing;
use crate::paths::{is_cached_file, OutputPaths};
use crate::{EngineError, Result};
use image::imageops::FilterType;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;
use url::Url;

pub const MAX_WORKERS: usize = 64;
const PROGRESS_EVERY: usize = 25;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    Downloaded,
    Skipped,
    Failed,
}

impl OutcomeStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            OutcomeStatus::Downloaded => "downloaded",
            OutcomeStatus::Skipped => "skipped",
            OutcomeStatus::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AcquisitionOutcome {
    pub lot_id: String,
    pub lot_url: String,
    pub status: OutcomeStatus,
    pub reason: String,
    pub image_url: Option<String>,
    pub saved_path: Option<PathBuf>,
}

impl AcquisitionOutcome {
    fn new(listing: &Listing, status: OutcomeStatus, reason: impl Into<String>) -> Self {
        Self {
            lot_id: listing.lot_id.trim().to_string(),
            lot_url: listing.lot_url.trim().to_string(),
            status,
            reason: reason.into(),
            image_url: None,
            saved_path: None,
        }
    }

    fn skipped(listing: &Listing, reason: impl Into<String>) -> Self {
        Self::new(listing, OutcomeStatus::Skipped, reason)
    }

    fn failed(listing: &Listing, reason: impl Into<String>) -> Self {
        Self::new(listing, OutcomeStatus::Failed, reason)
    }

    fn with_image_url(mut self, url: &str) -> Self {
        self.image_url = Some(url.to_string());
        self
    }

    fn with_saved_path(mut self, path: &Path) -> Self {
        self.saved_path = Some(path.to_path_buf());
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThumbnailSummary {
    pub total: usize,
    pub downloaded: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl ThumbnailSummary {
    pub fn completed(&self) -> usize {
        self.downloaded + self.skipped + self.failed
    }

    fn record(&mut self, status: OutcomeStatus) {
        match status {
            OutcomeStatus::Downloaded => self.downloaded += 1,
            OutcomeStatus::Skipped => self.skipped += 1,
            OutcomeStatus::Failed => self.failed += 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThumbnailOptions {
    pub workers: usize,
    pub max_edge: u32,
    pub quality: u8,
    /// Pause before each detail-page fetch.
    pub request_pacing_ms: u64,
}

impl Default for ThumbnailOptions {
    fn default() -> Self {
        Self {
            workers: 6,
            max_edge: 320,
            quality: 70,
            request_pacing_ms: 100,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ThumbnailRequest {
    pub auction_id: String,
    pub output_root: PathBuf,
    pub options: ThumbnailOptions,
    pub retry: RetryPolicy,
    pub manifest_path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct ThumbnailReport {
    pub summary: ThumbnailSummary,
    /// One entry per input listing, in input order.
    pub outcomes: Vec<AcquisitionOutcome>,
}

/// Decodes `bytes`, drops alpha, shrinks to fit `max_edge` square (never
/// enlarging) and encodes lossy WebP.
pub fn normalize_thumbnail(bytes: &[u8], max_edge: u32, quality: u8) -> Result<Vec<u8>> {
    let decoded = image::load_from_memory(bytes)
        .map_err(|err| EngineError::ImageProcessing(format!("decode failed: {err}")))?;
    let fitted = if decoded.width() > max_edge || decoded.height() > max_edge {
        decoded.resize(max_edge, max_edge, FilterType::Lanczos3)
    } else {
        decoded
    };
    let rgb = fitted.to_rgb8();
    let encoded = webp::Encoder::from_rgb(rgb.as_raw(), rgb.width(), rgb.height())
        .encode_simple(false, f32::from(quality))
        .map_err(|err| EngineError::ImageProcessing(format!("webp encode failed: {err:?}")))?;
    Ok(encoded.to_vec())
}

/// Writes through a temp file in the target directory, then renames.
pub fn write_atomically(target: &Path, bytes: &[u8]) -> Result<()> {
    let parent = target
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent)?;
    let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(target).map_err(|err| EngineError::Io(err.error))?;
    Ok(())
}

fn processing_reason(err: &EngineError) -> String {
    match err {
        EngineError::ImageProcessing(detail) => format!("image processing failed: {detail}"),
        other => format!("image processing failed: {other}"),
    }
}

/// Produces the outcome for one listing. Never returns an error: every
/// failure becomes a `failed` outcome with a short reason.
pub fn acquire_thumbnail<C: HttpClient + ?Sized>(
    client: &C,
    listing: &Listing,
    auction_id: &str,
    paths: &OutputPaths,
    options: &ThumbnailOptions,
    retry: &RetryPolicy,
) -> AcquisitionOutcome {
    let lot_id = listing.lot_id.trim();
    let lot_url = listing.lot_url.trim();
    if lot_id.is_empty() || lot_url.is_empty() {
        return AcquisitionOutcome::skipped(listing, "missing lot_id or lot_url");
    }

    let target = paths.thumbnail_path(auction_id, lot_id);
    if is_cached_file(&target) {
        return AcquisitionOutcome::skipped(listing, "already exists").with_saved_path(&target);
    }

    if options.request_pacing_ms > 0 {
        thread::sleep(Duration::from_millis(options.request_pacing_ms));
    }

    let page_url = match Url::parse(lot_url) {
        Ok(url) => url,
        Err(err) => {
            tracing::warn!(lot_id, error = %err, "thumbnail_lot_url_invalid");
            return AcquisitionOutcome::failed(listing, "html fetch failed");
        }
    };
    let page_request =
        HttpRequest::get(page_url.as_str()).header("Accept", "text/html,application/xhtml+xml");
    let html = match fetch_with_retry(client, &page_request, retry, "lot_html_fetch") {
        Ok(response) if response.body.is_empty() => {
            tracing::warn!(lot_id, url = %redact_url_for_log(lot_url), "thumbnail_html_empty");
            return AcquisitionOutcome::failed(listing, "html fetch failed");
        }
        Ok(response) => response.text(),
        Err(err) => {
            tracing::warn!(
                lot_id,
                url = %redact_url_for_log(lot_url),
                error = %err,
                "thumbnail_html_fetch_failed"
            );
            return AcquisitionOutcome::failed(listing, "html fetch failed");
        }
    };

    // Candidates resolve against the detail page's origin, not its path.
    let Some(image_url) = page_url
        .join("/")
        .ok()
        .and_then(|origin| resolve_image_url(&html, &origin))
    else {
        return AcquisitionOutcome::failed(listing, "no image candidate");
    };

    let bytes = match fetch_with_retry(client, &HttpRequest::get(&image_url), retry, "image_download") {
        Ok(response) if response.body.is_empty() => {
            tracing::warn!(lot_id, url = %redact_url_for_log(&image_url), "thumbnail_image_empty");
            return AcquisitionOutcome::failed(listing, "image download failed")
                .with_image_url(&image_url);
        }
        Ok(response) => response.body,
        Err(err) => {
            tracing::warn!(
                lot_id,
                url = %redact_url_for_log(&image_url),
                error = %err,
                "thumbnail_image_download_failed"
            );
            return AcquisitionOutcome::failed(listing, "image download failed")
                .with_image_url(&image_url);
        }
    };

    let stored = normalize_thumbnail(&bytes, options.max_edge, options.quality)
        .and_then(|encoded| write_atomically(&target, &encoded));
    if let Err(err) = stored {
        return AcquisitionOutcome::failed(listing, processing_reason(&err))
            .with_image_url(&image_url);
    }

    AcquisitionOutcome::new(listing, OutcomeStatus::Downloaded, "ok")
        .with_image_url(&image_url)
        .with_saved_path(&target)
}

#[derive(Serialize)]
struct ManifestRow<'a> {
    lot_id: &'a str,
    lot_url: &'a str,
    status: &'a str,
    reason: &'a str,
    image_url: &'a str,
    saved_path: String,
}

fn open_manifest(path: &Path) -> Result<csv::Writer<std::fs::File>> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    Ok(csv::Writer::from_path(path)?)
}

/// Coordinator-side state. Workers only send outcomes; counting happens here.
struct BatchTally<'a> {
    auction_id: &'a str,
    summary: ThumbnailSummary,
    outcomes: Vec<Option<AcquisitionOutcome>>,
    manifest: Option<csv::Writer<std::fs::File>>,
}

impl BatchTally<'_> {
    fn record<F>(&mut self, index: usize, outcome: AcquisitionOutcome, on_progress: &mut F) -> Result<()>
    where
        F: FnMut(&ThumbnailSummary) -> Result<()>,
    {
        self.summary.record(outcome.status);
        if let Some(writer) = self.manifest.as_mut() {
            writer.serialize(ManifestRow {
                lot_id: &outcome.lot_id,
                lot_url: &outcome.lot_url,
                status: outcome.status.as_str(),
                reason: &outcome.reason,
                image_url: outcome.image_url.as_deref().unwrap_or(""),
                saved_path: outcome
                    .saved_path
                    .as_ref()
                    .map(|p| p.to_string_lossy().to_string())
                    .unwrap_or_default(),
            })?;
        }
        if outcome.status == OutcomeStatus::Failed {
            tracing::debug!(
                auction_id = self.auction_id,
                lot_id = %outcome.lot_id,
                reason = %outcome.reason,
                "thumbnail_failed"
            );
        }
        if let Some(slot) = self.outcomes.get_mut(index) {
            *slot = Some(outcome);
        }

        let completed = self.summary.completed();
        if completed % PROGRESS_EVERY == 0 || completed == self.summary.total {
            tracing::info!(
                auction_id = self.auction_id,
                completed,
                total = self.summary.total,
                downloaded = self.summary.downloaded,
                skipped = self.summary.skipped,
                failed = self.summary.failed,
                "thumbnail_progress"
            );
        }
        on_progress(&self.summary)
    }
}

/// Runs the pipeline over `listings` with at most `options.workers` lots in
/// flight. Each worker builds its own client through `make_client`.
/// `should_cancel` is polled before every dispatch; once it reports true,
/// in-flight lots finish and the rest are recorded as skipped. Only output
/// directory, manifest and callback errors reach the caller.
pub fn run_thumbnail_batch<C, FMakeClient, FShouldCancel, FProgress>(
    request: &ThumbnailRequest,
    listings: &[Listing],
    make_client: FMakeClient,
    mut should_cancel: FShouldCancel,
    mut on_progress: FProgress,
) -> Result<ThumbnailReport>
where
    C: HttpClient,
    FMakeClient: Fn() -> C + Sync,
    FShouldCancel: FnMut() -> Result<bool>,
    FProgress: FnMut(&ThumbnailSummary) -> Result<()>,
{
    std::fs::create_dir_all(&request.output_root)?;
    let paths = OutputPaths::new(&request.output_root);
    let manifest = match &request.manifest_path {
        Some(path) => Some(open_manifest(path)?),
        None => None,
    };

    let total = listings.len();
    let workers = request.options.workers.clamp(1, MAX_WORKERS);
    let auction_id = request.auction_id.as_str();
    let mut tally = BatchTally {
        auction_id,
        summary: ThumbnailSummary {
            total,
            ..ThumbnailSummary::default()
        },
        outcomes: (0..total).map(|_| None).collect(),
        manifest,
    };

    tracing::info!(auction_id, total, workers, "thumbnail_batch_started");

    let (tx, rx) = mpsc::channel::<(usize, AcquisitionOutcome)>();
    thread::scope(|scope| -> Result<()> {
        let mut next = 0_usize;
        let mut in_flight = 0_usize;
        let mut canceled = false;
        loop {
            while !canceled && in_flight < workers && next < total {
                if should_cancel()? {
                    tracing::warn!(auction_id, dispatched = next, total, "thumbnail_batch_canceled");
                    canceled = true;
                    break;
                }
                let index = next;
                let listing = &listings[index];
                let tx = tx.clone();
                let make_client = &make_client;
                let paths = &paths;
                scope.spawn(move || {
                    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                        let client = make_client();
                        acquire_thumbnail(
                            &client,
                            listing,
                            &request.auction_id,
                            paths,
                            &request.options,
                            &request.retry,
                        )
                    }))
                    .unwrap_or_else(|_| AcquisitionOutcome::failed(listing, "worker panicked"));
                    let _ = tx.send((index, outcome));
                });
                next += 1;
                in_flight += 1;
            }

            if in_flight == 0 {
                break;
            }
            let Ok((index, outcome)) = rx.recv() else {
                break;
            };
            in_flight -= 1;
            tally.record(index, outcome, &mut on_progress)?;
        }
        Ok(())
    })?;

    for index in 0..total {
        if tally.outcomes[index].is_none() {
            let outcome = AcquisitionOutcome::skipped(&listings[index], "canceled");
            tally.record(index, outcome, &mut on_progress)?;
        }
    }

    let BatchTally {
        summary,
        outcomes,
        manifest,
        ..
    } = tally;
    if let Some(mut writer) = manifest {
        writer.flush()?;
    }

    tracing::info!(
        auction_id,
        total = summary.total,
        downloaded = summary.downloaded,
        skipped = summary.skipped,
        failed = summary.failed,
        "thumbnail_batch_complete"
    );
    Ok(ThumbnailReport {
        summary,
        outcomes: outcomes.into_iter().flatten().collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{sample_png, StubClient};

    const DETAIL: &str = "https://site.example/lot/1";
    const IMAGE: &str = "https://cdn.example/1.png";

    fn listing(lot_id: &str, lot_url: &str) -> Listing {
        Listing {
            auction_id: "4821".to_string(),
            lot_id: lot_id.to_string(),
            lot_url: lot_url.to_string(),
            ..Listing::default()
        }
    }

    fn fast_options() -> ThumbnailOptions {
        ThumbnailOptions {
            request_pacing_ms: 0,
            ..ThumbnailOptions::default()
        }
    }

    fn request(root: &Path) -> ThumbnailRequest {
        ThumbnailRequest {
            auction_id: "4821".to_string(),
            output_root: root.to_path_buf(),
            options: fast_options(),
            retry: RetryPolicy::immediate(3),
            manifest_path: None,
        }
    }

    fn serving_client() -> StubClient {
        let client = StubClient::new();
        client.set_html(DETAIL, &format!(r#"<meta property="og:image" content="{IMAGE}">"#));
        client.set_bytes(IMAGE, "image/png", sample_png(800, 400));
        client
    }

    #[test]
    fn normalizes_to_bounded_webp() {
        let encoded = normalize_thumbnail(&sample_png(800, 400), 320, 70).expect("normalize");
        assert_eq!(&encoded[0..4], b"RIFF");
        assert_eq!(&encoded[8..12], b"WEBP");
        let decoded = image::load_from_memory(&encoded).expect("decode webp");
        assert_eq!((decoded.width(), decoded.height()), (320, 160));
    }

    #[test]
    fn small_images_are_not_enlarged() {
        let encoded = normalize_thumbnail(&sample_png(40, 30), 320, 70).expect("normalize");
        let decoded = image::load_from_memory(&encoded).expect("decode webp");
        assert_eq!((decoded.width(), decoded.height()), (40, 30));
    }

    #[test]
    fn undecodable_bytes_are_a_processing_error() {
        let err = normalize_thumbnail(b"not an image", 320, 70).expect_err("garbage");
        assert!(matches!(err, EngineError::ImageProcessing(_)));
    }

    #[test]
    fn acquires_and_then_skips_cached_thumbnail() {
        let dir = tempfile::tempdir().expect("tempdir");
        let paths = OutputPaths::new(dir.path());
        let client = serving_client();
        let lot = listing("1", DETAIL);
        let retry = RetryPolicy::immediate(3);

        let first = acquire_thumbnail(&client, &lot, "4821", &paths, &fast_options(), &retry);
        assert_eq!(first.status, OutcomeStatus::Downloaded);
        assert_eq!(first.reason, "ok");
        assert_eq!(first.image_url.as_deref(), Some(IMAGE));
        let target = dir.path().join("img").join("4821").join("1.webp");
        assert_eq!(first.saved_path.as_deref(), Some(target.as_path()));
        assert!(is_cached_file(&target));

        let second = acquire_thumbnail(&client, &lot, "4821", &paths, &fast_options(), &retry);
        assert_eq!(second.status, OutcomeStatus::Skipped);
        assert_eq!(second.reason, "already exists");
        assert_eq!(client.request_count(DETAIL), 1);
    }

    #[test]
    fn failure_reasons_per_stage() {
        let dir = tempfile::tempdir().expect("tempdir");
        let paths = OutputPaths::new(dir.path());
        let retry = RetryPolicy::immediate(3);
        let options = fast_options();

        let client = StubClient::new();
        let missing = acquire_thumbnail(&client, &listing("", DETAIL), "1", &paths, &options, &retry);
        assert_eq!(missing.reason, "missing lot_id or lot_url");
        assert_eq!(missing.status, OutcomeStatus::Skipped);

        for _ in 0..3 {
            client.push_status(DETAIL, 503);
        }
        let html = acquire_thumbnail(&client, &listing("1", DETAIL), "1", &paths, &options, &retry);
        assert_eq!((html.status, html.reason.as_str()), (OutcomeStatus::Failed, "html fetch failed"));
        assert_eq!(client.request_count(DETAIL), 3);

        client.set_html(DETAIL, "<p>no pictures</p>");
        let none = acquire_thumbnail(&client, &listing("1", DETAIL), "1", &paths, &options, &retry);
        assert_eq!(none.reason, "no image candidate");

        client.set_html(DETAIL, r#"<img src="/gone.jpg">"#);
        let download = acquire_thumbnail(&client, &listing("1", DETAIL), "1", &paths, &options, &retry);
        assert_eq!(download.reason, "image download failed");
        assert_eq!(download.image_url.as_deref(), Some("https://site.example/gone.jpg"));

        client.set_html(DETAIL, r#"<img src="/bad.jpg">"#);
        client.set_bytes("https://site.example/bad.jpg", "image/jpeg", b"garbage".to_vec());
        let processing =
            acquire_thumbnail(&client, &listing("1", DETAIL), "1", &paths, &options, &retry);
        assert_eq!(processing.status, OutcomeStatus::Failed);
        assert!(processing.reason.starts_with("image processing failed: "));
        assert!(!paths.thumbnail_path("1", "1").exists());
    }

    #[test]
    fn empty_bodies_fail_at_the_fetching_stage() {
        let dir = tempfile::tempdir().expect("tempdir");
        let paths = OutputPaths::new(dir.path());
        let retry = RetryPolicy::immediate(1);
        let options = fast_options();
        let client = StubClient::new();

        client.set_html(DETAIL, "");
        let html = acquire_thumbnail(&client, &listing("1", DETAIL), "1", &paths, &options, &retry);
        assert_eq!((html.status, html.reason.as_str()), (OutcomeStatus::Failed, "html fetch failed"));

        client.set_html(DETAIL, r#"<img src="/empty.jpg">"#);
        client.set_bytes("https://site.example/empty.jpg", "image/jpeg", Vec::new());
        let image = acquire_thumbnail(&client, &listing("1", DETAIL), "1", &paths, &options, &retry);
        assert_eq!(image.reason, "image download failed");
        assert_eq!(image.image_url.as_deref(), Some("https://site.example/empty.jpg"));
        assert!(!paths.thumbnail_path("1", "1").exists());
    }

    #[test]
    fn relative_candidates_resolve_against_page_origin() {
        let dir = tempfile::tempdir().expect("tempdir");
        let paths = OutputPaths::new(dir.path());
        let detail = "https://site.example/lot/12/detail";
        let client = StubClient::new();
        client.set_html(detail, r#"<img src="pics/1.jpg">"#);
        client.set_bytes("https://site.example/pics/1.jpg", "image/png", sample_png(64, 48));

        let outcome = acquire_thumbnail(
            &client,
            &listing("12", detail),
            "4821",
            &paths,
            &fast_options(),
            &RetryPolicy::immediate(1),
        );
        assert_eq!(outcome.status, OutcomeStatus::Downloaded);
        assert_eq!(outcome.image_url.as_deref(), Some("https://site.example/pics/1.jpg"));
        assert_eq!(client.request_count("https://site.example/lot/12/pics/1.jpg"), 0);
    }

    #[test]
    fn batch_counts_every_listing_once_and_writes_manifest() {
        let dir = tempfile::tempdir().expect("tempdir");
        let client = serving_client();
        let manifest = dir.path().join("manifest.csv");
        let mut req = request(dir.path());
        req.manifest_path = Some(manifest.clone());
        req.options.workers = 3;

        let listings = vec![
            listing("1", DETAIL),
            listing("", DETAIL),
            listing("2", "https://site.example/lot/missing"),
            listing("3", ""),
        ];
        let mut progress_calls = 0;
        let report = run_thumbnail_batch(
            &req,
            &listings,
            || client.clone(),
            || Ok(false),
            |_| {
                progress_calls += 1;
                Ok(())
            },
        )
        .expect("batch");

        assert_eq!(
            report.summary,
            ThumbnailSummary {
                total: 4,
                downloaded: 1,
                skipped: 2,
                failed: 1
            }
        );
        assert_eq!(progress_calls, 4);
        let ids: Vec<&str> = report.outcomes.iter().map(|o| o.lot_id.as_str()).collect();
        assert_eq!(ids, vec!["1", "", "2", "3"]);

        let mut reader = csv::Reader::from_path(&manifest).expect("manifest");
        let headers = reader.headers().expect("headers").clone();
        assert_eq!(
            headers.iter().collect::<Vec<_>>(),
            vec!["lot_id", "lot_url", "status", "reason", "image_url", "saved_path"]
        );
        assert_eq!(reader.records().count(), 4);
    }

    #[test]
    fn cancellation_skips_undispatched_listings() {
        let dir = tempfile::tempdir().expect("tempdir");
        let client = serving_client();
        let mut req = request(dir.path());
        req.options.workers = 1;
        let listings: Vec<Listing> = (0..5).map(|i| listing(&i.to_string(), "")).collect();

        let mut polls = 0;
        let report = run_thumbnail_batch(
            &req,
            &listings,
            || client.clone(),
            || {
                polls += 1;
                Ok(polls > 2)
            },
            |_| Ok(()),
        )
        .expect("batch");

        assert_eq!(report.summary.total, 5);
        assert_eq!(report.summary.skipped, 5);
        let canceled = report
            .outcomes
            .iter()
            .filter(|o| o.reason == "canceled")
            .count();
        assert_eq!(canceled, 3);
        assert_eq!(report.outcomes.len(), 5);
    }

    #[test]
    fn panicking_client_becomes_failed_outcome() {
        struct PanickingClient;
        impl HttpClient for PanickingClient {
            fn execute(&self, _request: &HttpRequest) -> Result<crate::http::HttpResponse> {
                panic!("boom");
            }
        }

        let dir = tempfile::tempdir().expect("tempdir");
        let req = request(dir.path());
        let listings = vec![listing("1", DETAIL), listing("2", DETAIL)];
        let report = run_thumbnail_batch(&req, &listings, || PanickingClient, || Ok(false), |_| Ok(()))
            .expect("batch");
        assert_eq!(report.summary.failed, 2);
        assert!(report.outcomes.iter().all(|o| o.reason == "worker panicked"));
    }
}
