use std::sync::{Arc, LazyLock};
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use indicatif::{ProgressBar, ProgressStyle};
use regex::Regex;
use rusqlite::Connection;
use spider_client::shapes::request::{ReturnFormat, ReturnFormatHandling};
use spider_client::{RequestParams, Spider};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::db::{self, ScrapeRow};
use crate::parser;
use crate::parser::lines::IMAGE_RE;
use crate::settings::Settings;

const BASE_BACKOFF_MS: u64 = 2000;

static THREAD_URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https?://(?:www\.)?(?:twitter|x)\.com/\w+/status(?:es)?/\d+(?:[/?#].*)?$").unwrap()
});
static BLANK_RUN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").unwrap());

/// Scrape stats returned after completion.
pub struct ScrapeStats {
    pub total: usize,
    pub ok: usize,
    pub errors: usize,
}

/// Whether `url` points at a single status on twitter.com or x.com.
pub fn validate_thread_url(url: &str) -> bool {
    THREAD_URL_RE.is_match(url.trim())
}

pub fn extract_thread_id(url: &str) -> Option<String> {
    if validate_thread_url(url) {
        parser::thread_id_from_url(url)
    } else {
        None
    }
}

fn client() -> Result<Spider> {
    let api_key = std::env::var("SPIDER_API_KEY")
        .map_err(|_| anyhow!("SPIDER_API_KEY environment variable must be set"))?;
    Spider::new(Some(api_key)).map_err(|e| anyhow!("Failed to create Spider client: {}", e))
}

/// Result of one fetch, before it is tied to a queue row.
struct Fetched {
    markdown: Option<String>,
    status: Option<i32>,
    error: Option<String>,
    latency_ms: i64,
}

/// Scrape queued threads concurrently, saving each result to DB as it arrives.
pub async fn scrape_pages_streaming(
    conn: &Connection,
    pages: Vec<(i64, String)>,
    settings: &Settings,
) -> Result<ScrapeStats> {
    let spider = Arc::new(client()?);
    let semaphore = Arc::new(Semaphore::new(settings.scrape_concurrency));
    let total = pages.len();

    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec}, eta {eta})")?
            .progress_chars("=> "),
    );

    let (tx, mut rx) = tokio::sync::mpsc::channel::<ScrapeRow>(settings.scrape_concurrency * 2);

    for (thread_row, url) in pages {
        let spider = Arc::clone(&spider);
        let sem = Arc::clone(&semaphore);
        let tx = tx.clone();
        let settings = settings.clone();

        tokio::spawn(async move {
            let Ok(_permit) = sem.acquire().await else {
                return;
            };
            let fetched = scrape_with_retry(&spider, &url, &settings).await;
            let row = ScrapeRow {
                thread_row,
                url,
                markdown: fetched.markdown,
                status: fetched.status,
                error: fetched.error,
                latency_ms: Some(fetched.latency_ms),
            };
            let _ = tx.send(row).await;
        });
    }

    // rx closes once every task has dropped its sender
    drop(tx);

    let mut ok = 0usize;
    let mut errors = 0usize;
    while let Some(row) = rx.recv().await {
        match &row.error {
            Some(e) => {
                warn!("Scrape failed for {}: {}", row.url, e);
                errors += 1;
            }
            None => ok += 1,
        }
        db::save_scrape(conn, &row)?;
        pb.inc(1);
    }

    pb.finish_and_clear();
    info!("Scraped {} threads ({} ok, {} errors)", total, ok, errors);

    Ok(ScrapeStats { total, ok, errors })
}

/// Scrape a single thread URL and return its markdown content.
pub async fn scrape_single_page(url: &str, settings: &Settings) -> Result<String> {
    let spider = client()?;
    let fetched = scrape_with_retry(&spider, url, settings).await;
    if let Some(e) = fetched.error {
        return Err(anyhow!("Spider scrape failed: {}", e));
    }
    fetched
        .markdown
        .ok_or_else(|| anyhow!("No content in spider response"))
}

async fn scrape_with_retry(spider: &Spider, url: &str, settings: &Settings) -> Fetched {
    let timeout = Duration::from_secs(settings.request_timeout_secs);
    let mut attempt = 0;
    loop {
        let fetched = scrape_one(spider, url, timeout).await;
        let retry = fetched.error.as_deref().is_some_and(is_retryable);
        if !retry || attempt >= settings.max_retries {
            return fetched;
        }

        let backoff = Duration::from_millis(BASE_BACKOFF_MS * 2u64.pow(attempt));
        warn!(
            "Transient failure on {} (attempt {}/{}), backing off {:.1}s",
            url,
            attempt + 1,
            settings.max_retries,
            backoff.as_secs_f64()
        );
        tokio::time::sleep(backoff).await;
        attempt += 1;
    }
}

fn is_retryable(error: &str) -> bool {
    let e = error.to_lowercase();
    ["429", "rate", "500", "502", "503", "504", "timed out"]
        .iter()
        .any(|needle| e.contains(needle))
}

async fn scrape_one(spider: &Spider, url: &str, timeout: Duration) -> Fetched {
    let params = RequestParams {
        return_format: Some(ReturnFormatHandling::Single(ReturnFormat::Markdown)),
        ..Default::default()
    };

    let start = Instant::now();
    let response =
        tokio::time::timeout(timeout, spider.scrape_url(url, Some(params), "application/json")).await;
    let latency_ms = start.elapsed().as_millis() as i64;

    let value = match response {
        Ok(Ok(value)) => value,
        Ok(Err(e)) => return Fetched::failed(e.to_string(), latency_ms),
        Err(_) => {
            return Fetched::failed(format!("timed out after {}s", timeout.as_secs()), latency_ms)
        }
    };

    let parsed: serde_json::Value = match value.as_str() {
        Some(s) => serde_json::from_str(s).unwrap_or(value.clone()),
        None => value,
    };
    let first = parsed.as_array().and_then(|arr| arr.first());

    let markdown = first
        .and_then(|obj| obj.get("content"))
        .and_then(|c| c.as_str())
        .map(strip_images);
    let status = first
        .and_then(|obj| obj.get("status"))
        .and_then(|s| s.as_i64())
        .map(|s| s as i32);
    debug!(url, ?status, latency_ms, "spider response");

    // spider reports upstream failures in-band
    let error = match status {
        Some(code) if code >= 400 => Some(format!("upstream status {}", code)),
        _ => None,
    };

    Fetched {
        markdown,
        status,
        error,
        latency_ms,
    }
}

impl Fetched {
    fn failed(error: String, latency_ms: i64) -> Self {
        Fetched {
            markdown: None,
            status: None,
            error: Some(error),
            latency_ms,
        }
    }
}

/// Remove markdown image syntax: ![alt](url) and [![alt](url)](link)
fn strip_images(md: &str) -> String {
    let cleaned = IMAGE_RE.replace_all(md, "");
    BLANK_RUN_RE.replace_all(&cleaned, "\n\n").to_string()
}

// ── Tests ──
