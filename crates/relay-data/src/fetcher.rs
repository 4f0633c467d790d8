//! Retrieval of raw battle-report pages.
//!
//! One attempt per call, no retries. The HTTP implementation enforces a
//! per-request timeout and [`fetch_cancellable`] lets callers abandon an
//! in-flight request cooperatively.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, warn};

/// Default time allowed for a report fetch, body included.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(15);

const USER_AGENT: &str = concat!("kb-relay/", env!("CARGO_PKG_VERSION"));

// ── Errors ────────────────────────────────────────────────────────────────────

/// Transport-level failures. Not meant for end users: the text may contain
/// transport internals.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("invalid report url: {0}")]
    InvalidUrl(String),

    #[error("report fetch timed out after {0:?}")]
    Timeout(Duration),

    #[error("report host answered with status {0}")]
    Status(u16),

    #[error("report fetch failed: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("report fetch was cancelled")]
    Cancelled,
}

// ── Fetch ─────────────────────────────────────────────────────────────────────

/// Source of raw report content.
#[async_trait]
pub trait Fetch: Send + Sync {
    /// Retrieve the raw content behind `url` in a single attempt.
    async fn fetch(&self, url: &str) -> Result<String, FetchError>;
}

/// Race `fetcher.fetch(url)` against `cancel`; whichever finishes first wins.
pub async fn fetch_cancellable<C>(
    fetcher: &dyn Fetch,
    url: &str,
    cancel: C,
) -> Result<String, FetchError>
where
    C: Future<Output = ()> + Send,
{
    tokio::select! {
        result = fetcher.fetch(url) => result,
        _ = cancel => {
            debug!(url, "report fetch cancelled by caller");
            Err(FetchError::Cancelled)
        }
    }
}

// ── HttpFetcher ───────────────────────────────────────────────────────────────

/// [`Fetch`] over HTTP(S) with a shared connection pool.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(FetchError::Transport)?;
        Ok(Self { client, timeout })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn get_text(&self, url: reqwest::Url) -> Result<String, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), "report host returned non-success status");
            return Err(FetchError::Status(status.as_u16()));
        }

        response.text().await.map_err(|e| self.classify(e))
    }

    fn classify(&self, err: reqwest::Error) -> FetchError {
        if err.is_timeout() {
            FetchError::Timeout(self.timeout)
        } else {
            FetchError::Transport(err)
        }
    }
}

#[async_trait]
impl Fetch for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let url = parse_report_url(url)?;
        debug!(%url, timeout = ?self.timeout, "fetching battle report");

        let started = std::time::Instant::now();
        let body = tokio::time::timeout(self.timeout, self.get_text(url))
            .await
            .map_err(|_| FetchError::Timeout(self.timeout))??;

        debug!(
            bytes = body.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "battle report fetched"
        );
        Ok(body)
    }
}

/// Accept only syntactically valid `http`/`https` URLs.
fn parse_report_url(url: &str) -> Result<reqwest::Url, FetchError> {
    let parsed =
        reqwest::Url::parse(url.trim()).map_err(|_| FetchError::InvalidUrl(url.to_string()))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        _ => Err(FetchError::InvalidUrl(url.to_string())),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
