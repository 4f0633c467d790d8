//! Fetch → parse pipeline for a single report request.

use std::future::Future;

use thiserror::Error;
use tracing::{debug, error, warn};

use relay_core::error::{InvariantViolation, ParseError};

use crate::fetcher::{fetch_cancellable, Fetch, FetchError};
use crate::parser::{parse_report, ParsedReport, ReportParseFailure};

/// Generic text shown for failures whose details must stay internal.
pub const GENERIC_FAILURE_MESSAGE: &str = "Error: the battle report could not be processed.";

/// Failure of one ingestion run.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Invariant(#[from] InvariantViolation),
}

impl From<ReportParseFailure> for IngestError {
    fn from(failure: ReportParseFailure) -> Self {
        match failure {
            ReportParseFailure::Parse(e) => IngestError::Parse(e),
            ReportParseFailure::Invariant(e) => IngestError::Invariant(e),
        }
    }
}

impl IngestError {
    /// Text that is safe to show to the person who shared the link.
    ///
    /// Only parse errors carry their own wording; everything else collapses
    /// to [`GENERIC_FAILURE_MESSAGE`].
    pub fn user_message(&self) -> &str {
        match self {
            IngestError::Parse(e) => e.message(),
            IngestError::Fetch(_) | IngestError::Invariant(_) => GENERIC_FAILURE_MESSAGE,
        }
    }
}

/// Fetch the report behind `url` and parse it.
///
/// Parsing starts only after the fetch completed; `cancel` aborts the fetch
/// when it resolves first.
pub async fn ingest<C>(
    fetcher: &dyn Fetch,
    url: &str,
    cancel: C,
) -> Result<ParsedReport, IngestError>
where
    C: Future<Output = ()> + Send,
{
    // ── Step 1: Fetch ─────────────────────────────────────────────────────────
    let fetch_start = std::time::Instant::now();
    let raw = fetch_cancellable(fetcher, url, cancel).await.map_err(|e| {
        warn!(error = %e, "battle report fetch failed");
        e
    })?;
    let fetch_time = fetch_start.elapsed().as_secs_f64();

    // ── Step 2: Parse ─────────────────────────────────────────────────────────
    let parse_start = std::time::Instant::now();
    let parsed = parse_report(&raw).map_err(|failure| {
        match &failure {
            ReportParseFailure::Parse(e) => debug!(kind = ?e.kind(), "battle report rejected"),
            ReportParseFailure::Invariant(e) => error!(error = %e, "battle report tallies are inconsistent"),
        }
        failure
    })?;
    let parse_time = parse_start.elapsed().as_secs_f64();

    debug!(
        report_id = %parsed.report_id,
        fetch_time_seconds = fetch_time,
        parse_time_seconds = parse_time,
        "battle report ingested"
    );
    Ok(parsed)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
