//! Report ingestion for the battle-report relay.
//!
//! Fetches raw report pages, parses and anonymizes them into the normalized
//! [`Report`](relay_core::models::Report) model and runs the fetch → parse
//! pipeline for a single request.

pub mod anonymize;
pub mod fetcher;
pub mod ingest;
pub mod parser;

pub use relay_core as core;
