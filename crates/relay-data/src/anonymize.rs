//! Anonymized report identifiers.
//!
//! The id is derived only from content that survives anonymization (aliases,
//! alliance tags, tallies, loot and time), never from the source report id, so
//! it cannot be traced back to the original link and identical content always
//! maps to the same id.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};

use relay_core::models::{Loot, Parties};
use relay_core::tally::ShipTallies;

/// Number of hex characters kept from the digest.
pub const REPORT_ID_LEN: usize = 32;

const ID_SCHEMA: &str = "kb-relay/v1";

#[derive(Serialize)]
struct CanonicalReport<'a> {
    schema: &'static str,
    time: i64,
    parties: &'a Parties,
    tallies: &'a ShipTallies,
    loot: &'a Loot,
}

/// Derive the anonymized report id: lowercase hex, [`REPORT_ID_LEN`] chars.
pub fn report_id(
    time: DateTime<Utc>,
    parties: &Parties,
    tallies: &ShipTallies,
    loot: &Loot,
) -> String {
    let canonical = CanonicalReport {
        schema: ID_SCHEMA,
        time: time.timestamp(),
        parties,
        tallies,
        loot,
    };

    let mut hasher = Sha256::new();
    // Plain structs and integer-keyed maps always serialize.
    hasher.update(serde_json::to_vec(&canonical).unwrap_or_default());
    let mut id = hex::encode(hasher.finalize());
    id.truncate(REPORT_ID_LEN);
    id
}

/// Public link for an anonymized report: plain concatenation of base and id.
pub fn public_report_url(base: &str, report_id: &str) -> String {
    [base, report_id].concat()
}
