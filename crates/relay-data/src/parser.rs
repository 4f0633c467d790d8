//! Battle report parsing and normalization.
//!
//! Accepts either the bare report JSON or a report page that embeds it in a
//! `<script id="kb-data">` element, and produces an anonymized [`Report`] plus
//! the pass-through [`UnitListing`].
//!
//! Only each party's alias and alliance tag are carried over; the source id,
//! coordinates, planet names and any other identity fields are dropped.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, warn};

use relay_core::error::{InvariantViolation, ParseError};
use relay_core::models::{
    Loot, Parties, Party, Planet, Report, ShipClass, Side, Unit, UnitListing,
};
use relay_core::tally::{PhaseTable, ShipTallies, ShipTally};

use crate::anonymize;

/// Report schema versions this parser understands.
const SUPPORTED_VERSIONS: &[u64] = &[1];

/// Military power per point of attack + defense when a cell carries no `mp`.
const MP_PER_POINT: f64 = 1.0 / 200.0;

// Plain-language section names used in user-facing errors.
const SECTION_TIME: &str = "the battle time";
const SECTION_PARTIES: &str = "the parties";
const SECTION_ATTACKER: &str = "the attacker";
const SECTION_DEFENDER: &str = "the defender";
const SECTION_SHIPS: &str = "the fleet overview";
const SECTION_FIGHTING: &str = "the fighting units";
const SECTION_SURVIVING: &str = "the surviving units";
const SECTION_LOOT: &str = "the loot information";
const SECTION_UNITS: &str = "the unit list";

// ── Public types ──────────────────────────────────────────────────────────────

/// Output of [`parse_report`].
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedReport {
    /// Anonymized id, safe to append to a base URL.
    pub report_id: String,
    pub report: Report,
    pub units: UnitListing,
}

/// Why a report could not be parsed.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReportParseFailure {
    /// Malformed or unsupported content; the message is user-safe.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// Structurally valid content with inconsistent tallies.
    #[error(transparent)]
    Invariant(#[from] InvariantViolation),
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Parse raw report content into an anonymized report.
///
/// Deterministic: identical `raw` input always yields the same id and the same
/// report.
pub fn parse_report(raw: &str) -> Result<ParsedReport, ReportParseFailure> {
    let document = extract_document(raw).ok_or_else(ParseError::not_a_report)?;
    let value: Value =
        serde_json::from_str(document).map_err(|_| ParseError::not_a_report())?;
    let root = value.as_object().ok_or_else(ParseError::not_a_report)?;

    check_version(root)?;

    let time = read_time(root)?;
    let parties = read_parties(root)?;
    let (fighting, surviving) = read_ships(root)?;
    let tallies = ShipTallies::from_observed(fighting, surviving)?;
    let loot = read_loot(root)?;
    let units = read_units(root)?;

    let report_id = anonymize::report_id(time, &parties, &tallies, &loot);
    debug!(
        report_id = %report_id,
        units = units.len(),
        "battle report parsed"
    );

    Ok(ParsedReport {
        report: Report::new(report_id.clone(), time, parties, tallies, loot),
        report_id,
        units,
    })
}

// ── Document extraction ───────────────────────────────────────────────────────

/// Locate the JSON document in `raw`: the content itself when it starts with
/// `{`, otherwise the body of the embedded `kb-data` script element.
fn extract_document(raw: &str) -> Option<&str> {
    let trimmed = raw.trim_start_matches('\u{feff}').trim();
    if trimmed.starts_with('{') {
        return Some(trimmed);
    }

    static EMBEDDED: OnceLock<Regex> = OnceLock::new();
    let re = EMBEDDED.get_or_init(|| {
        Regex::new(r#"(?is)<script\b[^>]*\bid\s*=\s*["']kb-data["'][^>]*>(.*?)</script>"#)
            .expect("regex is valid")
    });

    re.captures(trimmed)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
        .filter(|body| body.starts_with('{'))
}

fn check_version(root: &Map<String, Value>) -> Result<(), ParseError> {
    match root.get("version") {
        None | Some(Value::Null) => Ok(()),
        Some(v) => {
            let version = read_number(v, SECTION_PARTIES)
                .map_err(|_| ParseError::unsupported_version())?;
            if version.fract() == 0.0 && SUPPORTED_VERSIONS.contains(&(version as u64)) {
                Ok(())
            } else {
                Err(ParseError::unsupported_version())
            }
        }
    }
}

// ── Sections ──────────────────────────────────────────────────────────────────

fn read_time(root: &Map<String, Value>) -> Result<DateTime<Utc>, ParseError> {
    let value = present(root.get("time")).ok_or_else(|| ParseError::missing_section(SECTION_TIME))?;
    let seconds = read_number(value, SECTION_TIME)?;
    if seconds.fract() != 0.0 || seconds > i64::MAX as f64 {
        return Err(ParseError::invalid_value(SECTION_TIME));
    }
    DateTime::from_timestamp(seconds as i64, 0).ok_or_else(|| ParseError::invalid_value(SECTION_TIME))
}

fn read_parties(root: &Map<String, Value>) -> Result<Parties, ParseError> {
    let parties = object_field(root, "parties", SECTION_PARTIES)?
        .ok_or_else(|| ParseError::missing_section(SECTION_PARTIES))?;

    Ok(Parties {
        attacker: read_party(parties, "attacker", SECTION_ATTACKER)?,
        defender: read_party(parties, "defender", SECTION_DEFENDER)?,
    })
}

fn read_party(
    parties: &Map<String, Value>,
    key: &str,
    section: &'static str,
) -> Result<Party, ParseError> {
    let party =
        object_field(parties, key, section)?.ok_or_else(|| ParseError::missing_section(section))?;
    let planet =
        object_field(party, "planet", section)?.ok_or_else(|| ParseError::missing_section(section))?;

    let alias = match planet.get("user_alias") {
        Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
        Some(Value::String(_)) | None | Some(Value::Null) => {
            return Err(ParseError::missing_section(section))
        }
        Some(_) => return Err(ParseError::invalid_value(section)),
    };

    let alliance = match planet.get("alliance") {
        Some(Value::String(s)) => Some(s.clone()),
        None | Some(Value::Null) => None,
        Some(_) => return Err(ParseError::invalid_value(section)),
    };

    Ok(Party {
        planet: Planet::new(alias, alliance),
    })
}

/// Read the fighting (`ships.g`) and surviving (`ships.result`) tables.
fn read_ships(root: &Map<String, Value>) -> Result<(PhaseTable, PhaseTable), ParseError> {
    let ships = object_field(root, "ships", SECTION_SHIPS)?
        .ok_or_else(|| ParseError::missing_section(SECTION_SHIPS))?;

    let fighting = object_field(ships, "g", SECTION_FIGHTING)?
        .ok_or_else(|| ParseError::missing_section(SECTION_FIGHTING))?;
    let fighting = read_phase_table(fighting, SECTION_FIGHTING)?;

    // No result table means nothing survived.
    let surviving = match object_field(ships, "result", SECTION_SURVIVING)? {
        Some(table) => read_phase_table(table, SECTION_SURVIVING)?,
        None => PhaseTable::new(),
    };

    Ok((fighting, surviving))
}

fn read_phase_table(
    table: &Map<String, Value>,
    section: &'static str,
) -> Result<PhaseTable, ParseError> {
    let mut out = PhaseTable::new();

    for (side_key, classes) in table {
        let Some(side) = Side::from_report_key(side_key) else {
            warn!(section, key = %side_key, "skipping unknown side in battle report");
            continue;
        };

        for (index, cell) in class_cells(classes, section)? {
            let Some(class) = ShipClass::from_report_index(index) else {
                warn!(section, index, "skipping unknown ship class in battle report");
                continue;
            };
            if let Some(tally) = read_cell(cell, section)? {
                out.set(side, class, tally);
            }
        }
    }

    // Side-wide totals must stay representable.
    if Side::ALL.iter().any(|&side| out.side_count(side).is_none()) {
        return Err(ParseError::invalid_number(section));
    }

    Ok(out)
}

/// Class cells keyed by report index, from either an object (`{"1": {...}}`)
/// or an array whose position is the index.
fn class_cells<'a>(
    classes: &'a Value,
    section: &'static str,
) -> Result<Vec<(u64, &'a Value)>, ParseError> {
    match classes {
        Value::Null => Ok(Vec::new()),
        Value::Object(map) => Ok(map
            .iter()
            .filter_map(|(k, v)| match k.trim().parse::<u64>() {
                Ok(index) => Some((index, v)),
                Err(_) => {
                    warn!(section, key = %k, "skipping unknown ship class in battle report");
                    None
                }
            })
            .collect()),
        Value::Array(items) => Ok(items
            .iter()
            .enumerate()
            .map(|(i, v)| (i as u64, v))
            .filter(|(_, v)| !v.is_null())
            .collect()),
        _ => Err(ParseError::invalid_value(section)),
    }
}

/// A single cell; `None` for `null` cells.
fn read_cell(cell: &Value, section: &'static str) -> Result<Option<ShipTally>, ParseError> {
    let map = match cell {
        Value::Null => return Ok(None),
        Value::Object(map) => map,
        _ => return Err(ParseError::invalid_value(section)),
    };

    let count = optional_count(map.get("count"), section)?.unwrap_or(0);
    let attack = optional_number(map.get("at"), section)?.unwrap_or(0.0);
    let defense = optional_number(map.get("de"), section)?.unwrap_or(0.0);
    let military_power = optional_number(map.get("mp"), section)?
        .unwrap_or((attack + defense) * MP_PER_POINT);

    Ok(Some(ShipTally {
        count,
        attack,
        defense,
        military_power,
    }))
}

fn read_loot(root: &Map<String, Value>) -> Result<Loot, ParseError> {
    let loot = object_field(root, "loot", SECTION_LOOT)?
        .ok_or_else(|| ParseError::missing_section(SECTION_LOOT))?;
    let info = object_field(loot, "info", SECTION_LOOT)?
        .ok_or_else(|| ParseError::missing_section(SECTION_LOOT))?;

    let attacker_could_loot = match present(info.get("atter_couldloot")) {
        None => false,
        Some(v) => read_flag(v).ok_or_else(|| ParseError::invalid_value(SECTION_LOOT))?,
    };

    let values = match present(loot.get("values")) {
        None => None,
        Some(Value::Array(items)) => Some(
            items
                .iter()
                .enumerate()
                .map(|(i, v)| -> Result<(u32, f64), ParseError> {
                    Ok((i as u32, read_number(v, SECTION_LOOT)?))
                })
                .collect::<Result<BTreeMap<u32, f64>, ParseError>>()?,
        ),
        Some(Value::Object(map)) => Some(
            map.iter()
                .map(|(k, v)| -> Result<(u32, f64), ParseError> {
                    let index = k
                        .trim()
                        .parse::<u32>()
                        .map_err(|_| ParseError::invalid_value(SECTION_LOOT))?;
                    Ok((index, read_number(v, SECTION_LOOT)?))
                })
                .collect::<Result<BTreeMap<u32, f64>, ParseError>>()?,
        ),
        Some(_) => return Err(ParseError::invalid_value(SECTION_LOOT)),
    };

    Ok(Loot {
        attacker_could_loot,
        values,
    })
}

fn read_units(root: &Map<String, Value>) -> Result<UnitListing, ParseError> {
    let items = match present(root.get("fleets")) {
        None => return Ok(Vec::new()),
        Some(Value::Array(items)) => items,
        Some(_) => return Err(ParseError::invalid_value(SECTION_UNITS)),
    };

    items
        .iter()
        .map(|item| -> Result<Unit, ParseError> {
            let map = item
                .as_object()
                .ok_or_else(|| ParseError::invalid_value(SECTION_UNITS))?;
            let side = map
                .get("side")
                .and_then(Value::as_str)
                .and_then(Side::from_report_key)
                .ok_or_else(|| ParseError::invalid_value(SECTION_UNITS))?;
            let unit_type = match map.get("type") {
                Some(Value::String(s)) => s.clone(),
                _ => String::new(),
            };
            let class = optional_count(map.get("class"), SECTION_UNITS)?
                .and_then(ShipClass::from_report_index);

            Ok(Unit {
                side,
                unit_type,
                class,
                count: optional_count(map.get("count"), SECTION_UNITS)?.unwrap_or(0),
                survived: optional_count(map.get("survived"), SECTION_UNITS)?,
            })
        })
        .collect()
}

// ── Value helpers ─────────────────────────────────────────────────────────────

/// Treat JSON `null` like an absent field.
fn present(value: Option<&Value>) -> Option<&Value> {
    value.filter(|v| !v.is_null())
}

/// An optional object field; wrong types are an invalid entry in `section`.
fn object_field<'a>(
    map: &'a Map<String, Value>,
    key: &str,
    section: &'static str,
) -> Result<Option<&'a Map<String, Value>>, ParseError> {
    match present(map.get(key)) {
        None => Ok(None),
        Some(Value::Object(inner)) => Ok(Some(inner)),
        Some(_) => Err(ParseError::invalid_value(section)),
    }
}

/// Non-negative finite number from a JSON number or numeric string.
///
/// Strings may carry whitespace and `,`/`_` thousands separators.
fn read_number(value: &Value, section: &'static str) -> Result<f64, ParseError> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let cleaned: String = s
                .chars()
                .filter(|c| !c.is_whitespace() && *c != ',' && *c != '_')
                .collect();
            cleaned.parse::<f64>().ok()
        }
        _ => None,
    };

    match parsed {
        Some(n) if n.is_finite() && n >= 0.0 => Ok(n),
        _ => Err(ParseError::invalid_number(section)),
    }
}

fn optional_number(value: Option<&Value>, section: &'static str) -> Result<Option<f64>, ParseError> {
    present(value).map(|v| read_number(v, section)).transpose()
}

fn optional_count(value: Option<&Value>, section: &'static str) -> Result<Option<u64>, ParseError> {
    match optional_number(value, section)? {
        None => Ok(None),
        Some(n) if n.fract() == 0.0 && n <= u64::MAX as f64 => Ok(Some(n as u64)),
        Some(_) => Err(ParseError::invalid_number(section)),
    }
}

fn read_flag(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => match n.as_u64() {
            Some(0) => Some(false),
            Some(1) => Some(true),
            _ => None,
        },
        Value::String(s) => match s.trim() {
            "true" | "1" => Some(true),
            "false" | "0" | "" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use relay_core::error::ParseErrorKind;
    use relay_core::models::Phase;
    use serde_json::json;

    // ── Helpers ───────────────────────────────────────────────────────────────

    fn sample() -> Value {
        json!({
            "version": 1,
            "id": "source-7f3a",
            "time": 1_700_000_000,
            "parties": {
                "attacker": {"planet": {
                    "user_alias": "Raider",
                    "alliance": "ABC",
                    "coords": "12:34:5",
                    "name": "Homeworld",
                    "user_id": 4711
                }},
                "defender": {"planet": {"user_alias": "Miner", "alliance": ""}}
            },
            "ships": {
                "g": {
                    "att": {"1": {"count": 10, "at": 1000, "de": 500}, "3": {"count": 2, "at": "4,000", "de": 6000}},
                    "def": {"5": {"count": 5, "at": 300, "de": 900, "mp": 7.5}}
                },
                "result": {
                    "att": {"1": {"count": 4, "at": 400, "de": 200}, "3": {"count": 2, "at": 4000, "de": 6000}}
                }
            },
            "loot": {"info": {"atter_couldloot": true}, "values": [500, 0]},
            "fleets": [
                {"side": "att", "type": "Interceptor", "class": 1, "count": 10, "survived": 4},
                {"side": "def", "type": "Orbital Gun", "class": 5, "count": 5}
            ]
        })
    }

    fn parse_value(v: &Value) -> Result<ParsedReport, ReportParseFailure> {
        parse_report(&v.to_string())
    }

    fn parse_error(v: &Value) -> ParseError {
        match parse_value(v) {
            Err(ReportParseFailure::Parse(e)) => e,
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    // ── happy path ────────────────────────────────────────────────────────────

    #[test]
    fn test_parse_sample() {
        let parsed = parse_value(&sample()).expect("sample parses");
        let report = &parsed.report;

        assert_eq!(report.time().timestamp(), 1_700_000_000);
        assert_eq!(report.planet(Side::Attacker).tagged_name(), "[ABC] Raider");
        assert_eq!(report.planet(Side::Defender).tagged_name(), "Miner");

        assert_eq!(report.count(Phase::Fighting, Side::Attacker, None), 12);
        assert_eq!(report.attack(Phase::Fighting, Side::Attacker, Some(ShipClass::Heavy)), 4_000.0);
        assert_eq!(report.military_power(Phase::Fighting, Side::Attacker, Some(ShipClass::Light)), 7.5);
        assert_eq!(report.military_power(Phase::Fighting, Side::Defender, Some(ShipClass::Orbital)), 7.5);
        assert_eq!(report.count(Phase::Destroyed, Side::Attacker, Some(ShipClass::Light)), 6);
        assert_eq!(report.count(Phase::Destroyed, Side::Defender, None), 5);

        assert!(report.loot().attacker_could_loot);
        assert_eq!(
            report.loot().values,
            Some(BTreeMap::from([(0, 500.0), (1, 0.0)]))
        );

        assert_eq!(parsed.units.len(), 2);
        assert_eq!(parsed.units[0].side, Side::Attacker);
        assert_eq!(parsed.units[0].class, Some(ShipClass::Light));
        assert_eq!(parsed.units[0].survived, Some(4));
        assert_eq!(parsed.units[1].survived, None);
        assert_eq!(parsed.report_id, report.id());
    }

    #[test]
    fn test_parse_embedded_html() {
        let html = format!(
            "<html><head><title>KB</title></head><body>\n<script type=\"application/json\" id=\"kb-data\">\n{}\n</script></body></html>",
            sample()
        );
        let from_html = parse_report(&html).expect("embedded report parses");
        let from_json = parse_value(&sample()).unwrap();
        assert_eq!(from_html, from_json);
    }

    #[test]
    fn test_report_id_does_not_leak_source_identity() {
        let parsed = parse_value(&sample()).unwrap();

        let serialized = serde_json::to_string(&parsed.report).unwrap();
        assert!(!serialized.contains("source-7f3a"));
        assert!(!serialized.contains("12:34:5"));
        assert!(!serialized.contains("Homeworld"));
        assert!(!serialized.contains("4711"));
    }

    #[test]
    fn test_source_id_does_not_change_report_id() {
        let mut other = sample();
        other["id"] = json!("another-source");
        other["parties"]["attacker"]["planet"]["coords"] = json!("1:1:1");
        assert_eq!(
            parse_value(&sample()).unwrap().report_id,
            parse_value(&other).unwrap().report_id
        );
    }

    // ── zero-fill ─────────────────────────────────────────────────────────────

    #[test]
    fn test_missing_result_means_nothing_survived() {
        let mut doc = sample();
        doc["ships"].as_object_mut().unwrap().remove("result");
        let report = parse_value(&doc).unwrap().report;
        assert_eq!(report.count(Phase::Surviving, Side::Attacker, None), 0);
        assert_eq!(report.count(Phase::Destroyed, Side::Attacker, None), 12);
    }

    #[test]
    fn test_side_that_never_engaged_is_zero() {
        let mut doc = sample();
        doc["ships"]["g"].as_object_mut().unwrap().remove("def");
        let report = parse_value(&doc).unwrap().report;
        for class in ShipClass::ALL {
            assert_eq!(report.military_power(Phase::Fighting, Side::Defender, Some(class)), 0.0);
        }
    }

    #[test]
    fn test_array_class_table() {
        let mut doc = sample();
        doc["ships"]["g"]["def"] = json!([null, {"count": 1, "at": 10, "de": 10}]);
        let report = parse_value(&doc).unwrap().report;
        assert_eq!(report.count(Phase::Fighting, Side::Defender, Some(ShipClass::Light)), 1);
    }

    #[test]
    fn test_unknown_class_is_skipped() {
        let mut doc = sample();
        doc["ships"]["g"]["def"]["9"] = json!({"count": 99, "at": 1, "de": 1});
        let report = parse_value(&doc).unwrap().report;
        assert_eq!(report.count(Phase::Fighting, Side::Defender, None), 5);
    }

    #[test]
    fn test_loot_values_object_and_absent() {
        let mut doc = sample();
        doc["loot"]["values"] = json!({"2": "1,500", "0": 7});
        let loot = parse_value(&doc).unwrap().report.loot().clone();
        assert_eq!(loot.values, Some(BTreeMap::from([(0, 7.0), (2, 1_500.0)])));

        doc["loot"].as_object_mut().unwrap().remove("values");
        let loot = parse_value(&doc).unwrap().report.loot().clone();
        assert!(loot.attacker_could_loot);
        assert!(loot.values.is_none());
    }

    // ── failures ──────────────────────────────────────────────────────────────

    #[test]
    fn test_not_a_report() {
        let err = match parse_report("<html><body>Login required</body></html>") {
            Err(ReportParseFailure::Parse(e)) => e,
            other => panic!("unexpected {other:?}"),
        };
        assert_eq!(err.kind(), ParseErrorKind::NotAReport);

        assert!(matches!(
            parse_report("{ broken json"),
            Err(ReportParseFailure::Parse(_))
        ));
    }

    #[test]
    fn test_unsupported_version() {
        let mut doc = sample();
        doc["version"] = json!(2);
        assert_eq!(parse_error(&doc).kind(), ParseErrorKind::UnsupportedVersion);
    }

    #[test]
    fn test_missing_required_sections() {
        for key in ["time", "parties", "ships", "loot"] {
            let mut doc = sample();
            doc.as_object_mut().unwrap().remove(key);
            assert_eq!(
                parse_error(&doc).kind(),
                ParseErrorKind::MissingSection,
                "removing {key}"
            );
        }

        let mut doc = sample();
        doc["parties"]["defender"]["planet"]
            .as_object_mut()
            .unwrap()
            .remove("user_alias");
        assert_eq!(
            parse_error(&doc).message(),
            "The battle report is incomplete: the defender is missing."
        );
    }

    #[test]
    fn test_unreadable_number() {
        let mut doc = sample();
        doc["ships"]["g"]["att"]["1"]["at"] = json!("lots");
        let err = parse_error(&doc);
        assert_eq!(err.kind(), ParseErrorKind::InvalidNumber);
        assert!(!err.message().contains("lots"));
    }

    #[test]
    fn test_negative_number_rejected() {
        let mut doc = sample();
        doc["ships"]["g"]["att"]["1"]["count"] = json!(-3);
        assert_eq!(parse_error(&doc).kind(), ParseErrorKind::InvalidNumber);
    }

    #[test]
    fn test_surviving_more_than_fighting_is_invariant_failure() {
        let mut doc = sample();
        doc["ships"]["result"]["att"]["1"]["count"] = json!(50);
        assert!(matches!(
            parse_value(&doc),
            Err(ReportParseFailure::Invariant(_))
        ));
    }

    #[test]
    fn test_unit_without_side_rejected() {
        let mut doc = sample();
        doc["fleets"] = json!([{"type": "Ghost", "count": 1}]);
        assert_eq!(parse_error(&doc).kind(), ParseErrorKind::InvalidValue);
    }

    // ── helpers ───────────────────────────────────────────────────────────────

    #[test]
    fn test_read_flag_variants() {
        assert_eq!(read_flag(&json!(true)), Some(true));
        assert_eq!(read_flag(&json!(0)), Some(false));
        assert_eq!(read_flag(&json!("1")), Some(true));
        assert_eq!(read_flag(&json!("maybe")), None);
    }

    #[test]
    fn test_read_number_strips_separators() {
        assert_eq!(read_number(&json!(" 1_234,5 "), SECTION_SHIPS).unwrap(), 12_345.0);
        assert!(read_number(&json!(null), SECTION_SHIPS).is_err());
    }
}
