use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::tally::{ShipTallies, ShipTally};

// ── Dimensions ────────────────────────────────────────────────────────────────

/// Point in the combat timeline a tally refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Units that entered the battle.
    Fighting,
    /// Units that remained after the battle.
    Surviving,
    /// `fighting − surviving`.
    Destroyed,
}

impl Phase {
    pub const ALL: [Phase; 3] = [Phase::Fighting, Phase::Surviving, Phase::Destroyed];

    pub(crate) fn index(self) -> usize {
        match self {
            Phase::Fighting => 0,
            Phase::Surviving => 1,
            Phase::Destroyed => 2,
        }
    }
}

/// One of the two parties of a battle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Attacker,
    Defender,
}

impl Side {
    pub const ALL: [Side; 2] = [Side::Attacker, Side::Defender];

    pub(crate) fn index(self) -> usize {
        match self {
            Side::Attacker => 0,
            Side::Defender => 1,
        }
    }

    /// Parse the short side keys used by battle reports (`att` / `def`).
    pub fn from_report_key(key: &str) -> Option<Side> {
        match key {
            "att" | "attacker" => Some(Side::Attacker),
            "def" | "defender" => Some(Side::Defender),
            _ => None,
        }
    }

    /// Capitalised label used in summaries.
    pub fn label(self) -> &'static str {
        match self {
            Side::Attacker => "Attacker",
            Side::Defender => "Defender",
        }
    }
}

/// Unit category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShipClass {
    Light,
    Medium,
    Heavy,
    Tactical,
    Orbital,
}

impl ShipClass {
    pub const ALL: [ShipClass; 5] = [
        ShipClass::Light,
        ShipClass::Medium,
        ShipClass::Heavy,
        ShipClass::Tactical,
        ShipClass::Orbital,
    ];

    pub(crate) fn index(self) -> usize {
        match self {
            ShipClass::Light => 0,
            ShipClass::Medium => 1,
            ShipClass::Heavy => 2,
            ShipClass::Tactical => 3,
            ShipClass::Orbital => 4,
        }
    }

    /// Map the 1-based class index used in battle reports.
    ///
    /// `1=light, 2=medium, 3=heavy, 4=tactical, 5=orbital`.
    pub fn from_report_index(index: u64) -> Option<ShipClass> {
        match index {
            1 => Some(ShipClass::Light),
            2 => Some(ShipClass::Medium),
            3 => Some(ShipClass::Heavy),
            4 => Some(ShipClass::Tactical),
            5 => Some(ShipClass::Orbital),
            _ => None,
        }
    }

    /// Single-letter row label used on charts.
    pub fn short_label(self) -> &'static str {
        match self {
            ShipClass::Light => "L",
            ShipClass::Medium => "M",
            ShipClass::Heavy => "H",
            ShipClass::Tactical => "T",
            ShipClass::Orbital => "O",
        }
    }
}

// ── Parties ───────────────────────────────────────────────────────────────────

/// Anonymized identity of a party's planet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Planet {
    /// Player alias as exposed by the report.
    pub display_name: String,
    /// Alliance tag without brackets, `None` when the player has no alliance.
    pub alliance_tag: Option<String>,
}

impl Planet {
    /// Build a planet, normalising blank alliance tags to `None`.
    pub fn new(display_name: impl Into<String>, alliance_tag: Option<String>) -> Self {
        let alliance_tag = alliance_tag
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());
        Self {
            display_name: display_name.into(),
            alliance_tag,
        }
    }

    /// `"[TAG] alias"` or just `"alias"`.
    pub fn tagged_name(&self) -> String {
        match &self.alliance_tag {
            Some(tag) => format!("[{}] {}", tag, self.display_name),
            None => self.display_name.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Party {
    pub planet: Planet,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parties {
    pub attacker: Party,
    pub defender: Party,
}

impl Parties {
    pub fn get(&self, side: Side) -> &Party {
        match side {
            Side::Attacker => &self.attacker,
            Side::Defender => &self.defender,
        }
    }
}

// ── Loot ──────────────────────────────────────────────────────────────────────

/// Resources transferred to the attacker.
///
/// `values == None` means the report carried no loot table at all, which is
/// distinct from a table whose amounts are all zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Loot {
    pub attacker_could_loot: bool,
    pub values: Option<BTreeMap<u32, f64>>,
}

// ── Units ─────────────────────────────────────────────────────────────────────

/// A single unit/fleet line item from the report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Unit {
    pub side: Side,
    pub unit_type: String,
    pub class: Option<ShipClass>,
    pub count: u64,
    pub survived: Option<u64>,
}

/// Ordered unit records, passed through to callers untouched.
pub type UnitListing = Vec<Unit>;

// ── Report ────────────────────────────────────────────────────────────────────

/// A parsed, anonymized battle report. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    id: String,
    time: DateTime<Utc>,
    parties: Parties,
    tallies: ShipTallies,
    loot: Loot,
}

impl Report {
    pub fn new(
        id: String,
        time: DateTime<Utc>,
        parties: Parties,
        tallies: ShipTallies,
        loot: Loot,
    ) -> Self {
        Self {
            id,
            time,
            parties,
            tallies,
            loot,
        }
    }

    /// Anonymized report identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn time(&self) -> DateTime<Utc> {
        self.time
    }

    pub fn parties(&self) -> &Parties {
        &self.parties
    }

    pub fn planet(&self, side: Side) -> &Planet {
        &self.parties.get(side).planet
    }

    pub fn tallies(&self) -> &ShipTallies {
        &self.tallies
    }

    pub fn loot(&self) -> &Loot {
        &self.loot
    }

    /// Side-wide tally for `(phase, side)`.
    pub fn total_for(&self, phase: Phase, side: Side) -> ShipTally {
        self.tallies.total_for(phase, side)
    }

    /// Single-cell tally for `(phase, side, class)`.
    pub fn cell_for(&self, phase: Phase, side: Side, class: ShipClass) -> ShipTally {
        self.tallies.cell_for(phase, side, class)
    }

    /// Unit count; side-wide when `class` is `None`.
    pub fn count(&self, phase: Phase, side: Side, class: Option<ShipClass>) -> u64 {
        self.select(phase, side, class).count
    }

    pub fn attack(&self, phase: Phase, side: Side, class: Option<ShipClass>) -> f64 {
        self.select(phase, side, class).attack
    }

    pub fn defense(&self, phase: Phase, side: Side, class: Option<ShipClass>) -> f64 {
        self.select(phase, side, class).defense
    }

    pub fn military_power(&self, phase: Phase, side: Side, class: Option<ShipClass>) -> f64 {
        self.select(phase, side, class).military_power
    }

    fn select(&self, phase: Phase, side: Side, class: Option<ShipClass>) -> ShipTally {
        match class {
            Some(class) => self.cell_for(phase, side, class),
            None => self.total_for(phase, side),
        }
    }
}

// ── ReportFormat ──────────────────────────────────────────────────────────────

/// Presentation selected for a shared report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Text,
    Oneline,
    Bargraph,
}

impl ReportFormat {
    pub const ALL: [ReportFormat; 3] = [
        ReportFormat::Text,
        ReportFormat::Oneline,
        ReportFormat::Bargraph,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ReportFormat::Text => "text",
            ReportFormat::Oneline => "oneline",
            ReportFormat::Bargraph => "bargraph",
        }
    }
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportFormat {
    type Err = crate::error::RelayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(ReportFormat::Text),
            "oneline" => Ok(ReportFormat::Oneline),
            "bargraph" => Ok(ReportFormat::Bargraph),
            other => Err(crate::error::RelayError::UnknownFormat(other.to_string())),
        }
    }
}
