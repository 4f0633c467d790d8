//! Aggregation tables over the parsed ship tallies.
//!
//! [`ShipTallies`] is a dense `phase × side × class` table. It can only be
//! built from the observed fighting and surviving tables; the destroyed table
//! is derived during construction, so `destroyed = fighting − surviving` holds
//! for every cell that exists.

use serde::Serialize;

use crate::error::InvariantViolation;
use crate::models::{Phase, ShipClass, Side};

/// Relative tolerance applied when `surviving` slightly exceeds `fighting`
/// because of rounding in the source.
const ROUNDING_TOLERANCE: f64 = 1e-6;

// ── ShipTally ─────────────────────────────────────────────────────────────────

/// Numbers for one `(phase, side, class)` cell.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ShipTally {
    pub count: u64,
    pub attack: f64,
    pub defense: f64,
    pub military_power: f64,
}

impl ShipTally {
    /// Read one metric as `f64`.
    pub fn get(&self, metric: Metric) -> f64 {
        match metric {
            Metric::Count => self.count as f64,
            Metric::Attack => self.attack,
            Metric::Defense => self.defense,
            Metric::MilitaryPower => self.military_power,
        }
    }

    fn add(&mut self, other: &ShipTally) {
        self.count = self.count.saturating_add(other.count);
        self.attack += other.attack;
        self.defense += other.defense;
        self.military_power += other.military_power;
    }
}

/// The four query families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    Count,
    Attack,
    Defense,
    MilitaryPower,
}

impl Metric {
    pub const ALL: [Metric; 4] = [
        Metric::Count,
        Metric::Attack,
        Metric::Defense,
        Metric::MilitaryPower,
    ];

    fn name(self) -> &'static str {
        match self {
            Metric::Count => "count",
            Metric::Attack => "attack",
            Metric::Defense => "defense",
            Metric::MilitaryPower => "military power",
        }
    }
}

// ── PhaseTable ────────────────────────────────────────────────────────────────

/// Observed tallies for a single phase (all sides and classes), zero-filled.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PhaseTable {
    cells: [[ShipTally; 5]; 2],
}

impl PhaseTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, side: Side, class: ShipClass, tally: ShipTally) {
        self.cells[side.index()][class.index()] = tally;
    }

    pub fn get(&self, side: Side, class: ShipClass) -> ShipTally {
        self.cells[side.index()][class.index()]
    }

    /// Unit count of `side` over all classes, `None` when it overflows `u64`.
    pub fn side_count(&self, side: Side) -> Option<u64> {
        self.cells[side.index()]
            .iter()
            .try_fold(0u64, |sum, cell| sum.checked_add(cell.count))
    }
}

// ── ShipTallies ───────────────────────────────────────────────────────────────

/// Immutable read-model over all tallies of a report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShipTallies {
    cells: [[[ShipTally; 5]; 2]; 3],
}

impl ShipTallies {
    /// Build the table from the fighting and surviving observations.
    ///
    /// Fails when a surviving value exceeds its fighting value beyond the
    /// rounding tolerance; small overshoots are clamped so the destroyed
    /// value is exactly zero.
    pub fn from_observed(
        fighting: PhaseTable,
        surviving: PhaseTable,
    ) -> Result<Self, InvariantViolation> {
        let mut cells = [[[ShipTally::default(); 5]; 2]; 3];

        for side in Side::ALL {
            for class in ShipClass::ALL {
                let f = fighting.get(side, class);
                let s = surviving.get(side, class);
                let destroyed = destroyed_cell(side, class, &f, &s)?;

                cells[Phase::Fighting.index()][side.index()][class.index()] = f;
                cells[Phase::Surviving.index()][side.index()][class.index()] = s;
                cells[Phase::Destroyed.index()][side.index()][class.index()] = destroyed;
            }
        }

        Ok(Self { cells })
    }

    /// Value of a single `(phase, side, class)` cell. Missing cells are zero.
    pub fn cell_for(&self, phase: Phase, side: Side, class: ShipClass) -> ShipTally {
        self.cells[phase.index()][side.index()][class.index()]
    }

    /// Side-wide total, summed over all five classes in canonical order.
    pub fn total_for(&self, phase: Phase, side: Side) -> ShipTally {
        let mut total = ShipTally::default();
        for class in ShipClass::ALL {
            total.add(&self.cell_for(phase, side, class));
        }
        total
    }

    /// Largest single-cell value of `metric` in `phase`, across both sides.
    pub fn max_cell_value(&self, phase: Phase, metric: Metric) -> f64 {
        Side::ALL
            .iter()
            .flat_map(|&side| {
                ShipClass::ALL
                    .iter()
                    .map(move |&class| self.cell_for(phase, side, class).get(metric))
            })
            .fold(0.0, f64::max)
    }
}

// ── Internal helpers ──────────────────────────────────────────────────────────

fn destroyed_cell(
    side: Side,
    class: ShipClass,
    fighting: &ShipTally,
    surviving: &ShipTally,
) -> Result<ShipTally, InvariantViolation> {
    let violation = |metric: Metric| InvariantViolation {
        side,
        class,
        metric: metric.name(),
        fighting: fighting.get(metric),
        surviving: surviving.get(metric),
    };

    let count = fighting
        .count
        .checked_sub(surviving.count)
        .ok_or_else(|| violation(Metric::Count))?;

    let attack = non_negative_difference(fighting.attack, surviving.attack)
        .ok_or_else(|| violation(Metric::Attack))?;
    let defense = non_negative_difference(fighting.defense, surviving.defense)
        .ok_or_else(|| violation(Metric::Defense))?;
    let military_power =
        non_negative_difference(fighting.military_power, surviving.military_power)
            .ok_or_else(|| violation(Metric::MilitaryPower))?;

    Ok(ShipTally {
        count,
        attack,
        defense,
        military_power,
    })
}

/// `fighting − surviving`, clamped to `0.0` inside the rounding tolerance and
/// `None` beyond it.
fn non_negative_difference(fighting: f64, surviving: f64) -> Option<f64> {
    let diff = fighting - surviving;
    if diff >= 0.0 {
        return Some(diff);
    }
    let tolerance = ROUNDING_TOLERANCE * fighting.abs().max(1.0);
    if -diff <= tolerance {
        Some(0.0)
    } else {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn tally(count: u64, attack: f64, defense: f64) -> ShipTally {
        ShipTally {
            count,
            attack,
            defense,
            military_power: (attack + defense) / 200.0,
        }
    }

    fn sample() -> ShipTallies {
        let mut fighting = PhaseTable::new();
        fighting.set(Side::Attacker, ShipClass::Light, tally(10, 1_000.0, 500.0));
        fighting.set(Side::Attacker, ShipClass::Heavy, tally(2, 4_000.0, 6_000.0));
        fighting.set(Side::Defender, ShipClass::Orbital, tally(5, 300.0, 900.0));

        let mut surviving = PhaseTable::new();
        surviving.set(Side::Attacker, ShipClass::Light, tally(4, 400.0, 200.0));
        surviving.set(Side::Attacker, ShipClass::Heavy, tally(2, 4_000.0, 6_000.0));

        ShipTallies::from_observed(fighting, surviving).expect("consistent tallies")
    }

    // ── destroyed derivation ─────────────────────────────────────────────────

    #[test]
    fn test_destroyed_equals_fighting_minus_surviving() {
        let t = sample();
        for side in Side::ALL {
            for class in ShipClass::ALL {
                let f = t.cell_for(Phase::Fighting, side, class);
                let s = t.cell_for(Phase::Surviving, side, class);
                let d = t.cell_for(Phase::Destroyed, side, class);
                assert_eq!(d.count, f.count - s.count);
                assert!((d.attack - (f.attack - s.attack)).abs() < 1e-9);
                assert!((d.defense - (f.defense - s.defense)).abs() < 1e-9);
                assert!((d.military_power - (f.military_power - s.military_power)).abs() < 1e-9);
                assert!(d.attack >= 0.0 && d.defense >= 0.0 && d.military_power >= 0.0);
            }
        }
    }

    #[test]
    fn test_destroyed_when_nothing_survived() {
        let t = sample();
        let d = t.cell_for(Phase::Destroyed, Side::Defender, ShipClass::Orbital);
        assert_eq!(d.count, 5);
        assert_eq!(d.attack, 300.0);
    }

    #[test]
    fn test_surviving_exceeding_fighting_is_rejected() {
        let mut fighting = PhaseTable::new();
        fighting.set(Side::Defender, ShipClass::Medium, tally(3, 30.0, 30.0));
        let mut surviving = PhaseTable::new();
        surviving.set(Side::Defender, ShipClass::Medium, tally(4, 40.0, 40.0));

        let err = ShipTallies::from_observed(fighting, surviving).unwrap_err();
        assert_eq!(err.side, Side::Defender);
        assert_eq!(err.class, ShipClass::Medium);
        assert_eq!(err.metric, "count");
    }

    #[test]
    fn test_rounding_overshoot_is_clamped() {
        let mut fighting = PhaseTable::new();
        fighting.set(Side::Attacker, ShipClass::Light, tally(1, 100.0, 100.0));
        let mut surviving = PhaseTable::new();
        surviving.set(
            Side::Attacker,
            ShipClass::Light,
            ShipTally {
                count: 1,
                attack: 100.000_000_01,
                defense: 100.0,
                military_power: 1.0,
            },
        );

        let t = ShipTallies::from_observed(fighting, surviving).expect("within tolerance");
        let d = t.cell_for(Phase::Destroyed, Side::Attacker, ShipClass::Light);
        assert_eq!(d.attack, 0.0);
    }

    // ── queries ──────────────────────────────────────────────────────────────

    #[test]
    fn test_total_equals_sum_of_cells() {
        let t = sample();
        for phase in Phase::ALL {
            for side in Side::ALL {
                let total = t.total_for(phase, side);
                for metric in Metric::ALL {
                    let sum: f64 = ShipClass::ALL
                        .iter()
                        .map(|&c| t.cell_for(phase, side, c).get(metric))
                        .sum();
                    assert_eq!(total.get(metric), sum, "{phase:?} {side:?} {metric:?}");
                }
            }
        }
    }

    #[test]
    fn test_missing_cells_are_zero() {
        let t = sample();
        let cell = t.cell_for(Phase::Fighting, Side::Defender, ShipClass::Light);
        assert_eq!(cell, ShipTally::default());
        assert_eq!(cell.get(Metric::MilitaryPower), 0.0);
    }

    #[test]
    fn test_empty_tables_are_all_zero() {
        let t = ShipTallies::from_observed(PhaseTable::new(), PhaseTable::new()).unwrap();
        for phase in Phase::ALL {
            for side in Side::ALL {
                assert_eq!(t.total_for(phase, side), ShipTally::default());
            }
        }
    }

    #[test]
    fn test_side_count_detects_overflow() {
        let mut table = PhaseTable::new();
        table.set(Side::Attacker, ShipClass::Light, tally(u64::MAX - 1, 0.0, 0.0));
        assert_eq!(table.side_count(Side::Attacker), Some(u64::MAX - 1));

        table.set(Side::Attacker, ShipClass::Medium, tally(2, 0.0, 0.0));
        assert_eq!(table.side_count(Side::Attacker), None);
        assert_eq!(table.side_count(Side::Defender), Some(0));
    }

    #[test]
    fn test_max_cell_value() {
        let t = sample();
        assert_eq!(t.max_cell_value(Phase::Fighting, Metric::Defense), 6_000.0);
        assert_eq!(t.max_cell_value(Phase::Fighting, Metric::Count), 10.0);
        assert_eq!(t.max_cell_value(Phase::Surviving, Metric::Attack), 4_000.0);
    }
}
