use crate::models::{Loot, Phase, Report, Side};

/// How one side fared, judged on military power.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SideOutcome {
    /// Brought no military power to the fight.
    NotEngaged,
    /// Everything survived.
    Untouched { surviving_mp: f64 },
    /// Some military power was lost. `surviving_ratio` is in `(0, 1)`.
    PartialLoss { surviving_mp: f64, surviving_ratio: f64 },
    /// Nothing survived.
    Wiped { fighting_mp: f64 },
}

impl SideOutcome {
    pub fn classify(fighting_mp: f64, surviving_mp: f64) -> Self {
        if fighting_mp <= 0.0 {
            SideOutcome::NotEngaged
        } else if surviving_mp <= 0.0 {
            SideOutcome::Wiped { fighting_mp }
        } else if surviving_mp >= fighting_mp {
            SideOutcome::Untouched { surviving_mp }
        } else {
            SideOutcome::PartialLoss {
                surviving_mp,
                surviving_ratio: surviving_mp / fighting_mp,
            }
        }
    }

    pub fn for_side(report: &Report, side: Side) -> Self {
        Self::classify(
            report.total_for(Phase::Fighting, side).military_power,
            report.total_for(Phase::Surviving, side).military_power,
        )
    }
}

/// Battle result as seen through the loot table.
///
/// A loot table whose amounts are all zero is treated exactly like a missing
/// table: the attacker won but looted nothing.
#[derive(Debug, Clone, PartialEq)]
pub enum LootOutcome {
    DefenderWon,
    NothingLooted,
    /// Amounts in resource-index order, zeros included.
    Looted(Vec<(u32, f64)>),
}

impl LootOutcome {
    pub fn of(loot: &Loot) -> Self {
        if !loot.attacker_could_loot {
            return LootOutcome::DefenderWon;
        }
        match &loot.values {
            Some(values) if values.values().any(|&v| v > 0.0) => {
                LootOutcome::Looted(values.iter().map(|(&k, &v)| (k, v)).collect())
            }
            _ => LootOutcome::NothingLooted,
        }
    }

    pub fn attacker_won(&self) -> bool {
        !matches!(self, LootOutcome::DefenderWon)
    }
}
