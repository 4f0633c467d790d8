//! Single-line embed summary.

use relay_core::formatting::{format_compact, format_number, percentage};
use relay_core::models::{Phase, Report, Side};
use relay_core::outcome::LootOutcome;

use crate::message::{Embed, Message};

/// Separator between loot amounts.
pub const LOOT_SEPARATOR: &str = " | ";

/// `[Battle Report](url): attacker vs defender - loot`, winner in bold.
pub fn oneline_message(report: &Report, report_url: &str) -> Message {
    let loot = LootOutcome::of(report.loot());
    let winner = if loot.attacker_won() {
        Side::Attacker
    } else {
        Side::Defender
    };

    let attacker = party(report, Side::Attacker, winner);
    let defender = party(report, Side::Defender, winner);

    let loot_suffix = match &loot {
        LootOutcome::Looted(values) => format!(" - {}", loot_amounts(values)),
        LootOutcome::NothingLooted | LootOutcome::DefenderWon => String::new(),
    };

    let embed = Embed {
        description: Some(format!(
            "[Battle Report]({}): {} vs {}{}",
            report_url, attacker, defender, loot_suffix
        )),
        ..Embed::default()
    };

    Message {
        embeds: vec![embed],
        ..Message::default()
    }
}

/// Loot amounts in index order, compact and separated by [`LOOT_SEPARATOR`].
pub fn loot_amounts(values: &[(u32, f64)]) -> String {
    values
        .iter()
        .map(|&(_, v)| format_compact(v))
        .collect::<Vec<_>>()
        .join(LOOT_SEPARATOR)
}

fn party(report: &Report, side: Side, winner: Side) -> String {
    let name = report.planet(side).tagged_name();
    let mut out = if side == winner {
        format!("**{}**", name)
    } else {
        name
    };

    let lost_mp = report.military_power(Phase::Destroyed, side, None);
    if lost_mp > 0.0 {
        let pct = percentage(lost_mp, report.military_power(Phase::Fighting, side, None), 0);
        out.push_str(&format!(
            " (-{} MP, {}%)",
            format_compact(lost_mp),
            format_number(pct, 0)
        ));
    }
    out
}
