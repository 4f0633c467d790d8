//! Narrative text summary.

use relay_core::formatting::{format_grouped, format_number};
use relay_core::models::{Phase, Report, Side};
use relay_core::outcome::{LootOutcome, SideOutcome};

use crate::message::{Author, Message};

const RULE_WIDTH: usize = 100;

/// Multi-line narrative message posted as plain content.
pub fn text_message(report: &Report, report_url: &str, author: &Author) -> Message {
    let lines = [
        format!("{} shared a battle report: {}", author, report_url),
        String::new(),
        party_line(report, Side::Attacker),
        party_line(report, Side::Defender),
        side_sentence(Side::Attacker, SideOutcome::for_side(report, Side::Attacker)),
        side_sentence(Side::Defender, SideOutcome::for_side(report, Side::Defender)),
        result_sentence(&LootOutcome::of(report.loot())),
        "-".repeat(RULE_WIDTH),
    ];

    Message {
        content: Some(lines.join("\n")),
        ..Message::default()
    }
}

fn party_line(report: &Report, side: Side) -> String {
    let fighting = report.total_for(Phase::Fighting, side);
    let units = match side {
        Side::Attacker => "ships",
        Side::Defender => "ships/defense units",
    };
    format!(
        "**{}:** {} with **{}** {} and **{}mp** ({}/{})",
        side.label(),
        report.planet(side).tagged_name(),
        format_number(fighting.count as f64, 0),
        units,
        format_number(fighting.military_power, 1),
        format_grouped(fighting.attack),
        format_grouped(fighting.defense),
    )
}

fn side_sentence(side: Side, outcome: SideOutcome) -> String {
    match (side, outcome) {
        (Side::Defender, SideOutcome::NotEngaged) => "Defender was a chicken and didn't engage in the fight but also hasn't lost any units :chicken:.".to_string(),
        (Side::Attacker, SideOutcome::NotEngaged) => {
            "Attacker lost all units (0.0mp) :sob:.".to_string()
        }
        (side, SideOutcome::Wiped { fighting_mp }) => format!(
            "{} lost all units ({}mp) :sob:.",
            side.label(),
            format_number(fighting_mp, 1)
        ),
        (Side::Attacker, SideOutcome::Untouched { .. }) => {
            "Attacker lost nothing :confetti_ball:.".to_string()
        }
        (Side::Defender, SideOutcome::Untouched { surviving_mp }) => format!(
            "Defender with their force of {}mp got involved in a hefty battle but was able to strike back successfully without losing anything :tada:.",
            format_number(surviving_mp, 1)
        ),
        (side, SideOutcome::PartialLoss { surviving_mp, surviving_ratio }) => {
            let emoji = match side {
                Side::Attacker => ":piñata:",
                Side::Defender => ":face_holding_back_tears:",
            };
            format!(
                "{} lost some units but {}mp ({}%) survived {}.",
                side.label(),
                format_number(surviving_mp, 1),
                format_number(surviving_ratio * 100.0, 1),
                emoji
            )
        }
    }
}

fn result_sentence(loot: &LootOutcome) -> String {
    match loot {
        LootOutcome::DefenderWon => "**Defender won! :tada:**".to_string(),
        LootOutcome::NothingLooted => {
            "**Attacker won :tada: and looted nothing :face_holding_back_tears:!**".to_string()
        }
        LootOutcome::Looted(values) => {
            let amounts: Vec<String> = values.iter().map(|&(_, v)| format_grouped(v)).collect();
            format!(
                "**Attacker won and looted {} resources! :tada:**",
                amounts.join("/")
            )
        }
    }
}
