//! Embed with per-side fleet and loss fields and an attached bar chart.

use relay_core::formatting::{format_compact, format_number, percentage};
use relay_core::models::{Phase, Report, Side};
use relay_core::outcome::LootOutcome;
use relay_core::tally::ShipTally;

use crate::chart::{BarChart, ChartRenderer, RenderError};
use crate::message::{Attachment, Author, Embed, Message};
use crate::oneline::loot_amounts;

const TITLE: &str = "Battle report";
/// Base name of the attached chart file.
const CHART_FILE_STEM: &str = "kb";
/// Zero-width space; renders an empty full-width spacer field.
const SPACER: &str = "\u{200B}";

pub fn bargraph_message(
    report: &Report,
    report_url: &str,
    author: &Author,
    renderer: &dyn ChartRenderer,
) -> Result<Message, RenderError> {
    let mut embed = Embed {
        title: Some(TITLE.to_string()),
        url: Some(report_url.to_string()),
        timestamp: Some(report.time()),
        author: Some(author.clone()),
        ..Embed::default()
    };

    add_side_fields(&mut embed, report, Side::Attacker);
    embed.add_field(SPACER, SPACER, false);
    add_side_fields(&mut embed, report, Side::Defender);

    match LootOutcome::of(report.loot()) {
        LootOutcome::Looted(values) => {
            embed.description = Some("Attacker wins!".to_string());
            embed.add_field("Loot", loot_amounts(&values), false);
        }
        LootOutcome::NothingLooted => {
            embed.description = Some("Attacker wins and loots nothing!".to_string());
        }
        LootOutcome::DefenderWon => {
            embed.description = Some("Defender wins!".to_string());
        }
    }

    let image = renderer.render(&BarChart::from_report(report))?;
    let file_name = format!("{}.{}", CHART_FILE_STEM, image.extension);
    embed.image_url = Some(format!("attachment://{}", file_name));

    Ok(Message {
        content: None,
        embeds: vec![embed],
        attachments: vec![Attachment {
            file_name,
            content_type: image.mime_type.to_string(),
            data: image.bytes,
        }],
    })
}

fn add_side_fields(embed: &mut Embed, report: &Report, side: Side) {
    embed.add_field(side.label(), report.planet(side).tagged_name(), true);
    embed.add_field("Fleet", fleet_summary(&report.total_for(Phase::Fighting, side)), true);

    let destroyed = report.total_for(Phase::Destroyed, side);
    if destroyed.military_power > 0.0 {
        let fighting_mp = report.military_power(Phase::Fighting, side, None);
        let pct = percentage(destroyed.military_power, fighting_mp, 0);
        embed.add_field(
            format!("Losses {} %", format_number(pct, 0)),
            fleet_summary(&destroyed),
            true,
        );
    }
}

fn fleet_summary(tally: &ShipTally) -> String {
    format!(
        "{} ships - {} MP\n{} Att/ {} Def",
        format_number(tally.count as f64, 0),
        format_compact(tally.military_power),
        format_compact(tally.attack),
        format_compact(tally.defense)
    )
}
