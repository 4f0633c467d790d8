//! Bar chart data and the rendering boundary.
//!
//! [`BarChart`] holds everything a renderer needs: one row per class in the
//! order T, L, M, H, O with the fighting and surviving attack/defense of both
//! sides, plus the common scale maximum. Attacker bars grow to the left of the
//! centre, defender bars to the right; attack above the row midline, defense
//! below it.

use std::fmt::Write as _;

use thiserror::Error;

use relay_core::models::{Phase, Report, ShipClass, Side};
use relay_core::tally::Metric;

/// Canvas size in pixels.
pub const CANVAS_WIDTH: f64 = 400.0;
pub const CANVAS_HEIGHT: f64 = 100.0;

/// Row order, top to bottom.
pub const ROW_ORDER: [ShipClass; 5] = [
    ShipClass::Tactical,
    ShipClass::Light,
    ShipClass::Medium,
    ShipClass::Heavy,
    ShipClass::Orbital,
];

const ROW_HEIGHT: f64 = CANVAS_HEIGHT / ROW_ORDER.len() as f64;
const TEXT_HEIGHT: f64 = ROW_HEIGHT * 0.8;
/// Gap between the canvas centre and the start of the bars.
const CENTER_GAP: f64 = 20.0;
/// Longest possible bar.
const BAR_SPAN: f64 = CANVAS_WIDTH / 2.0 - 30.0;
const BAR_THICKNESS: f64 = ROW_HEIGHT * 0.5 * 0.8;

const FIGHTING_ATTACK_COLOR: &str = "rgb(179, 179, 179)";
const FIGHTING_DEFENSE_COLOR: &str = "rgb(153, 153, 153)";
const SURVIVING_ATTACK_COLOR: &str = "rgb(255, 0, 0)";
const SURVIVING_DEFENSE_COLOR: &str = "rgb(202, 0, 0)";
const LABEL_COLOR: &str = "rgb(255, 255, 255)";

// ── Chart data ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AttackDefense {
    pub attack: f64,
    pub defense: f64,
}

/// One side's bars in a row.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SideBars {
    pub fighting: AttackDefense,
    pub surviving: AttackDefense,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChartRow {
    pub class: ShipClass,
    pub label: &'static str,
    pub attacker: SideBars,
    pub defender: SideBars,
}

impl ChartRow {
    pub fn side(&self, side: Side) -> &SideBars {
        match side {
            Side::Attacker => &self.attacker,
            Side::Defender => &self.defender,
        }
    }
}

/// Renderer-independent chart description.
#[derive(Debug, Clone, PartialEq)]
pub struct BarChart {
    rows: Vec<ChartRow>,
    scale_max: f64,
}

impl BarChart {
    pub fn from_report(report: &Report) -> Self {
        let bars = |side: Side, class: ShipClass| SideBars {
            fighting: attack_defense(report, Phase::Fighting, side, class),
            surviving: attack_defense(report, Phase::Surviving, side, class),
        };

        let rows = ROW_ORDER
            .iter()
            .map(|&class| ChartRow {
                class,
                label: class.short_label(),
                attacker: bars(Side::Attacker, class),
                defender: bars(Side::Defender, class),
            })
            .collect();

        let tallies = report.tallies();
        let scale_max = tallies
            .max_cell_value(Phase::Fighting, Metric::Attack)
            .max(tallies.max_cell_value(Phase::Fighting, Metric::Defense));

        Self { rows, scale_max }
    }

    pub fn rows(&self) -> &[ChartRow] {
        &self.rows
    }

    /// Largest fighting attack or defense value of any single cell.
    pub fn scale_max(&self) -> f64 {
        self.scale_max
    }

    /// `value` as a fraction of the scale, `0.0` on an empty chart.
    pub fn fraction(&self, value: f64) -> f64 {
        if self.scale_max > 0.0 {
            (value / self.scale_max).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}

fn attack_defense(report: &Report, phase: Phase, side: Side, class: ShipClass) -> AttackDefense {
    let cell = report.cell_for(phase, side, class);
    AttackDefense {
        attack: cell.attack,
        defense: cell.defense,
    }
}

// ── Rendering boundary ────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("chart rendering failed: {0}")]
    Backend(String),
}

/// Encoded image ready to be attached to a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedImage {
    pub bytes: Vec<u8>,
    /// File extension without the dot.
    pub extension: &'static str,
    pub mime_type: &'static str,
}

pub trait ChartRenderer: Send + Sync {
    fn render(&self, chart: &BarChart) -> Result<RenderedImage, RenderError>;
}

// ── SvgChartRenderer ──────────────────────────────────────────────────────────

/// Renders the chart as a standalone SVG document on a transparent canvas.
#[derive(Debug, Clone, Copy, Default)]
pub struct SvgChartRenderer;

impl ChartRenderer for SvgChartRenderer {
    fn render(&self, chart: &BarChart) -> Result<RenderedImage, RenderError> {
        let svg = svg_document(chart).map_err(|e| RenderError::Backend(e.to_string()))?;
        Ok(RenderedImage {
            bytes: svg.into_bytes(),
            extension: "svg",
            mime_type: "image/svg+xml",
        })
    }
}

fn svg_document(chart: &BarChart) -> Result<String, std::fmt::Error> {
    let mut out = String::new();
    writeln!(
        out,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
        w = CANVAS_WIDTH,
        h = CANVAS_HEIGHT
    )?;
    writeln!(
        out,
        r#"<g font-family="DejaVu Sans, sans-serif" font-size="{}" fill="{}" text-anchor="middle">"#,
        TEXT_HEIGHT.floor(),
        LABEL_COLOR
    )?;
    for (i, row) in chart.rows().iter().enumerate() {
        let baseline = ROW_HEIGHT * (i + 1) as f64 - (ROW_HEIGHT - TEXT_HEIGHT);
        writeln!(
            out,
            r#"<text x="{}" y="{:.1}">{}</text>"#,
            CANVAS_WIDTH / 2.0,
            baseline,
            row.label
        )?;
    }
    writeln!(out, "</g>")?;

    for (i, row) in chart.rows().iter().enumerate() {
        let midline = ROW_HEIGHT * (i + 1) as f64 - ROW_HEIGHT * 0.5;
        for side in Side::ALL {
            let bars = row.side(side);
            // Surviving bars are drawn over the fighting ones.
            let layers = [
                (bars.fighting.attack, true, FIGHTING_ATTACK_COLOR),
                (bars.fighting.defense, false, FIGHTING_DEFENSE_COLOR),
                (bars.surviving.attack, true, SURVIVING_ATTACK_COLOR),
                (bars.surviving.defense, false, SURVIVING_DEFENSE_COLOR),
            ];
            for (value, above, color) in layers {
                write_bar(&mut out, chart.fraction(value), side, midline, above, color)?;
            }
        }
    }

    writeln!(out, "</svg>")?;
    Ok(out)
}

fn write_bar(
    out: &mut String,
    fraction: f64,
    side: Side,
    midline: f64,
    above: bool,
    color: &str,
) -> std::fmt::Result {
    let width = fraction * BAR_SPAN;
    if width <= 0.0 {
        return Ok(());
    }
    let x = match side {
        Side::Attacker => CANVAS_WIDTH / 2.0 - CENTER_GAP - width,
        Side::Defender => CANVAS_WIDTH / 2.0 + CENTER_GAP,
    };
    let y = if above { midline - BAR_THICKNESS } else { midline };
    writeln!(
        out,
        r#"<rect x="{:.2}" y="{:.2}" width="{:.2}" height="{:.2}" fill="{}"/>"#,
        x, y, width, BAR_THICKNESS, color
    )
}
