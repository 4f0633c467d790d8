use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use relay_core::models::ReportFormat;
use relay_data::parser::ParsedReport;

use crate::chart::{ChartRenderer, RenderError};
use crate::{bargraph, oneline, text};

// ── Message model ─────────────────────────────────────────────────────────────

/// Person who shared the report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Author {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon_url: Option<String>,
}

impl Author {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            icon_url: None,
        }
    }
}

impl fmt::Display for Author {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

/// Rich card attached to a message.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Embed {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<Author>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<EmbedField>,
    /// Image reference, e.g. `attachment://kb.svg`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl Embed {
    pub fn add_field(&mut self, name: impl Into<String>, value: impl Into<String>, inline: bool) {
        self.fields.push(EmbedField {
            name: name.into(),
            value: value.into(),
            inline,
        });
    }

    pub fn field(&self, name: &str) -> Option<&EmbedField> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// File uploaded together with a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Attachment {
    pub file_name: String,
    pub content_type: String,
    #[serde(skip)]
    pub data: Vec<u8>,
}

/// Platform-neutral outgoing message.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Message {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub embeds: Vec<Embed>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
}

// ── compose ───────────────────────────────────────────────────────────────────

/// Build the message for `format`.
///
/// Only the bargraph path touches `renderer`; the other formats cannot fail.
pub fn compose(
    format: ReportFormat,
    parsed: &ParsedReport,
    report_url: &str,
    author: &Author,
    renderer: &dyn ChartRenderer,
) -> Result<Message, RenderError> {
    debug!(%format, report_id = %parsed.report_id, "composing report message");
    let report = &parsed.report;
    match format {
        ReportFormat::Text => Ok(text::text_message(report, report_url, author)),
        ReportFormat::Oneline => Ok(oneline::oneline_message(report, report_url)),
        ReportFormat::Bargraph => bargraph::bargraph_message(report, report_url, author, renderer),
    }
}
