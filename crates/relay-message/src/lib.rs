//! Presentation of parsed battle reports.
//!
//! Three paths share the same read-only queries over the aggregation model:
//! narrative [`text`], a compact [`oneline`] embed and the [`bargraph`] embed
//! with an attached chart rendered through the [`chart`] boundary.

pub mod bargraph;
pub mod chart;
pub mod message;
pub mod oneline;
pub mod text;

pub use chart::{BarChart, ChartRenderer, RenderError, RenderedImage, SvgChartRenderer};
pub use message::{compose, Attachment, Author, Embed, EmbedField, Message};
