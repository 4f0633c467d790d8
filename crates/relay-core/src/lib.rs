//! Core model for the battle-report relay.
//!
//! Holds the normalized report model, the aggregation tables and their query
//! surface, the outcome rules shared by every presentation, numeric formatting,
//! errors and CLI settings.

pub mod error;
pub mod formatting;
pub mod models;
pub mod outcome;
pub mod settings;
pub mod tally;
