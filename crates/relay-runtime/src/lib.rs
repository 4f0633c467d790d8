//! Command runtime for the battle-report relay.
//!
//! Wires ingestion and presentation to the guild configuration store and the
//! publishing adapter.

pub mod config_command;
pub mod guild_config;
pub mod publisher;
pub mod share;
