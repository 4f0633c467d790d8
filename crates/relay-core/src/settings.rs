use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{RelayError, Result};
use crate::models::ReportFormat;

/// Base URL that anonymized report ids are appended to.
pub const DEFAULT_REPORT_URL_BASE: &str = "https://kb.original.xwars.net/";

// ── Settings (CLI) ─────────────────────────────────────────────────────────────

/// Share anonymized battle reports
#[derive(Parser, Debug, Clone)]
#[command(
    name = "kb-relay",
    about = "Share anonymized battle reports",
    version
)]
pub struct Settings {
    /// Base URL the anonymized report id is appended to
    #[arg(long, env = "REPORT_URL_BASE", default_value = DEFAULT_REPORT_URL_BASE, global = true)]
    pub report_url_base: String,

    /// Timeout for fetching a report, in seconds (1-120)
    #[arg(long, default_value = "15", value_parser = clap::value_parser!(u64).range(1..=120), global = true)]
    pub fetch_timeout_secs: u64,

    /// Guild configuration file (defaults to ~/.kb-relay/guilds.json)
    #[arg(long, global = true)]
    pub config_file: Option<PathBuf>,

    /// Guild the command runs for
    #[arg(long, default_value = "local", global = true)]
    pub guild: String,

    /// Logging level
    #[arg(long, default_value = "INFO", value_parser = ["DEBUG", "INFO", "WARNING", "ERROR"], global = true)]
    pub log_level: String,

    /// Debug mode: verbose logging and every report is answered privately
    #[arg(long, env = "KB_RELAY_DEBUG", global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Fetch a battle report and publish it anonymized
    Share(ShareArgs),
    /// Read or change the guild configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Args, Debug, Clone)]
pub struct ShareArgs {
    /// Battle report URL
    pub url: String,

    /// Only answer privately instead of publishing to the report channel
    #[arg(long)]
    pub private: bool,

    /// Message format (defaults to the guild's user format)
    #[arg(long, value_parser = parse_format)]
    pub format: Option<ReportFormat>,

    /// Directory published messages are written to
    #[arg(long, default_value = "published")]
    pub out: PathBuf,

    /// Name the report is shared under
    #[arg(long = "as", env = "KB_RELAY_AUTHOR", default_value = "kb-relay")]
    pub author: String,
}

/// Whose default format is addressed.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatAudience {
    User,
    Bot,
}

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigCommand {
    /// Get or set the default message format
    DefaultFormat {
        #[arg(value_enum)]
        audience: FormatAudience,
        #[arg(value_parser = parse_format)]
        format: Option<ReportFormat>,
    },
    /// Get or set whether push reports are published
    PublishPushReports { value: Option<bool> },
    /// Get or set the channel reports are published in
    ReportChannel { id: Option<String> },
}

// ── Settings impl ──────────────────────────────────────────────────────────────

impl Settings {
    /// Parse the process arguments and resolve derived values.
    pub fn load() -> Self {
        Self::resolve(Settings::parse())
    }

    /// Same as [`Settings::load`] with an explicit argument list.
    pub fn load_from<I, T>(args: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        Self::resolve(Settings::parse_from(args))
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    /// Reject values clap cannot check on its own.
    pub fn validate(&self) -> Result<()> {
        let base = self.report_url_base.trim();
        if !(base.starts_with("https://") || base.starts_with("http://")) {
            return Err(RelayError::Config(format!(
                "report url base must be an http(s) URL, got {:?}",
                self.report_url_base
            )));
        }
        if self.guild.trim().is_empty() {
            return Err(RelayError::Config("guild must not be empty".to_string()));
        }
        Ok(())
    }

    /// Guild configuration file, `~/.kb-relay/guilds.json` unless overridden.
    pub fn config_path(&self) -> PathBuf {
        match &self.config_file {
            Some(path) => path.clone(),
            None => default_config_path_in(&dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))),
        }
    }

    /// `--debug` overrides the log level.
    fn resolve(mut settings: Settings) -> Settings {
        if settings.debug {
            settings.log_level = "DEBUG".to_string();
        }
        settings
    }
}

/// Config path rooted at `base_dir`.
pub fn default_config_path_in(base_dir: &std::path::Path) -> PathBuf {
    base_dir.join(".kb-relay").join("guilds.json")
}

fn parse_format(s: &str) -> std::result::Result<ReportFormat, String> {
    s.parse::<ReportFormat>().map_err(|e| e.to_string())
}

// ── Tests ──────────────────────────────────────────────────────────────────────
