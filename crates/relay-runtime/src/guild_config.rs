//! Per-guild configuration repository.
//!
//! Reads return immutable [`GuildConfig`] snapshots. Updates are explicit,
//! awaited operations that return the stored snapshot or a
//! [`ConfigStoreError`]; nothing is persisted in the background.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info};

use relay_core::models::ReportFormat;
use relay_core::settings::FormatAudience;

// ── GuildConfig ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuildConfig {
    pub guild_id: String,
    /// Format used when a member shares a report without choosing one.
    pub default_format_user: ReportFormat,
    /// Format used for reports the bot shares on its own.
    pub default_format_bot: ReportFormat,
    /// Channel shared reports are published in.
    pub report_channel_id: Option<String>,
    pub publish_push_reports: bool,
}

impl GuildConfig {
    /// Defaults for a guild seen for the first time.
    pub fn new(guild_id: impl Into<String>) -> Self {
        Self {
            guild_id: guild_id.into(),
            default_format_user: ReportFormat::Text,
            default_format_bot: ReportFormat::Text,
            report_channel_id: None,
            publish_push_reports: true,
        }
    }

    pub fn default_format(&self, audience: FormatAudience) -> ReportFormat {
        match audience {
            FormatAudience::User => self.default_format_user,
            FormatAudience::Bot => self.default_format_bot,
        }
    }
}

/// Fields to change; `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GuildConfigUpdate {
    pub default_format_user: Option<ReportFormat>,
    pub default_format_bot: Option<ReportFormat>,
    pub report_channel_id: Option<String>,
    pub publish_push_reports: Option<bool>,
}

impl GuildConfigUpdate {
    pub fn default_format(audience: FormatAudience, format: ReportFormat) -> Self {
        match audience {
            FormatAudience::User => Self {
                default_format_user: Some(format),
                ..Self::default()
            },
            FormatAudience::Bot => Self {
                default_format_bot: Some(format),
                ..Self::default()
            },
        }
    }

    pub fn report_channel(id: impl Into<String>) -> Self {
        Self {
            report_channel_id: Some(id.into()),
            ..Self::default()
        }
    }

    pub fn publish_push_reports(value: bool) -> Self {
        Self {
            publish_push_reports: Some(value),
            ..Self::default()
        }
    }

    fn apply(self, config: &mut GuildConfig) {
        if let Some(format) = self.default_format_user {
            config.default_format_user = format;
        }
        if let Some(format) = self.default_format_bot {
            config.default_format_bot = format;
        }
        if let Some(id) = self.report_channel_id {
            config.report_channel_id = Some(id);
        }
        if let Some(value) = self.publish_push_reports {
            config.publish_push_reports = value;
        }
    }
}

// ── Repository ────────────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum ConfigStoreError {
    #[error("failed to access guild config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("guild config at {path} is not valid JSON: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialise guild config: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[async_trait]
pub trait GuildConfigRepository: Send + Sync {
    /// Stored config for `guild_id`, creating it with defaults when absent.
    async fn get_or_create(&self, guild_id: &str) -> Result<GuildConfig, ConfigStoreError>;

    /// Apply `update` and return the snapshot as stored.
    async fn update(
        &self,
        guild_id: &str,
        update: GuildConfigUpdate,
    ) -> Result<GuildConfig, ConfigStoreError>;
}

// ── JsonFileGuildConfigStore ──────────────────────────────────────────────────

type GuildMap = BTreeMap<String, GuildConfig>;

/// All guilds in one JSON file, rewritten atomically on every change.
///
/// Operations are serialised through an async mutex so concurrent updates
/// never interleave their read-modify-write cycles.
pub struct JsonFileGuildConfigStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileGuildConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Missing file means no guilds yet.
    async fn load(&self) -> Result<GuildMap, ConfigStoreError> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(GuildMap::new()),
            Err(source) => return Err(self.io_error(source)),
        };
        serde_json::from_str(&content).map_err(|source| ConfigStoreError::Corrupt {
            path: self.path.clone(),
            source,
        })
    }

    async fn save(&self, guilds: &GuildMap) -> Result<(), ConfigStoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.io_error(e))?;
        }

        let json = serde_json::to_string_pretty(guilds)?;

        // Write to a temp file then rename for atomicity.
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &json)
            .await
            .map_err(|e| self.io_error(e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| self.io_error(e))?;

        debug!(path = %self.path.display(), guilds = guilds.len(), "guild config saved");
        Ok(())
    }

    fn io_error(&self, source: std::io::Error) -> ConfigStoreError {
        ConfigStoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

#[async_trait]
impl GuildConfigRepository for JsonFileGuildConfigStore {
    async fn get_or_create(&self, guild_id: &str) -> Result<GuildConfig, ConfigStoreError> {
        let _guard = self.lock.lock().await;
        let mut guilds = self.load().await?;
        if let Some(config) = guilds.get(guild_id) {
            return Ok(config.clone());
        }

        let config = GuildConfig::new(guild_id);
        guilds.insert(guild_id.to_string(), config.clone());
        self.save(&guilds).await?;
        info!(guild_id, "created default guild config");
        Ok(config)
    }

    async fn update(
        &self,
        guild_id: &str,
        update: GuildConfigUpdate,
    ) -> Result<GuildConfig, ConfigStoreError> {
        let _guard = self.lock.lock().await;
        let mut guilds = self.load().await?;
        let config = guilds
            .entry(guild_id.to_string())
            .or_insert_with(|| GuildConfig::new(guild_id));
        update.apply(config);
        let snapshot = config.clone();
        self.save(&guilds).await?;
        debug!(guild_id, ?snapshot, "guild config updated");
        Ok(snapshot)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
