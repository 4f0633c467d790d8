//! The config command: read or change one guild setting.
//!
//! A value given on the command line is stored (and awaited) before the
//! confirmation is returned; without a value the current setting is reported.

use relay_core::settings::{ConfigCommand, FormatAudience};

use crate::guild_config::{ConfigStoreError, GuildConfigRepository, GuildConfigUpdate};

pub async fn run_config_command(
    configs: &dyn GuildConfigRepository,
    guild_id: &str,
    command: &ConfigCommand,
) -> Result<String, ConfigStoreError> {
    match command {
        ConfigCommand::DefaultFormat {
            audience,
            format: Some(format),
        } => {
            configs
                .update(guild_id, GuildConfigUpdate::default_format(*audience, *format))
                .await?;
            Ok(format!(
                "Default format for {} set to {}",
                audience_name(*audience),
                format
            ))
        }
        ConfigCommand::DefaultFormat {
            audience,
            format: None,
        } => {
            let config = configs.get_or_create(guild_id).await?;
            Ok(format!(
                "Default format for {} is {}",
                audience_name(*audience),
                config.default_format(*audience)
            ))
        }
        ConfigCommand::PublishPushReports { value: Some(value) } => {
            configs
                .update(guild_id, GuildConfigUpdate::publish_push_reports(*value))
                .await?;
            Ok(format!("publish_push_reports set to {}", value))
        }
        ConfigCommand::PublishPushReports { value: None } => {
            let config = configs.get_or_create(guild_id).await?;
            Ok(format!("publish_push_reports is {}", config.publish_push_reports))
        }
        ConfigCommand::ReportChannel { id: Some(id) } => {
            configs
                .update(guild_id, GuildConfigUpdate::report_channel(id.clone()))
                .await?;
            Ok(format!("report_channel set to {}", id))
        }
        ConfigCommand::ReportChannel { id: None } => {
            let config = configs.get_or_create(guild_id).await?;
            Ok(match config.report_channel_id {
                Some(id) => format!("report_channel is {}", id),
                None => "report_channel is not configured".to_string(),
            })
        }
    }
}

fn audience_name(audience: FormatAudience) -> &'static str {
    match audience {
        FormatAudience::User => "user",
        FormatAudience::Bot => "bot",
    }
}
