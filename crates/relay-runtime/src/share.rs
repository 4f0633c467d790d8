//! The share command: ingest a report, compose it and deliver it.

use std::future::Future;

use thiserror::Error;
use tracing::{error, info, warn};

use relay_core::models::ReportFormat;
use relay_data::anonymize::public_report_url;
use relay_data::fetcher::Fetch;
use relay_data::ingest::{ingest, IngestError, GENERIC_FAILURE_MESSAGE};
use relay_message::{compose, Author, ChartRenderer, Message, RenderError};

use crate::guild_config::{ConfigStoreError, GuildConfigRepository};
use crate::publisher::{PublishError, ReportPublisher};

/// Reply when the report channel cannot be used.
pub const CHANNEL_NOT_FOUND_MESSAGE: &str = "Error: report_channel not found on this guild";
pub const CHANNEL_NOT_CONFIGURED_MESSAGE: &str = "Error: report_channel not configured";

/// Collaborators of the share command.
pub struct ShareContext<'a> {
    pub fetcher: &'a dyn Fetch,
    pub configs: &'a dyn GuildConfigRepository,
    pub publisher: &'a dyn ReportPublisher,
    pub renderer: &'a dyn ChartRenderer,
    /// Prefix the anonymized report id is appended to.
    pub report_url_base: &'a str,
    /// Answer every request privately.
    pub debug: bool,
}

#[derive(Debug, Clone)]
pub struct ShareRequest {
    pub url: String,
    pub guild_id: String,
    pub author: Author,
    pub private: bool,
    /// Explicit format; the guild's user default otherwise.
    pub format: Option<ReportFormat>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ShareOutcome {
    /// Posted to the guild's report channel.
    Published { channel_id: String, report_url: String },
    /// To be shown only to the requester.
    Private { report_url: String, message: Message },
    /// Publishing was requested but no report channel is set.
    ChannelNotConfigured,
}

impl ShareOutcome {
    /// Text for the requester.
    pub fn reply(&self) -> String {
        match self {
            ShareOutcome::Published {
                channel_id,
                report_url,
            } => format!("Battle report shared as {} in channel {}", report_url, channel_id),
            ShareOutcome::Private { report_url, .. } => {
                format!("Battle report shared privately as {}", report_url)
            }
            ShareOutcome::ChannelNotConfigured => CHANNEL_NOT_CONFIGURED_MESSAGE.to_string(),
        }
    }
}

#[derive(Error, Debug)]
pub enum ShareError {
    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Publish(#[from] PublishError),

    #[error(transparent)]
    Config(#[from] ConfigStoreError),
}

impl ShareError {
    /// Text for the requester; internal details never leak.
    pub fn reply(&self) -> &str {
        match self {
            ShareError::Ingest(e) => e.user_message(),
            ShareError::Publish(PublishError::NotFound | PublishError::Forbidden) => {
                CHANNEL_NOT_FOUND_MESSAGE
            }
            ShareError::Publish(PublishError::Transient(_) | PublishError::Other(_))
            | ShareError::Render(_)
            | ShareError::Config(_) => GENERIC_FAILURE_MESSAGE,
        }
    }
}

/// Run one share request end to end.
///
/// `cancel` aborts the report fetch when it resolves first.
pub async fn share_report<C>(
    ctx: &ShareContext<'_>,
    request: &ShareRequest,
    cancel: C,
) -> Result<ShareOutcome, ShareError>
where
    C: Future<Output = ()> + Send,
{
    let config = ctx.configs.get_or_create(&request.guild_id).await?;
    let format = request.format.unwrap_or(config.default_format_user);

    let parsed = ingest(ctx.fetcher, &request.url, cancel).await?;
    let report_url = public_report_url(ctx.report_url_base, &parsed.report_id);

    let message = compose(format, &parsed, &report_url, &request.author, ctx.renderer)
        .map_err(|e| {
            error!(error = %e, "failed to compose report message");
            e
        })?;

    let private = ctx.debug || request.private;
    info!(
        source_url = %request.url,
        report_url = %report_url,
        %format,
        private,
        "shared report url"
    );

    if private {
        return Ok(ShareOutcome::Private {
            report_url,
            message,
        });
    }

    let Some(channel_id) = config.report_channel_id else {
        return Ok(ShareOutcome::ChannelNotConfigured);
    };

    ctx.publisher
        .publish(&channel_id, &message)
        .await
        .map_err(|e| {
            warn!(error = %e, channel_id = %channel_id, "failed to publish report");
            e
        })?;

    Ok(ShareOutcome::Published {
        channel_id,
        report_url,
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guild_config::{GuildConfigUpdate, JsonFileGuildConfigStore};
    use async_trait::async_trait;
    use relay_data::fetcher::FetchError;
    use relay_message::SvgChartRenderer;
    use std::future;
    use std::sync::Mutex;
    use tempfile::TempDir;

    const REPORT: &str = r#"{
        "time": 1700000000,
        "parties": {
            "attacker": {"planet": {"user_alias": "Raider", "alliance": "RDR"}},
            "defender": {"planet": {"user_alias": "Miner"}}
        },
        "ships": {"g": {"att": {"1": {"count": 10, "at": 1000, "de": 1000, "mp": 10}}}},
        "loot": {"info": {"atter_couldloot": true}, "values": [500, 0]}
    }"#;

    struct Canned(Result<&'static str, ()>);

    #[async_trait]
    impl Fetch for Canned {
        async fn fetch(&self, _url: &str) -> Result<String, FetchError> {
            self.0
                .map(str::to_string)
                .map_err(|_| FetchError::Status(503))
        }
    }

    /// Records published messages or fails with a fixed error.
    #[derive(Default)]
    struct Recorder {
        fail_with: Option<PublishError>,
        sent: Mutex<Vec<(String, Message)>>,
    }

    #[async_trait]
    impl ReportPublisher for Recorder {
        async fn publish(&self, channel_id: &str, message: &Message) -> Result<(), PublishError> {
            if let Some(err) = &self.fail_with {
                return Err(err.clone());
            }
            self.sent
                .lock()
                .unwrap()
                .push((channel_id.to_string(), message.clone()));
            Ok(())
        }
    }

    struct Fixture {
        _tmp: TempDir,
        configs: JsonFileGuildConfigStore,
    }

    impl Fixture {
        async fn new(channel: Option<&str>) -> Self {
            let tmp = TempDir::new().unwrap();
            let configs = JsonFileGuildConfigStore::new(tmp.path().join("guilds.json"));
            if let Some(channel) = channel {
                configs
                    .update("g1", GuildConfigUpdate::report_channel(channel))
                    .await
                    .unwrap();
            }
            Self { _tmp: tmp, configs }
        }

        fn ctx<'a>(
            &'a self,
            fetcher: &'a dyn Fetch,
            publisher: &'a dyn ReportPublisher,
            debug: bool,
        ) -> ShareContext<'a> {
            ShareContext {
                fetcher,
                configs: &self.configs,
                publisher,
                renderer: &SvgChartRenderer,
                report_url_base: "https://kb.example.net/",
                debug,
            }
        }
    }

    fn request(private: bool) -> ShareRequest {
        ShareRequest {
            url: "https://source.example.net/report/secret-id".to_string(),
            guild_id: "g1".to_string(),
            author: Author::named("Pilot"),
            private,
            format: None,
        }
    }

    #[tokio::test]
    async fn test_share_publishes_to_report_channel() {
        let fixture = Fixture::new(Some("reports")).await;
        let publisher = Recorder::default();
        let fetcher = Canned(Ok(REPORT));
        let ctx = fixture.ctx(&fetcher, &publisher, false);

        let outcome = share_report(&ctx, &request(false), future::pending())
            .await
            .unwrap();
        let ShareOutcome::Published {
            channel_id,
            report_url,
        } = &outcome
        else {
            panic!("unexpected {outcome:?}");
        };
        assert_eq!(channel_id, "reports");
        assert!(report_url.starts_with("https://kb.example.net/"));
        assert!(!report_url.contains("secret-id"));
        assert!(outcome.reply().starts_with("Battle report shared as https://kb.example.net/"));

        let sent = publisher.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        // Guild default is the text format.
        let content = sent[0].1.content.as_deref().unwrap();
        assert!(content.starts_with("Pilot shared a battle report: https://kb.example.net/"));
    }

    #[tokio::test]
    async fn test_share_uses_explicit_format() {
        let fixture = Fixture::new(Some("reports")).await;
        let publisher = Recorder::default();
        let fetcher = Canned(Ok(REPORT));
        let ctx = fixture.ctx(&fetcher, &publisher, false);

        let mut req = request(false);
        req.format = Some(ReportFormat::Oneline);
        share_report(&ctx, &req, future::pending()).await.unwrap();

        let sent = publisher.sent.lock().unwrap();
        let description = sent[0].1.embeds[0].description.as_deref().unwrap();
        assert!(description.ends_with("- 500 | 0"), "{description}");
    }

    #[tokio::test]
    async fn test_share_private_and_debug_do_not_publish() {
        let fixture = Fixture::new(Some("reports")).await;
        let publisher = Recorder::default();
        let fetcher = Canned(Ok(REPORT));

        for (private, debug) in [(true, false), (false, true)] {
            let ctx = fixture.ctx(&fetcher, &publisher, debug);
            let outcome = share_report(&ctx, &request(private), future::pending())
                .await
                .unwrap();
            assert!(matches!(outcome, ShareOutcome::Private { .. }));
        }
        assert!(publisher.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_share_without_channel() {
        let fixture = Fixture::new(None).await;
        let publisher = Recorder::default();
        let fetcher = Canned(Ok(REPORT));
        let ctx = fixture.ctx(&fetcher, &publisher, false);

        let outcome = share_report(&ctx, &request(false), future::pending())
            .await
            .unwrap();
        assert_eq!(outcome, ShareOutcome::ChannelNotConfigured);
        assert_eq!(outcome.reply(), "Error: report_channel not configured");
    }

    #[tokio::test]
    async fn test_share_error_replies() {
        let fixture = Fixture::new(Some("reports")).await;
        let ok = Canned(Ok(REPORT));
        let not_a_report = Canned(Ok("<html>login</html>"));
        let down = Canned(Err(()));

        let cases: [(&dyn Fetch, Option<PublishError>, &str); 5] = [
            (&not_a_report, None, "The link does not point to a battle report."),
            (&down, None, GENERIC_FAILURE_MESSAGE),
            (&ok, Some(PublishError::NotFound), CHANNEL_NOT_FOUND_MESSAGE),
            (&ok, Some(PublishError::Forbidden), CHANNEL_NOT_FOUND_MESSAGE),
            (&ok, Some(PublishError::Transient("rate limited".into())), GENERIC_FAILURE_MESSAGE),
        ];

        for (fetcher, fail_with, expected) in cases {
            let publisher = Recorder {
                fail_with,
                ..Recorder::default()
            };
            let ctx = fixture.ctx(fetcher, &publisher, false);
            let err = share_report(&ctx, &request(false), future::pending())
                .await
                .unwrap_err();
            assert_eq!(err.reply(), expected);
        }
    }

    #[tokio::test]
    async fn test_share_same_report_same_url() {
        let fixture = Fixture::new(None).await;
        let publisher = Recorder::default();
        let fetcher = Canned(Ok(REPORT));
        let ctx = fixture.ctx(&fetcher, &publisher, true);

        let first = share_report(&ctx, &request(true), future::pending()).await.unwrap();
        let second = share_report(&ctx, &request(true), future::pending()).await.unwrap();
        assert_eq!(first.reply(), second.reply());
    }
}
