mod bootstrap;

use anyhow::Result;
use relay_core::settings::{Command, Settings, ShareArgs};
use relay_data::fetcher::HttpFetcher;
use relay_message::{Author, SvgChartRenderer};
use relay_runtime::config_command::run_config_command;
use relay_runtime::guild_config::JsonFileGuildConfigStore;
use relay_runtime::publisher::DirectoryPublisher;
use relay_runtime::share::{share_report, ShareContext, ShareOutcome, ShareRequest};

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::load();

    bootstrap::setup_logging(&settings.log_level)?;
    settings.validate()?;

    tracing::info!("kb-relay v{} starting", env!("CARGO_PKG_VERSION"));

    let config_path = settings.config_path();
    bootstrap::ensure_parent_dir(&config_path)?;
    let configs = JsonFileGuildConfigStore::new(config_path);

    match &settings.command {
        Command::Share(args) => run_share(&settings, args, &configs).await,
        Command::Config(command) => {
            let reply = run_config_command(&configs, &settings.guild, command).await?;
            println!("{}", reply);
            Ok(())
        }
    }
}

async fn run_share(
    settings: &Settings,
    args: &ShareArgs,
    configs: &JsonFileGuildConfigStore,
) -> Result<()> {
    let fetcher = HttpFetcher::new(settings.fetch_timeout())?;
    let publisher = DirectoryPublisher::new(&args.out);

    let ctx = ShareContext {
        fetcher: &fetcher,
        configs,
        publisher: &publisher,
        renderer: &SvgChartRenderer,
        report_url_base: &settings.report_url_base,
        debug: settings.debug,
    };
    let request = ShareRequest {
        url: args.url.clone(),
        guild_id: settings.guild.clone(),
        author: Author::named(args.author.clone()),
        private: args.private,
        format: args.format,
    };

    // Ctrl+C abandons an in-flight fetch.
    let cancel = async {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Ctrl+C received; cancelling report fetch");
        }
    };

    match share_report(&ctx, &request, cancel).await {
        Ok(outcome) => {
            if let ShareOutcome::Private { message, .. } = &outcome {
                println!("{}", serde_json::to_string_pretty(message)?);
            }
            println!("{}", outcome.reply());
            Ok(())
        }
        Err(e) => {
            tracing::error!(error = %e, url = %request.url, "failed to share battle report");
            eprintln!("{}", e.reply());
            std::process::exit(1);
        }
    }
}
