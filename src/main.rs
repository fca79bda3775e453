use anyhow::Context;
use clap::{Parser, Subcommand};
use nordshort::client::HttpTransport;
use nordshort::datasource::{CsvLayout, CsvRegulatorSource};
use nordshort::domain::Market;
use nordshort::{
    api, CachedFetcher, Config, FileTransport, JsonPortfolio, MergedSource, PortfolioProvider,
    Publisher, SnapshotStore, SourceFetcher, StaticPortfolio, Transport, TransportConfig,
    Validator,
};
use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;

/// Nordic short interest tracker.
#[derive(Debug, Parser)]
#[command(name = "nordshort", version, about = "Nordic short interest publisher and client")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Fetch regulator data, validate it and publish it to DATA_DIR.
    Publish,
    /// Serve DATA_DIR over HTTP.
    Serve,
    /// Fetch the published snapshot through the configured transport.
    Fetch {
        /// Ignore an unexpired cache entry.
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return ExitCode::from(2);
        }
    };

    let result = match cli.command {
        Command::Publish => publish(&config).await,
        Command::Serve => serve(&config).await,
        Command::Fetch { force } => fetch(&config, force).await,
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::from(1)
        }
    }
}

fn build_sources(config: &Config) -> Vec<Arc<dyn SourceFetcher>> {
    let timeout = config.source_timeout();
    let mut sources: Vec<Arc<dyn SourceFetcher>> = Vec::new();

    let se_aggregated = config.se_aggregated_url.as_ref().map(|url| {
        Arc::new(
            CsvRegulatorSource::new("se-aggregated", url, Market::Se, CsvLayout::Aggregated)
                .with_timeout(timeout),
        ) as Arc<dyn SourceFetcher>
    });
    let se_detailed = config.se_detailed_url.as_ref().map(|url| {
        Arc::new(
            CsvRegulatorSource::new("se-detailed", url, Market::Se, CsvLayout::Detailed)
                .with_timeout(timeout),
        ) as Arc<dyn SourceFetcher>
    });
    match (se_aggregated, se_detailed) {
        (Some(aggregated), Some(detailed)) => {
            sources.push(Arc::new(MergedSource::new("se", aggregated, detailed)))
        }
        (Some(single), None) | (None, Some(single)) => sources.push(single),
        (None, None) => {}
    }

    if let Some(url) = &config.fi_positions_url {
        sources.push(Arc::new(
            CsvRegulatorSource::new("fi", url, Market::Fi, CsvLayout::Detailed)
                .with_timeout(timeout),
        ));
    }
    sources
}

async fn publish(config: &Config) -> anyhow::Result<ExitCode> {
    let sources = build_sources(config);
    if sources.is_empty() {
        tracing::warn!("No regulator sources configured; the run will fail");
    }
    let portfolio: Arc<dyn PortfolioProvider> = match &config.portfolio_file {
        Some(path) => Arc::new(JsonPortfolio::new(path)),
        None => Arc::new(StaticPortfolio::default()),
    };
    std::fs::create_dir_all(&config.data_dir)
        .with_context(|| format!("creating {}", config.data_dir.display()))?;
    let store = Arc::new(SnapshotStore::new(&config.data_dir));

    let publisher = Publisher::new(
        sources,
        portfolio,
        Validator::new(config.validator_config()),
        store,
    )
    .with_source_timeout(config.source_timeout());

    let outcome = publisher.run().await.context("publisher run")?;
    println!("{}", serde_json::to_string_pretty(&outcome.metadata)?);

    Ok(if outcome.is_accepted() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    })
}

async fn serve(config: &Config) -> anyhow::Result<ExitCode> {
    let store = Arc::new(SnapshotStore::new(&config.data_dir));
    let app = api::create_router(api::AppState::new(store));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {}", addr))?;

    tracing::info!("Serving {} on {}", config.data_dir.display(), addr);
    axum::serve(listener, app).await.context("server error")?;
    Ok(ExitCode::SUCCESS)
}

async fn fetch(config: &Config, force: bool) -> anyhow::Result<ExitCode> {
    let transport: Arc<dyn Transport> = match &config.transport {
        TransportConfig::File { dir } => Arc::new(FileTransport::new(dir)),
        TransportConfig::Http { base_url } => {
            Arc::new(HttpTransport::new(base_url, config.source_timeout()))
        }
    };
    let fetcher = CachedFetcher::new(transport, &config.cache_dir, config.cache_ttl())
        .with_validator(Validator::new(config.validator_config()));

    let data = fetcher.fetch(force).await?;
    if data.is_stale() {
        tracing::warn!("Showing cached data from {}", data.fetched_at);
    }
    let status = fetcher.status().await;
    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({
            "freshness": data.freshness,
            "generated_at": data.snapshot.generated_at,
            "positions": data.snapshot.positions.len(),
            "portfolio_matches": data.snapshot.matches.len(),
            "cache": status,
        }))?
    );
    Ok(ExitCode::SUCCESS)
}
