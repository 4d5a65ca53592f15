use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use news_aggregator::api::{self, AppState};
use news_aggregator::config::DEFAULT_CONFIG_PATH;
use news_aggregator::{AppConfig, ArticleStore, CycleCoordinator, SqliteStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "news-aggregator", version, about = "Periodic news ingestion pipeline")]
struct Cli {
    /// Path to the sources/settings YAML file.
    #[arg(long, env = "NEWS_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a cycle now, then one per interval until Ctrl-C.
    Run,
    /// Run a single cycle and print its report as JSON.
    Once,
    /// Validate the configuration and list sources.
    Check,
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn open_store(config: &AppConfig) -> Result<Arc<SqliteStore>> {
    let database_url = config.resolved_database_url();
    if let Some(path) = database_url
        .strip_prefix("sqlite://")
        .filter(|p| !p.starts_with(':'))
        .and_then(|p| Path::new(p).parent())
        .filter(|p| !p.as_os_str().is_empty())
    {
        std::fs::create_dir_all(path)
            .with_context(|| format!("creating database directory {}", path.display()))?;
    }

    let store = SqliteStore::connect(&database_url)
        .await
        .with_context(|| format!("opening article store at {}", database_url))?;
    Ok(Arc::new(store))
}

async fn run(config: AppConfig, config_path: PathBuf) -> Result<()> {
    let store = open_store(&config).await?;
    let coordinator = CycleCoordinator::from_config(&config, store.clone(), Some(config_path))
        .context("building cycle coordinator")?;

    if let Some(web) = &config.web {
        let state = AppState {
            store: store.clone() as Arc<dyn ArticleStore>,
            status: coordinator.status(),
        };
        let listener = tokio::net::TcpListener::bind(&web.bind)
            .await
            .with_context(|| format!("binding web surface to {}", web.bind))?;
        info!("Serving web surface on {}", web.bind);
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, api::router(state)).await {
                error!("Web surface stopped: {}", e);
            }
        });
    }

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    coordinator
        .run_forever(shutdown)
        .await
        .context("cycle loop stopped")?;
    info!("News aggregator stopped");
    Ok(())
}

async fn once(config: AppConfig) -> Result<()> {
    let store = open_store(&config).await?;
    let coordinator =
        CycleCoordinator::from_config(&config, store, None).context("building cycle coordinator")?;
    let report = coordinator.run_cycle().await.context("running cycle")?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn check(config: &AppConfig) {
    println!(
        "Configuration OK: every {} min, retention {} days, {} sources",
        config.scrape_interval_minutes,
        config.retention_days,
        config.sources.len()
    );
    for source in &config.sources {
        println!(
            "  [{}] {} ({}) {}",
            if source.enabled { "on " } else { "off" },
            source.name,
            source.kind,
            source.url
        );
    }
    match &config.llm {
        Some(llm) => println!("Summaries: {} via {}", llm.model, llm.base_url()),
        None => println!("Summaries: disabled"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = AppConfig::load(&cli.config)
        .with_context(|| format!("loading configuration from {}", cli.config.display()))?;

    match cli.command {
        Command::Run => run(config, cli.config).await,
        Command::Once => once(config).await,
        Command::Check => {
            check(&config);
            Ok(())
        }
    }
}
