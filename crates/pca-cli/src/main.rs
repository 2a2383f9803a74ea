use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pca_adapters::ChromeLauncher;
use pca_storage::{MemoryPlanStore, PgPlanStore, PlanStore};
use pca_sync::{build_scheduler, scheduled_tick, CrawlSettings, Crawler, CrawlerConfig, RunSummary};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "pca-cli")]
#[command(about = "Procurement plan crawler")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Crawl the portal once and commit the result.
    Sync,
    /// Crawl now, then again on every cron tick until interrupted.
    Schedule,
    /// Apply pending database migrations.
    Migrate,
    /// Crawl into an in-memory store; nothing is persisted.
    DryRun,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .compact()
        .try_init();

    let cli = Cli::parse();
    let config = CrawlerConfig::from_env()?;

    match cli.command.unwrap_or(Commands::Sync) {
        Commands::Sync => {
            let crawler = crawler(connect(&config).await?, &config)?;
            print_summary(&crawler.run_once().await?)?;
        }
        Commands::Schedule => {
            let crawler = Arc::new(crawler(connect(&config).await?, &config)?);
            scheduled_tick(&crawler).await;

            let mut sched = build_scheduler(Arc::clone(&crawler), &config.schedule_cron).await?;
            sched.start().await.context("starting scheduler")?;
            tokio::signal::ctrl_c()
                .await
                .context("waiting for ctrl-c")?;
            info!("shutting down scheduler");
            sched.shutdown().await.context("stopping scheduler")?;
        }
        Commands::Migrate => {
            connect(&config).await?.migrate().await.context("applying migrations")?;
            println!("migrations applied");
        }
        Commands::DryRun => {
            let crawler = crawler(MemoryPlanStore::new(), &config)?;
            print_summary(&crawler.run_once().await?)?;
        }
    }

    Ok(())
}

async fn connect(config: &CrawlerConfig) -> Result<PgPlanStore> {
    PgPlanStore::connect(&config.database_url)
        .await
        .context("connecting to database")
}

fn crawler<S: PlanStore>(store: S, config: &CrawlerConfig) -> Result<Crawler<S, ChromeLauncher>> {
    let settings = CrawlSettings::from_config(config)?;
    Ok(Crawler::new(
        store,
        ChromeLauncher::new(config.chrome_options()),
        settings,
    ))
}

fn print_summary(summary: &RunSummary) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(summary)?);
    Ok(())
}
