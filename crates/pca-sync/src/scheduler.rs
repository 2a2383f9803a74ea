use std::sync::Arc;

use anyhow::{Context, Result};
use pca_adapters::BrowserLauncher;
use pca_storage::PlanStore;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{info, warn};

use crate::run::Crawler;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Skipped,
    Committed,
    Failed,
}

/// One scheduler firing: starts a crawl unless one is already in progress.
pub async fn scheduled_tick<S, L>(crawler: &Crawler<S, L>) -> TickOutcome
where
    S: PlanStore,
    L: BrowserLauncher,
{
    if crawler.is_running() {
        warn!("previous crawl still running; skipping this tick");
        return TickOutcome::Skipped;
    }
    match crawler.run_once().await {
        Ok(summary) => {
            info!(run_id = %summary.run_id, "scheduled crawl finished");
            TickOutcome::Committed
        }
        // Already logged with its stage by the crawler.
        Err(_) => TickOutcome::Failed,
    }
}

pub async fn build_scheduler<S, L>(crawler: Arc<Crawler<S, L>>, cron: &str) -> Result<JobScheduler>
where
    S: PlanStore + 'static,
    L: BrowserLauncher + 'static,
{
    let sched = JobScheduler::new().await.context("creating scheduler")?;
    let job = Job::new_async(cron, move |_uuid, _l| {
        let crawler = Arc::clone(&crawler);
        Box::pin(async move {
            scheduled_tick(&crawler).await;
        })
    })
    .with_context(|| format!("creating scheduler job for cron {cron}"))?;
    sched.add(job).await.context("adding scheduler job")?;
    info!(cron, "crawl scheduled");
    Ok(sched)
}
