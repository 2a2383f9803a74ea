use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use pca_adapters::{BrowserEngine, BrowserLauncher, BrowserPage, Locator, PortalLayout};
use pca_core::DataQualityPolicy;
use pca_storage::{PageSnapshotStore, PlanStore, PlanTransaction};
use serde::Serialize;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::config::CrawlerConfig;
use crate::error::{CrawlError, CrawlStage, StageExt};
use crate::traversal::{resolve_link, traverse_plans, TraversalContext};
use crate::CrawlStats;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    Idle,
    Running,
}

/// Whether a crawl is in progress. Clones observe the same run.
#[derive(Debug, Clone, Default)]
pub struct RunState {
    running: Arc<AtomicBool>,
}

impl RunState {
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> RunPhase {
        if self.is_running() {
            RunPhase::Running
        } else {
            RunPhase::Idle
        }
    }

    fn enter(&self) -> RunGuard {
        self.running.store(true, Ordering::SeqCst);
        RunGuard {
            running: Arc::clone(&self.running),
        }
    }
}

struct RunGuard {
    running: Arc<AtomicBool>,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone)]
pub struct CrawlSettings {
    pub base_url: String,
    pub organization: String,
    pub layout: PortalLayout,
    pub data_quality: DataQualityPolicy,
    pub snapshot_dir: Option<PathBuf>,
}

impl CrawlSettings {
    pub fn from_config(config: &CrawlerConfig) -> Result<Self> {
        Ok(Self {
            base_url: config.base_url.clone(),
            organization: config.organization.clone(),
            layout: config.layout()?,
            data_quality: config.data_quality,
            snapshot_dir: config.snapshot_dir.clone(),
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub organization: String,
    #[serde(flatten)]
    pub stats: CrawlStats,
}

pub struct Crawler<S, L> {
    store: S,
    launcher: L,
    settings: CrawlSettings,
    snapshots: Option<PageSnapshotStore>,
    state: RunState,
}

impl<S, L> Crawler<S, L>
where
    S: PlanStore,
    L: BrowserLauncher,
{
    pub fn new(store: S, launcher: L, settings: CrawlSettings) -> Self {
        let snapshots = settings.snapshot_dir.clone().map(PageSnapshotStore::new);
        Self {
            store,
            launcher,
            settings,
            snapshots,
            state: RunState::default(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn run_state(&self) -> RunState {
        self.state.clone()
    }

    pub fn is_running(&self) -> bool {
        self.state.is_running()
    }

    /// Crawls the portal and commits everything, or nothing when any step fails.
    pub async fn run_once(&self) -> Result<RunSummary, CrawlError> {
        let _guard = self.state.enter();
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let span = info_span!("crawl", %run_id, organization = %self.settings.organization);

        async move {
            info!("crawl started");
            let mut tx = self
                .store
                .begin()
                .await
                .at_stage(CrawlStage::BeginTransaction)?;
            let mut stats = CrawlStats::default();

            match self.crawl(&mut tx, &mut stats).await {
                Ok(()) => {
                    tx.commit().await.at_stage(CrawlStage::Commit)?;
                    let summary = RunSummary {
                        run_id,
                        started_at,
                        finished_at: Utc::now(),
                        organization: self.settings.organization.clone(),
                        stats,
                    };
                    info!(
                        plans = summary.stats.plans_seen,
                        items = summary.stats.items_seen,
                        abandoned_early = summary.stats.abandoned_early,
                        "crawl committed"
                    );
                    Ok(summary)
                }
                Err(err) => {
                    if let Err(rollback) = tx.rollback().await {
                        warn!(error = %rollback, "rollback failed");
                    }
                    error!(stage = %err.stage, error = %err, "crawl failed; transaction rolled back");
                    Err(err)
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn crawl(&self, tx: &mut S::Tx, stats: &mut CrawlStats) -> Result<(), CrawlError> {
        let engine = self
            .launcher
            .launch()
            .await
            .at_stage(CrawlStage::LaunchBrowser)?;
        let outcome = self.drive(&engine, tx, stats).await;
        let closed = engine.close().await.at_stage(CrawlStage::CloseBrowser);
        outcome?;
        closed
    }

    async fn drive(
        &self,
        engine: &L::Engine,
        tx: &mut S::Tx,
        stats: &mut CrawlStats,
    ) -> Result<(), CrawlError> {
        let layout = &self.settings.layout;
        let main = engine.new_page().await.at_stage(CrawlStage::OpenPortal)?;

        let portal = resolve_link(&self.settings.base_url, &layout.transparency_path);
        main.goto(&portal).await.at_stage(CrawlStage::OpenPortal)?;
        main.wait_for_network_idle()
            .await
            .at_stage(CrawlStage::OpenPortal)?;

        main.type_into(&layout.search_input, &self.settings.organization)
            .await
            .at_stage(CrawlStage::SearchOrganization)?;
        main.press_key(&layout.search_submit_key)
            .await
            .at_stage(CrawlStage::SearchOrganization)?;
        main.wait_for_selector(&layout.results_table)
            .await
            .at_stage(CrawlStage::SearchOrganization)?;

        main.click(&Locator::css(layout.organization_link.as_str()))
            .await
            .at_stage(CrawlStage::SelectOrganization)?;
        main.wait_for_navigation()
            .await
            .at_stage(CrawlStage::SelectOrganization)?;
        main.wait_for_network_idle()
            .await
            .at_stage(CrawlStage::SelectOrganization)?;

        let ctx = TraversalContext {
            base_url: &self.settings.base_url,
            layout,
            policy: self.settings.data_quality,
            snapshots: self.snapshots.as_ref(),
        };
        traverse_plans(engine, &main, tx, ctx, stats).await
    }
}
