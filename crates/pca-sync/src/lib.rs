use serde::Serialize;

mod config;
mod error;
mod extractor;
mod run;
mod scheduler;
mod traversal;
mod walker;

pub use config::CrawlerConfig;
pub use error::{CrawlCause, CrawlError, CrawlStage, StageExt};
pub use extractor::extract_block;
pub use run::{CrawlSettings, Crawler, RunPhase, RunState, RunSummary};
pub use scheduler::{build_scheduler, scheduled_tick, TickOutcome};
pub use traversal::{resolve_link, traverse_plans, TraversalContext};
pub use walker::{
    normalize_item, BrowserBlockSource, ItemIdentity, ItemsPageSource, PaginationWalker,
};

pub const CRATE_NAME: &str = "pca-sync";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CrawlStats {
    pub plans_seen: usize,
    pub plans_created: usize,
    pub categories_created: usize,
    pub items_seen: usize,
    pub items_created: usize,
    pub item_pages: usize,
    /// A plan without a detail section ended the traversal before the last plan.
    pub abandoned_early: bool,
}

impl CrawlStats {
    fn record_plan(&mut self, created: bool) {
        self.plans_seen += 1;
        if created {
            self.plans_created += 1;
        }
    }

    fn record_item(&mut self, created: bool) {
        self.items_seen += 1;
        if created {
            self.items_created += 1;
        }
    }
}
