use chrono::Utc;
use pca_adapters::{
    locate_category_blocks, parse_plan_rows, BrowserEngine, BrowserPage, ExtractError, PlanRow,
    PortalLayout,
};
use pca_core::{
    parse_brl_amount, parse_year, single_line, DataQualityPolicy, Plan, PlanKey, PlanValues,
};
use pca_storage::{upsert, PageSnapshotStore, PlanTransaction};
use tracing::{info, info_span, warn, Instrument};

use crate::error::{CrawlError, CrawlStage, StageExt};
use crate::extractor::extract_block;
use crate::walker::BrowserBlockSource;
use crate::CrawlStats;

#[derive(Debug, Clone, Copy)]
pub struct TraversalContext<'a> {
    pub base_url: &'a str,
    pub layout: &'a PortalLayout,
    pub policy: DataQualityPolicy,
    pub snapshots: Option<&'a PageSnapshotStore>,
}

/// A plan whose detail section cannot be found stops the traversal for all the plans after
/// it; what was stored until then is kept.
pub async fn traverse_plans<E, T>(
    engine: &E,
    main: &E::Page,
    tx: &mut T,
    ctx: TraversalContext<'_>,
    stats: &mut CrawlStats,
) -> Result<(), CrawlError>
where
    E: BrowserEngine,
    T: PlanTransaction,
{
    let html = main.content().await.at_stage(CrawlStage::ReadPlans)?;
    let rows = parse_plan_rows(&html, ctx.layout).at_stage(CrawlStage::ReadPlans)?;
    info!(plans = rows.len(), "plans listed");

    for (index, row) in rows.iter().enumerate() {
        let span = info_span!("plan", index, name = row.name.as_deref().unwrap_or_default());
        let proceed = visit_plan(engine, main, tx, ctx, row, stats)
            .instrument(span)
            .await?;
        if !proceed {
            warn!(
                skipped = rows.len() - index - 1,
                "plan detail section missing; abandoning the remaining plans"
            );
            stats.abandoned_early = true;
            break;
        }
    }
    Ok(())
}

async fn visit_plan<E, T>(
    engine: &E,
    main: &E::Page,
    tx: &mut T,
    ctx: TraversalContext<'_>,
    row: &PlanRow,
    stats: &mut CrawlStats,
) -> Result<bool, CrawlError>
where
    E: BrowserEngine,
    T: PlanTransaction,
{
    let href = row
        .detail_href
        .as_deref()
        .ok_or_else(|| ExtractError::MissingElement(ctx.layout.plan_detail_link.clone()))
        .at_stage(CrawlStage::OpenPlan)?;
    let url = resolve_link(ctx.base_url, href);

    let page = engine.new_page().await.at_stage(CrawlStage::OpenPlan)?;
    let outcome = read_plan_detail(&page, &url, tx, ctx, row, stats).await;
    let closed = page.close().await.at_stage(CrawlStage::ClosePlan);
    let proceed = outcome?;
    closed?;

    main.bring_to_front().await.at_stage(CrawlStage::ClosePlan)?;
    main.activate_lifecycle()
        .await
        .at_stage(CrawlStage::ClosePlan)?;
    Ok(proceed)
}

async fn read_plan_detail<P, T>(
    page: &P,
    url: &str,
    tx: &mut T,
    ctx: TraversalContext<'_>,
    row: &PlanRow,
    stats: &mut CrawlStats,
) -> Result<bool, CrawlError>
where
    P: BrowserPage,
    T: PlanTransaction,
{
    page.goto(url).await.at_stage(CrawlStage::OpenPlan)?;
    page.wait_for_network_idle()
        .await
        .at_stage(CrawlStage::OpenPlan)?;

    let (key, values) = normalize_plan(row, ctx.layout, ctx.policy)?;
    let (plan, created) = upsert::<Plan, _>(tx, &key, &values)
        .await
        .at_stage(CrawlStage::SavePlan)?;
    stats.record_plan(created);

    let html = page.content().await.at_stage(CrawlStage::ReadCategories)?;
    if let Some(store) = ctx.snapshots {
        match store.store_html(Utc::now(), &plan.name, &html).await {
            Ok(stored) => info!(path = %stored.path.display(), deduplicated = stored.deduplicated, "plan page snapshot stored"),
            Err(err) => warn!(error = %format!("{err:#}"), "plan page snapshot failed"),
        }
    }

    let Some(blocks) =
        locate_category_blocks(&html, ctx.layout).at_stage(CrawlStage::ReadCategories)?
    else {
        return Ok(false);
    };
    info!(plan_id = plan.id, blocks = blocks.len(), "plan detail located");

    for block_path in &blocks {
        let source = BrowserBlockSource::new(page, block_path, ctx.layout);
        extract_block(source, tx, plan.id, ctx.policy, stats).await?;
    }
    Ok(true)
}

fn normalize_plan(
    row: &PlanRow,
    layout: &PortalLayout,
    policy: DataQualityPolicy,
) -> Result<(PlanKey, PlanValues), CrawlError> {
    let name = row
        .name
        .as_deref()
        .map(single_line)
        .filter(|name| !name.is_empty())
        .ok_or_else(|| ExtractError::MissingField(layout.plan_columns.name.clone()))
        .at_stage(CrawlStage::SavePlan)?;
    let values = PlanValues {
        year: policy
            .apply("year", parse_year(row.year.as_deref().unwrap_or_default()))
            .at_stage(CrawlStage::SavePlan)?,
        status: row.status.as_deref().map(single_line).unwrap_or_default(),
        estimated_budget: policy
            .apply(
                "estimated_budget",
                parse_brl_amount(row.estimated_budget.as_deref().unwrap_or_default()),
            )
            .at_stage(CrawlStage::SavePlan)?,
    };
    Ok((PlanKey { name }, values))
}

pub fn resolve_link(base_url: &str, href: &str) -> String {
    if href.starts_with("http://") || href.starts_with("https://") {
        return href.to_string();
    }
    let base = base_url.trim_end_matches('/');
    match href.strip_prefix('/') {
        Some(path) => format!("{base}/{path}"),
        None => format!("{base}/{href}"),
    }
}
