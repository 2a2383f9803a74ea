use pca_adapters::CategoryMarker;
use pca_core::{Category, CategoryKey, DataQualityPolicy, PlanItem, PlanItemKey};
use pca_storage::{upsert, PlanTransaction};
use tracing::{debug, warn};

use crate::error::{CrawlError, CrawlStage, StageExt};
use crate::walker::{normalize_item, ItemsPageSource, PaginationWalker};
use crate::CrawlStats;

/// Blocks marked unavailable store their items without a category and never touch the
/// category table.
pub async fn extract_block<S, T>(
    mut source: S,
    tx: &mut T,
    plan_id: i64,
    policy: DataQualityPolicy,
    stats: &mut CrawlStats,
) -> Result<(), CrawlError>
where
    S: ItemsPageSource,
    T: PlanTransaction,
{
    let first = source.read_page().await?;

    let category_id = match &first.category {
        CategoryMarker::Unavailable => None,
        CategoryMarker::Unlabeled => {
            warn!(plan_id, "categorized block has no label; storing its items uncategorized");
            None
        }
        CategoryMarker::Named(name) => {
            let key = CategoryKey { name: name.clone() };
            let (category, created) = upsert::<Category, _>(tx, &key, &())
                .await
                .at_stage(CrawlStage::SaveCategory)?;
            if created {
                stats.categories_created += 1;
            }
            Some(category.id)
        }
    };
    debug!(plan_id, ?category_id, "extracting category block");

    let mut walker = PaginationWalker::resume(source, first);
    while let Some(page) = walker.next_page().await? {
        for row in &page.rows {
            let (identity, values) = normalize_item(row, policy).at_stage(CrawlStage::ReadItems)?;
            let key = PlanItemKey {
                plan_id,
                category_id,
                uasg: identity.uasg,
                item_number: identity.item_number,
                item_code: identity.item_code,
            };
            let (_, created) = upsert::<PlanItem, _>(tx, &key, &values)
                .await
                .at_stage(CrawlStage::SaveItem)?;
            stats.record_item(created);
        }
    }
    stats.item_pages += walker.passes();
    Ok(())
}
