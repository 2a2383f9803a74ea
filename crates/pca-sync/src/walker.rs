use async_trait::async_trait;
use pca_adapters::{parse_block_page, BlockPage, BrowserPage, ItemRow, Locator, PortalLayout};
use pca_core::{
    parse_br_date, parse_brl_amount, parse_digits, single_line, strip_non_digits,
    DataQualityError, DataQualityPolicy, PlanItemValues,
};
use tracing::debug;

use crate::error::{CrawlError, CrawlStage, StageExt};

#[async_trait]
pub trait ItemsPageSource: Send {
    async fn read_page(&mut self) -> Result<BlockPage, CrawlError>;
    async fn activate_next(&mut self) -> Result<(), CrawlError>;
}

pub struct BrowserBlockSource<'a, P> {
    page: &'a P,
    block_path: &'a str,
    layout: &'a PortalLayout,
}

impl<'a, P: BrowserPage> BrowserBlockSource<'a, P> {
    pub fn new(page: &'a P, block_path: &'a str, layout: &'a PortalLayout) -> Self {
        Self {
            page,
            block_path,
            layout,
        }
    }
}

#[async_trait]
impl<'a, P: BrowserPage> ItemsPageSource for BrowserBlockSource<'a, P> {
    async fn read_page(&mut self) -> Result<BlockPage, CrawlError> {
        let html = self.page.content().await.at_stage(CrawlStage::ReadItems)?;
        parse_block_page(&html, self.block_path, self.layout).at_stage(CrawlStage::ReadItems)
    }

    async fn activate_next(&mut self) -> Result<(), CrawlError> {
        let next = Locator::css(self.layout.next_page_locator(self.block_path));
        self.page
            .click(&next)
            .await
            .at_stage(CrawlStage::NextItemsPage)?;
        // A clicked page may still be throttled as a background context.
        self.page
            .bring_to_front()
            .await
            .at_stage(CrawlStage::NextItemsPage)?;
        self.page
            .activate_lifecycle()
            .await
            .at_stage(CrawlStage::NextItemsPage)?;
        self.page
            .wait_for_network_idle()
            .await
            .at_stage(CrawlStage::NextItemsPage)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WalkState {
    ReadingPage,
    HasNext,
    Done,
}

pub struct PaginationWalker<S> {
    source: S,
    state: WalkState,
    pending: Option<BlockPage>,
    passes: usize,
}

impl<S: ItemsPageSource> PaginationWalker<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            state: WalkState::ReadingPage,
            pending: None,
            passes: 0,
        }
    }

    /// Starts from a first page the caller already read.
    pub fn resume(source: S, first: BlockPage) -> Self {
        Self {
            pending: Some(first),
            ..Self::new(source)
        }
    }

    pub fn passes(&self) -> usize {
        self.passes
    }

    /// The next page, or `None` once the block is exhausted. The caller is expected to
    /// persist a page's rows before asking for the following one.
    pub async fn next_page(&mut self) -> Result<Option<BlockPage>, CrawlError> {
        loop {
            match self.state {
                WalkState::ReadingPage => {
                    let page = match self.pending.take() {
                        Some(page) => page,
                        None => self.source.read_page().await?,
                    };
                    self.passes += 1;
                    self.state = if page.next.is_enabled() {
                        WalkState::HasNext
                    } else {
                        WalkState::Done
                    };
                    debug!(pass = self.passes, rows = page.rows.len(), next = ?page.next, "items page read");
                    return Ok(Some(page));
                }
                WalkState::HasNext => {
                    self.source.activate_next().await?;
                    self.state = WalkState::ReadingPage;
                }
                WalkState::Done => return Ok(None),
            }
        }
    }
}

/// Identifying columns of an item row. Missing or digit-less values are `None` and still
/// take part in the item's identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemIdentity {
    pub uasg: Option<i64>,
    pub item_number: Option<i64>,
    pub item_code: Option<i64>,
}

pub fn normalize_item(
    row: &ItemRow,
    policy: DataQualityPolicy,
) -> Result<(ItemIdentity, PlanItemValues), DataQualityError> {
    let text = |cell: &Option<String>| cell.as_deref().map(single_line).unwrap_or_default();
    let raw = |cell: &Option<String>| cell.as_deref().unwrap_or_default().to_string();

    let identity = ItemIdentity {
        uasg: row.uasg.as_deref().and_then(strip_non_digits),
        item_number: row.item_number.as_deref().and_then(strip_non_digits),
        item_code: row.item_code.as_deref().and_then(strip_non_digits),
    };
    let values = PlanItemValues {
        description: text(&row.description),
        quantity: policy.apply("quantity", parse_digits(&raw(&row.quantity)))?,
        unity: text(&row.unity),
        estimated_total_value: policy.apply(
            "estimated_total_value",
            parse_brl_amount(&raw(&row.estimated_total_value)),
        )?,
        priority_level: text(&row.priority_level),
        desired_date: policy.apply("desired_date", parse_br_date(&raw(&row.desired_date)))?,
    };
    Ok((identity, values))
}
