//! Snapshot parsing of the portal pages.
//!
//! Everything here works on serialized DOM text and returns owned data, so no parsed
//! document ever lives across an await point.

use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::layout::PortalLayout;
use crate::table::{body_rows, cell_text, child_elements, text_of};

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("invalid selector `{selector}`: {reason}")]
    Selector { selector: String, reason: String },
    #[error("required element `{0}` not found")]
    MissingElement(String),
    #[error("required column `{0}` is empty")]
    MissingField(String),
}

fn selector(css: &str) -> Result<Selector, ExtractError> {
    Selector::parse(css).map_err(|e| ExtractError::Selector {
        selector: css.to_string(),
        reason: e.to_string(),
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanRow {
    pub year: Option<String>,
    pub status: Option<String>,
    pub name: Option<String>,
    pub estimated_budget: Option<String>,
    pub detail_href: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemRow {
    pub uasg: Option<String>,
    pub item_number: Option<String>,
    pub item_code: Option<String>,
    pub description: Option<String>,
    pub quantity: Option<String>,
    pub unity: Option<String>,
    pub estimated_total_value: Option<String>,
    pub priority_level: Option<String>,
    pub desired_date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CategoryMarker {
    Named(String),
    Unlabeled,
    /// Block flagged as unavailable; its items carry no category.
    Unavailable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NextControl {
    Absent,
    Disabled,
    Enabled,
}

impl NextControl {
    pub fn is_enabled(self) -> bool {
        self == Self::Enabled
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockPage {
    pub category: CategoryMarker,
    pub rows: Vec<ItemRow>,
    pub next: NextControl,
}

/// CSS path from the document root to `element`, stable while the page keeps its shape.
pub fn css_path(element: ElementRef<'_>) -> String {
    let mut segments = Vec::new();
    let mut current = Some(element);
    while let Some(node) = current {
        let name = node.value().name();
        if name == "html" {
            segments.push(name.to_string());
            break;
        }
        let position = node
            .prev_siblings()
            .filter(|sibling| sibling.value().is_element())
            .count()
            + 1;
        segments.push(format!("{name}:nth-child({position})"));
        current = node.parent().and_then(ElementRef::wrap);
    }
    segments.reverse();
    segments.join(" > ")
}

pub fn parse_plan_rows(html: &str, layout: &PortalLayout) -> Result<Vec<PlanRow>, ExtractError> {
    let document = Html::parse_document(html);
    let table_selector = selector(&layout.results_table)?;
    let link_selector = selector(&layout.plan_detail_link)?;
    let table = document
        .select(&table_selector)
        .next()
        .ok_or_else(|| ExtractError::MissingElement(layout.results_table.clone()))?;
    let columns = &layout.plan_columns;

    Ok(body_rows(table)
        .enumerate()
        .map(|(index, row)| {
            let position = index + 1;
            PlanRow {
                year: cell_text(table, position, &columns.year),
                status: cell_text(table, position, &columns.status),
                name: cell_text(table, position, &columns.name),
                estimated_budget: cell_text(table, position, &columns.estimated_budget),
                detail_href: row
                    .select(&link_selector)
                    .next()
                    .and_then(|link| link.value().attr("href"))
                    .map(|href| href.trim().to_string()),
            }
        })
        .collect())
}

/// Paths of the category blocks listed under the plan detail heading.
///
/// `None` when the heading or the list after it is missing: the page has no extractable
/// detail.
pub fn locate_category_blocks(
    html: &str,
    layout: &PortalLayout,
) -> Result<Option<Vec<String>>, ExtractError> {
    let document = Html::parse_document(html);
    let spans = selector("span")?;
    let heading = document
        .select(&spans)
        .find(|span| span.text().collect::<String>().trim() == layout.plan_detail_heading);
    let Some(heading) = heading else {
        return Ok(None);
    };
    let list = heading
        .next_siblings()
        .filter_map(ElementRef::wrap)
        .find(|sibling| sibling.value().name() == "ol");
    let Some(list) = list else {
        return Ok(None);
    };

    Ok(Some(
        child_elements(list)
            .filter(|child| child.value().name() == "li")
            .map(css_path)
            .collect(),
    ))
}

pub fn parse_block_page(
    html: &str,
    block_path: &str,
    layout: &PortalLayout,
) -> Result<BlockPage, ExtractError> {
    let document = Html::parse_document(html);
    let block_selector = selector(block_path)?;
    let block = document
        .select(&block_selector)
        .next()
        .ok_or_else(|| ExtractError::MissingElement(block_path.to_string()))?;
    parse_block(block, layout)
}

pub fn parse_block(block: ElementRef<'_>, layout: &PortalLayout) -> Result<BlockPage, ExtractError> {
    let category = if has_class(block, &layout.category_unavailable_class) {
        CategoryMarker::Unavailable
    } else {
        let label = selector(&layout.category_label)?;
        block
            .select(&label)
            .next()
            .and_then(text_of)
            .map_or(CategoryMarker::Unlabeled, CategoryMarker::Named)
    };

    let table_selector = selector(&layout.items_table)?;
    let rows = match block.select(&table_selector).next() {
        Some(table) => {
            let columns = &layout.item_columns;
            (1..=body_rows(table).count())
                .map(|row| ItemRow {
                    uasg: cell_text(table, row, &columns.uasg),
                    item_number: cell_text(table, row, &columns.item_number),
                    item_code: cell_text(table, row, &columns.item_code),
                    description: cell_text(table, row, &columns.description),
                    quantity: cell_text(table, row, &columns.quantity),
                    unity: cell_text(table, row, &columns.unity),
                    estimated_total_value: cell_text(table, row, &columns.estimated_total_value),
                    priority_level: cell_text(table, row, &columns.priority_level),
                    desired_date: cell_text(table, row, &columns.desired_date),
                })
                .collect()
        }
        None => Vec::new(),
    };

    let next_selector = selector(&layout.next_page)?;
    let next = match block.select(&next_selector).next() {
        None => NextControl::Absent,
        Some(control) if has_class(control, &layout.disabled_class) => NextControl::Disabled,
        Some(_) => NextControl::Enabled,
    };

    Ok(BlockPage {
        category,
        rows,
        next,
    })
}

fn has_class(element: ElementRef<'_>, class: &str) -> bool {
    element.value().classes().any(|c| c == class)
}
