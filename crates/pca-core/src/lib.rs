//! Core domain model for the procurement plan crawler.
//!
//! Every persisted entity is split into a natural key (what identifies the record on the
//! portal) and a value set (what a re-scrape is allowed to overwrite).

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

mod normalize;

pub use normalize::{
    parse_br_date, parse_brl_amount, parse_digits, parse_year, single_line, strip_non_digits,
    DataQualityError, DataQualityPolicy, NormalizeError,
};

pub const CRATE_NAME: &str = "pca-core";

/// A persisted row: the natural key it is looked up by and the fields an upsert refreshes.
pub trait Record: Sized + Send + Sync {
    type Key: Send + Sync + std::fmt::Debug;
    type Values: Send + Sync + std::fmt::Debug;

    const ENTITY: &'static str;
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CategoryKey {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Record for Category {
    type Key = CategoryKey;
    type Values = ();

    const ENTITY: &'static str = "category";
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlanKey {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanValues {
    pub year: Option<i32>,
    pub status: String,
    pub estimated_budget: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub id: i64,
    pub name: String,
    pub values: PlanValues,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Record for Plan {
    type Key = PlanKey;
    type Values = PlanValues;

    const ENTITY: &'static str = "plan";
}

/// Identity of a plan item. All five parts take part in equality, `None` included.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlanItemKey {
    pub plan_id: i64,
    pub category_id: Option<i64>,
    pub uasg: Option<i64>,
    pub item_number: Option<i64>,
    pub item_code: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanItemValues {
    pub description: String,
    pub quantity: Option<i64>,
    pub unity: String,
    pub estimated_total_value: Option<f64>,
    pub priority_level: String,
    pub desired_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanItem {
    pub id: i64,
    pub key: PlanItemKey,
    pub values: PlanItemValues,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Record for PlanItem {
    type Key = PlanItemKey;
    type Values = PlanItemValues;

    const ENTITY: &'static str = "plan_item";
}
