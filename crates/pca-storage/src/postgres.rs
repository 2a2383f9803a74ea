use async_trait::async_trait;
use pca_core::{
    Category, CategoryKey, Plan, PlanItem, PlanItemKey, PlanItemValues, PlanKey, PlanValues,
};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Postgres, Row, Transaction};
use tracing::info;

use crate::{PlanStore, PlanTransaction, RecordStore, StorageError};

const CATEGORY_COLUMNS: &str = "id, name, created_at, updated_at";
const PLAN_COLUMNS: &str = "id, name, year, status, estimated_budget, created_at, updated_at";
const PLAN_ITEM_COLUMNS: &str = "id, plan_id, category_id, uasg, item_number, item_code, \
     description, quantity, unity, estimated_total_value, priority_level, desired_date, \
     created_at, updated_at";

#[derive(Debug, Clone)]
pub struct PgPlanStore {
    pool: PgPool,
}

impl PgPlanStore {
    pub async fn connect(database_url: &str) -> Result<Self, StorageError> {
        let pool = PgPoolOptions::new()
            .max_connections(4)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<(), StorageError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("database migrations applied");
        Ok(())
    }
}

#[async_trait]
impl PlanStore for PgPlanStore {
    type Tx = PgPlanTransaction;

    async fn begin(&self) -> Result<Self::Tx, StorageError> {
        Ok(PgPlanTransaction {
            tx: self.pool.begin().await?,
        })
    }
}

pub struct PgPlanTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl PlanTransaction for PgPlanTransaction {
    async fn commit(self) -> Result<(), StorageError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> Result<(), StorageError> {
        self.tx.rollback().await?;
        Ok(())
    }
}

fn category_from_row(row: &PgRow) -> Result<Category, sqlx::Error> {
    Ok(Category {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn plan_from_row(row: &PgRow) -> Result<Plan, sqlx::Error> {
    Ok(Plan {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        values: PlanValues {
            year: row.try_get("year")?,
            status: row.try_get("status")?,
            estimated_budget: row.try_get("estimated_budget")?,
        },
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn plan_item_from_row(row: &PgRow) -> Result<PlanItem, sqlx::Error> {
    Ok(PlanItem {
        id: row.try_get("id")?,
        key: PlanItemKey {
            plan_id: row.try_get("plan_id")?,
            category_id: row.try_get("category_id")?,
            uasg: row.try_get("uasg")?,
            item_number: row.try_get("item_number")?,
            item_code: row.try_get("item_code")?,
        },
        values: PlanItemValues {
            description: row.try_get("description")?,
            quantity: row.try_get("quantity")?,
            unity: row.try_get("unity")?,
            estimated_total_value: row.try_get("estimated_total_value")?,
            priority_level: row.try_get("priority_level")?,
            desired_date: row.try_get("desired_date")?,
        },
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl RecordStore<Category> for PgPlanTransaction {
    async fn find(&mut self, key: &CategoryKey) -> Result<Option<Category>, StorageError> {
        let sql = format!("SELECT {CATEGORY_COLUMNS} FROM categories WHERE name = $1");
        let row = sqlx::query(&sql)
            .bind(&key.name)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(row.as_ref().map(category_from_row).transpose()?)
    }

    async fn create(&mut self, key: &CategoryKey, _values: &()) -> Result<Category, StorageError> {
        let sql = format!("INSERT INTO categories (name) VALUES ($1) RETURNING {CATEGORY_COLUMNS}");
        let row = sqlx::query(&sql)
            .bind(&key.name)
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(category_from_row(&row)?)
    }

    // Category names are stable labels; nothing to refresh.
    async fn update(&mut self, key: &CategoryKey, _values: &()) -> Result<Category, StorageError> {
        RecordStore::<Category>::find(self, key)
            .await?
            .ok_or_else(|| StorageError::not_found::<Category>(key))
    }
}

#[async_trait]
impl RecordStore<Plan> for PgPlanTransaction {
    async fn find(&mut self, key: &PlanKey) -> Result<Option<Plan>, StorageError> {
        let sql = format!("SELECT {PLAN_COLUMNS} FROM plans WHERE name = $1");
        let row = sqlx::query(&sql)
            .bind(&key.name)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(row.as_ref().map(plan_from_row).transpose()?)
    }

    async fn create(&mut self, key: &PlanKey, values: &PlanValues) -> Result<Plan, StorageError> {
        let sql = format!(
            "INSERT INTO plans (name, year, status, estimated_budget) \
             VALUES ($1, $2, $3, $4) RETURNING {PLAN_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(&key.name)
            .bind(values.year)
            .bind(&values.status)
            .bind(values.estimated_budget)
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(plan_from_row(&row)?)
    }

    async fn update(&mut self, key: &PlanKey, values: &PlanValues) -> Result<Plan, StorageError> {
        let sql = format!(
            "UPDATE plans SET year = $2, status = $3, estimated_budget = $4, updated_at = now() \
             WHERE name = $1 RETURNING {PLAN_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(&key.name)
            .bind(values.year)
            .bind(&values.status)
            .bind(values.estimated_budget)
            .fetch_optional(&mut *self.tx)
            .await?;
        match row {
            Some(row) => Ok(plan_from_row(&row)?),
            None => Err(StorageError::not_found::<Plan>(key)),
        }
    }
}

const PLAN_ITEM_KEY_FILTER: &str = "plan_id = $1 \
     AND category_id IS NOT DISTINCT FROM $2 \
     AND uasg IS NOT DISTINCT FROM $3 \
     AND item_number IS NOT DISTINCT FROM $4 \
     AND item_code IS NOT DISTINCT FROM $5";

#[async_trait]
impl RecordStore<PlanItem> for PgPlanTransaction {
    async fn find(&mut self, key: &PlanItemKey) -> Result<Option<PlanItem>, StorageError> {
        let sql = format!("SELECT {PLAN_ITEM_COLUMNS} FROM plan_items WHERE {PLAN_ITEM_KEY_FILTER}");
        let row = sqlx::query(&sql)
            .bind(key.plan_id)
            .bind(key.category_id)
            .bind(key.uasg)
            .bind(key.item_number)
            .bind(key.item_code)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(row.as_ref().map(plan_item_from_row).transpose()?)
    }

    async fn create(
        &mut self,
        key: &PlanItemKey,
        values: &PlanItemValues,
    ) -> Result<PlanItem, StorageError> {
        let sql = format!(
            "INSERT INTO plan_items (plan_id, category_id, uasg, item_number, item_code, \
             description, quantity, unity, estimated_total_value, priority_level, desired_date) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) RETURNING {PLAN_ITEM_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(key.plan_id)
            .bind(key.category_id)
            .bind(key.uasg)
            .bind(key.item_number)
            .bind(key.item_code)
            .bind(&values.description)
            .bind(values.quantity)
            .bind(&values.unity)
            .bind(values.estimated_total_value)
            .bind(&values.priority_level)
            .bind(values.desired_date)
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(plan_item_from_row(&row)?)
    }

    async fn update(
        &mut self,
        key: &PlanItemKey,
        values: &PlanItemValues,
    ) -> Result<PlanItem, StorageError> {
        let sql = format!(
            "UPDATE plan_items SET description = $6, quantity = $7, unity = $8, \
             estimated_total_value = $9, priority_level = $10, desired_date = $11, \
             updated_at = now() WHERE {PLAN_ITEM_KEY_FILTER} RETURNING {PLAN_ITEM_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(key.plan_id)
            .bind(key.category_id)
            .bind(key.uasg)
            .bind(key.item_number)
            .bind(key.item_code)
            .bind(&values.description)
            .bind(values.quantity)
            .bind(&values.unity)
            .bind(values.estimated_total_value)
            .bind(&values.priority_level)
            .bind(values.desired_date)
            .fetch_optional(&mut *self.tx)
            .await?;
        match row {
            Some(row) => Ok(plan_item_from_row(&row)?),
            None => Err(StorageError::not_found::<PlanItem>(key)),
        }
    }
}
