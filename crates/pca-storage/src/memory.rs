use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use pca_core::{
    Category, CategoryKey, Plan, PlanItem, PlanItemKey, PlanItemValues, PlanKey, PlanValues,
    Record,
};
use tokio::sync::Mutex;

use crate::{PlanStore, PlanTransaction, RecordStore, StorageError};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    next_id: i64,
    categories: Vec<Category>,
    plans: Vec<Plan>,
    plan_items: Vec<PlanItem>,
}

impl MemoryState {
    fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// Snapshot-isolated store kept in process memory.
///
/// A transaction works on a private copy of the committed state and publishes it on
/// `commit`; a rollback (or drop) leaves the committed state untouched.
#[derive(Debug, Clone, Default)]
pub struct MemoryPlanStore {
    committed: Arc<Mutex<MemoryState>>,
    lookups: Arc<std::sync::Mutex<BTreeMap<&'static str, usize>>>,
}

impl MemoryPlanStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn categories(&self) -> Vec<Category> {
        self.committed.lock().await.categories.clone()
    }

    pub async fn plans(&self) -> Vec<Plan> {
        self.committed.lock().await.plans.clone()
    }

    pub async fn plan_items(&self) -> Vec<PlanItem> {
        self.committed.lock().await.plan_items.clone()
    }

    pub fn lookups(&self, entity: &str) -> usize {
        self.lookups
            .lock()
            .map(|counts| counts.get(entity).copied().unwrap_or(0))
            .unwrap_or(0)
    }
}

#[async_trait]
impl PlanStore for MemoryPlanStore {
    type Tx = MemoryPlanTransaction;

    async fn begin(&self) -> Result<Self::Tx, StorageError> {
        let working = self.committed.lock().await.clone();
        Ok(MemoryPlanTransaction {
            committed: Arc::clone(&self.committed),
            lookups: Arc::clone(&self.lookups),
            working,
        })
    }
}

pub struct MemoryPlanTransaction {
    committed: Arc<Mutex<MemoryState>>,
    lookups: Arc<std::sync::Mutex<BTreeMap<&'static str, usize>>>,
    working: MemoryState,
}

impl MemoryPlanTransaction {
    fn count_lookup<R: Record>(&self) {
        if let Ok(mut counts) = self.lookups.lock() {
            *counts.entry(R::ENTITY).or_default() += 1;
        }
    }
}

#[async_trait]
impl PlanTransaction for MemoryPlanTransaction {
    async fn commit(self) -> Result<(), StorageError> {
        *self.committed.lock().await = self.working;
        Ok(())
    }

    async fn rollback(self) -> Result<(), StorageError> {
        Ok(())
    }
}

#[async_trait]
impl RecordStore<Category> for MemoryPlanTransaction {
    async fn find(&mut self, key: &CategoryKey) -> Result<Option<Category>, StorageError> {
        self.count_lookup::<Category>();
        Ok(self
            .working
            .categories
            .iter()
            .find(|c| c.name == key.name)
            .cloned())
    }

    async fn create(&mut self, key: &CategoryKey, _values: &()) -> Result<Category, StorageError> {
        if self.working.categories.iter().any(|c| c.name == key.name) {
            return Err(StorageError::duplicate::<Category>(key));
        }
        let now = Utc::now();
        let category = Category {
            id: self.working.allocate_id(),
            name: key.name.clone(),
            created_at: now,
            updated_at: now,
        };
        self.working.categories.push(category.clone());
        Ok(category)
    }

    async fn update(&mut self, key: &CategoryKey, _values: &()) -> Result<Category, StorageError> {
        self.working
            .categories
            .iter()
            .find(|c| c.name == key.name)
            .cloned()
            .ok_or_else(|| StorageError::not_found::<Category>(key))
    }
}

#[async_trait]
impl RecordStore<Plan> for MemoryPlanTransaction {
    async fn find(&mut self, key: &PlanKey) -> Result<Option<Plan>, StorageError> {
        self.count_lookup::<Plan>();
        Ok(self
            .working
            .plans
            .iter()
            .find(|p| p.name == key.name)
            .cloned())
    }

    async fn create(&mut self, key: &PlanKey, values: &PlanValues) -> Result<Plan, StorageError> {
        if self.working.plans.iter().any(|p| p.name == key.name) {
            return Err(StorageError::duplicate::<Plan>(key));
        }
        let now = Utc::now();
        let plan = Plan {
            id: self.working.allocate_id(),
            name: key.name.clone(),
            values: values.clone(),
            created_at: now,
            updated_at: now,
        };
        self.working.plans.push(plan.clone());
        Ok(plan)
    }

    async fn update(&mut self, key: &PlanKey, values: &PlanValues) -> Result<Plan, StorageError> {
        let plan = self
            .working
            .plans
            .iter_mut()
            .find(|p| p.name == key.name)
            .ok_or_else(|| StorageError::not_found::<Plan>(key))?;
        plan.values = values.clone();
        plan.updated_at = Utc::now();
        Ok(plan.clone())
    }
}

#[async_trait]
impl RecordStore<PlanItem> for MemoryPlanTransaction {
    async fn find(&mut self, key: &PlanItemKey) -> Result<Option<PlanItem>, StorageError> {
        self.count_lookup::<PlanItem>();
        Ok(self
            .working
            .plan_items
            .iter()
            .find(|item| &item.key == key)
            .cloned())
    }

    async fn create(
        &mut self,
        key: &PlanItemKey,
        values: &PlanItemValues,
    ) -> Result<PlanItem, StorageError> {
        if self.working.plan_items.iter().any(|item| &item.key == key) {
            return Err(StorageError::duplicate::<PlanItem>(key));
        }
        let now = Utc::now();
        let item = PlanItem {
            id: self.working.allocate_id(),
            key: key.clone(),
            values: values.clone(),
            created_at: now,
            updated_at: now,
        };
        self.working.plan_items.push(item.clone());
        Ok(item)
    }

    async fn update(
        &mut self,
        key: &PlanItemKey,
        values: &PlanItemValues,
    ) -> Result<PlanItem, StorageError> {
        let item = self
            .working
            .plan_items
            .iter_mut()
            .find(|item| &item.key == key)
            .ok_or_else(|| StorageError::not_found::<PlanItem>(key))?;
        item.values = values.clone();
        item.updated_at = Utc::now();
        Ok(item.clone())
    }
}
