//! Structural coupling points with the portal's markup.
//!
//! Defaults describe the portal as it is today; a YAML file can override any subset
//! when the markup drifts.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortalLayout {
    pub transparency_path: String,
    pub search_input: String,
    pub search_submit_key: String,
    pub results_table: String,
    pub organization_link: String,
    pub plan_detail_link: String,
    pub plan_detail_heading: String,
    pub category_unavailable_class: String,
    pub category_label: String,
    pub items_table: String,
    pub next_page: String,
    pub next_page_target: String,
    pub disabled_class: String,
    pub plan_columns: PlanColumns,
    pub item_columns: ItemColumns,
}

impl Default for PortalLayout {
    fn default() -> Self {
        Self {
            transparency_path: "/Transparencia".into(),
            search_input: "#input-pesquisa-orgao".into(),
            search_submit_key: "Enter".into(),
            results_table: "#result-pesquisa table".into(),
            organization_link: "#result-pesquisa table tbody tr > td:last-of-type a".into(),
            plan_detail_link: "td:last-of-type a".into(),
            plan_detail_heading: "Detalhamento do Plano".into(),
            category_unavailable_class: "text-danger".into(),
            category_label: ".list-sticky-item-label > span:first-of-type".into(),
            items_table: "table".into(),
            next_page: ".paginacao ul li.PagedList-skipToNext".into(),
            next_page_target: "a".into(),
            disabled_class: "disabled".into(),
            plan_columns: PlanColumns::default(),
            item_columns: ItemColumns::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanColumns {
    pub year: String,
    pub status: String,
    pub name: String,
    pub estimated_budget: String,
}

impl Default for PlanColumns {
    fn default() -> Self {
        Self {
            year: "Ano".into(),
            status: "Status".into(),
            name: "Identificação".into(),
            estimated_budget: "Valor do Orçamento estimado para o Exercício".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ItemColumns {
    pub uasg: String,
    pub item_number: String,
    pub item_code: String,
    pub description: String,
    pub quantity: String,
    pub unity: String,
    pub estimated_total_value: String,
    pub priority_level: String,
    pub desired_date: String,
}

impl Default for ItemColumns {
    fn default() -> Self {
        Self {
            uasg: "UASG".into(),
            item_number: "Nº Item".into(),
            item_code: "Código do Item".into(),
            description: "Descrição".into(),
            quantity: "Quantidade".into(),
            unity: "Unidade".into(),
            estimated_total_value: "Valor total estimado (R$)".into(),
            priority_level: "Grau de prioridade".into(),
            desired_date: "Data desejada".into(),
        }
    }
}

impl PortalLayout {
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        serde_yaml::from_str(text).context("parsing portal layout")
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        Self::from_yaml_str(&text).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn next_page_locator(&self, block_path: &str) -> String {
        if self.next_page_target.trim().is_empty() {
            format!("{block_path} {}", self.next_page)
        } else {
            format!("{block_path} {} {}", self.next_page, self.next_page_target)
        }
    }
}
