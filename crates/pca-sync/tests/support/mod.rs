//! A scripted portal behind the browser traits: pages are rendered from fixtures and
//! every browser call is recorded.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use anyhow::anyhow;
use async_trait::async_trait;
use pca_adapters::{
    BrowserEngine, BrowserError, BrowserLauncher, BrowserPage, Locator, PortalLayout,
};
use pca_core::DataQualityPolicy;
use pca_storage::MemoryPlanStore;
use pca_sync::{CrawlSettings, Crawler};
use tokio::sync::Notify;

pub const BASE_URL: &str = "https://portal.test";
pub const ORGANIZATION_URL: &str = "https://portal.test/Transparencia/Orgao/42";

pub fn plan_url(index: usize) -> String {
    format!("{BASE_URL}/Transparencia/Plano/{}", index + 1)
}

#[derive(Debug, Clone)]
pub struct ItemFixture {
    pub uasg: String,
    pub item_number: String,
    pub item_code: String,
    pub description: String,
    pub quantity: String,
    pub unity: String,
    pub value: String,
    pub priority: String,
    pub date: String,
}

pub fn item(number: u32, description: &str, quantity: &str) -> ItemFixture {
    ItemFixture {
        uasg: "12.345".into(),
        item_number: number.to_string(),
        item_code: format!("4.{number:03}"),
        description: description.into(),
        quantity: quantity.into(),
        unity: "UN".into(),
        value: "R$ 1.234,56".into(),
        priority: "Alta".into(),
        date: "05/09/2024".into(),
    }
}

#[derive(Debug, Clone)]
pub struct BlockFixture {
    /// `None` renders the block with the unavailable marker.
    pub category: Option<String>,
    pub pages: Vec<Vec<ItemFixture>>,
}

pub fn named(category: &str, pages: Vec<Vec<ItemFixture>>) -> BlockFixture {
    BlockFixture {
        category: Some(category.into()),
        pages,
    }
}

pub fn unavailable(items: Vec<ItemFixture>) -> BlockFixture {
    BlockFixture {
        category: None,
        pages: vec![items],
    }
}

#[derive(Debug, Clone)]
pub struct PlanFixture {
    pub name: String,
    pub year: String,
    pub status: String,
    pub budget: String,
    /// `None` renders a detail page without the detail section.
    pub blocks: Option<Vec<BlockFixture>>,
}

pub fn plan(name: &str, blocks: Vec<BlockFixture>) -> PlanFixture {
    PlanFixture {
        name: name.into(),
        year: "2024".into(),
        status: "\n Publicado \n".into(),
        budget: "R$ 10.000,00".into(),
        blocks: Some(blocks),
    }
}

pub fn plan_without_detail(name: &str) -> PlanFixture {
    PlanFixture {
        blocks: None,
        ..plan(name, Vec::new())
    }
}

#[derive(Debug, Default)]
pub struct Portal {
    pub plans: Vec<PlanFixture>,
    pub failing_urls: HashSet<String>,
    pub events: Vec<String>,
}

impl Portal {
    pub fn new(plans: Vec<PlanFixture>) -> Self {
        Self {
            plans,
            ..Self::default()
        }
    }

    fn render(&self, url: &str, version: usize) -> String {
        if url == ORGANIZATION_URL {
            return self.render_organization();
        }
        match (0..self.plans.len()).find(|&i| plan_url(i) == url) {
            Some(index) => self.render_detail(&self.plans[index], version),
            None => "<html><body><input id=\"input-pesquisa-orgao\"></body></html>".into(),
        }
    }

    fn render_organization(&self) -> String {
        let rows: String = self
            .plans
            .iter()
            .enumerate()
            .map(|(i, p)| {
                format!(
                    "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td>\
                     <td><a href=\"/Transparencia/Plano/{}\">Ver</a></td></tr>",
                    p.year,
                    p.status,
                    p.name,
                    p.budget,
                    i + 1
                )
            })
            .collect();
        format!(
            "<html><body><div id=\"result-pesquisa\"><table>\
             <thead><tr><th>Ano</th><th>Status</th><th>Identificação</th>\
             <th>Valor do Orçamento estimado para o Exercício</th><th></th></tr></thead>\
             <tbody>{rows}</tbody></table></div></body></html>"
        )
    }

    /// Pages advance block by block: each click moves the block currently being walked
    /// one page further.
    fn page_positions(blocks: &[BlockFixture], version: usize) -> Vec<usize> {
        let mut positions = vec![0; blocks.len()];
        let mut remaining = version;
        for (i, block) in blocks.iter().enumerate() {
            let advance = remaining.min(block.pages.len().saturating_sub(1));
            positions[i] = advance;
            remaining -= advance;
        }
        positions
    }

    fn render_detail(&self, plan: &PlanFixture, version: usize) -> String {
        let Some(blocks) = &plan.blocks else {
            return "<html><body><span>Plano sem itens publicados</span></body></html>".into();
        };
        let positions = Self::page_positions(blocks, version);
        let items: String = blocks
            .iter()
            .zip(positions)
            .map(|(block, position)| render_block(block, position))
            .collect();
        format!(
            "<html><body><div class=\"container\"><span>Detalhamento do Plano</span>\
             <ol>{items}</ol></div></body></html>"
        )
    }
}

fn render_block(block: &BlockFixture, position: usize) -> String {
    let class = if block.category.is_some() { "" } else { "text-danger" };
    let label = block.category.clone().unwrap_or_else(|| "Itens sem categoria".into());
    let rows: String = block
        .pages
        .get(position)
        .into_iter()
        .flatten()
        .map(|it| {
            format!(
                "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td>\
                 <td>{}</td><td>{}</td><td>{}</td></tr>",
                it.uasg,
                it.item_number,
                it.item_code,
                it.description,
                it.quantity,
                it.unity,
                it.value,
                it.priority,
                it.date
            )
        })
        .collect();
    let pagination = if block.pages.len() > 1 {
        let disabled = if position + 1 >= block.pages.len() { " disabled" } else { "" };
        format!(
            "<div class=\"paginacao\"><ul><li class=\"PagedList-skipToPrevious\"><a>«</a></li>\
             <li class=\"PagedList-skipToNext{disabled}\"><a>»</a></li></ul></div>"
        )
    } else {
        String::new()
    };
    format!(
        "<li class=\"{class}\"><div class=\"list-sticky-item-label\"><span>{label}</span>\
         <span>{} itens</span></div><table><thead><tr><th>UASG</th><th>Nº Item</th>\
         <th>Código do Item</th><th>Descrição</th><th>Quantidade</th><th>Unidade</th>\
         <th>Valor total estimado (R$)</th><th>Grau de prioridade</th><th>Data desejada</th>\
         </tr></thead><tbody>{rows}</tbody></table>{pagination}</li>",
        block.pages.iter().map(Vec::len).sum::<usize>()
    )
}

pub type SharedPortal = Arc<Mutex<Portal>>;

fn record(portal: &SharedPortal, event: impl Into<String>) {
    if let Ok(mut portal) = portal.lock() {
        portal.events.push(event.into());
    }
}

#[derive(Clone)]
pub struct FixtureLauncher {
    pub portal: SharedPortal,
    /// When set, `launch` waits for a notification before returning.
    pub gate: Option<Arc<Notify>>,
}

impl FixtureLauncher {
    pub fn new(portal: SharedPortal) -> Self {
        Self { portal, gate: None }
    }
}

#[async_trait]
impl BrowserLauncher for FixtureLauncher {
    type Engine = FixtureEngine;

    async fn launch(&self) -> Result<FixtureEngine, BrowserError> {
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        record(&self.portal, "launch");
        Ok(FixtureEngine {
            portal: Arc::clone(&self.portal),
        })
    }
}

pub struct FixtureEngine {
    portal: SharedPortal,
}

#[async_trait]
impl BrowserEngine for FixtureEngine {
    type Page = FixtureTab;

    async fn new_page(&self) -> Result<FixtureTab, BrowserError> {
        record(&self.portal, "new page");
        Ok(FixtureTab {
            portal: Arc::clone(&self.portal),
            location: Mutex::new((String::from("about:blank"), 0)),
        })
    }

    async fn close(self) -> Result<(), BrowserError> {
        record(&self.portal, "browser closed");
        Ok(())
    }
}

pub struct FixtureTab {
    portal: SharedPortal,
    location: Mutex<(String, usize)>,
}

impl FixtureTab {
    fn url(&self) -> String {
        self.location
            .lock()
            .map(|location| location.0.clone())
            .unwrap_or_default()
    }

    fn set_location(&self, url: &str, version: usize) {
        if let Ok(mut location) = self.location.lock() {
            *location = (url.to_string(), version);
        }
    }
}

#[async_trait]
impl BrowserPage for FixtureTab {
    async fn goto(&self, url: &str) -> Result<(), BrowserError> {
        record(&self.portal, format!("goto {url}"));
        let failing = self
            .portal
            .lock()
            .map(|portal| portal.failing_urls.contains(url))
            .unwrap_or(false);
        if failing {
            return Err(BrowserError::Navigation {
                url: url.to_string(),
                source: anyhow!("net::ERR_CONNECTION_RESET"),
            });
        }
        self.set_location(url, 0);
        Ok(())
    }

    async fn wait_for_network_idle(&self) -> Result<(), BrowserError> {
        record(&self.portal, "network idle");
        Ok(())
    }

    async fn wait_for_selector(&self, css: &str) -> Result<(), BrowserError> {
        record(&self.portal, format!("wait for {css}"));
        Ok(())
    }

    async fn wait_for_navigation(&self) -> Result<(), BrowserError> {
        Ok(())
    }

    async fn type_into(&self, css: &str, text: &str) -> Result<(), BrowserError> {
        record(&self.portal, format!("type {text} into {css}"));
        Ok(())
    }

    async fn press_key(&self, key: &str) -> Result<(), BrowserError> {
        record(&self.portal, format!("press {key}"));
        Ok(())
    }

    async fn click(&self, locator: &Locator) -> Result<(), BrowserError> {
        if locator.as_css().contains("PagedList-skipToNext") {
            record(&self.portal, "click next");
            let (url, version) = self
                .location
                .lock()
                .map(|location| location.clone())
                .map_err(|_| BrowserError::Message("tab state poisoned".into()))?;
            self.set_location(&url, version + 1);
        } else {
            record(&self.portal, "click organization");
            self.set_location(ORGANIZATION_URL, 0);
        }
        Ok(())
    }

    async fn content(&self) -> Result<String, BrowserError> {
        let (url, version) = self
            .location
            .lock()
            .map(|location| location.clone())
            .map_err(|_| BrowserError::Message("tab state poisoned".into()))?;
        self.portal
            .lock()
            .map(|portal| portal.render(&url, version))
            .map_err(|_| BrowserError::Message("portal poisoned".into()))
    }

    async fn bring_to_front(&self) -> Result<(), BrowserError> {
        record(&self.portal, "bring to front");
        Ok(())
    }

    async fn activate_lifecycle(&self) -> Result<(), BrowserError> {
        record(&self.portal, "activate lifecycle");
        Ok(())
    }

    async fn close(self) -> Result<(), BrowserError> {
        record(&self.portal, format!("close {}", self.url()));
        Ok(())
    }
}

pub fn settings(policy: DataQualityPolicy) -> CrawlSettings {
    CrawlSettings {
        base_url: BASE_URL.into(),
        organization: "cliente de testes".into(),
        layout: PortalLayout::default(),
        data_quality: policy,
        snapshot_dir: None,
    }
}

pub fn crawler(
    plans: Vec<PlanFixture>,
) -> (Crawler<MemoryPlanStore, FixtureLauncher>, SharedPortal) {
    let portal = Arc::new(Mutex::new(Portal::new(plans)));
    let crawler = Crawler::new(
        MemoryPlanStore::new(),
        FixtureLauncher::new(Arc::clone(&portal)),
        settings(DataQualityPolicy::Reject),
    );
    (crawler, portal)
}

pub fn events(portal: &SharedPortal) -> Vec<String> {
    portal.lock().map(|p| p.events.clone()).unwrap_or_default()
}
