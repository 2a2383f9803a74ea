use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locator(String);

impl Locator {
    pub fn css(selector: impl Into<String>) -> Self {
        Self(selector.into())
    }

    pub fn as_css(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "css `{}`", self.0)
    }
}

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("browser launch failed: {0}")]
    Launch(#[source] anyhow::Error),
    #[error("navigation to {url} failed: {source}")]
    Navigation {
        url: String,
        source: anyhow::Error,
    },
    #[error("{locator} not found: {source}")]
    ElementNotFound {
        locator: String,
        source: anyhow::Error,
    },
    #[error("{action} failed: {source}")]
    Interaction {
        action: &'static str,
        source: anyhow::Error,
    },
    #[error("network still busy after {0:?}")]
    IdleTimeout(Duration),
    #[error("browser task did not complete: {0}")]
    Join(#[from] tokio::task::JoinError),
    #[error("{0}")]
    Message(String),
}

#[async_trait]
pub trait BrowserPage: Send + Sync + Sized {
    async fn goto(&self, url: &str) -> Result<(), BrowserError>;
    async fn wait_for_network_idle(&self) -> Result<(), BrowserError>;
    async fn wait_for_selector(&self, css: &str) -> Result<(), BrowserError>;
    async fn wait_for_navigation(&self) -> Result<(), BrowserError>;
    async fn type_into(&self, css: &str, text: &str) -> Result<(), BrowserError>;
    async fn press_key(&self, key: &str) -> Result<(), BrowserError>;
    async fn click(&self, locator: &Locator) -> Result<(), BrowserError>;
    async fn content(&self) -> Result<String, BrowserError>;
    async fn bring_to_front(&self) -> Result<(), BrowserError>;
    /// Forces the context out of the throttled background lifecycle state.
    async fn activate_lifecycle(&self) -> Result<(), BrowserError>;
    async fn close(self) -> Result<(), BrowserError>;
}

#[async_trait]
pub trait BrowserEngine: Send + Sync + Sized {
    type Page: BrowserPage;

    async fn new_page(&self) -> Result<Self::Page, BrowserError>;
    async fn close(self) -> Result<(), BrowserError>;
}

#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    type Engine: BrowserEngine;

    async fn launch(&self) -> Result<Self::Engine, BrowserError>;
}
