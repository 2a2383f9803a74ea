//! Headless Chrome backend for [`BrowserEngine`] over the DevTools protocol.
//!
//! `headless_chrome` is a blocking client, so every call is moved onto the blocking pool.

use std::ffi::OsStr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::anyhow;
use async_trait::async_trait;
use headless_chrome::protocol::cdp::Page;
use headless_chrome::{Browser, LaunchOptions, Tab};
use tracing::{debug, info};

use crate::browser::{BrowserEngine, BrowserError, BrowserLauncher, BrowserPage, Locator};

/// Outstanding work indicator: ready state, jQuery requests in flight, resources loaded.
const IDLE_PROBE: &str = r#"(() => {
    if (performance.setResourceTimingBufferSize) { performance.setResourceTimingBufferSize(100000); }
    const pending = window.jQuery ? window.jQuery.active : 0;
    return [document.readyState, pending, performance.getEntriesByType('resource').length].join('|');
})()"#;

const IDLE_POLL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone)]
pub struct ChromeOptions {
    pub headless: bool,
    pub executable: Option<PathBuf>,
    pub wait_timeout: Duration,
    /// How long the network has to stay quiet to count as idle.
    pub idle_window: Duration,
}

impl Default for ChromeOptions {
    fn default() -> Self {
        Self {
            headless: true,
            executable: None,
            wait_timeout: Duration::from_secs(30),
            idle_window: Duration::from_millis(500),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ChromeLauncher {
    options: ChromeOptions,
}

impl ChromeLauncher {
    pub fn new(options: ChromeOptions) -> Self {
        Self { options }
    }
}

#[async_trait]
impl BrowserLauncher for ChromeLauncher {
    type Engine = ChromeEngine;

    async fn launch(&self) -> Result<ChromeEngine, BrowserError> {
        let options = self.options.clone();
        let browser = tokio::task::spawn_blocking(move || {
            let launch = LaunchOptions::default_builder()
                .headless(options.headless)
                .sandbox(false)
                .path(options.executable)
                .args(vec![
                    OsStr::new("--disable-setuid-sandbox"),
                    OsStr::new("--disable-features=site-per-process"),
                ])
                .idle_browser_timeout(Duration::from_secs(3600))
                .build()
                .map_err(|e| anyhow!(e.to_string()))?;
            Browser::new(launch)
        })
        .await?
        .map_err(BrowserError::Launch)?;

        info!(headless = self.options.headless, "browser launched");
        Ok(ChromeEngine {
            browser,
            options: self.options.clone(),
        })
    }
}

pub struct ChromeEngine {
    browser: Browser,
    options: ChromeOptions,
}

#[async_trait]
impl BrowserEngine for ChromeEngine {
    type Page = ChromePage;

    async fn new_page(&self) -> Result<ChromePage, BrowserError> {
        let browser = self.browser.clone();
        let timeout = self.options.wait_timeout;
        let tab = tokio::task::spawn_blocking(move || {
            let tab = browser.new_tab()?;
            tab.set_default_timeout(timeout);
            Ok::<_, anyhow::Error>(tab)
        })
        .await?
        .map_err(|source| BrowserError::Interaction {
            action: "opening a tab",
            source,
        })?;

        Ok(ChromePage {
            tab,
            wait_timeout: self.options.wait_timeout,
            idle_window: self.options.idle_window,
        })
    }

    async fn close(self) -> Result<(), BrowserError> {
        // Dropping the last handle terminates the browser process.
        tokio::task::spawn_blocking(move || drop(self.browser)).await?;
        info!("browser closed");
        Ok(())
    }
}

pub struct ChromePage {
    tab: Arc<Tab>,
    wait_timeout: Duration,
    idle_window: Duration,
}

impl ChromePage {
    async fn blocking<T, F>(&self, action: &'static str, f: F) -> Result<T, BrowserError>
    where
        T: Send + 'static,
        F: FnOnce(&Tab) -> anyhow::Result<T> + Send + 'static,
    {
        let tab = Arc::clone(&self.tab);
        tokio::task::spawn_blocking(move || f(&tab))
            .await?
            .map_err(|source| BrowserError::Interaction { action, source })
    }

    async fn probe(&self) -> Result<String, BrowserError> {
        self.blocking("probing network activity", |tab| {
            let result = tab.evaluate(IDLE_PROBE, false)?;
            Ok(result
                .value
                .and_then(|v| v.as_str().map(str::to_string))
                .unwrap_or_default())
        })
        .await
    }
}

fn probe_is_settled(probe: &str) -> bool {
    let mut parts = probe.split('|');
    matches!(
        (parts.next(), parts.next()),
        (Some("complete"), Some("0"))
    )
}

#[async_trait]
impl BrowserPage for ChromePage {
    async fn goto(&self, url: &str) -> Result<(), BrowserError> {
        let target = url.to_string();
        let tab = Arc::clone(&self.tab);
        tokio::task::spawn_blocking(move || {
            tab.navigate_to(&target)?;
            tab.wait_until_navigated()?;
            Ok::<_, anyhow::Error>(())
        })
        .await?
        .map_err(|source| BrowserError::Navigation {
            url: url.to_string(),
            source,
        })?;
        debug!(url, "navigated");
        Ok(())
    }

    async fn wait_for_network_idle(&self) -> Result<(), BrowserError> {
        let deadline = Instant::now() + self.wait_timeout;
        let mut last = self.probe().await?;
        let mut quiet_since = Instant::now();

        loop {
            if probe_is_settled(&last) && quiet_since.elapsed() >= self.idle_window {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(BrowserError::IdleTimeout(self.wait_timeout));
            }
            tokio::time::sleep(IDLE_POLL).await;
            let current = self.probe().await?;
            if current != last {
                last = current;
                quiet_since = Instant::now();
            }
        }
    }

    async fn wait_for_selector(&self, css: &str) -> Result<(), BrowserError> {
        let selector = css.to_string();
        let tab = Arc::clone(&self.tab);
        tokio::task::spawn_blocking(move || tab.wait_for_element(&selector).map(|_| ()))
            .await?
            .map_err(|source| BrowserError::ElementNotFound {
                locator: Locator::css(css).to_string(),
                source,
            })
    }

    async fn wait_for_navigation(&self) -> Result<(), BrowserError> {
        self.blocking("waiting for navigation", |tab| {
            tab.wait_until_navigated()?;
            Ok(())
        })
        .await
    }

    async fn type_into(&self, css: &str, text: &str) -> Result<(), BrowserError> {
        let selector = css.to_string();
        let text = text.to_string();
        self.blocking("typing", move |tab| {
            tab.wait_for_element(&selector)?.type_into(&text)?;
            Ok(())
        })
        .await
    }

    async fn press_key(&self, key: &str) -> Result<(), BrowserError> {
        let key = key.to_string();
        self.blocking("pressing a key", move |tab| {
            tab.press_key(&key)?;
            Ok(())
        })
        .await
    }

    async fn click(&self, locator: &Locator) -> Result<(), BrowserError> {
        let target = locator.clone();
        let tab = Arc::clone(&self.tab);
        tokio::task::spawn_blocking(move || {
            tab.wait_for_element(target.as_css())?.click()?;
            Ok::<_, anyhow::Error>(())
        })
        .await?
        .map_err(|source| BrowserError::ElementNotFound {
            locator: locator.to_string(),
            source,
        })
    }

    async fn content(&self) -> Result<String, BrowserError> {
        self.blocking("reading page content", |tab| tab.get_content())
            .await
    }

    async fn bring_to_front(&self) -> Result<(), BrowserError> {
        self.blocking("bringing tab to front", |tab| {
            tab.bring_to_front()?;
            Ok(())
        })
        .await
    }

    async fn activate_lifecycle(&self) -> Result<(), BrowserError> {
        self.blocking("activating page lifecycle", |tab| {
            tab.call_method(Page::SetWebLifecycleState {
                state: Page::SetWebLifecycleStateStateOption::Active,
            })?;
            Ok(())
        })
        .await
    }

    async fn close(self) -> Result<(), BrowserError> {
        self.blocking("closing tab", |tab| {
            tab.close(true)?;
            Ok(())
        })
        .await
    }
}
