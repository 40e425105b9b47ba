//! Web Driver implementation using Playwright
//!
//! One browser, one context, one page per run. The context is seeded from the
//! persisted storage state so that the probes start out logged in.

use anyhow::{Context, Result};
use async_trait::async_trait;
use colored::Colorize;
use log::{debug, info, warn};
use playwright::api::StorageState;
use playwright::api::{Browser, BrowserContext, ElementHandle, Page, Viewport};
use playwright::Playwright;
use regex::Regex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::driver::traits::{ElementRef, Pacing, UiDriver};

/// Web browser type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BrowserType {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

impl BrowserType {
    pub fn parse(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "firefox" => BrowserType::Firefox,
            "webkit" => BrowserType::Webkit,
            _ => BrowserType::Chromium,
        }
    }
}

/// Web Driver configuration
#[derive(Debug, Clone)]
pub struct WebDriverConfig {
    pub browser_type: BrowserType,
    pub headless: bool,
    pub viewport_width: u32,
    pub viewport_height: u32,
    /// URL whose cookies `has_cookie` inspects
    pub cookie_url: String,
}

/// Web Driver using Playwright
pub struct WebDriver {
    #[allow(dead_code)]
    playwright: Arc<Playwright>,
    browser: Arc<Browser>,
    context: Arc<BrowserContext>,
    page: Arc<Mutex<Page>>,
    config: WebDriverConfig,
    handles: Mutex<HashMap<u64, Arc<ElementHandle>>>,
    next_handle: AtomicU64,
}

impl WebDriver {
    /// Launch a browser and open a page, restoring `storage` when given
    pub async fn new(config: WebDriverConfig, storage: Option<serde_json::Value>) -> Result<Self> {
        let playwright = Playwright::initialize()
            .await
            .context("Failed to initialize Playwright")?;

        let browser = match config.browser_type {
            BrowserType::Chromium => launch_chromium_browser(&playwright.chromium(), &config).await?,
            BrowserType::Firefox => {
                playwright
                    .firefox()
                    .launcher()
                    .headless(config.headless)
                    .launch()
                    .await?
            }
            BrowserType::Webkit => {
                playwright
                    .webkit()
                    .launcher()
                    .headless(config.headless)
                    .launch()
                    .await?
            }
        };

        let state = storage.and_then(|value| match serde_json::from_value::<StorageState>(value) {
            Ok(state) => Some(state),
            Err(e) => {
                warn!("Stored session is not a valid storage state, starting fresh: {}", e);
                None
            }
        });

        let context = match state {
            Some(state) => match browser.context_builder().storage_state(state).build().await {
                Ok(ctx) => {
                    info!("Restored browser context from stored session");
                    ctx
                }
                Err(e) => {
                    warn!("Could not restore stored session, starting fresh: {}", e);
                    browser.context_builder().build().await?
                }
            },
            None => browser.context_builder().build().await?,
        };

        let page = context.new_page().await?;
        page.set_viewport_size(Viewport {
            width: config.viewport_width as i32,
            height: config.viewport_height as i32,
        })
        .await?;

        Ok(Self {
            playwright: Arc::new(playwright),
            browser: Arc::new(browser),
            context: Arc::new(context),
            page: Arc::new(Mutex::new(page)),
            config,
            handles: Mutex::new(HashMap::new()),
            next_handle: AtomicU64::new(1),
        })
    }

    async fn handle(&self, element: ElementRef) -> Result<Arc<ElementHandle>> {
        self.handles
            .lock()
            .await
            .get(&element.0)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("Stale element handle: {}", element.0))
    }
}

#[async_trait]
impl UiDriver for WebDriver {
    fn platform_name(&self) -> &str {
        match self.config.browser_type {
            BrowserType::Chromium => "chromium",
            BrowserType::Firefox => "firefox",
            BrowserType::Webkit => "webkit",
        }
    }

    async fn navigate(&self, url: &str) -> Result<()> {
        debug!("navigate {}", url);
        self.handles.lock().await.clear();
        let page = self.page.lock().await;
        page.goto_builder(url)
            .goto()
            .await
            .with_context(|| format!("Failed to navigate to {}", url))?;
        Ok(())
    }

    async fn current_url(&self) -> Result<String> {
        let page = self.page.lock().await;
        Ok(page.url()?)
    }

    async fn locate(&self, selector: &str) -> Result<Option<ElementRef>> {
        let page = self.page.lock().await;
        match page.query_selector(selector).await? {
            Some(handle) => {
                let id = self.next_handle.fetch_add(1, Ordering::SeqCst);
                self.handles.lock().await.insert(id, Arc::new(handle));
                Ok(Some(ElementRef(id)))
            }
            None => Ok(None),
        }
    }

    async fn attribute(&self, element: ElementRef, name: &str) -> Result<Option<String>> {
        let handle = self.handle(element).await?;
        Ok(handle.get_attribute(name).await?)
    }

    async fn text(&self, element: ElementRef) -> Result<Option<String>> {
        let handle = self.handle(element).await?;
        Ok(handle.text_content().await?)
    }

    async fn click(&self, element: ElementRef) -> Result<()> {
        let handle = self.handle(element).await?;
        handle.click_builder().click().await?;
        Ok(())
    }

    async fn click_selector(&self, selector: &str) -> Result<()> {
        let page = self.page.lock().await;
        match page.click_builder(selector).click().await {
            Ok(_) => Ok(()),
            Err(e) => {
                println!(
                    "{} Click failed for selector '{}': {:?}",
                    "❌".red(),
                    selector,
                    e
                );
                Err(anyhow::anyhow!("Failed to click: {}. Error: {:?}", selector, e))
            }
        }
    }

    async fn type_text(&self, text: &str, pacing: Pacing) -> Result<()> {
        match pacing {
            Pacing::Instant => {
                let page = self.page.lock().await;
                page.keyboard.input_text(text).await?;
            }
            Pacing::PerChar(delay) => {
                for ch in text.chars() {
                    tokio::time::sleep(delay).await;
                    let page = self.page.lock().await;
                    page.keyboard.input_text(&ch.to_string()).await?;
                }
            }
        }
        Ok(())
    }

    async fn press_key(&self, key: &str) -> Result<()> {
        let page = self.page.lock().await;
        // Workaround for potential binding issue with press()
        page.keyboard.down(key).await?;
        page.keyboard.up(key).await?;
        Ok(())
    }

    async fn wait_for_selector(&self, selector: &str, timeout_ms: u64) -> Result<bool> {
        let page = self.page.lock().await;
        let result = page
            .wait_for_selector_builder(selector)
            .timeout(timeout_ms as f64)
            .wait_for_selector()
            .await;
        Ok(result.is_ok())
    }

    async fn wait_for_url(&self, pattern: &Regex, timeout_ms: u64) -> Result<bool> {
        poll_until(timeout_ms, move || async move {
            Ok(pattern.is_match(&self.current_url().await?))
        })
        .await
    }

    async fn has_cookie(&self, name: &str) -> Result<bool> {
        let cookies = self
            .context
            .cookies(&[self.config.cookie_url.clone()])
            .await?;
        Ok(cookies.iter().any(|c| c.name == name))
    }

    async fn snapshot_session(&self) -> Result<serde_json::Value> {
        let state = self.context.storage_state().await?;
        Ok(serde_json::to_value(state)?)
    }

    async fn close(&self) -> Result<()> {
        self.handles.lock().await.clear();
        self.context.close().await?;
        self.browser.close().await?;
        Ok(())
    }
}

/// Poll `check` every 250ms until it holds or `timeout_ms` has passed.
/// The condition is always checked at least once.
async fn poll_until<F, Fut>(timeout_ms: u64, mut check: F) -> Result<bool>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<bool>>,
{
    let start = std::time::Instant::now();
    loop {
        if check().await? {
            return Ok(true);
        }
        if start.elapsed().as_millis() >= timeout_ms as u128 {
            return Ok(false);
        }
        tokio::time::sleep(tokio::time::Duration::from_millis(250)).await;
    }
}

/// Launch Chromium, preferring a browser already installed on the host
async fn launch_chromium_browser(
    chromium: &playwright::api::BrowserType,
    config: &WebDriverConfig,
) -> Result<Browser> {
    let mut launcher = chromium.launcher();
    launcher = launcher.headless(config.headless);

    let env_path = std::env::var("PLAYWRIGHT_CHROMIUM_EXECUTABLE_PATH")
        .ok()
        .map(std::path::PathBuf::from);

    let executable = env_path.or_else(find_system_browser);
    if let Some(ref path) = executable {
        info!("Using browser executable: {}", path.display());
        launcher = launcher.executable(path);
    } else {
        debug!("No system browser found, using the Playwright bundled build");
    }

    let args: Vec<String> = [
        "--no-sandbox",
        "--disable-setuid-sandbox",
        "--disable-dev-shm-usage",
        "--disable-gpu",
        "--disable-blink-features=AutomationControlled",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();

    launcher = launcher.args(&args);

    Ok(launcher.launch().await?)
}

fn find_system_browser() -> Option<std::path::PathBuf> {
    let common_paths = [
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        "/usr/bin/google-chrome",
        "/usr/bin/google-chrome-stable",
        "/Applications/Chromium.app/Contents/MacOS/Chromium",
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
        "/snap/bin/chromium",
    ];

    common_paths
        .iter()
        .map(std::path::Path::new)
        .find(|p| p.exists())
        .map(|p| p.to_path_buf())
        .or_else(|| {
            ["google-chrome", "chromium", "chromium-browser"]
                .iter()
                .find_map(|name| which::which(name).ok())
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[tokio::test]
    async fn test_zero_timeout_still_checks_once() {
        assert!(poll_until(0, || async { Ok(true) }).await.unwrap());

        let calls = AtomicUsize::new(0);
        let counter = &calls;
        let matched = poll_until(0, move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(false)
        })
        .await
        .unwrap();
        assert!(!matched);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_condition_met_while_polling() {
        let calls = AtomicUsize::new(0);
        let counter = &calls;
        let matched = poll_until(2000, move || async move {
            Ok(counter.fetch_add(1, Ordering::SeqCst) >= 1)
        })
        .await
        .unwrap();
        assert!(matched);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
