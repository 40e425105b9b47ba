//! Probes: one user-facing action plus the check that it worked
//!
//! A probe is split into `action` (drive the page) and `assertion` (inspect
//! the page). The runner calls them in that order, and calls neither once an
//! earlier probe of the same run has failed.

pub mod greeting;
pub mod login;
pub mod suite;
pub mod toggle;

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;

use crate::catalog::{page_url, SelectorCatalog};
use crate::driver::traits::{ElementRef, Pacing, UiDriver};
use crate::session::{Session, SessionStore};
use crate::utils::config::Config;

/// Failures a probe can raise while acting on or inspecting the page
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("assertion failed: {0}")]
    Assertion(String),

    #[error("element not found: {0}")]
    ElementNotFound(String),

    #[error("timed out after {timeout_ms}ms waiting for {what}")]
    Timeout { what: String, timeout_ms: u64 },
}

/// What the action phase achieved
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    /// The action ran; the assertion decides the result
    Performed,
    /// The desired end state was already present; no assertion is made
    AlreadySatisfied(String),
    /// The page offered nothing to act on; no assertion is made
    NotApplicable(String),
}

/// Result of the assertion phase
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Pass,
    Fail(String),
    /// The site legitimately refused the action (e.g. duplicate content)
    Skip(String),
}

/// Everything a probe may touch while it runs
pub struct ProbeContext<'a> {
    pub driver: &'a dyn UiDriver,
    pub config: &'a Config,
    pub catalog: &'a SelectorCatalog,
    pub session: &'a mut Session,
    pub store: &'a dyn SessionStore,
    /// Values handed from a probe's action to its assertion
    pub notes: HashMap<&'static str, String>,
}

impl<'a> ProbeContext<'a> {
    pub fn new(
        driver: &'a dyn UiDriver,
        config: &'a Config,
        catalog: &'a SelectorCatalog,
        session: &'a mut Session,
        store: &'a dyn SessionStore,
    ) -> Self {
        Self {
            driver,
            config,
            catalog,
            session,
            store,
            notes: HashMap::new(),
        }
    }

    /// Navigate to a catalog path
    pub async fn goto(&self, path: &str) -> Result<()> {
        self.driver
            .navigate(&page_url(&self.config.base_url, path))
            .await
    }

    pub async fn settle(&self, ms: u64) {
        self.driver.sleep(ms).await;
    }

    /// Pacing for text that should look typed by a person
    pub fn human_pacing(&self) -> Pacing {
        Pacing::per_char_ms(self.config.timings.typing_delay_ms)
    }

    pub fn timeout_ms(&self) -> u64 {
        self.config.timings.default_timeout_ms
    }

    pub fn account(&self) -> Result<&str> {
        self.config.require_account()
    }

    /// Wait for a selector, turning a timeout into a probe failure
    pub async fn expect_selector(&self, selector: &str) -> Result<()> {
        let timeout_ms = self.timeout_ms();
        if self.driver.wait_for_selector(selector, timeout_ms).await? {
            Ok(())
        } else {
            Err(ProbeError::Timeout {
                what: selector.to_string(),
                timeout_ms,
            }
            .into())
        }
    }

    /// Locate an element that must exist right now
    pub async fn require(&self, selector: &str) -> Result<ElementRef> {
        self.driver
            .locate(selector)
            .await?
            .ok_or_else(|| ProbeError::ElementNotFound(selector.to_string()).into())
    }

    /// Text of an element, empty when it is missing
    pub async fn text_or_empty(&self, selector: &str) -> Result<String> {
        Ok(self.driver.text_of(selector).await?.unwrap_or_default())
    }

    /// Snapshot the browser into the session and persist it
    pub async fn persist_session(&mut self) -> Result<()> {
        let storage = self.driver.snapshot_session().await?;
        self.session.refresh(storage);
        self.store.save(&*self.session).await;
        Ok(())
    }
}

/// One named UI action and the check that it worked
#[async_trait]
pub trait Probe: Send + Sync {
    /// Unique name within a run; also the text of the failure notice
    fn name(&self) -> &str;

    /// Human-readable summary for listings
    fn description(&self) -> &str {
        ""
    }

    /// Drive the page
    async fn action(&self, cx: &mut ProbeContext<'_>) -> Result<ActionOutcome>;

    /// Inspect the page after `action` returned `Performed`
    async fn assertion(&self, cx: &mut ProbeContext<'_>) -> Result<Verdict>;
}

/// Check that `haystack` contains `needle`, as a verdict
pub(crate) fn expect_contains(what: &str, haystack: &str, needle: &str) -> Verdict {
    if haystack.contains(needle) {
        Verdict::Pass
    } else {
        Verdict::Fail(format!(
            "{} was {:?}, expected it to contain {:?}",
            what, haystack, needle
        ))
    }
}
