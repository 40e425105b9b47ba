//! Toggle verification for two-state controls (bookmark, like, repost)
//!
//! The control may already be in the state the probe wants from an earlier
//! run. Clicking it then produces the complement, which is still an
//! acceptable outcome and is recorded as already satisfied, not as a defect.

use anyhow::Result;
use async_trait::async_trait;
use log::{debug, info};

use super::{ActionOutcome, Probe, ProbeContext, ProbeError, Verdict};
use crate::catalog::{SelectorCatalog, ToggleSpec};
use crate::driver::traits::UiDriver;
use crate::utils::config::FailurePolicy;

/// Semantic state of a toggle control
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleState {
    /// The attribute ends with the target suffix
    Target,
    /// Anything else, normally the origin suffix
    Origin,
}

impl ToggleState {
    pub fn classify(value: &str, spec: &ToggleSpec) -> Self {
        if value.ends_with(&spec.target_suffix) {
            ToggleState::Target
        } else {
            if !value.ends_with(&spec.origin_suffix) {
                debug!(
                    "Toggle value {:?} matches neither {:?} nor {:?}, treating as origin",
                    value, spec.target_suffix, spec.origin_suffix
                );
            }
            ToggleState::Origin
        }
    }
}

/// Result of the flip phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flip {
    /// Control was already in the target state; it was clicked back once
    AlreadySatisfied,
    /// Control was in the origin state and was clicked once
    Flipped,
    /// No control on the page
    Missing,
}

/// Flips a toggle control and confirms where it ended up
pub struct ToggleVerifier<'a> {
    spec: &'a ToggleSpec,
    settle_ms: u64,
}

impl<'a> ToggleVerifier<'a> {
    pub fn new(spec: &'a ToggleSpec, settle_ms: u64) -> Self {
        Self { spec, settle_ms }
    }

    /// Current state, or `None` when the control is absent
    pub async fn read(&self, driver: &dyn UiDriver) -> Result<Option<ToggleState>> {
        let selector = self.spec.selector();
        let Some(element) = driver.locate(&selector).await? else {
            return Ok(None);
        };
        let value = driver
            .attribute(element, &self.spec.attribute)
            .await?
            .unwrap_or_default();
        Ok(Some(ToggleState::classify(&value, self.spec)))
    }

    /// Click the control once, whatever state it is in
    pub async fn flip(&self, driver: &dyn UiDriver) -> Result<Flip> {
        let selector = self.spec.selector();
        let Some(element) = driver.locate(&selector).await? else {
            return Ok(Flip::Missing);
        };
        let value = driver
            .attribute(element, &self.spec.attribute)
            .await?
            .unwrap_or_default();
        let before = ToggleState::classify(&value, self.spec);

        driver.click(element).await?;
        let confirm = match before {
            ToggleState::Origin => self.spec.confirm_forward.as_deref(),
            ToggleState::Target => self.spec.confirm_reverse.as_deref(),
        };
        if let Some(confirm) = confirm {
            driver.click_selector(confirm).await?;
        }
        driver.sleep(self.settle_ms).await;

        Ok(match before {
            ToggleState::Target => Flip::AlreadySatisfied,
            ToggleState::Origin => Flip::Flipped,
        })
    }

    /// After `Flip::Flipped`, check the control reached the target state
    pub async fn confirm(&self, driver: &dyn UiDriver) -> Result<Verdict> {
        match self.read(driver).await? {
            Some(ToggleState::Target) => Ok(Verdict::Pass),
            Some(ToggleState::Origin) => Ok(Verdict::Fail(format!(
                "{} did not end with {:?} after clicking",
                self.spec.attribute, self.spec.target_suffix
            ))),
            None => Err(ProbeError::Assertion(format!(
                "toggle control disappeared after clicking: {}",
                self.spec.selector()
            ))
            .into()),
        }
    }
}

/// Which catalog toggle a probe exercises
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleKind {
    Bookmark,
    Like,
    Repost,
}

impl ToggleKind {
    fn spec<'c>(&self, catalog: &'c SelectorCatalog) -> &'c ToggleSpec {
        match self {
            ToggleKind::Bookmark => &catalog.bookmark,
            ToggleKind::Like => &catalog.like,
            ToggleKind::Repost => &catalog.repost,
        }
    }
}

/// Probe that opens the first post from the explore page and flips a toggle on it
pub struct ToggleProbe {
    kind: ToggleKind,
}

impl ToggleProbe {
    pub fn new(kind: ToggleKind) -> Self {
        Self { kind }
    }
}

#[async_trait]
impl Probe for ToggleProbe {
    fn name(&self) -> &str {
        match self.kind {
            ToggleKind::Bookmark => "bookmark",
            ToggleKind::Like => "like",
            ToggleKind::Repost => "repost",
        }
    }

    fn description(&self) -> &str {
        match self.kind {
            ToggleKind::Bookmark => "bookmark a post from the explore page",
            ToggleKind::Like => "like a post from the explore page",
            ToggleKind::Repost => "repost a post from the explore page",
        }
    }

    async fn action(&self, cx: &mut ProbeContext<'_>) -> Result<ActionOutcome> {
        cx.goto(&cx.catalog.pages.explore).await?;
        cx.driver
            .click_selector(&cx.catalog.search.first_result)
            .await?;
        cx.settle(cx.config.timings.feed_settle_ms).await;

        let spec = self.kind.spec(cx.catalog);
        let verifier = ToggleVerifier::new(spec, cx.config.timings.toggle_settle_ms);
        match verifier.flip(cx.driver).await? {
            Flip::Flipped => Ok(ActionOutcome::Performed),
            Flip::AlreadySatisfied => {
                info!("{}: control was already {:?}", self.name(), spec.target_suffix);
                Ok(ActionOutcome::AlreadySatisfied(format!(
                    "already {}",
                    spec.target_suffix
                )))
            }
            Flip::Missing => match cx.config.policy {
                FailurePolicy::Lenient => Ok(ActionOutcome::NotApplicable(format!(
                    "no control matching {}",
                    spec.selector()
                ))),
                FailurePolicy::Strict => Err(ProbeError::ElementNotFound(spec.selector()).into()),
            },
        }
    }

    async fn assertion(&self, cx: &mut ProbeContext<'_>) -> Result<Verdict> {
        let spec = self.kind.spec(cx.catalog);
        ToggleVerifier::new(spec, cx.config.timings.toggle_settle_ms)
            .confirm(cx.driver)
            .await
    }
}
