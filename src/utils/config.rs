//! Application configuration
//!
//! Loaded from a YAML file (every key optional) and then overridden from the
//! environment, so credentials and the webhook never have to live on disk.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::catalog::SelectorCatalog;

/// Config file picked up from the working directory when none is given
pub const DEFAULT_CONFIG_FILE: &str = "lumi-watch.yaml";

/// How strictly ambiguous page states are judged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// A toggle control that cannot be found is a failure
    Strict,
    /// A toggle control that cannot be found means the probe does not apply
    #[default]
    Lenient,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// Origin of the monitored web application
    pub base_url: String,

    /// Account identifier used by the login probe
    pub account: Option<String>,

    pub password: Option<String>,

    /// Webhook receiving failure notices
    pub reporter_url: Option<String>,

    /// Signing secret for the webhook, if the bot requires one
    pub reporter_secret: Option<String>,

    /// Where the authenticated session is persisted between runs
    pub session_path: PathBuf,

    /// Directory for run reports
    pub output_dir: PathBuf,

    pub policy: FailurePolicy,

    /// Probe names to run, in order. Empty runs the whole suite.
    pub probes: Vec<String>,

    pub timings: Timings,

    pub browser: BrowserSettings,

    pub schedule: ScheduleSettings,

    /// Partial overrides merged onto the default selector catalog
    pub selectors: Option<serde_yaml::Value>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: "https://twitter.com".to_string(),
            account: None,
            password: None,
            reporter_url: None,
            reporter_secret: None,
            session_path: PathBuf::from("state.local.json"),
            output_dir: PathBuf::from("./output"),
            policy: FailurePolicy::default(),
            probes: Vec::new(),
            timings: Timings::default(),
            browser: BrowserSettings::default(),
            schedule: ScheduleSettings::default(),
            selectors: None,
        }
    }
}

/// Pauses and timeouts, all in milliseconds
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Timings {
    /// Delay before each typed character of a post or reply
    pub typing_delay_ms: u64,
    /// Pause after login before reading the account switcher
    pub login_settle_ms: u64,
    /// Pause after submitting or loading a feed
    pub feed_settle_ms: u64,
    /// Pause after flipping a toggle before re-reading it
    pub toggle_settle_ms: u64,
    /// Bound on every wait for a selector or URL
    pub default_timeout_ms: u64,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            typing_delay_ms: 200,
            login_settle_ms: 1000,
            feed_settle_ms: 3000,
            toggle_settle_ms: 2000,
            default_timeout_ms: 30000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct BrowserSettings {
    /// chromium, firefox or webkit
    pub name: String,
    pub headless: bool,
    pub viewport_width: u32,
    pub viewport_height: u32,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            name: "chromium".to_string(),
            headless: true,
            viewport_width: 1280,
            viewport_height: 720,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ScheduleSettings {
    /// Minutes between runs; runs fire on multiples of this since midnight UTC
    pub interval_minutes: u32,
    /// Fire once immediately when the scheduler starts
    pub run_on_start: bool,
}

impl Default for ScheduleSettings {
    fn default() -> Self {
        Self {
            interval_minutes: 60,
            run_on_start: false,
        }
    }
}

impl Config {
    /// Load configuration from `path`, or from `lumi-watch.yaml` when it
    /// exists, then apply environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => {
                let default = Path::new(DEFAULT_CONFIG_FILE);
                if default.exists() {
                    Self::from_file(default)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        Self::from_yaml(&content)
            .with_context(|| format!("Failed to parse config: {}", path.display()))
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    /// Override fields from environment variables
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let first = |keys: &[&str]| keys.iter().find_map(|k| lookup(k).filter(|v| !v.is_empty()));

        if let Some(v) = first(&["TWITTER_TEST_ACCOUNT", "LUMI_ACCOUNT"]) {
            self.account = Some(v);
        }
        if let Some(v) = first(&["TWITTER_TEST_PASSWORD", "LUMI_PASSWORD"]) {
            self.password = Some(v);
        }
        if let Some(v) = first(&["REPORTER_URL", "Reporter_URL"]) {
            self.reporter_url = Some(v);
        }
        if let Some(v) = first(&["REPORTER_SECRET"]) {
            self.reporter_secret = Some(v);
        }
        if let Some(v) = first(&["LUMI_HEADLESS"]) {
            self.browser.headless = v == "true" || v == "1";
        }
        if let Some(v) = first(&["LUMI_SESSION_PATH"]) {
            self.session_path = PathBuf::from(v);
        }
    }

    /// Selector catalog with any configured overrides applied
    pub fn catalog(&self) -> Result<SelectorCatalog> {
        match self.selectors {
            Some(ref overrides) => SelectorCatalog::with_overrides(overrides),
            None => Ok(SelectorCatalog::default()),
        }
    }

    pub fn require_account(&self) -> Result<&str> {
        self.account
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("No account configured (set TWITTER_TEST_ACCOUNT)"))
    }

    /// Lock file guarding the session against overlapping runs
    pub fn lock_path(&self) -> PathBuf {
        let mut name = self
            .session_path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "session".into());
        name.push(".lock");
        self.session_path.with_file_name(name)
    }
}
