//! In-memory page used by the unit tests
//!
//! Elements are keyed by the exact selector string the probes use. Clicks
//! and key presses can be scripted to mutate the page, which is enough to
//! model toggles, logins and feeds without a browser.

use anyhow::Result;
use async_trait::async_trait;
use regex::Regex;
use std::collections::HashMap;
use std::sync::Mutex;

use super::traits::{ElementRef, Pacing, UiDriver};

#[derive(Debug, Clone, Default)]
pub struct FakeElement {
    pub text: String,
    pub attrs: HashMap<String, String>,
}

#[derive(Debug, Default)]
pub struct FakePage {
    pub url: String,
    pub elements: HashMap<String, FakeElement>,
    pub cookies: Vec<String>,
    /// Everything typed since the last submit
    pub typed: String,
    pub keys: Vec<String>,
    pub visited: Vec<String>,
    pub clicks: Vec<String>,
    pub sleeps: Vec<u64>,
}

impl FakePage {
    pub fn set_text(&mut self, selector: &str, text: &str) {
        self.elements.entry(selector.to_string()).or_default().text = text.to_string();
    }

    pub fn set_attr(&mut self, selector: &str, name: &str, value: &str) {
        self.elements
            .entry(selector.to_string())
            .or_default()
            .attrs
            .insert(name.to_string(), value.to_string());
    }

    pub fn remove(&mut self, selector: &str) {
        self.elements.remove(selector);
    }

    pub fn attr(&self, selector: &str, name: &str) -> Option<String> {
        self.elements
            .get(selector)
            .and_then(|e| e.attrs.get(name).cloned())
    }
}

type Effect = Box<dyn Fn(&mut FakePage) + Send + Sync>;

#[derive(Default)]
pub struct FakeDriver {
    page: Mutex<FakePage>,
    on_click: HashMap<String, Effect>,
    on_key: HashMap<String, Effect>,
    handles: Mutex<HashMap<u64, String>>,
    next_handle: Mutex<u64>,
}

impl FakeDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_text(self, selector: &str, text: &str) -> Self {
        self.page.lock().unwrap().set_text(selector, text);
        self
    }

    pub fn with_attr(self, selector: &str, name: &str, value: &str) -> Self {
        self.page.lock().unwrap().set_attr(selector, name, value);
        self
    }

    pub fn with_cookie(self, name: &str) -> Self {
        self.page.lock().unwrap().cookies.push(name.to_string());
        self
    }

    pub fn on_click(
        mut self,
        selector: &str,
        effect: impl Fn(&mut FakePage) + Send + Sync + 'static,
    ) -> Self {
        self.on_click.insert(selector.to_string(), Box::new(effect));
        self
    }

    pub fn on_key(
        mut self,
        key: &str,
        effect: impl Fn(&mut FakePage) + Send + Sync + 'static,
    ) -> Self {
        self.on_key.insert(key.to_string(), Box::new(effect));
        self
    }

    /// Inspect the page after a run
    pub fn page(&self) -> std::sync::MutexGuard<'_, FakePage> {
        self.page.lock().unwrap()
    }

    fn selector_of(&self, element: ElementRef) -> Result<String> {
        self.handles
            .lock()
            .unwrap()
            .get(&element.0)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("Stale element handle: {}", element.0))
    }

    fn do_click(&self, selector: &str) -> Result<()> {
        let mut page = self.page.lock().unwrap();
        if !page.elements.contains_key(selector) {
            anyhow::bail!("Failed to click: {}. Element not found", selector);
        }
        page.clicks.push(selector.to_string());
        if let Some(effect) = self.on_click.get(selector) {
            effect(&mut page);
        }
        Ok(())
    }
}

#[async_trait]
impl UiDriver for FakeDriver {
    fn platform_name(&self) -> &str {
        "fake"
    }

    async fn navigate(&self, url: &str) -> Result<()> {
        let mut page = self.page.lock().unwrap();
        page.url = url.to_string();
        page.visited.push(url.to_string());
        Ok(())
    }

    async fn current_url(&self) -> Result<String> {
        Ok(self.page.lock().unwrap().url.clone())
    }

    async fn locate(&self, selector: &str) -> Result<Option<ElementRef>> {
        if !self.page.lock().unwrap().elements.contains_key(selector) {
            return Ok(None);
        }
        let mut next = self.next_handle.lock().unwrap();
        *next += 1;
        self.handles
            .lock()
            .unwrap()
            .insert(*next, selector.to_string());
        Ok(Some(ElementRef(*next)))
    }

    async fn attribute(&self, element: ElementRef, name: &str) -> Result<Option<String>> {
        let selector = self.selector_of(element)?;
        Ok(self.page.lock().unwrap().attr(&selector, name))
    }

    async fn text(&self, element: ElementRef) -> Result<Option<String>> {
        let selector = self.selector_of(element)?;
        Ok(self
            .page
            .lock()
            .unwrap()
            .elements
            .get(&selector)
            .map(|e| e.text.clone()))
    }

    async fn click(&self, element: ElementRef) -> Result<()> {
        let selector = self.selector_of(element)?;
        self.do_click(&selector)
    }

    async fn click_selector(&self, selector: &str) -> Result<()> {
        self.do_click(selector)
    }

    async fn type_text(&self, text: &str, pacing: Pacing) -> Result<()> {
        let mut page = self.page.lock().unwrap();
        if let Pacing::PerChar(delay) = pacing {
            for _ in text.chars() {
                page.sleeps.push(delay.as_millis() as u64);
            }
        }
        page.typed.push_str(text);
        Ok(())
    }

    async fn press_key(&self, key: &str) -> Result<()> {
        let mut page = self.page.lock().unwrap();
        page.keys.push(key.to_string());
        if let Some(effect) = self.on_key.get(key) {
            effect(&mut page);
        }
        Ok(())
    }

    async fn wait_for_selector(&self, selector: &str, _timeout_ms: u64) -> Result<bool> {
        Ok(self.page.lock().unwrap().elements.contains_key(selector))
    }

    async fn wait_for_url(&self, pattern: &Regex, _timeout_ms: u64) -> Result<bool> {
        Ok(pattern.is_match(&self.page.lock().unwrap().url))
    }

    async fn has_cookie(&self, name: &str) -> Result<bool> {
        Ok(self.page.lock().unwrap().cookies.iter().any(|c| c == name))
    }

    async fn snapshot_session(&self) -> Result<serde_json::Value> {
        let page = self.page.lock().unwrap();
        Ok(serde_json::json!({ "cookies": page.cookies }))
    }

    async fn sleep(&self, ms: u64) {
        self.page.lock().unwrap().sleeps.push(ms);
    }
}
