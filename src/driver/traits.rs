use anyhow::Result;
use async_trait::async_trait;
use regex::Regex;
use std::time::Duration;

/// Handle to an element located on the current page.
///
/// Handles are only meaningful to the driver that issued them and are
/// invalidated by the next navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementRef(pub u64);

/// How `type_text` feeds characters into the focused element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Pacing {
    /// Send the whole string at once
    #[default]
    Instant,
    /// Pause before every character, the way a person types
    PerChar(Duration),
}

impl Pacing {
    pub fn per_char_ms(ms: u64) -> Self {
        if ms == 0 {
            Pacing::Instant
        } else {
            Pacing::PerChar(Duration::from_millis(ms))
        }
    }
}

/// Browser automation capability consumed by the probes
///
/// The probe engine sees the browser only through this trait. It covers a
/// small subset of Playwright and is also implemented by an in-memory page.
#[async_trait]
pub trait UiDriver: Send + Sync {
    /// Get the driver name (e.g., "chromium", "fake")
    fn platform_name(&self) -> &str;

    /// Navigate the page to an absolute URL
    async fn navigate(&self, url: &str) -> Result<()>;

    /// URL currently loaded in the page
    async fn current_url(&self) -> Result<String>;

    /// Locate the first element matching a CSS selector
    ///
    /// # Returns
    /// `None` when nothing matches right now; this never waits.
    async fn locate(&self, selector: &str) -> Result<Option<ElementRef>>;

    /// Read an attribute of a located element
    async fn attribute(&self, element: ElementRef, name: &str) -> Result<Option<String>>;

    /// Read the text content of a located element
    async fn text(&self, element: ElementRef) -> Result<Option<String>>;

    /// Click a located element
    async fn click(&self, element: ElementRef) -> Result<()>;

    /// Click the first element matching a selector, waiting for it to appear
    async fn click_selector(&self, selector: &str) -> Result<()>;

    /// Type text into the focused element
    async fn type_text(&self, text: &str, pacing: Pacing) -> Result<()>;

    /// Press a named key (e.g., "Tab", "Enter")
    async fn press_key(&self, key: &str) -> Result<()>;

    /// Wait for a selector to be attached to the page
    ///
    /// # Returns
    /// True if the element appeared, false on timeout
    async fn wait_for_selector(&self, selector: &str, timeout_ms: u64) -> Result<bool>;

    /// Wait until the page URL matches a pattern
    ///
    /// # Returns
    /// True if the URL matched, false on timeout
    async fn wait_for_url(&self, pattern: &Regex, timeout_ms: u64) -> Result<bool>;

    /// Whether the browsing context holds a cookie with this name
    async fn has_cookie(&self, name: &str) -> Result<bool>;

    /// Serialize the browsing context (cookies + origin storage)
    ///
    /// The format is owned by the driver; the session store keeps it opaque.
    async fn snapshot_session(&self) -> Result<serde_json::Value>;

    /// Fixed pause
    async fn sleep(&self, ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    /// Release the browser
    async fn close(&self) -> Result<()> {
        Ok(())
    }

    /// Text of the first element matching a selector, if any
    async fn text_of(&self, selector: &str) -> Result<Option<String>> {
        match self.locate(selector).await? {
            Some(element) => self.text(element).await,
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pacing_from_ms() {
        assert_eq!(Pacing::per_char_ms(0), Pacing::Instant);
        assert_eq!(
            Pacing::per_char_ms(200),
            Pacing::PerChar(Duration::from_millis(200))
        );
    }
}
