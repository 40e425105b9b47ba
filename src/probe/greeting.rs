//! Post and reply probes
//!
//! Both type a greeting that depends on the time of day, submit it, and look
//! for it in the resulting feed. The site refuses to accept the same text
//! twice in a row, so a "duplicate content" notice is a skip, not a failure.

use anyhow::Result;
use async_trait::async_trait;
use chrono::Timelike;
use log::info;

use super::{ActionOutcome, Probe, ProbeContext, Verdict};

const GREETING: &str = "greeting";

/// Greeting for an hour of the local day (0-23)
pub fn greeting_for_hour(hour: u32) -> &'static str {
    if hour < 12 {
        "Good morning!"
    } else if hour < 18 {
        "Good afternoon!"
    } else {
        "Good evening!"
    }
}

pub fn current_greeting() -> &'static str {
    greeting_for_hour(chrono::Local::now().hour())
}

/// Drop whitespace, BOM and NBSP so rendered text compares with typed text
pub fn normalize(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_whitespace() && *c != '\u{FEFF}' && *c != '\u{A0}')
        .collect()
}

/// Whether the feed shows the greeting, ignoring layout whitespace
pub fn feed_contains(feed: &str, greeting: &str) -> bool {
    normalize(feed).contains(&normalize(greeting))
}

/// Where the greeting is posted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GreetingTarget {
    /// A new post from the home timeline composer
    Post,
    /// A reply to the first post on the explore page
    Reply,
}

pub struct GreetingProbe {
    target: GreetingTarget,
}

impl GreetingProbe {
    pub fn post() -> Self {
        Self {
            target: GreetingTarget::Post,
        }
    }

    pub fn reply() -> Self {
        Self {
            target: GreetingTarget::Reply,
        }
    }
}

#[async_trait]
impl Probe for GreetingProbe {
    fn name(&self) -> &str {
        match self.target {
            GreetingTarget::Post => "post",
            GreetingTarget::Reply => "reply",
        }
    }

    fn description(&self) -> &str {
        match self.target {
            GreetingTarget::Post => "send a post from the home timeline",
            GreetingTarget::Reply => "reply to a post from the explore page",
        }
    }

    async fn action(&self, cx: &mut ProbeContext<'_>) -> Result<ActionOutcome> {
        let catalog = cx.catalog;
        let (composer, submit) = match self.target {
            GreetingTarget::Post => {
                cx.goto("/").await?;
                cx.driver.click_selector(&catalog.post.home_link).await?;
                (&catalog.post.composer, &catalog.post.submit)
            }
            GreetingTarget::Reply => {
                cx.goto(&catalog.pages.explore).await?;
                cx.driver
                    .click_selector(&catalog.search.first_result)
                    .await?;
                (&catalog.reply.editable, &catalog.reply.submit)
            }
        };

        let greeting = current_greeting();
        cx.driver.click_selector(composer).await?;
        cx.driver.type_text(greeting, cx.human_pacing()).await?;
        cx.driver.click_selector(submit).await?;
        cx.settle(cx.config.timings.feed_settle_ms).await;

        cx.notes.insert(GREETING, greeting.to_string());
        Ok(ActionOutcome::Performed)
    }

    async fn assertion(&self, cx: &mut ProbeContext<'_>) -> Result<Verdict> {
        let catalog = cx.catalog;
        let greeting = cx
            .notes
            .get(GREETING)
            .cloned()
            .unwrap_or_else(|| current_greeting().to_string());
        let (feed, notice) = match self.target {
            GreetingTarget::Post => (&catalog.post.feed, &catalog.post.status_notice),
            GreetingTarget::Reply => (&catalog.reply.timeline, &catalog.reply.status_notice),
        };

        if feed_contains(&cx.text_or_empty(feed).await?, &greeting) {
            return Ok(Verdict::Pass);
        }

        let notice_text = cx.text_or_empty(notice).await?;
        if notice_text.contains(&catalog.post.duplicate_text) {
            info!("{}: {:?} was already posted", self.name(), greeting);
            return Ok(Verdict::Skip(format!("duplicate content: {}", greeting)));
        }

        Ok(Verdict::Fail(format!("{:?} not found in feed", greeting)))
    }
}
