//! Built-in probe suite
//!
//! Probes are looked up by name so a deployment can pick and reorder them
//! from the configuration file.

use anyhow::{bail, Result};
use async_trait::async_trait;
use regex::Regex;

use super::greeting::GreetingProbe;
use super::login::LoginProbe;
use super::toggle::{ToggleKind, ToggleProbe};
use super::{expect_contains, ActionOutcome, Probe, ProbeContext, ProbeError, Verdict};

/// Every built-in probe, in default run order
pub const PROBE_NAMES: [&str; 9] = [
    "login", "profile", "post", "search", "bookmark", "follow", "like", "reply", "repost",
];

/// Open the own profile and check the displayed handle
pub struct ProfileProbe;

#[async_trait]
impl Probe for ProfileProbe {
    fn name(&self) -> &str {
        "profile"
    }

    fn description(&self) -> &str {
        "open the profile page of the logged-in account"
    }

    async fn action(&self, cx: &mut ProbeContext<'_>) -> Result<ActionOutcome> {
        cx.goto(&cx.catalog.pages.home).await?;
        cx.driver
            .click_selector(&cx.catalog.profile.profile_link)
            .await?;
        cx.expect_selector(&cx.catalog.profile.user_name).await?;
        Ok(ActionOutcome::Performed)
    }

    async fn assertion(&self, cx: &mut ProbeContext<'_>) -> Result<Verdict> {
        let account = cx.account()?;
        let name = cx.text_or_empty(&cx.catalog.profile.user_name).await?;
        Ok(expect_contains("profile user name", &name, account))
    }
}

/// Search from the explore page and open the first result
pub struct SearchProbe;

#[async_trait]
impl Probe for SearchProbe {
    fn name(&self) -> &str {
        "search"
    }

    fn description(&self) -> &str {
        "search for a hot topic and open the first post"
    }

    async fn action(&self, cx: &mut ProbeContext<'_>) -> Result<ActionOutcome> {
        let catalog = cx.catalog;
        cx.goto(&catalog.pages.home).await?;
        cx.driver.click_selector(&catalog.search.explore_link).await?;
        cx.driver.click_selector(&catalog.search.search_input).await?;
        cx.driver
            .type_text(&catalog.search.query, cx.human_pacing())
            .await?;
        cx.driver.press_key("Enter").await?;
        cx.settle(cx.config.timings.feed_settle_ms).await;

        cx.require(&catalog.search.first_result).await?;
        cx.driver.click_selector(&catalog.search.first_result).await?;
        Ok(ActionOutcome::Performed)
    }

    async fn assertion(&self, cx: &mut ProbeContext<'_>) -> Result<Verdict> {
        let catalog = cx.catalog;
        let pattern = Regex::new(&catalog.pages.status_url_pattern)?;
        let timeout_ms = cx.timeout_ms();
        if !cx.driver.wait_for_url(&pattern, timeout_ms).await? {
            let url = cx.driver.current_url().await?;
            return Ok(Verdict::Fail(format!(
                "expected a post URL matching {}, got {}",
                pattern, url
            )));
        }

        if cx
            .driver
            .wait_for_selector(&catalog.search.reply_prompt, timeout_ms)
            .await?
        {
            Ok(Verdict::Pass)
        } else {
            Err(ProbeError::Timeout {
                what: catalog.search.reply_prompt.clone(),
                timeout_ms,
            }
            .into())
        }
    }
}

/// Follow the first trending account
pub struct FollowProbe;

#[async_trait]
impl Probe for FollowProbe {
    fn name(&self) -> &str {
        "follow"
    }

    fn description(&self) -> &str {
        "follow an account from the trending list"
    }

    async fn action(&self, cx: &mut ProbeContext<'_>) -> Result<ActionOutcome> {
        let follow = &cx.catalog.follow;
        cx.goto(&cx.catalog.pages.explore).await?;
        cx.driver.click_selector(&follow.trending_avatar).await?;
        cx.settle(cx.config.timings.feed_settle_ms).await;
        cx.driver.click_selector(&follow.follow_button).await?;
        cx.expect_selector(&follow.unfollow_marker).await?;
        Ok(ActionOutcome::Performed)
    }

    async fn assertion(&self, cx: &mut ProbeContext<'_>) -> Result<Verdict> {
        let follow = &cx.catalog.follow;
        let text = cx.text_or_empty(&follow.unfollow_marker).await?;
        Ok(expect_contains("follow button", &text, &follow.following_text))
    }
}

/// Probe for a built-in name
pub fn probe_by_name(name: &str) -> Option<Box<dyn Probe>> {
    let probe: Box<dyn Probe> = match name {
        "login" => Box::new(LoginProbe),
        "profile" => Box::new(ProfileProbe),
        "post" => Box::new(GreetingProbe::post()),
        "search" => Box::new(SearchProbe),
        "bookmark" => Box::new(ToggleProbe::new(ToggleKind::Bookmark)),
        "follow" => Box::new(FollowProbe),
        "like" => Box::new(ToggleProbe::new(ToggleKind::Like)),
        "reply" => Box::new(GreetingProbe::reply()),
        "repost" => Box::new(ToggleProbe::new(ToggleKind::Repost)),
        _ => return None,
    };
    Some(probe)
}

/// Build the probes to run. An empty selection means the whole suite in
/// default order.
pub fn build_suite(names: &[String]) -> Result<Vec<Box<dyn Probe>>> {
    if names.is_empty() {
        return Ok(PROBE_NAMES
            .iter()
            .filter_map(|name| probe_by_name(name))
            .collect());
    }

    let mut probes: Vec<Box<dyn Probe>> = Vec::with_capacity(names.len());
    for name in names {
        if probes.iter().any(|p| p.name() == name.as_str()) {
            bail!("Probe listed twice: {}", name);
        }
        match probe_by_name(name) {
            Some(probe) => probes.push(probe),
            None => bail!(
                "Unknown probe: {} (available: {})",
                name,
                PROBE_NAMES.join(", ")
            ),
        }
    }
    Ok(probes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::fake::FakeDriver;
    use crate::session::{FileSessionStore, Session};
    use crate::utils::config::Config;

    fn names(probes: &[Box<dyn Probe>]) -> Vec<&str> {
        probes.iter().map(|p| p.name()).collect()
    }

    #[test]
    fn test_default_suite_order() {
        let suite = build_suite(&[]).unwrap();
        assert_eq!(names(&suite), PROBE_NAMES.to_vec());
    }

    #[test]
    fn test_selected_and_reordered() {
        let suite = build_suite(&["like".to_string(), "login".to_string()]).unwrap();
        assert_eq!(names(&suite), vec!["like", "login"]);
    }

    #[test]
    fn test_unknown_or_duplicate_name_is_rejected() {
        let err = build_suite(&["login".to_string(), "dance".to_string()]).err().expect("expected an error");
        assert!(err.to_string().contains("dance"));
        assert!(build_suite(&["like".to_string(), "like".to_string()]).is_err());
    }

    #[tokio::test]
    async fn test_profile_shows_account() {
        let config = Config {
            account: Some("lumi_bot".to_string()),
            ..Config::default()
        };
        let catalog = config.catalog().unwrap();
        let user_name = catalog.profile.user_name.clone();
        let driver = FakeDriver::new()
            .with_text(&catalog.profile.profile_link, "Profile")
            .on_click(&catalog.profile.profile_link, move |page| {
                page.set_text(&user_name, "Lumi\n@lumi_bot");
            });
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path().join("state.json"));
        let mut session = Session::fresh();
        let mut cx = ProbeContext::new(&driver, &config, &catalog, &mut session, &store);

        ProfileProbe.action(&mut cx).await.unwrap();
        assert_eq!(ProfileProbe.assertion(&mut cx).await.unwrap(), Verdict::Pass);
    }

    #[tokio::test]
    async fn test_search_opens_a_post() {
        let config = Config::default();
        let catalog = config.catalog().unwrap();
        let prompt = catalog.search.reply_prompt.clone();
        let driver = FakeDriver::new()
            .with_text(&catalog.search.explore_link, "Explore")
            .with_text(&catalog.search.search_input, "")
            .on_key("Enter", {
                let first = catalog.search.first_result.clone();
                move |page| page.set_text(&first, "AI is everywhere")
            })
            .on_click(&catalog.search.first_result, move |page| {
                page.url = "https://twitter.com/someone/status/1700000000".to_string();
                page.set_text(&prompt, "Post your reply");
            });
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path().join("state.json"));
        let mut session = Session::fresh();
        let mut cx = ProbeContext::new(&driver, &config, &catalog, &mut session, &store);

        SearchProbe.action(&mut cx).await.unwrap();
        assert_eq!(SearchProbe.assertion(&mut cx).await.unwrap(), Verdict::Pass);
        assert_eq!(driver.page().typed, "AI");
    }

    #[tokio::test]
    async fn test_search_without_results_fails() {
        let config = Config::default();
        let catalog = config.catalog().unwrap();
        let driver = FakeDriver::new()
            .with_text(&catalog.search.explore_link, "Explore")
            .with_text(&catalog.search.search_input, "");
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path().join("state.json"));
        let mut session = Session::fresh();
        let mut cx = ProbeContext::new(&driver, &config, &catalog, &mut session, &store);

        let err = SearchProbe.action(&mut cx).await.unwrap_err();
        assert!(err.downcast_ref::<ProbeError>().is_some());
    }

    #[tokio::test]
    async fn test_follow_shows_following() {
        let config = Config::default();
        let catalog = config.catalog().unwrap();
        let marker = catalog.follow.unfollow_marker.clone();
        let driver = FakeDriver::new()
            .with_text(&catalog.follow.trending_avatar, "")
            .with_text(&catalog.follow.follow_button, "Follow")
            .on_click(&catalog.follow.follow_button, move |page| {
                page.set_text(&marker, "Following");
            });
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path().join("state.json"));
        let mut session = Session::fresh();
        let mut cx = ProbeContext::new(&driver, &config, &catalog, &mut session, &store);

        FollowProbe.action(&mut cx).await.unwrap();
        assert_eq!(FollowProbe.assertion(&mut cx).await.unwrap(), Verdict::Pass);
    }
}
