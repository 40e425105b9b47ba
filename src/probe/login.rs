//! Login probe
//!
//! Reuses the restored session when its auth cookie is still present and
//! only types credentials otherwise. A successful login is persisted right
//! away so later probes (and later runs) start authenticated.

use anyhow::Result;
use async_trait::async_trait;
use log::{debug, info};

use super::{expect_contains, ActionOutcome, Probe, ProbeContext, Verdict};

pub struct LoginProbe;

impl LoginProbe {
    async fn type_credentials(&self, cx: &ProbeContext<'_>) -> Result<()> {
        let account = cx.account()?;
        let password = cx
            .config
            .password
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("No password configured (set TWITTER_TEST_PASSWORD)"))?;
        let selectors = &cx.catalog.login;
        let pacing = cx.human_pacing();

        cx.expect_selector(&selectors.username_input).await?;
        cx.driver.click_selector(&selectors.username_input).await?;
        cx.driver.type_text(account, pacing).await?;
        cx.driver.press_key("Tab").await?;
        cx.driver.press_key("Enter").await?;

        cx.expect_selector(&selectors.password_input).await?;
        cx.driver.click_selector(&selectors.password_input).await?;
        cx.driver.type_text(password, pacing).await?;
        for _ in 0..3 {
            cx.driver.press_key("Tab").await?;
        }
        cx.driver.press_key("Enter").await?;
        Ok(())
    }
}

#[async_trait]
impl Probe for LoginProbe {
    fn name(&self) -> &str {
        "login"
    }

    fn description(&self) -> &str {
        "log in, reusing the stored session when possible"
    }

    async fn action(&self, cx: &mut ProbeContext<'_>) -> Result<ActionOutcome> {
        let catalog = cx.catalog;
        cx.goto(&catalog.pages.login).await?;

        if cx.driver.has_cookie(&catalog.login.auth_cookie).await? {
            info!("Stored session is still authenticated, skipping credentials");
            cx.goto(&catalog.pages.home).await?;
        } else {
            debug!("No {} cookie, logging in with credentials", catalog.login.auth_cookie);
            self.type_credentials(cx).await?;
        }

        cx.settle(cx.config.timings.login_settle_ms).await;
        Ok(ActionOutcome::Performed)
    }

    async fn assertion(&self, cx: &mut ProbeContext<'_>) -> Result<Verdict> {
        let account = cx.account()?.to_string();
        let switcher = cx.text_or_empty(&cx.catalog.login.account_switcher).await?;
        let verdict = expect_contains("account switcher", &switcher, &account);
        if verdict == Verdict::Pass {
            cx.persist_session().await?;
        }
        Ok(verdict)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::SelectorCatalog;
    use crate::driver::fake::FakeDriver;
    use crate::session::{FileSessionStore, Session, SessionStore};
    use crate::utils::config::Config;

    fn config() -> Config {
        Config {
            account: Some("lumi_bot".to_string()),
            password: Some("hunter2".to_string()),
            ..Config::default()
        }
    }

    /// Login page whose final Enter signs the user in
    fn login_page(catalog: &SelectorCatalog) -> FakeDriver {
        let login = catalog.login.clone();
        FakeDriver::new()
            .with_text(&login.username_input, "")
            .with_text(&login.password_input, "")
            .on_key("Enter", move |page| {
                if page.typed == "lumi_bothunter2" {
                    page.cookies.push(login.auth_cookie.clone());
                    page.set_text(&login.account_switcher, "Lumi\n@lumi_bot");
                }
            })
    }

    #[tokio::test]
    async fn test_stored_session_skips_credentials() {
        let config = config();
        let catalog = config.catalog().unwrap();
        let driver = FakeDriver::new()
            .with_cookie("auth_token")
            .with_text(&catalog.login.account_switcher, "Lumi @lumi_bot");
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path().join("state.json"));
        let mut session = Session::fresh();
        let mut cx = ProbeContext::new(&driver, &config, &catalog, &mut session, &store);

        let probe = LoginProbe;
        assert_eq!(probe.action(&mut cx).await.unwrap(), ActionOutcome::Performed);
        assert_eq!(probe.assertion(&mut cx).await.unwrap(), Verdict::Pass);

        let page = driver.page();
        assert!(page.typed.is_empty());
        assert!(page.keys.is_empty());
        assert_eq!(page.url, "https://twitter.com/home");
    }

    #[tokio::test]
    async fn test_credentials_login_persists_session() {
        let config = config();
        let catalog = config.catalog().unwrap();
        let driver = login_page(&catalog);
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path().join("state.json"));
        let mut session = Session::fresh();
        let mut cx = ProbeContext::new(&driver, &config, &catalog, &mut session, &store);

        let probe = LoginProbe;
        probe.action(&mut cx).await.unwrap();
        assert_eq!(probe.assertion(&mut cx).await.unwrap(), Verdict::Pass);

        assert_eq!(
            driver.page().keys,
            vec!["Tab", "Enter", "Tab", "Tab", "Tab", "Enter"]
        );
        let saved = store.load().await.expect("session persisted");
        assert_eq!(saved.storage, Some(serde_json::json!({ "cookies": ["auth_token"] })));
    }

    #[tokio::test]
    async fn test_wrong_account_fails_without_persisting() {
        let config = config();
        let catalog = config.catalog().unwrap();
        let driver = FakeDriver::new()
            .with_cookie("auth_token")
            .with_text(&catalog.login.account_switcher, "Someone @else");
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path().join("state.json"));
        let mut session = Session::fresh();
        let mut cx = ProbeContext::new(&driver, &config, &catalog, &mut session, &store);

        LoginProbe.action(&mut cx).await.unwrap();
        let verdict = LoginProbe.assertion(&mut cx).await.unwrap();
        assert!(matches!(verdict, Verdict::Fail(_)));
        assert!(store.load().await.is_none());
    }

    #[tokio::test]
    async fn test_missing_password_is_an_error() {
        let config = Config {
            password: None,
            ..config()
        };
        let catalog = config.catalog().unwrap();
        let driver = login_page(&catalog);
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path().join("state.json"));
        let mut session = Session::fresh();
        let mut cx = ProbeContext::new(&driver, &config, &catalog, &mut session, &store);

        assert!(LoginProbe.action(&mut cx).await.is_err());
    }
}
