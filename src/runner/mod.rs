pub mod context;
pub mod events;
pub mod executor;
pub mod lock;
pub mod state;

use anyhow::Result;
use colored::Colorize;
use log::{info, warn};
use std::time::Duration;

pub use events::*;
pub use state::*;

use crate::driver::traits::UiDriver;
use crate::probe::suite::build_suite;
use crate::reporter::Reporter;
use crate::session::{FileSessionStore, Session, SessionStore};
use crate::utils::config::Config;
use context::RunContext;
use executor::ProbeRunner;
use lock::RunLock;

/// Upper bound on waiting for queued failure notices at exit
const REPORTER_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Run the configured suite once against a freshly launched browser
///
/// Returns `None` when another run holds the session lock.
pub async fn run_once(config: &Config) -> Result<Option<RunReport>> {
    let Some(_lock) = RunLock::try_acquire(&config.lock_path())? else {
        warn!(
            "Another run holds {}, skipping this one",
            config.lock_path().display()
        );
        println!("{} Another run is in progress, skipping", "⚠".yellow());
        return Ok(None);
    };

    let store = FileSessionStore::new(&config.session_path);
    let session = store.load().await.unwrap_or_else(Session::fresh);

    // Build the suite before launching anything so bad names fail fast
    build_suite(&config.probes)?;

    let reporter = crate::reporter::from_config(config)?;
    let driver = crate::driver::launch(config, session.storage.clone()).await?;
    info!("Launched {} against {}", driver.platform_name(), config.base_url);

    let result = execute_suite(&*driver, config, session, &store, &*reporter, true).await;

    if let Err(e) = driver.close().await {
        warn!("Failed to close browser: {:#}", e);
    }
    reporter.flush(REPORTER_DRAIN_TIMEOUT).await;

    let report = result?;
    crate::report::write_all(report.clone(), &config.output_dir)?;
    Ok(Some(report))
}

/// Run the suite on an already launched driver, then persist the session
pub async fn execute_suite(
    driver: &dyn UiDriver,
    config: &Config,
    session: Session,
    store: &dyn SessionStore,
    reporter: &dyn Reporter,
    console: bool,
) -> Result<RunReport> {
    let catalog = config.catalog()?;
    let probes = build_suite(&config.probes)?;
    let runner = ProbeRunner::new(driver, config, &catalog, store, reporter);

    let listener = if console {
        Some(tokio::spawn(ConsoleEventListener::listen(runner.subscribe())))
    } else {
        None
    };

    let mut cx = RunContext::new(session);
    let state = runner.run(&probes, &mut cx).await;

    if let Some(listener) = listener {
        // The listener stops by itself after the final summary
        let _ = tokio::time::timeout(Duration::from_secs(2), listener).await;
    }

    let mut session = cx.into_session();
    match driver.snapshot_session().await {
        Ok(storage) => {
            session.refresh(storage);
            store.save(&session).await;
        }
        Err(e) => warn!("Could not snapshot session: {:#}", e),
    }

    let summary = state.summary();
    match state.failed_probe() {
        Some(probe) => info!("Run {} failed at {}", summary.run_id, probe.name),
        None => info!(
            "Run {} passed ({} passed, {} satisfied)",
            summary.run_id, summary.passed, summary.satisfied
        ),
    }
    Ok(state.to_report())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::fake::FakeDriver;
    use crate::reporter::RecordingReporter;

    #[tokio::test]
    async fn test_suite_persists_session_at_run_end() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            account: Some("lumi_bot".to_string()),
            probes: vec!["login".to_string(), "profile".to_string()],
            ..Config::default()
        };
        let catalog = config.catalog().unwrap();
        let user_name = catalog.profile.user_name.clone();
        let driver = FakeDriver::new()
            .with_cookie("auth_token")
            .with_text(&catalog.login.account_switcher, "Lumi @lumi_bot")
            .with_text(&catalog.profile.profile_link, "Profile")
            .on_click(&catalog.profile.profile_link, move |page| {
                page.set_text(&user_name, "Lumi @lumi_bot");
            });
        let store = FileSessionStore::new(dir.path().join("state.json"));
        let reporter = RecordingReporter::default();

        let report = execute_suite(&driver, &config, Session::fresh(), &store, &reporter, false)
            .await
            .unwrap();

        assert!(report.summary.is_success());
        assert_eq!(report.summary.passed, 2);
        assert!(reporter.probes().is_empty());
        let saved = store.load().await.unwrap();
        assert_eq!(saved.storage, Some(serde_json::json!({ "cookies": ["auth_token"] })));
    }

    #[tokio::test]
    async fn test_failed_login_reports_once_and_still_saves() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            account: Some("lumi_bot".to_string()),
            ..Config::default()
        };
        // Logged out and no credentials: login cannot get past the form
        let driver = FakeDriver::new();
        let store = FileSessionStore::new(dir.path().join("state.json"));
        let reporter = RecordingReporter::default();

        let report = execute_suite(&driver, &config, Session::fresh(), &store, &reporter, false)
            .await
            .unwrap();

        assert_eq!(reporter.probes(), vec!["login"]);
        assert_eq!(report.summary.failed, 1);
        assert_eq!(report.summary.skipped, 8);
        assert!(store.load().await.is_some());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_skipped_while_lock_is_held() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            session_path: dir.path().join("state.json"),
            output_dir: dir.path().join("reports"),
            ..Config::default()
        };
        let _held = RunLock::try_acquire(&config.lock_path()).unwrap().unwrap();

        let report = run_once(&config).await.unwrap();

        assert!(report.is_none());
        assert!(!config.session_path.exists());
        assert!(!config.output_dir.exists());
    }

    #[tokio::test]
    async fn test_unknown_probe_is_a_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            probes: vec!["teleport".to_string()],
            ..Config::default()
        };
        let store = FileSessionStore::new(dir.path().join("state.json"));
        let result = execute_suite(
            &FakeDriver::new(),
            &config,
            Session::fresh(),
            &store,
            &RecordingReporter::default(),
            false,
        )
        .await;
        assert!(result.is_err());
    }
}
