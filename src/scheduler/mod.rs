//! Periodic trigger
//!
//! Fires one `run` child process at every interval boundary (the top of the
//! hour by default). A tick that arrives while the previous child is still
//! alive is skipped; the run lock catches anything started outside this
//! scheduler.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Timelike, Utc};
use colored::Colorize;
use log::{info, warn};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::process::{Child, Command};
use tokio::sync::Notify;

use crate::utils::config::ScheduleSettings;

const MINUTES_PER_DAY: i64 = 24 * 60;

/// First interval boundary strictly after `now`, counted from midnight UTC
pub fn next_tick(now: DateTime<Utc>, interval_minutes: u32) -> DateTime<Utc> {
    let interval = i64::from(interval_minutes.max(1));
    let midnight = now
        .with_hour(0)
        .and_then(|t| t.with_minute(0))
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(now);
    let elapsed = i64::from(now.hour() * 60 + now.minute());
    // Intervals that do not divide a day restart at midnight
    let next = ((elapsed / interval + 1) * interval).min(MINUTES_PER_DAY);
    midnight + Duration::minutes(next)
}

/// Process launched on every tick
#[derive(Debug, Clone)]
pub struct RunCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl RunCommand {
    /// This executable's `run` subcommand with the same config file
    pub fn current_exe(config_path: Option<&std::path::Path>) -> Result<Self> {
        let program = std::env::current_exe().context("Failed to locate own executable")?;
        let mut args = Vec::new();
        if let Some(path) = config_path {
            args.push("--config".to_string());
            args.push(path.display().to_string());
        }
        args.push("run".to_string());
        Ok(Self { program, args })
    }
}

pub struct Scheduler {
    settings: ScheduleSettings,
    command: RunCommand,
    child: Option<Child>,
}

impl Scheduler {
    pub fn new(settings: ScheduleSettings, command: RunCommand) -> Self {
        Self {
            settings,
            command,
            child: None,
        }
    }

    /// Whether the previous run is still alive. Reaps it if it has exited.
    fn previous_still_running(&mut self) -> bool {
        let Some(child) = self.child.as_mut() else {
            return false;
        };
        match child.try_wait() {
            Ok(None) => true,
            Ok(Some(status)) => {
                if status.success() {
                    info!("Previous run finished: {}", status);
                } else {
                    warn!("Previous run finished: {}", status);
                }
                self.child = None;
                false
            }
            Err(e) => {
                warn!("Could not poll previous run: {}", e);
                self.child = None;
                false
            }
        }
    }

    /// Start a run unless the previous one is still going
    pub fn fire(&mut self) -> Result<bool> {
        if self.previous_still_running() {
            warn!("Previous run still in progress, skipping this tick");
            println!("{} Previous run still in progress, skipping", "⚠".yellow());
            return Ok(false);
        }

        let child = Command::new(&self.command.program)
            .args(&self.command.args)
            .spawn()
            .with_context(|| format!("Failed to start {}", self.command.program.display()))?;
        info!("Started run (pid {:?})", child.id());
        self.child = Some(child);
        Ok(true)
    }

    /// Tick until Ctrl+C
    pub async fn run(mut self) -> Result<()> {
        let stop = Arc::new(Notify::new());
        let stop_handler = stop.clone();
        ctrlc::set_handler(move || {
            println!("\n{} Stopping scheduler...", "⏹".yellow());
            stop_handler.notify_one();
        })?;

        println!(
            "{} Scheduler started, every {} minute(s)",
            "⏱".green(),
            self.settings.interval_minutes
        );

        if self.settings.run_on_start {
            self.fire()?;
        }

        loop {
            let tick = next_tick(Utc::now(), self.settings.interval_minutes);
            info!("Next run at {}", tick.to_rfc3339());
            let wait = (tick - Utc::now()).to_std().unwrap_or_default();

            tokio::select! {
                _ = tokio::time::sleep(wait) => {
                    if let Err(e) = self.fire() {
                        warn!("{:#}", e);
                    }
                }
                _ = stop.notified() => break,
            }
        }

        if let Some(mut child) = self.child.take() {
            if matches!(child.try_wait(), Ok(None)) {
                println!("{} Waiting for the current run to finish", "…".dimmed());
                let status = child.wait().await?;
                info!("Last run finished: {}", status);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, h, m, s).unwrap()
    }

    #[test]
    fn test_hourly_ticks_on_the_hour() {
        assert_eq!(next_tick(at(10, 0, 0), 60), at(11, 0, 0));
        assert_eq!(next_tick(at(10, 59, 59), 60), at(11, 0, 0));
        assert_eq!(next_tick(at(10, 17, 3), 60), at(11, 0, 0));
    }

    #[test]
    fn test_short_interval() {
        assert_eq!(next_tick(at(10, 14, 30), 15), at(10, 15, 0));
        assert_eq!(next_tick(at(10, 15, 0), 15), at(10, 30, 0));
    }

    #[test]
    fn test_tick_rolls_over_midnight() {
        let tick = next_tick(at(23, 30, 0), 60);
        assert_eq!(tick, Utc.with_ymd_and_hms(2024, 3, 2, 0, 0, 0).unwrap());
        // 7 does not divide a day; the last tick is clamped to midnight
        let tick = next_tick(at(23, 58, 0), 7);
        assert_eq!(tick, Utc.with_ymd_and_hms(2024, 3, 2, 0, 0, 0).unwrap());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_tick_skipped_while_previous_run_alive() {
        let mut scheduler = Scheduler::new(
            ScheduleSettings::default(),
            RunCommand {
                program: PathBuf::from("sleep"),
                args: vec!["2".to_string()],
            },
        );
        assert!(scheduler.fire().unwrap());
        assert!(!scheduler.fire().unwrap());

        if let Some(child) = scheduler.child.as_mut() {
            child.wait().await.unwrap();
        }
        assert!(scheduler.fire().unwrap());
        if let Some(mut child) = scheduler.child.take() {
            let _ = child.kill().await;
        }
    }

    #[test]
    fn test_run_command_passes_config() {
        let cmd = RunCommand::current_exe(Some(std::path::Path::new("watch.yaml"))).unwrap();
        assert_eq!(cmd.args, vec!["--config", "watch.yaml", "run"]);
    }
}
