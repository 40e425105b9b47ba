use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

use lumi_watch::probe::suite::{build_suite, PROBE_NAMES};
use lumi_watch::scheduler::{RunCommand, Scheduler};
use lumi_watch::session::{FileSessionStore, SessionStore};
use lumi_watch::utils::config::{Config, FailurePolicy};
use lumi_watch::{report, runner};

#[derive(Parser)]
#[command(name = "lumi-watch")]
#[command(version)]
#[command(about = "Scheduled UI probes for a social web client", long_about = None)]
struct Cli {
    /// Config file (defaults to ./lumi-watch.yaml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the probe suite once
    Run {
        /// Probes to run, in order (repeatable). Defaults to the whole suite.
        #[arg(short, long = "probe")]
        probes: Vec<String>,

        /// Show the browser window
        #[arg(long, default_value = "false")]
        headed: bool,

        /// Output directory for reports
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Treat a missing toggle control as a failure
        #[arg(long, default_value = "false")]
        strict: bool,
    },

    /// Run the suite at every interval boundary until interrupted
    Schedule {
        /// Minutes between runs
        #[arg(short, long)]
        interval: Option<u32>,

        /// Also run once right away
        #[arg(long, default_value = "false")]
        run_on_start: bool,
    },

    /// List the built-in probes in default order
    Probes,

    /// Inspect or forget the stored session
    Session {
        #[command(subcommand)]
        command: SessionCommands,
    },

    /// Render saved run results
    Report {
        /// Path to run-results.json
        results: PathBuf,

        /// Output format (json, junit)
        #[arg(short, long, default_value = "junit")]
        format: String,

        /// Output file path
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum SessionCommands {
    /// Print where the session is stored and how old it is
    Show,
    /// Delete the stored session so the next run logs in again
    Clear,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let mut config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Run {
            probes,
            headed,
            output,
            strict,
        } => {
            if !probes.is_empty() {
                config.probes = probes;
            }
            if headed {
                config.browser.headless = false;
            }
            if let Some(output) = output {
                config.output_dir = output;
            }
            if strict {
                config.policy = FailurePolicy::Strict;
            }

            println!(
                "{} Probing {}",
                "▶".green().bold(),
                config.base_url.cyan()
            );
            println!("  Session: {}", config.session_path.display());
            println!("  Output: {}", config.output_dir.display().to_string().cyan());

            if let Some(report) = runner::run_once(&config).await? {
                if !report.summary.is_success() {
                    std::process::exit(1);
                }
            }
        }

        Commands::Schedule {
            interval,
            run_on_start,
        } => {
            let mut settings = config.schedule.clone();
            if let Some(minutes) = interval {
                settings.interval_minutes = minutes;
            }
            if run_on_start {
                settings.run_on_start = true;
            }
            // Fail on a bad probe list now rather than once an hour
            build_suite(&config.probes)?;

            let command = RunCommand::current_exe(cli.config.as_deref())?;
            Scheduler::new(settings, command).run().await?;
        }

        Commands::Probes => {
            for name in PROBE_NAMES {
                let description = build_suite(&[name.to_string()])?
                    .first()
                    .map(|p| p.description().to_string())
                    .unwrap_or_default();
                println!("  {:<10} {}", name.cyan(), description.dimmed());
            }
        }

        Commands::Session { command } => {
            let store = FileSessionStore::new(&config.session_path);
            match command {
                SessionCommands::Show => match store.load().await {
                    Some(session) => {
                        println!("{} {}", "Session:".bold(), store.path().display());
                        println!("  Created: {}", session.created_at.to_rfc3339());
                        println!("  Age: {} minutes", session.age().num_minutes());
                        println!(
                            "  Storage: {}",
                            if session.storage.is_some() {
                                "present".green()
                            } else {
                                "empty".yellow()
                            }
                        );
                    }
                    None => println!("{} No stored session", "ℹ".blue()),
                },
                SessionCommands::Clear => {
                    store.clear().await;
                    println!("{} Session cleared", "✓".green());
                }
            }
        }

        Commands::Report {
            results,
            format,
            output,
        } => {
            println!(
                "{} Generating {} report from: {}",
                "📊".to_string().blue(),
                format.cyan(),
                results.display()
            );
            report::generate_report(&results, &format, output.as_deref())?;
        }
    }

    Ok(())
}
