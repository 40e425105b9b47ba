use super::state::RunSummary;
use tokio::sync::broadcast;

/// Run events for real-time console output
#[derive(Debug, Clone)]
pub enum RunEvent {
    RunStarted {
        run_id: String,
        probe_count: usize,
    },
    RunFinished {
        summary: RunSummary,
    },

    ProbeStarted {
        index: usize,
        name: String,
    },
    ProbePassed {
        index: usize,
        duration_ms: u64,
    },
    ProbeFailed {
        index: usize,
        error: String,
        duration_ms: u64,
    },
    /// Satisfied or not applicable; never a failure
    ProbeSatisfied {
        index: usize,
        reason: String,
    },
    ProbeSkipped {
        index: usize,
        name: String,
        reason: String,
    },

    Log {
        message: String,
    },
}

/// Event emitter for broadcasting run events
pub struct EventEmitter {
    sender: broadcast::Sender<RunEvent>,
}

impl EventEmitter {
    pub fn new() -> (Self, broadcast::Receiver<RunEvent>) {
        let (sender, receiver) = broadcast::channel(100);
        (Self { sender }, receiver)
    }

    pub fn emit(&self, event: RunEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RunEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventEmitter {
    fn default() -> Self {
        let (sender, _) = broadcast::channel(100);
        Self { sender }
    }
}

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::time::Duration as StdDuration;

/// Prints run events as they arrive, with a spinner for the running probe
pub struct ConsoleEventListener;

impl ConsoleEventListener {
    pub async fn listen(mut receiver: broadcast::Receiver<RunEvent>) {
        use colored::Colorize;
        use indicatif::ProgressDrawTarget;
        use std::io::IsTerminal;

        // Piped output (cron, CI) gets plain lines without escape codes
        let multi = if std::io::stdout().is_terminal() {
            MultiProgress::new()
        } else {
            MultiProgress::with_draw_target(ProgressDrawTarget::hidden())
        };

        let mut spinner: Option<ProgressBar> = None;
        let mut current = String::new();

        while let Ok(event) = receiver.recv().await {
            match event {
                RunEvent::RunStarted {
                    run_id,
                    probe_count,
                } => {
                    println!(
                        "\n{} Run {} started ({} probes)",
                        "▶".green().bold(),
                        run_id.cyan(),
                        probe_count
                    );
                }

                RunEvent::ProbeStarted { index, name } => {
                    let pb = multi.add(ProgressBar::new_spinner());
                    if let Ok(style) = ProgressStyle::default_spinner()
                        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ ")
                        .template("    {spinner} {msg}")
                    {
                        pb.set_style(style);
                    }
                    current = format!("[{}] {}... ", index, name.dimmed());
                    pb.set_message(current.clone());
                    pb.enable_steady_tick(StdDuration::from_millis(100));
                    spinner = Some(pb);
                }

                RunEvent::ProbePassed { duration_ms, .. } => {
                    if let Some(pb) = spinner.take() {
                        pb.finish_and_clear();
                    }
                    println!("    {} {}({}ms)", "✓".green(), current, duration_ms);
                }

                RunEvent::ProbeFailed {
                    error, duration_ms, ..
                } => {
                    if let Some(pb) = spinner.take() {
                        pb.finish_and_clear();
                    }
                    println!("    {} {}({}ms)", "✗".red(), current, duration_ms);
                    println!("        {}", error.red());
                }

                RunEvent::ProbeSatisfied { reason, .. } => {
                    if let Some(pb) = spinner.take() {
                        pb.finish_and_clear();
                    }
                    println!("    {} {}({})", "✓".cyan(), current, reason.dimmed());
                }

                RunEvent::ProbeSkipped {
                    index,
                    name,
                    reason,
                } => {
                    println!(
                        "    {} [{}] {} ({})",
                        "○".yellow(),
                        index,
                        name.dimmed(),
                        reason.dimmed()
                    );
                }

                RunEvent::Log { message } => {
                    print_line(&multi, &mut std::io::stdout(), &format!("      {}", message))
                        .ok();
                }

                RunEvent::RunFinished { summary } => {
                    if let Some(pb) = spinner.take() {
                        pb.finish();
                    }
                    println!("\n{} Run finished", "■".blue().bold());
                    println!(
                        "  {} passed, {} satisfied, {} failed, {} skipped",
                        summary.passed.to_string().green(),
                        summary.satisfied.to_string().cyan(),
                        summary.failed.to_string().red(),
                        summary.skipped.to_string().yellow()
                    );
                    if let Some(duration) = summary.total_duration_ms {
                        println!("  Duration: {}ms", duration);
                    }
                    break;
                }
            }
        }
    }
}

/// Print above the spinners, or straight to `out` when they are not drawn
fn print_line(
    multi: &MultiProgress,
    out: &mut impl std::io::Write,
    line: &str,
) -> std::io::Result<()> {
    if multi.is_hidden() {
        writeln!(out, "{}", line)
    } else {
        multi.println(line)
    }
}
