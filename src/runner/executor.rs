use colored::Colorize;
use log::{debug, error};
use uuid::Uuid;

use super::context::RunContext;
use super::events::{EventEmitter, RunEvent};
use super::state::RunState;
use crate::catalog::SelectorCatalog;
use crate::driver::traits::UiDriver;
use crate::probe::{ActionOutcome, Probe, ProbeContext, Verdict};
use crate::reporter::{FailureReport, Reporter};
use crate::session::SessionStore;
use crate::utils::config::Config;

/// How a single probe ended
enum Outcome {
    Passed,
    Satisfied(String),
    NotApplicable(String),
    Failed(String),
}

/// Runs probes in order against one driver and session
pub struct ProbeRunner<'a> {
    driver: &'a dyn UiDriver,
    config: &'a Config,
    catalog: &'a SelectorCatalog,
    store: &'a dyn SessionStore,
    reporter: &'a dyn Reporter,
    emitter: EventEmitter,
}

impl<'a> ProbeRunner<'a> {
    pub fn new(
        driver: &'a dyn UiDriver,
        config: &'a Config,
        catalog: &'a SelectorCatalog,
        store: &'a dyn SessionStore,
        reporter: &'a dyn Reporter,
    ) -> Self {
        Self {
            driver,
            config,
            catalog,
            store,
            reporter,
            emitter: EventEmitter::default(),
        }
    }

    /// Subscribe to run events
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<RunEvent> {
        self.emitter.subscribe()
    }

    /// Run every probe once. Once one fails, the rest are skipped without
    /// being invoked, and exactly one failure notice is sent.
    pub async fn run(&self, probes: &[Box<dyn Probe>], cx: &mut RunContext) -> RunState {
        let names: Vec<&str> = probes.iter().map(|p| p.name()).collect();
        let mut state = RunState::new(&Uuid::new_v4().to_string(), &names);

        self.emitter.emit(RunEvent::RunStarted {
            run_id: state.run_id.clone(),
            probe_count: probes.len(),
        });

        for (i, probe) in probes.iter().enumerate() {
            let probe_state = &mut state.probes[i];

            if cx.failed {
                let reason = cx.skip_reason();
                probe_state.skip(reason.clone());
                self.emitter.emit(RunEvent::ProbeSkipped {
                    index: i,
                    name: probe.name().to_string(),
                    reason,
                });
                continue;
            }

            probe_state.start();
            self.emitter.emit(RunEvent::ProbeStarted {
                index: i,
                name: probe.name().to_string(),
            });
            cx.executed.push(probe.name().to_string());

            match self.execute(probe.as_ref(), cx).await {
                Outcome::Passed => {
                    probe_state.pass();
                    self.emitter.emit(RunEvent::ProbePassed {
                        index: i,
                        duration_ms: probe_state.duration_ms.unwrap_or(0),
                    });
                }
                Outcome::Satisfied(reason) => {
                    probe_state.satisfy(reason.clone());
                    self.emitter.emit(RunEvent::ProbeSatisfied { index: i, reason });
                }
                Outcome::NotApplicable(reason) => {
                    probe_state.not_applicable(reason.clone());
                    self.emitter.emit(RunEvent::ProbeSatisfied { index: i, reason });
                }
                Outcome::Failed(message) => {
                    self.handle_failure(probe.name(), &message);
                    cx.mark_failed(probe.name());

                    probe_state.fail(message.clone());
                    self.emitter.emit(RunEvent::ProbeFailed {
                        index: i,
                        error: message,
                        duration_ms: probe_state.duration_ms.unwrap_or(0),
                    });
                }
            }
        }

        state.finish();
        self.emitter.emit(RunEvent::RunFinished {
            summary: state.summary(),
        });
        state
    }

    /// Action, then assertion unless the action made it unnecessary
    async fn execute(&self, probe: &dyn Probe, run: &mut RunContext) -> Outcome {
        let mut cx = ProbeContext::new(
            self.driver,
            self.config,
            self.catalog,
            &mut run.session,
            self.store,
        );

        match probe.action(&mut cx).await {
            Ok(ActionOutcome::Performed) => {}
            Ok(ActionOutcome::AlreadySatisfied(reason)) => return Outcome::Satisfied(reason),
            Ok(ActionOutcome::NotApplicable(reason)) => return Outcome::NotApplicable(reason),
            Err(e) => return Outcome::Failed(format!("{:#}", e)),
        }

        match probe.assertion(&mut cx).await {
            Ok(Verdict::Pass) => Outcome::Passed,
            Ok(Verdict::Skip(reason)) => Outcome::Satisfied(reason),
            Ok(Verdict::Fail(message)) => Outcome::Failed(message),
            Err(e) => Outcome::Failed(format!("{:#}", e)),
        }
    }

    fn handle_failure(&self, probe: &str, message: &str) {
        error!("Probe {} failed: {}", probe, message);
        self.emitter.emit(RunEvent::Log {
            message: format!("{} Reporting failure of {}", "❌".red(), probe),
        });
        debug!("Queueing failure report for {}", probe);
        self.reporter
            .report(FailureReport::new(probe, Some(message.to_string())));
    }
}
