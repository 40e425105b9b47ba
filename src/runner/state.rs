use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Lifecycle of one probe within a run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProbeStatus {
    Pending,
    Running,
    Passed,
    Failed { error: String },
    /// The desired end state already held, or the site refused a repeat
    Satisfied { reason: String },
    /// Nothing on the page to act on (lenient policy)
    NotApplicable { reason: String },
    /// Not run because an earlier probe failed
    Skipped { reason: String },
}

impl ProbeStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ProbeStatus::Pending | ProbeStatus::Running)
    }

    pub fn label(&self) -> &'static str {
        match self {
            ProbeStatus::Pending => "pending",
            ProbeStatus::Running => "running",
            ProbeStatus::Passed => "passed",
            ProbeStatus::Failed { .. } => "failed",
            ProbeStatus::Satisfied { .. } => "satisfied",
            ProbeStatus::NotApplicable { .. } => "not applicable",
            ProbeStatus::Skipped { .. } => "skipped",
        }
    }
}

/// State for a single probe
#[derive(Debug, Clone)]
pub struct ProbeState {
    pub index: usize,
    pub name: String,
    pub status: ProbeStatus,
    pub started_at: Option<Instant>,
    pub duration_ms: Option<u64>,
}

impl ProbeState {
    pub fn new(index: usize, name: &str) -> Self {
        Self {
            index,
            name: name.to_string(),
            status: ProbeStatus::Pending,
            started_at: None,
            duration_ms: None,
        }
    }

    pub fn start(&mut self) {
        self.status = ProbeStatus::Running;
        self.started_at = Some(Instant::now());
    }

    pub fn pass(&mut self) {
        self.finish(ProbeStatus::Passed);
    }

    pub fn fail(&mut self, error: String) {
        self.finish(ProbeStatus::Failed { error });
    }

    pub fn satisfy(&mut self, reason: String) {
        self.finish(ProbeStatus::Satisfied { reason });
    }

    pub fn not_applicable(&mut self, reason: String) {
        self.finish(ProbeStatus::NotApplicable { reason });
    }

    pub fn skip(&mut self, reason: String) {
        self.status = ProbeStatus::Skipped { reason };
    }

    fn finish(&mut self, status: ProbeStatus) {
        self.status = status;
        if let Some(start) = self.started_at {
            self.duration_ms = Some(start.elapsed().as_millis() as u64);
        }
    }

    pub fn to_report(&self) -> ProbeStateReport {
        ProbeStateReport {
            index: self.index,
            name: self.name.clone(),
            status: self.status.clone(),
            duration_ms: self.duration_ms,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProbeStateReport {
    pub index: usize,
    pub name: String,
    pub status: ProbeStatus,
    pub duration_ms: Option<u64>,
}

/// State for one run of the suite
#[derive(Debug, Clone)]
pub struct RunState {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub probes: Vec<ProbeState>,
    started: Instant,
    pub total_duration_ms: Option<u64>,
}

impl RunState {
    pub fn new(run_id: &str, names: &[&str]) -> Self {
        Self {
            run_id: run_id.to_string(),
            started_at: Utc::now(),
            probes: names
                .iter()
                .enumerate()
                .map(|(i, name)| ProbeState::new(i, name))
                .collect(),
            started: Instant::now(),
            total_duration_ms: None,
        }
    }

    pub fn finish(&mut self) {
        self.total_duration_ms = Some(self.started.elapsed().as_millis() as u64);
    }

    pub fn summary(&self) -> RunSummary {
        let mut summary = RunSummary {
            run_id: self.run_id.clone(),
            total: self.probes.len() as u32,
            total_duration_ms: self.total_duration_ms,
            ..Default::default()
        };
        for probe in &self.probes {
            match probe.status {
                ProbeStatus::Passed => summary.passed += 1,
                ProbeStatus::Failed { .. } => summary.failed += 1,
                ProbeStatus::Satisfied { .. } | ProbeStatus::NotApplicable { .. } => {
                    summary.satisfied += 1
                }
                ProbeStatus::Skipped { .. } => summary.skipped += 1,
                _ => {}
            }
        }
        summary
    }

    /// The probe that failed the run, if any
    pub fn failed_probe(&self) -> Option<&ProbeState> {
        self.probes
            .iter()
            .find(|p| matches!(p.status, ProbeStatus::Failed { .. }))
    }

    pub fn to_report(&self) -> RunReport {
        RunReport {
            run_id: self.run_id.clone(),
            started_at: self.started_at,
            probes: self.probes.iter().map(|p| p.to_report()).collect(),
            summary: self.summary(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub run_id: String,
    pub total: u32,
    pub passed: u32,
    pub failed: u32,
    pub satisfied: u32,
    pub skipped: u32,
    pub total_duration_ms: Option<u64>,
}

impl RunSummary {
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }
}

/// Serializable result of a run, as written to the output directory
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub probes: Vec<ProbeStateReport>,
    pub summary: RunSummary,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_probe_and_terminal_states() {
        let mut state = RunState::new("r1", &["login", "profile", "post"]);
        assert!(!state.probes[0].status.is_terminal());
        state.probes[0].start();
        state.probes[0].fail("nope".to_string());
        state.probes[1].skip("login failed".to_string());
        state.probes[2].skip("login failed".to_string());

        let labels: Vec<_> = state.probes.iter().map(|p| p.status.label()).collect();
        assert_eq!(labels, vec!["failed", "skipped", "skipped"]);
        assert_eq!(state.failed_probe().unwrap().name, "login");
        assert!(state.probes.iter().all(|p| p.status.is_terminal()));
    }

    #[test]
    fn test_summary_counts() {
        let mut state = RunState::new("r2", &["login", "like", "bookmark", "post"]);
        state.probes[0].pass();
        state.probes[1].satisfy("already Liked".to_string());
        state.probes[2].not_applicable("no control".to_string());
        state.probes[3].fail("boom".to_string());
        state.finish();

        let summary = state.summary();
        assert_eq!(summary.total, 4);
        assert_eq!(summary.passed, 1);
        assert_eq!(summary.satisfied, 2);
        assert_eq!(summary.failed, 1);
        assert!(!summary.is_success());
        assert!(summary.total_duration_ms.is_some());
    }

    #[test]
    fn test_status_serializes_tagged() {
        let json = serde_json::to_value(ProbeStatus::Failed {
            error: "x".to_string(),
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({ "type": "failed", "error": "x" }));

        let json = serde_json::to_value(ProbeStatus::NotApplicable {
            reason: "r".to_string(),
        })
        .unwrap();
        assert_eq!(json["type"], "notapplicable");
    }
}
