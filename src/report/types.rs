use crate::runner::state::{ProbeStateReport, RunReport, RunSummary};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Run results as saved to and read back from the output directory
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RunResults {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub probes: Vec<ProbeStateReport>,
    pub summary: RunSummary,
    pub generated_at: String,
}

impl From<RunReport> for RunResults {
    fn from(report: RunReport) -> Self {
        Self {
            run_id: report.run_id,
            started_at: report.started_at,
            probes: report.probes,
            summary: report.summary,
            generated_at: chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }
}
