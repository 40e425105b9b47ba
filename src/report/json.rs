use super::types::RunResults;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// File name of the results inside the output directory
pub const RESULTS_FILE: &str = "run-results.json";

/// Print the results, or write them to `output`
pub fn generate(results: &RunResults, output: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(results)?;

    if let Some(path) = output {
        std::fs::write(path, json)?;
        println!("JSON report saved to: {}", path.display());
    } else {
        println!("{}", json);
    }

    Ok(())
}

/// Write the results into the output directory
pub fn write_report(results: &RunResults, output_dir: &Path) -> Result<PathBuf> {
    let path = output_dir.join(RESULTS_FILE);
    std::fs::write(&path, serde_json::to_string_pretty(results)?)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}

pub fn load(path: &Path) -> Result<RunResults> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read results: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse results: {}", path.display()))
}
