pub mod json;
pub mod junit;
pub mod types;

use anyhow::Result;
use colored::Colorize;
use std::path::Path;

use crate::runner::state::RunReport;
use types::RunResults;

/// Render saved results in another format
pub fn generate_report(results_path: &Path, format: &str, output: Option<&Path>) -> Result<()> {
    let results = json::load(results_path)?;

    match format {
        "json" => json::generate(&results, output),
        "junit" => {
            let xml = junit::generate_junit_xml(&results)?;
            match output {
                Some(path) => {
                    std::fs::write(path, xml)?;
                    println!("JUnit report saved to: {}", path.display());
                }
                None => println!("{}", xml),
            }
            Ok(())
        }
        _ => anyhow::bail!("Unknown format: {} (expected json or junit)", format),
    }
}

/// Write the JSON results and JUnit XML of a finished run
pub fn write_all(report: RunReport, output_dir: &Path) -> Result<()> {
    std::fs::create_dir_all(output_dir)?;
    let results = RunResults::from(report);

    let json_path = json::write_report(&results, output_dir)?;
    println!(
        "\n{} JSON report saved to: {}",
        "📄".to_string().blue(),
        json_path.display().to_string().cyan()
    );

    junit::write_report(&results, output_dir)?;
    Ok(())
}
