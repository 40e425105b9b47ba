use super::types::RunResults;
use crate::runner::state::{ProbeStateReport, ProbeStatus};
use anyhow::Result;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::io::Cursor;
use std::path::Path;

fn seconds(ms: u64) -> String {
    (ms as f64 / 1000.0).to_string()
}

/// Generate JUnit XML with one test case per probe
pub fn generate_junit_xml(results: &RunResults) -> Result<String> {
    let mut writer = Writer::new(Cursor::new(Vec::new()));

    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    let total = results.probes.len().to_string();
    let failures = results.summary.failed.to_string();
    // Satisfied probes count as passing; only skipped and not-applicable are reported skipped
    let skipped = results
        .probes
        .iter()
        .filter(|p| {
            matches!(
                p.status,
                ProbeStatus::Skipped { .. } | ProbeStatus::NotApplicable { .. }
            )
        })
        .count()
        .to_string();
    let time = seconds(results.summary.total_duration_ms.unwrap_or(0));

    let mut suites_start = BytesStart::new("testsuites");
    suites_start.push_attribute(("name", "lumi-watch-run"));
    suites_start.push_attribute(("tests", total.as_str()));
    suites_start.push_attribute(("failures", failures.as_str()));
    suites_start.push_attribute(("skipped", skipped.as_str()));
    suites_start.push_attribute(("time", time.as_str()));
    writer.write_event(Event::Start(suites_start))?;

    let mut suite_start = BytesStart::new("testsuite");
    suite_start.push_attribute(("name", "probes"));
    suite_start.push_attribute(("tests", total.as_str()));
    suite_start.push_attribute(("failures", failures.as_str()));
    suite_start.push_attribute(("skipped", skipped.as_str()));
    suite_start.push_attribute(("id", results.run_id.as_str()));
    suite_start.push_attribute(("time", time.as_str()));
    suite_start.push_attribute(("timestamp", results.generated_at.as_str()));
    writer.write_event(Event::Start(suite_start))?;

    for probe in &results.probes {
        write_test_case(&mut writer, probe)?;
    }

    writer.write_event(Event::End(BytesEnd::new("testsuite")))?;
    writer.write_event(Event::End(BytesEnd::new("testsuites")))?;

    let result = writer.into_inner().into_inner();
    Ok(String::from_utf8(result)?)
}

fn write_test_case<W: std::io::Write>(
    writer: &mut Writer<W>,
    probe: &ProbeStateReport,
) -> Result<()> {
    let time = seconds(probe.duration_ms.unwrap_or(0));
    let mut case_start = BytesStart::new("testcase");
    case_start.push_attribute(("name", probe.name.as_str()));
    case_start.push_attribute(("classname", "lumi-watch.probes"));
    case_start.push_attribute(("time", time.as_str()));
    writer.write_event(Event::Start(case_start))?;

    match probe.status {
        ProbeStatus::Failed { ref error } => {
            let mut fail_start = BytesStart::new("failure");
            fail_start.push_attribute(("message", error.as_str()));
            fail_start.push_attribute(("type", "ProbeFailure"));
            writer.write_event(Event::Start(fail_start))?;
            writer.write_event(Event::Text(BytesText::new(error)))?;
            writer.write_event(Event::End(BytesEnd::new("failure")))?;
        }
        ProbeStatus::Skipped { ref reason } | ProbeStatus::NotApplicable { ref reason } => {
            let mut skip = BytesStart::new("skipped");
            skip.push_attribute(("message", reason.as_str()));
            writer.write_event(Event::Empty(skip))?;
        }
        ProbeStatus::Satisfied { ref reason } => {
            writer.write_event(Event::Start(BytesStart::new("system-out")))?;
            writer.write_event(Event::Text(BytesText::new(reason)))?;
            writer.write_event(Event::End(BytesEnd::new("system-out")))?;
        }
        _ => {}
    }

    writer.write_event(Event::End(BytesEnd::new("testcase")))?;
    Ok(())
}

/// Write `junit.xml` into the output directory
pub fn write_report(results: &RunResults, output_dir: &Path) -> Result<()> {
    let xml = generate_junit_xml(results)?;
    let path = output_dir.join("junit.xml");
    std::fs::write(&path, xml)?;
    println!("    Generated JUnit report: {}", path.display());
    Ok(())
}
