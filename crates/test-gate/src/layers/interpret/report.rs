//! pytest-json-report output.

use std::collections::HashSet;

use protocol::{CollectionError, DiscoveredTest, TestOutcome, TestStatus};
use serde::Deserialize;
use serde_json::Value;

const PHASES: [&str; 3] = ["setup", "call", "teardown"];

#[derive(Debug, Deserialize)]
struct JsonReport {
    #[serde(default)]
    duration: Option<f64>,
    #[serde(default)]
    tests: Vec<JsonTest>,
    #[serde(default)]
    collectors: Vec<JsonCollector>,
}

#[derive(Debug, Deserialize)]
struct JsonTest {
    nodeid: String,
    outcome: String,
    #[serde(default)]
    setup: Option<JsonPhase>,
    #[serde(default)]
    call: Option<JsonPhase>,
    #[serde(default)]
    teardown: Option<JsonPhase>,
}

impl JsonTest {
    fn phase(&self, name: &str) -> Option<&JsonPhase> {
        match name {
            "setup" => self.setup.as_ref(),
            "call" => self.call.as_ref(),
            _ => self.teardown.as_ref(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct JsonPhase {
    #[serde(default)]
    duration: Option<f64>,
    #[serde(default)]
    outcome: Option<String>,
    #[serde(default)]
    crash: Option<JsonCrash>,
    #[serde(default)]
    longrepr: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct JsonCrash {
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct JsonCollector {
    nodeid: String,
    outcome: String,
    #[serde(default)]
    longrepr: Option<Value>,
    #[serde(default)]
    result: Vec<JsonCollected>,
}

#[derive(Debug, Deserialize)]
struct JsonCollected {
    nodeid: String,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    lineno: Option<u32>,
}

#[derive(Debug)]
pub(crate) struct StructuredReport {
    pub(crate) tests: Vec<TestOutcome>,
    pub(crate) discovered: Vec<DiscoveredTest>,
    pub(crate) collection_errors: Vec<CollectionError>,
    pub(crate) duration_secs: Option<f64>,
    /// The whole report as the plugin wrote it.
    pub(crate) raw: Value,
}

pub(crate) fn parse_report(text: &str) -> Result<StructuredReport, serde_json::Error> {
    let raw: Value = serde_json::from_str(text)?;
    let report = JsonReport::deserialize(&raw)?;

    let tests = report.tests.iter().map(to_outcome).collect();

    let collection_errors = report
        .collectors
        .iter()
        .filter(|collector| collector.outcome == "failed")
        .map(|collector| CollectionError {
            location: collector.nodeid.clone(),
            reason: collector
                .longrepr
                .as_ref()
                .map(render_longrepr)
                .unwrap_or_default(),
        })
        .collect();

    // Items are the collected entries that are not collectors themselves.
    let collector_ids: HashSet<&str> = report
        .collectors
        .iter()
        .map(|collector| collector.nodeid.as_str())
        .collect();
    let mut seen = HashSet::new();
    let discovered = report
        .collectors
        .iter()
        .flat_map(|collector| collector.result.iter())
        .filter(|entry| {
            entry.nodeid.contains("::")
                && !collector_ids.contains(entry.nodeid.as_str())
                && !matches!(entry.kind.as_deref(), Some("Class" | "Module" | "Package"))
        })
        .filter(|entry| seen.insert(entry.nodeid.clone()))
        .map(|entry| DiscoveredTest::from_node_id(&entry.nodeid, entry.lineno))
        .collect();

    Ok(StructuredReport {
        tests,
        discovered,
        collection_errors,
        duration_secs: report.duration,
        raw,
    })
}

fn to_outcome(test: &JsonTest) -> TestOutcome {
    let status = match test.outcome.as_str() {
        "passed" | "xpassed" => TestStatus::Passed,
        "failed" => TestStatus::Failed,
        "error" => TestStatus::Error,
        _ => TestStatus::Skipped,
    };
    let duration: f64 = PHASES
        .iter()
        .filter_map(|name| test.phase(name).and_then(|phase| phase.duration))
        .sum();
    let mut outcome = TestOutcome {
        node_id: test.nodeid.clone(),
        status,
        duration_secs: Some(duration),
        message: None,
        traceback: None,
    };

    // The first phase that did not pass explains the outcome.
    let culprit = PHASES.iter().filter_map(|name| test.phase(name)).find(|phase| {
        phase
            .outcome
            .as_deref()
            .map(|outcome| outcome != "passed")
            .unwrap_or(false)
    });
    match status {
        TestStatus::Passed => {}
        TestStatus::Skipped => {
            outcome.message = culprit
                .and_then(|phase| phase.longrepr.as_ref())
                .map(skip_reason);
        }
        TestStatus::Failed | TestStatus::Error => {
            if let Some(phase) = culprit {
                let traceback = phase.longrepr.as_ref().map(render_longrepr);
                outcome.message = phase
                    .crash
                    .as_ref()
                    .and_then(|crash| crash.message.clone())
                    .or_else(|| {
                        traceback
                            .as_deref()
                            .and_then(|text| text.lines().rev().find(|line| !line.trim().is_empty()))
                            .map(|line| line.trim().to_string())
                    });
                outcome.traceback = traceback;
            }
        }
    }
    outcome
}

fn render_longrepr(value: &Value) -> String {
    match value {
        Value::String(text) => text.trim_end().to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Skip longreprs look like `('tests/test_a.py', 12, 'Skipped: reason')`,
/// either as a string or as a JSON array.
fn skip_reason(value: &Value) -> String {
    match value {
        Value::Array(items) => items
            .last()
            .and_then(Value::as_str)
            .map(strip_skip_prefix)
            .unwrap_or_default(),
        Value::String(text) => {
            let trimmed = text.trim().trim_end_matches(')');
            let reason = trimmed
                .rsplit_once(", '")
                .or_else(|| trimmed.rsplit_once(", \""))
                .map(|(_, reason)| reason.trim_end_matches(['\'', '"']))
                .unwrap_or(trimmed);
            strip_skip_prefix(reason)
        }
        other => other.to_string(),
    }
}

fn strip_skip_prefix(reason: &str) -> String {
    reason.trim_start_matches("Skipped: ").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXECUTION_REPORT: &str = r#"{
  "created": 1700000000.0,
  "duration": 0.42,
  "exitcode": 1,
  "root": "/project",
  "summary": {"passed": 1, "failed": 1, "skipped": 1, "total": 3, "collected": 3},
  "collectors": [
    {"nodeid": "", "outcome": "passed", "result": [{"nodeid": "tests/test_math.py", "type": "Module"}]},
    {"nodeid": "tests/test_math.py", "outcome": "passed", "result": [
      {"nodeid": "tests/test_math.py::test_add", "type": "Function", "lineno": 0},
      {"nodeid": "tests/test_math.py::test_sub", "type": "Function", "lineno": 3},
      {"nodeid": "tests/test_math.py::test_skip", "type": "Function", "lineno": 6}
    ]}
  ],
  "tests": [
    {"nodeid": "tests/test_math.py::test_add", "lineno": 0, "outcome": "passed",
     "setup": {"duration": 0.01, "outcome": "passed"},
     "call": {"duration": 0.1, "outcome": "passed"},
     "teardown": {"duration": 0.01, "outcome": "passed"}},
    {"nodeid": "tests/test_math.py::test_sub", "lineno": 3, "outcome": "failed",
     "setup": {"duration": 0.0, "outcome": "passed"},
     "call": {"duration": 0.2, "outcome": "failed",
              "crash": {"path": "/project/tests/test_math.py", "lineno": 5, "message": "assert 0 == 1"},
              "longrepr": "def test_sub():\n>       assert 1 - 1 == 1\nE       assert 0 == 1\n\ntests/test_math.py:5: AssertionError"},
     "teardown": {"duration": 0.0, "outcome": "passed"}},
    {"nodeid": "tests/test_math.py::test_skip", "lineno": 6, "outcome": "skipped",
     "setup": {"duration": 0.0, "outcome": "skipped",
               "longrepr": "('/project/tests/test_math.py', 7, 'Skipped: needs network')"},
     "teardown": {"duration": 0.0, "outcome": "passed"}}
  ]
}"#;

    #[test]
    fn maps_tests_with_volume_policy() {
        let report = parse_report(EXECUTION_REPORT).expect("report");
        assert_eq!(report.tests.len(), 3);
        assert_eq!(report.duration_secs, Some(0.42));
        assert_eq!(report.raw["summary"]["total"], serde_json::json!(3));
        assert_eq!(report.raw["exitcode"], serde_json::json!(1));

        let add = &report.tests[0];
        assert_eq!(add.status, TestStatus::Passed);
        assert!((add.duration_secs.unwrap() - 0.12).abs() < 1e-9);
        assert!(add.message.is_none() && add.traceback.is_none());

        let sub = &report.tests[1];
        assert_eq!(sub.status, TestStatus::Failed);
        assert_eq!(sub.message.as_deref(), Some("assert 0 == 1"));
        assert!(sub.traceback.as_deref().unwrap().contains("AssertionError"));

        let skip = &report.tests[2];
        assert_eq!(skip.status, TestStatus::Skipped);
        assert_eq!(skip.message.as_deref(), Some("needs network"));
        assert!(skip.traceback.is_none());

        assert_eq!(report.discovered.len(), 3);
        assert_eq!(report.discovered[1].line, Some(3));
        assert!(report.collection_errors.is_empty());
    }

    #[test]
    fn failed_collectors_become_collection_errors() {
        let text = r#"{
  "duration": 0.1,
  "tests": [],
  "collectors": [
    {"nodeid": "", "outcome": "passed", "result": [{"nodeid": "tests/test_b.py", "type": "Module"}]},
    {"nodeid": "tests/test_b.py", "outcome": "failed", "result": [],
     "longrepr": "ImportError while importing test module\nE   ModuleNotFoundError: No module named 'x'\n"}
  ]
}"#;
        let report = parse_report(text).expect("report");
        assert!(report.tests.is_empty());
        assert!(report.discovered.is_empty());
        assert_eq!(report.collection_errors.len(), 1);
        assert_eq!(report.collection_errors[0].location, "tests/test_b.py");
        assert!(report.collection_errors[0].reason.ends_with("No module named 'x'"));
    }

    #[test]
    fn malformed_report_is_an_error() {
        assert!(parse_report("{\"tests\": 3}").is_err());
        assert!(parse_report("not json").is_err());
    }

    #[test]
    fn class_collectors_are_not_items() {
        let text = r#"{
  "collectors": [
    {"nodeid": "tests/test_c.py", "outcome": "passed", "result": [
      {"nodeid": "tests/test_c.py::TestCls", "type": "Class"}
    ]},
    {"nodeid": "tests/test_c.py::TestCls", "outcome": "passed", "result": [
      {"nodeid": "tests/test_c.py::TestCls::test_a", "type": "Function", "lineno": 4}
    ]}
  ]
}"#;
        let report = parse_report(text).expect("report");
        let ids: Vec<&str> = report.discovered.iter().map(|t| t.node_id.as_str()).collect();
        assert_eq!(ids, vec!["tests/test_c.py::TestCls::test_a"]);
        assert_eq!(report.discovered[0].class.as_deref(), Some("TestCls"));
    }
}
