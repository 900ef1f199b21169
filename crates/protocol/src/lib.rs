use serde::{Deserialize, Serialize};

pub mod violations;

pub use violations::{FieldViolation, ViolationRule};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    Execute,
    Discover,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TestStatus {
    Passed,
    Failed,
    Skipped,
    Error,
}

/// One executed test. Passing tests only carry the node id and duration;
/// message and traceback are reserved for skips, failures and errors.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TestOutcome {
    pub node_id: String,
    pub status: TestStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub traceback: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CollectionError {
    pub location: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DiscoveredTest {
    pub node_id: String,
    pub file: String,
    pub module: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,
    pub function: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
}

impl DiscoveredTest {
    /// Splits a pytest node id (`path/to/test_mod.py::TestCls::test_fn[p]`)
    /// into its file, module, class and function parts.
    pub fn from_node_id(node_id: &str, line: Option<u32>) -> Self {
        let mut parts = node_id.split("::");
        let file = parts.next().unwrap_or_default().to_string();
        let rest: Vec<&str> = parts.collect();
        let module = file
            .trim_end_matches(".py")
            .trim_start_matches("./")
            .replace('/', ".");
        let (class, function) = match rest.as_slice() {
            [] => (None, String::new()),
            [function] => (None, function.to_string()),
            [classes @ .., function] => (Some(classes.join(".")), function.to_string()),
        };
        Self {
            node_id: node_id.to_string(),
            file,
            module,
            class,
            function,
            line,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ExecutionSummary {
    pub total: u64,
    pub passed: u64,
    pub failed: u64,
    pub skipped: u64,
    pub errors: u64,
    pub duration_secs: f64,
}

impl ExecutionSummary {
    pub fn from_outcomes(outcomes: &[TestOutcome], duration_secs: f64) -> Self {
        let mut summary = Self {
            duration_secs,
            ..Self::default()
        };
        for outcome in outcomes {
            summary.total += 1;
            match outcome.status {
                TestStatus::Passed => summary.passed += 1,
                TestStatus::Failed => summary.failed += 1,
                TestStatus::Skipped => summary.skipped += 1,
                TestStatus::Error => summary.errors += 1,
            }
        }
        summary
    }

    pub fn from_discovered(tests: &[DiscoveredTest], duration_secs: f64) -> Self {
        Self {
            total: tests.len() as u64,
            duration_secs,
            ..Self::default()
        }
    }
}

/// How much of the run could be reconstructed from the runner's output.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DetailLevel {
    StructuredReport,
    Text,
    CountsOnly,
    RawOnly,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunResult {
    pub mode: RunMode,
    pub exit_code: i32,
    pub summary: ExecutionSummary,
    pub detail: DetailLevel,
    #[serde(default)]
    pub tests: Vec<TestOutcome>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub discovered: Vec<DiscoveredTest>,
    #[serde(default)]
    pub collection_errors: Vec<CollectionError>,
    pub stdout: String,
    pub stderr: String,
    /// The structured report file as the runner wrote it, when one was produced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structured_report: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Spawn,
    Timeout,
    AbnormalTermination,
    RunnerInternal,
    InternalAdapter,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExitDescriptor {
    Code { code: i32 },
    Signal { signal: i32 },
    Timeout { after_ms: u64 },
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DiagnosticContext {
    pub command: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit: Option<ExitDescriptor>,
    #[serde(default)]
    pub stdout: String,
    #[serde(default)]
    pub stderr: String,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProtocolError {
    pub kind: ErrorKind,
    pub code: i32,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<DiagnosticContext>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub violations: Vec<FieldViolation>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExecutionResponse {
    Result(RunResult),
    Error(ProtocolError),
}

impl ExecutionResponse {
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }
}
