use protocol::RunMode;
use serde_json::{json, Map, Value};
use std::time::Duration;

use super::expression::FilterExpression;
use super::paths::TestTarget;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verbosity(i8);

impl Verbosity {
    pub const MIN: i64 = -2;
    pub const MAX: i64 = 2;

    pub(crate) fn new(level: i8) -> Self {
        Self(level)
    }

    pub fn level(self) -> i8 {
        self.0
    }

    pub fn flag(self) -> Option<&'static str> {
        match self.0 {
            i8::MIN..=-2 => Some("-qq"),
            -1 => Some("-q"),
            0 => None,
            1 => Some("-v"),
            _ => Some("-vv"),
        }
    }
}

impl Default for Verbosity {
    fn default() -> Self {
        Self(0)
    }
}

/// `failfast` and `maxfail` collapse into one value, so the two can never be
/// combined past validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StopPolicy {
    #[default]
    Never,
    FirstFailure,
    AfterFailures(u64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CaptureDisplay {
    #[default]
    RunnerDefault,
    All,
    Hidden,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePattern(String);

impl FilePattern {
    pub const MAX_LEN: usize = 128;

    pub(crate) fn new(pattern: String) -> Self {
        Self(pattern)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A request that has passed every policy check. Only the validator builds
/// these; later stages trust them without re-checking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionRequest {
    pub(crate) mode: RunMode,
    pub(crate) targets: Vec<TestTarget>,
    pub(crate) markers: Option<FilterExpression>,
    pub(crate) keywords: Option<FilterExpression>,
    pub(crate) verbosity: Verbosity,
    pub(crate) stop: StopPolicy,
    pub(crate) capture: CaptureDisplay,
    pub(crate) flags: Vec<String>,
    pub(crate) pattern: Option<FilePattern>,
    pub(crate) timeout: Duration,
}

impl ExecutionRequest {
    pub fn mode(&self) -> RunMode {
        self.mode
    }

    pub fn targets(&self) -> &[TestTarget] {
        &self.targets
    }

    pub fn markers(&self) -> Option<&FilterExpression> {
        self.markers.as_ref()
    }

    pub fn keywords(&self) -> Option<&FilterExpression> {
        self.keywords.as_ref()
    }

    pub fn verbosity(&self) -> Verbosity {
        self.verbosity
    }

    pub fn stop(&self) -> StopPolicy {
        self.stop
    }

    pub fn capture(&self) -> CaptureDisplay {
        self.capture
    }

    /// Allowlisted flags in canonical (allowlist) order.
    pub fn flags(&self) -> &[String] {
        &self.flags
    }

    pub fn pattern(&self) -> Option<&FilePattern> {
        self.pattern.as_ref()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Encodes the request back into its canonical payload; validating the
    /// result yields an identical request.
    pub fn to_payload(&self) -> Value {
        let mut map = Map::new();
        let targets: Vec<String> = self.targets.iter().map(TestTarget::render).collect();
        match self.mode {
            RunMode::Execute => {
                if !targets.is_empty() {
                    map.insert("node_ids".to_string(), json!(targets));
                }
                if let Some(markers) = &self.markers {
                    map.insert("markers".to_string(), json!(markers.as_str()));
                }
                if let Some(keywords) = &self.keywords {
                    map.insert("keywords".to_string(), json!(keywords.as_str()));
                }
                if self.verbosity != Verbosity::default() {
                    map.insert("verbosity".to_string(), json!(self.verbosity.level()));
                }
                match self.stop {
                    StopPolicy::Never => {}
                    StopPolicy::FirstFailure => {
                        map.insert("failfast".to_string(), json!(true));
                    }
                    StopPolicy::AfterFailures(count) => {
                        map.insert("maxfail".to_string(), json!(count));
                    }
                }
                match self.capture {
                    CaptureDisplay::RunnerDefault => {}
                    CaptureDisplay::All => {
                        map.insert("show_capture".to_string(), json!(true));
                    }
                    CaptureDisplay::Hidden => {
                        map.insert("show_capture".to_string(), json!(false));
                    }
                }
                if !self.flags.is_empty() {
                    map.insert("flags".to_string(), json!(self.flags));
                }
            }
            RunMode::Discover => {
                if let Some(target) = targets.first() {
                    map.insert("path".to_string(), json!(target));
                }
                if let Some(pattern) = &self.pattern {
                    map.insert("pattern".to_string(), json!(pattern.as_str()));
                }
            }
        }
        map.insert("timeout".to_string(), json!(self.timeout.as_secs()));
        Value::Object(map)
    }
}
