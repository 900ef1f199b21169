use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use protocol::RunMode;

use crate::config::GateConfig;
use crate::error::AdapterError;
use crate::layers::policy::{CaptureDisplay, ExecutionRequest, StopPolicy};

const COLOR_OFF: &str = "--color=no";
const EXECUTE_TOKENS: &[&str] = &["-rA", "--durations=0", "--durations-min=0"];
const DISCOVER_TOKENS: &[&str] = &["--collect-only", "-q"];
const JSON_REPORT: &str = "--json-report";
const JSON_REPORT_FILE: &str = "--json-report-file=";

/// The single command line a request turns into. Tokens go to the runner
/// as-is; nothing here is ever joined into a shell string for execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedCommand {
    program: String,
    args: Vec<String>,
    prefix_len: usize,
    cwd: PathBuf,
    timeout: Duration,
    env: BTreeMap<String, String>,
    report_path: Option<PathBuf>,
}

impl ValidatedCommand {
    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn env(&self) -> &BTreeMap<String, String> {
        &self.env
    }

    pub fn report_path(&self) -> Option<&Path> {
        self.report_path.as_deref()
    }

    /// Program followed by every argument.
    pub fn argv(&self) -> Vec<String> {
        let mut argv = Vec::with_capacity(self.args.len() + 1);
        argv.push(self.program.clone());
        argv.extend(self.args.iter().cloned());
        argv
    }

    /// Quoted rendering for logs and diagnostics only.
    pub fn display(&self) -> String {
        shell_words::join(self.argv())
    }
}

/// Builds the argument vector for a validated request. Same request and
/// configuration always give the same tokens.
pub fn build_command(
    request: &ExecutionRequest,
    config: &GateConfig,
    report_path: Option<&Path>,
) -> Result<ValidatedCommand, AdapterError> {
    let mut args: Vec<String> = config.runner.args.clone();
    let prefix_len = args.len();
    args.push(COLOR_OFF.to_string());

    match request.mode() {
        RunMode::Execute => {
            args.extend(EXECUTE_TOKENS.iter().map(|token| token.to_string()));
            if let Some(flag) = request.verbosity().flag() {
                args.push(flag.to_string());
            }
            match request.stop() {
                StopPolicy::Never => {}
                StopPolicy::FirstFailure => args.push("-x".to_string()),
                StopPolicy::AfterFailures(count) => args.push(format!("--maxfail={count}")),
            }
            match request.capture() {
                CaptureDisplay::RunnerDefault => {}
                CaptureDisplay::All => args.push("--show-capture=all".to_string()),
                CaptureDisplay::Hidden => args.push("--show-capture=no".to_string()),
            }
            if let Some(markers) = request.markers() {
                args.push("-m".to_string());
                args.push(markers.as_str().to_string());
            }
            if let Some(keywords) = request.keywords() {
                args.push("-k".to_string());
                args.push(keywords.as_str().to_string());
            }
            let mut positions = Vec::with_capacity(request.flags().len());
            for flag in request.flags() {
                let position = config.flags.position(flag).ok_or_else(|| {
                    AdapterError::internal(format!(
                        "validated request carries flag {flag:?} outside the allowlist"
                    ))
                })?;
                positions.push((position, flag));
            }
            positions.sort_by_key(|(position, _)| *position);
            args.extend(positions.into_iter().map(|(_, flag)| flag.clone()));
        }
        RunMode::Discover => {
            args.extend(DISCOVER_TOKENS.iter().map(|token| token.to_string()));
        }
    }

    let report_path = report_path.map(Path::to_path_buf);
    if let Some(path) = &report_path {
        args.push(JSON_REPORT.to_string());
        args.push(format!("{JSON_REPORT_FILE}{}", path.display()));
    }

    if let Some(pattern) = request.pattern() {
        args.push("-o".to_string());
        args.push(format!("python_files={}", pattern.as_str()));
    }

    args.extend(request.targets().iter().map(|target| target.render()));

    Ok(ValidatedCommand {
        program: config.runner.program.clone(),
        args,
        prefix_len,
        cwd: config.project_root.clone(),
        timeout: request.timeout(),
        env: passthrough_env(&config.runner.env_passthrough),
        report_path,
    })
}

fn passthrough_env(names: &[String]) -> BTreeMap<String, String> {
    names
        .iter()
        .filter_map(|name| std::env::var(name).ok().map(|value| (name.clone(), value)))
        .collect()
}

/// Recovers the allowlisted extra flags from a built command.
pub fn decode_flags(command: &ValidatedCommand, config: &GateConfig) -> Vec<String> {
    command.args[command.prefix_len..]
        .iter()
        .filter(|token| config.flags.position(token).is_some())
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::policy::validate_request;
    use crate::test_utils::temp_dir;
    use serde_json::{json, Value};
    use std::fs;

    fn project() -> GateConfig {
        let dir = temp_dir("test-gate-command");
        fs::create_dir_all(dir.join("tests")).unwrap();
        fs::write(dir.join("tests/test_math.py"), "def test_add(): pass\n").unwrap();
        GateConfig::for_project(&dir).expect("config")
    }

    #[test]
    fn execute_tokens_follow_canonical_order() {
        let config = project();
        let request = validate_request(
            RunMode::Execute,
            &json!({
                "node_ids": ["tests/test_math.py::test_add", "tests"],
                "markers": "not slow",
                "keywords": "add",
                "verbosity": 2,
                "maxfail": 2,
                "show_capture": true,
                "flags": ["--tb=short", "--lf"],
            }),
            &config,
        )
        .expect("valid");
        let command = build_command(&request, &config, None).expect("build");
        assert_eq!(command.program(), "python3");
        assert_eq!(
            command.args(),
            [
                "-m",
                "pytest",
                "--color=no",
                "-rA",
                "--durations=0",
                "--durations-min=0",
                "-vv",
                "--maxfail=2",
                "--show-capture=all",
                "-m",
                "not slow",
                "-k",
                "add",
                "--lf",
                "--tb=short",
                "tests/test_math.py::test_add",
                "tests",
            ]
        );
        assert_eq!(command.cwd(), config.project_root.as_path());
        assert_eq!(command.timeout(), Duration::from_secs(300));
        fs::remove_dir_all(&config.project_root).ok();
    }

    #[test]
    fn same_request_builds_identical_argv() {
        let config = project();
        let request = validate_request(
            RunMode::Execute,
            &json!({"failfast": true, "flags": ["--runxfail", "--lf"]}),
            &config,
        )
        .expect("valid");
        let first = build_command(&request, &config, None).expect("build");
        let second = build_command(&request.clone(), &config, None).expect("build");
        assert_eq!(first.argv(), second.argv());
        assert!(first.args().contains(&"-x".to_string()));
        fs::remove_dir_all(&config.project_root).ok();
    }

    #[test]
    fn discover_uses_collect_only_and_pattern() {
        let config = project();
        let request = validate_request(
            RunMode::Discover,
            &json!({"path": "tests", "pattern": "check_*.py"}),
            &config,
        )
        .expect("valid");
        let report = std::env::temp_dir().join("gate-report.json");
        let command = build_command(&request, &config, Some(&report)).expect("build");
        let expected = vec![
            "-m".to_string(),
            "pytest".to_string(),
            "--color=no".to_string(),
            "--collect-only".to_string(),
            "-q".to_string(),
            "--json-report".to_string(),
            format!("--json-report-file={}", report.display()),
            "-o".to_string(),
            "python_files=check_*.py".to_string(),
            "tests".to_string(),
        ];
        assert_eq!(command.args(), expected.as_slice());
        assert_eq!(command.report_path(), Some(report.as_path()));
        fs::remove_dir_all(&config.project_root).ok();
    }

    #[test]
    fn flag_round_trip_reproduces_canonical_order() {
        let config = project();
        let requested = json!({"flags": ["--tb=no", "--showlocals", "--ff", "--ff"]});
        let request = validate_request(RunMode::Execute, &requested, &config).expect("valid");
        let revalidated =
            validate_request(RunMode::Execute, &request.to_payload(), &config).expect("valid");
        assert_eq!(request, revalidated);
        let command = build_command(&revalidated, &config, None).expect("build");
        assert_eq!(
            decode_flags(&command, &config),
            vec!["--ff", "--showlocals", "--tb=no"]
        );
        fs::remove_dir_all(&config.project_root).ok();
    }

    #[test]
    fn flag_outside_allowlist_is_an_internal_error() {
        let config = project();
        let request =
            validate_request(RunMode::Execute, &json!({"flags": ["--lf"]}), &config).unwrap();
        let mut narrowed = config.clone();
        narrowed.flags.allowed = vec!["--ff".to_string()];
        let err = build_command(&request, &narrowed, None).unwrap_err();
        assert!(matches!(err, AdapterError::Internal { .. }));
        fs::remove_dir_all(&config.project_root).ok();
    }

    #[test]
    fn environment_is_limited_to_passthrough() {
        let config = project();
        let request = validate_request(RunMode::Execute, &Value::Null, &config).unwrap();
        let command = build_command(&request, &config, None).expect("build");
        assert!(command
            .env()
            .keys()
            .all(|name| config.runner.env_passthrough.contains(name)));
        fs::remove_dir_all(&config.project_root).ok();
    }
}
