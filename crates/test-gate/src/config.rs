use anyhow::Context;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Flags the command builder emits itself. They may never be allowlisted,
/// otherwise a request could override the adapter's own selection logic.
const RESERVED_FLAGS: &[&str] = &[
    "-m",
    "-k",
    "-x",
    "--exitfirst",
    "--maxfail",
    "-q",
    "--quiet",
    "-v",
    "--verbose",
    "-r",
    "--color",
    "--durations",
    "--durations-min",
    "--show-capture",
    "--collect-only",
    "--co",
    "-o",
    "--override-ini",
    "-p",
    "-c",
    "--config-file",
    "--rootdir",
    "--confcutdir",
    "--basetemp",
    "--json-report",
    "--json-report-file",
    "--junitxml",
    "--junit-xml",
    "--pyargs",
    "--pdb",
    "--trace",
];

#[derive(Debug, Clone, Deserialize)]
pub struct GateConfig {
    pub project_root: PathBuf,
    #[serde(default)]
    pub runner: RunnerConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub flags: FlagsConfig,
    #[serde(default)]
    pub exit_codes: ExitCodePolicy,
}

impl GateConfig {
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let mut config: Self = toml::from_str(&content)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        // Relative roots are relative to the config file, not the cwd.
        if config.project_root.is_relative() {
            if let Some(parent) = path.parent() {
                config.project_root = parent.join(&config.project_root);
            }
        }
        config.finalize()
    }

    pub fn for_project(project_root: impl Into<PathBuf>) -> anyhow::Result<Self> {
        Self {
            project_root: project_root.into(),
            runner: RunnerConfig::default(),
            limits: LimitsConfig::default(),
            flags: FlagsConfig::default(),
            exit_codes: ExitCodePolicy::default(),
        }
        .finalize()
    }

    /// Canonicalizes the project root and checks the invariants every later
    /// stage relies on.
    pub fn finalize(mut self) -> anyhow::Result<Self> {
        self.project_root = self.project_root.canonicalize().with_context(|| {
            format!("project root {} is not accessible", self.project_root.display())
        })?;
        if !self.project_root.is_dir() {
            anyhow::bail!("project root {} is not a directory", self.project_root.display());
        }
        self.validate()?;
        Ok(self)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.runner.program.trim().is_empty() {
            anyhow::bail!("runner.program must not be empty");
        }
        let limits = &self.limits;
        if limits.max_timeout_secs == 0 {
            anyhow::bail!("limits.max_timeout_secs must be at least 1");
        }
        if limits.default_timeout_secs == 0 || limits.default_timeout_secs > limits.max_timeout_secs
        {
            anyhow::bail!(
                "limits.default_timeout_secs must be within 1..={}",
                limits.max_timeout_secs
            );
        }
        if limits.max_maxfail == 0 {
            anyhow::bail!("limits.max_maxfail must be at least 1");
        }
        if limits.max_targets == 0 {
            anyhow::bail!("limits.max_targets must be at least 1");
        }
        for flag in &self.flags.allowed {
            validate_allowed_flag(flag)?;
        }
        Ok(())
    }
}

fn validate_allowed_flag(flag: &str) -> anyhow::Result<()> {
    if !flag.starts_with('-') || flag == "-" || flag == "--" {
        anyhow::bail!("allowlisted flag {flag:?} must be an option");
    }
    if flag
        .chars()
        .any(|ch| ch.is_whitespace() || ch.is_control() || "\"'`$;&|<>\\".contains(ch))
    {
        anyhow::bail!("allowlisted flag {flag:?} contains forbidden characters");
    }
    let name = flag_family(flag);
    if RESERVED_FLAGS.contains(&name) || (name.starts_with("-r") && !name.starts_with("--")) {
        anyhow::bail!("flag {flag:?} is managed by the adapter and cannot be allowlisted");
    }
    // `-vx` style bundles would smuggle reserved short options past the check above.
    if !name.starts_with("--") && name.chars().count() != 2 {
        anyhow::bail!("allowlisted short flag {flag:?} must be a single option");
    }
    Ok(())
}

/// `--tb=short` and `--tb=line` belong to the same family and exclude each
/// other in a single request.
pub fn flag_family(flag: &str) -> &str {
    flag.split_once('=').map(|(name, _)| name).unwrap_or(flag)
}

#[derive(Debug, Clone, Deserialize)]
pub struct RunnerConfig {
    #[serde(default = "default_program")]
    pub program: String,
    #[serde(default = "default_runner_args")]
    pub args: Vec<String>,
    #[serde(default = "default_env_passthrough")]
    pub env_passthrough: Vec<String>,
    #[serde(default)]
    pub json_report: bool,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            args: default_runner_args(),
            env_passthrough: default_env_passthrough(),
            json_report: false,
        }
    }
}

fn default_program() -> String {
    "python3".to_string()
}

fn default_runner_args() -> Vec<String> {
    vec!["-m".to_string(), "pytest".to_string()]
}

fn default_env_passthrough() -> Vec<String> {
    [
        "PATH",
        "HOME",
        "LANG",
        "LC_ALL",
        "TMPDIR",
        "VIRTUAL_ENV",
        "PYTHONPATH",
        "PYTHONHASHSEED",
        "SYSTEMROOT",
    ]
    .iter()
    .map(|name| name.to_string())
    .collect()
}

#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    #[serde(default = "default_timeout_secs")]
    pub default_timeout_secs: u64,
    #[serde(default = "default_max_timeout_secs")]
    pub max_timeout_secs: u64,
    #[serde(default = "default_max_output_bytes")]
    pub max_output_bytes: u64,
    #[serde(default = "default_max_maxfail")]
    pub max_maxfail: u64,
    #[serde(default = "default_max_targets")]
    pub max_targets: usize,
    #[serde(default = "default_termination_grace_ms")]
    pub termination_grace_ms: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            default_timeout_secs: default_timeout_secs(),
            max_timeout_secs: default_max_timeout_secs(),
            max_output_bytes: default_max_output_bytes(),
            max_maxfail: default_max_maxfail(),
            max_targets: default_max_targets(),
            termination_grace_ms: default_termination_grace_ms(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    300
}

fn default_max_timeout_secs() -> u64 {
    3600
}

fn default_max_output_bytes() -> u64 {
    4 * 1024 * 1024
}

fn default_max_maxfail() -> u64 {
    10_000
}

fn default_max_targets() -> usize {
    256
}

fn default_termination_grace_ms() -> u64 {
    2000
}

/// The allowlist doubles as the canonical flag order.
#[derive(Debug, Clone, Deserialize)]
pub struct FlagsConfig {
    #[serde(default = "default_allowed_flags")]
    pub allowed: Vec<String>,
}

impl Default for FlagsConfig {
    fn default() -> Self {
        Self {
            allowed: default_allowed_flags(),
        }
    }
}

impl FlagsConfig {
    pub fn position(&self, flag: &str) -> Option<usize> {
        self.allowed.iter().position(|allowed| allowed == flag)
    }
}

fn default_allowed_flags() -> Vec<String> {
    [
        "--lf",
        "--ff",
        "--nf",
        "--sw",
        "--sw-skip",
        "--strict-markers",
        "--strict-config",
        "--runxfail",
        "--showlocals",
        "--full-trace",
        "--disable-warnings",
        "--no-header",
        "--no-summary",
        "--tb=auto",
        "--tb=long",
        "--tb=short",
        "--tb=line",
        "--tb=native",
        "--tb=no",
        "--import-mode=prepend",
        "--import-mode=append",
        "--import-mode=importlib",
    ]
    .iter()
    .map(|flag| flag.to_string())
    .collect()
}

/// pytest's documented exit codes.
#[derive(Debug, Clone, Deserialize)]
pub struct ExitCodePolicy {
    #[serde(default = "code_passed")]
    pub passed: i32,
    #[serde(default = "code_tests_failed")]
    pub tests_failed: i32,
    #[serde(default = "code_interrupted")]
    pub interrupted: i32,
    #[serde(default = "code_internal_error")]
    pub internal_error: i32,
    #[serde(default = "code_usage_error")]
    pub usage_error: i32,
    #[serde(default = "code_no_tests_collected")]
    pub no_tests_collected: i32,
}

impl Default for ExitCodePolicy {
    fn default() -> Self {
        Self {
            passed: code_passed(),
            tests_failed: code_tests_failed(),
            interrupted: code_interrupted(),
            internal_error: code_internal_error(),
            usage_error: code_usage_error(),
            no_tests_collected: code_no_tests_collected(),
        }
    }
}

fn code_passed() -> i32 {
    0
}

fn code_tests_failed() -> i32 {
    1
}

fn code_interrupted() -> i32 {
    2
}

fn code_internal_error() -> i32 {
    3
}

fn code_usage_error() -> i32 {
    4
}

fn code_no_tests_collected() -> i32 {
    5
}
