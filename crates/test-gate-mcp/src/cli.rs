use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use test_gate::GateConfig;

#[derive(Parser, Debug)]
#[command(
    name = "test-gate-mcp",
    version,
    about = "MCP stdio server that runs a project's pytest suite under a fixed policy"
)]
pub(crate) struct Args {
    /// Project whose tests are run. Overrides `project_root` from --config.
    #[arg(long)]
    pub(crate) project_root: Option<PathBuf>,
    #[arg(long)]
    pub(crate) config: Option<PathBuf>,
    /// Runner command line, e.g. "uv run pytest".
    #[arg(long)]
    pub(crate) runner: Option<String>,
    #[arg(long, value_parser = humantime::parse_duration)]
    pub(crate) default_timeout: Option<Duration>,
    /// Ask pytest-json-report for a structured report.
    #[arg(long)]
    pub(crate) json_report: bool,
    /// Also write JSON logs to a daily file in this directory.
    #[arg(long)]
    pub(crate) log_dir: Option<PathBuf>,
}

impl Args {
    pub(crate) fn gate_config(&self) -> anyhow::Result<GateConfig> {
        let mut config = match &self.config {
            Some(path) => GateConfig::load(path)?,
            None => {
                let root = self
                    .project_root
                    .clone()
                    .unwrap_or_else(|| PathBuf::from("."));
                GateConfig::for_project(root)?
            }
        };
        if self.config.is_some() {
            if let Some(root) = &self.project_root {
                config.project_root = root.clone();
            }
        }
        if let Some(runner) = &self.runner {
            let mut words = shell_words::split(runner)
                .with_context(|| format!("invalid --runner {runner:?}"))?
                .into_iter();
            config.runner.program = words.next().context("--runner must not be empty")?;
            config.runner.args = words.collect();
        }
        if let Some(timeout) = self.default_timeout {
            config.limits.default_timeout_secs = timeout.as_secs();
        }
        if self.json_report {
            config.runner.json_report = true;
        }
        config.finalize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn temp_dir(prefix: &str) -> PathBuf {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let dir = std::env::temp_dir().join(format!("{prefix}-{}-{nanos}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn cli_overrides_apply() {
        let dir = temp_dir("test-gate-cli");
        let args = Args::parse_from([
            "test-gate-mcp",
            "--project-root",
            dir.to_str().unwrap(),
            "--runner",
            "uv run pytest",
            "--default-timeout",
            "90s",
            "--json-report",
        ]);
        let config = args.gate_config().expect("config");
        assert_eq!(config.runner.program, "uv");
        assert_eq!(config.runner.args, vec!["run".to_string(), "pytest".to_string()]);
        assert_eq!(config.limits.default_timeout_secs, 90);
        assert!(config.runner.json_report);
        assert_eq!(config.project_root, dir.canonicalize().unwrap());
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn config_file_is_loaded_relative_to_itself() {
        let dir = temp_dir("test-gate-cli");
        fs::create_dir_all(dir.join("project")).unwrap();
        let path = dir.join("gate.toml");
        fs::write(
            &path,
            "project_root = \"project\"\n[limits]\ndefault_timeout_secs = 30\n",
        )
        .unwrap();
        let args = Args::parse_from(["test-gate-mcp", "--config", path.to_str().unwrap()]);
        let config = args.gate_config().expect("config");
        assert_eq!(config.project_root, dir.join("project").canonicalize().unwrap());
        assert_eq!(config.limits.default_timeout_secs, 30);
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn timeout_beyond_maximum_is_rejected() {
        let dir = temp_dir("test-gate-cli");
        let args = Args::parse_from([
            "test-gate-mcp",
            "--project-root",
            dir.to_str().unwrap(),
            "--default-timeout",
            "2days",
        ]);
        assert!(args.gate_config().is_err());
        fs::remove_dir_all(&dir).ok();
    }
}
