mod process;
mod record;
mod stream;

use std::io;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::process::Command;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::LimitsConfig;
use crate::layers::command::ValidatedCommand;

use self::process::{apply_process_group, terminate_child};
use self::stream::{read_stream_capture, Capture, SharedCapture};

pub use self::record::{CompletionRecord, StreamOutput, Termination};
pub(crate) use self::record::duration_ms;

/// Upper bound on waiting for the pipes to close once the runner is gone.
/// A grandchild that escaped the process group can hold them open forever.
const DRAIN_LIMIT: Duration = Duration::from_secs(2);

#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("lost track of runner process: {source}")]
    Supervise {
        #[source]
        source: io::Error,
        duration: Duration,
    },
}

/// Runs `command` to completion, timeout or cancellation. Exactly one child
/// is spawned; nothing is retried.
pub async fn run_command(
    command: &ValidatedCommand,
    limits: &LimitsConfig,
    cancel: CancellationToken,
) -> Result<CompletionRecord, RunError> {
    let max_bytes = usize::try_from(limits.max_output_bytes).unwrap_or(usize::MAX);
    let grace = Duration::from_millis(limits.termination_grace_ms);
    let timeout = command.timeout();

    let mut cmd = Command::new(command.program());
    cmd.args(command.args())
        .current_dir(command.cwd())
        .env_clear()
        .envs(command.env())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    apply_process_group(&mut cmd);

    let started_at = Instant::now();
    let mut child = cmd.spawn().map_err(|source| RunError::Spawn {
        program: command.program().to_string(),
        source,
    })?;
    let pgid = child.id();
    tracing::debug!(pid = ?pgid, command = %command.display(), "runner spawned");

    let stdout_capture = SharedCapture::default();
    let stderr_capture = SharedCapture::default();
    let stdout_task = child.stdout.take().map(|stdout| {
        tokio::spawn(read_stream_capture(
            stdout,
            max_bytes,
            Arc::clone(&stdout_capture),
        ))
    });
    let stderr_task = child.stderr.take().map(|stderr| {
        tokio::spawn(read_stream_capture(
            stderr,
            max_bytes,
            Arc::clone(&stderr_capture),
        ))
    });

    let mut forced = false;
    let termination = tokio::select! {
        status = child.wait() => match status {
            Ok(status) => {
                // Leftover group members would keep the pipes open.
                process::signal_group(pgid, process::SIGKILL);
                classify_status(status)
            }
            Err(source) => {
                process::signal_group(pgid, process::SIGKILL);
                return Err(RunError::Supervise {
                    source,
                    duration: started_at.elapsed(),
                });
            }
        },
        _ = tokio::time::sleep(timeout) => {
            tracing::warn!(timeout_ms = duration_ms(timeout), "runner timed out, terminating");
            let terminated = terminate_child(&mut child, pgid, grace).await;
            forced = terminated.forced;
            log_terminated_status(terminated.status);
            Termination::TimedOut
        }
        _ = cancel.cancelled() => {
            tracing::info!("request cancelled, terminating runner");
            let terminated = terminate_child(&mut child, pgid, grace).await;
            forced = terminated.forced;
            log_terminated_status(terminated.status);
            Termination::Cancelled
        }
    };
    let duration = started_at.elapsed();

    let stdout = drain(stdout_task, &stdout_capture, "stdout").await;
    let stderr = drain(stderr_task, &stderr_capture, "stderr").await;
    let structured_report = match command.report_path() {
        Some(path) => collect_report(path, limits.max_output_bytes).await,
        None => None,
    };

    Ok(CompletionRecord {
        termination,
        stdout,
        stderr,
        duration,
        timeout,
        forced,
        command: command.argv(),
        structured_report,
    })
}

#[cfg(unix)]
fn classify_status(status: ExitStatus) -> Termination {
    use std::os::unix::process::ExitStatusExt;
    match (status.code(), status.signal()) {
        (Some(code), _) => Termination::Exited(code),
        (None, Some(signal)) => Termination::Signaled(signal),
        (None, None) => Termination::Exited(-1),
    }
}

#[cfg(not(unix))]
fn classify_status(status: ExitStatus) -> Termination {
    Termination::Exited(status.code().unwrap_or(-1))
}

fn log_terminated_status(status: Option<ExitStatus>) {
    match status {
        Some(status) => tracing::debug!(status = %status, "runner terminated"),
        None => tracing::warn!("runner did not report an exit status after SIGKILL"),
    }
}

async fn drain(
    task: Option<JoinHandle<io::Result<()>>>,
    capture: &SharedCapture,
    stream: &'static str,
) -> StreamOutput {
    if let Some(mut task) = task {
        match tokio::time::timeout(DRAIN_LIMIT, &mut task).await {
            Ok(Ok(Ok(()))) => {}
            Ok(Ok(Err(err))) => tracing::warn!(stream, error = %err, "failed to read runner output"),
            Ok(Err(err)) => tracing::warn!(stream, error = %err, "output reader task failed"),
            Err(_) => {
                tracing::warn!(stream, "runner output still open after exit, keeping partial capture");
                task.abort();
            }
        }
    }
    let capture = capture.lock().await;
    let Capture { bytes, truncated } = &*capture;
    StreamOutput::from_capture(bytes, *truncated)
}

/// Reads and removes the structured report file. Any problem only costs the
/// structured detail; the text output is still there.
async fn collect_report(path: &Path, max_bytes: u64) -> Option<String> {
    let report = match tokio::fs::metadata(path).await {
        Ok(meta) if meta.len() > max_bytes => {
            tracing::warn!(size = meta.len(), "structured report too large, ignoring it");
            None
        }
        Ok(_) => match tokio::fs::read_to_string(path).await {
            Ok(text) => Some(text),
            Err(err) => {
                tracing::warn!(error = %err, "failed to read structured report");
                None
            }
        },
        Err(err) => {
            tracing::debug!(error = %err, "no structured report written");
            None
        }
    };
    if let Err(err) = tokio::fs::remove_file(path).await {
        if err.kind() != io::ErrorKind::NotFound {
            tracing::warn!(error = %err, path = %path.display(), "failed to remove structured report");
        }
    }
    report
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::config::GateConfig;
    use crate::layers::command::build_command;
    use crate::layers::policy::validate_request;
    use crate::test_utils::temp_dir;
    use protocol::RunMode;
    use serde_json::json;
    use std::fs;

    /// A config whose runner is `sh -c <script> pytest ...`; the pytest
    /// arguments land in `$@` and are ignored.
    fn fake_runner(script: &str) -> GateConfig {
        let dir = temp_dir("test-gate-exec");
        let mut config = GateConfig::for_project(&dir).expect("config");
        config.runner.program = "sh".to_string();
        config.runner.args = vec!["-c".to_string(), script.to_string(), "pytest".to_string()];
        config.limits.termination_grace_ms = 200;
        config
    }

    fn command_for(config: &GateConfig, payload: serde_json::Value) -> ValidatedCommand {
        let request = validate_request(RunMode::Execute, &payload, config).expect("valid");
        build_command(&request, config, None).expect("build")
    }

    fn run(config: &GateConfig, command: &ValidatedCommand) -> Result<CompletionRecord, RunError> {
        let rt = tokio::runtime::Runtime::new().expect("runtime");
        rt.block_on(run_command(command, &config.limits, CancellationToken::new()))
    }

    #[test]
    fn captures_streams_separately_with_exit_code() {
        let config = fake_runner("echo out; echo err 1>&2; exit 1");
        let command = command_for(&config, json!({}));
        let record = run(&config, &command).expect("record");
        assert_eq!(record.termination, Termination::Exited(1));
        assert_eq!(record.stdout.text, "out\n");
        assert_eq!(record.stderr.text, "err\n");
        assert!(!record.forced);
        assert_eq!(record.command[0], "sh");
        fs::remove_dir_all(&config.project_root).ok();
    }

    #[test]
    fn runs_in_project_root_with_cleared_environment() {
        std::env::set_var("TEST_GATE_SECRET", "leak");
        let config = fake_runner("pwd; echo \"secret=${TEST_GATE_SECRET:-}\"");
        let command = command_for(&config, json!({}));
        let record = run(&config, &command).expect("record");
        let mut lines = record.stdout.text.lines();
        assert_eq!(
            lines.next().map(std::path::PathBuf::from),
            Some(config.project_root.clone())
        );
        assert_eq!(lines.next(), Some("secret="));
        fs::remove_dir_all(&config.project_root).ok();
    }

    #[test]
    fn spawn_failure_is_reported_without_record() {
        let mut config = fake_runner("exit 0");
        config.runner.program = "/nonexistent/test-gate-runner".to_string();
        let command = command_for(&config, json!({}));
        let err = run(&config, &command).unwrap_err();
        assert!(matches!(err, RunError::Spawn { .. }));
        fs::remove_dir_all(&config.project_root).ok();
    }

    #[test]
    fn timeout_terminates_the_process_group() {
        let config = fake_runner("echo started; echo $$ > runner.pid; sleep 30");
        let command = command_for(&config, json!({"timeout": 1}));
        let record = run(&config, &command).expect("record");
        assert_eq!(record.termination, Termination::TimedOut);
        assert_eq!(record.stdout.text, "started\n");
        assert!(record.duration < Duration::from_secs(10));

        let pid: i32 = fs::read_to_string(config.project_root.join("runner.pid"))
            .expect("pid file")
            .trim()
            .parse()
            .expect("pid");
        let alive = unsafe { libc::kill(pid, 0) } == 0;
        assert!(!alive, "runner process {pid} survived the timeout");
        fs::remove_dir_all(&config.project_root).ok();
    }

    #[test]
    fn sigint_resistant_runner_is_killed() {
        let config = fake_runner("trap '' INT; sleep 30");
        let command = command_for(&config, json!({"timeout": 1}));
        let record = run(&config, &command).expect("record");
        assert_eq!(record.termination, Termination::TimedOut);
        assert!(record.forced);
        fs::remove_dir_all(&config.project_root).ok();
    }

    #[test]
    fn signal_death_is_distinct_from_timeout() {
        let config = fake_runner("echo partial; kill -9 $$");
        let command = command_for(&config, json!({}));
        let record = run(&config, &command).expect("record");
        assert_eq!(record.termination, Termination::Signaled(libc::SIGKILL));
        assert_eq!(record.stdout.text, "partial\n");
        fs::remove_dir_all(&config.project_root).ok();
    }

    #[test]
    fn cancellation_stops_the_runner() {
        let config = fake_runner("sleep 30");
        let command = command_for(&config, json!({}));
        let rt = tokio::runtime::Runtime::new().expect("runtime");
        let record = rt.block_on(async {
            let cancel = CancellationToken::new();
            let trigger = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(200)).await;
                trigger.cancel();
            });
            run_command(&command, &config.limits, cancel).await
        });
        let record = record.expect("record");
        assert_eq!(record.termination, Termination::Cancelled);
        assert!(record.duration < Duration::from_secs(10));
        fs::remove_dir_all(&config.project_root).ok();
    }

    #[test]
    fn output_is_capped() {
        let mut config = fake_runner("i=0; while [ $i -lt 200 ]; do echo 0123456789; i=$((i+1)); done");
        config.limits.max_output_bytes = 64;
        let command = command_for(&config, json!({}));
        let record = run(&config, &command).expect("record");
        assert_eq!(record.stdout.text.len(), 64);
        assert!(record.stdout.truncated);
        assert!(record.stdout.rendered().ends_with("[output truncated]"));
        fs::remove_dir_all(&config.project_root).ok();
    }

    #[test]
    fn structured_report_is_read_and_removed() {
        let config = fake_runner("for arg; do case $arg in --json-report-file=*) printf '{\"tests\": []}' > \"${arg#--json-report-file=}\";; esac; done");
        let request = validate_request(RunMode::Execute, &json!({}), &config).expect("valid");
        let report = config.project_root.join("report.json");
        let command = build_command(&request, &config, Some(&report)).expect("build");
        let record = run(&config, &command).expect("record");
        assert_eq!(record.structured_report.as_deref(), Some("{\"tests\": []}"));
        assert!(!report.exists());
        fs::remove_dir_all(&config.project_root).ok();
    }
}
