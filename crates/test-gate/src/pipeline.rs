use std::path::PathBuf;
use std::time::Instant;

use protocol::{DiagnosticContext, ExecutionResponse, RunMode, RunResult};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::GateConfig;
use crate::error::AdapterError;
use crate::layers::command::build_command;
use crate::layers::execution::{duration_ms, run_command, RunError};
use crate::layers::interpret::Interpreter;
use crate::layers::policy::validate_request;
use crate::layers::response::build_response;

/// validate → build → run → interpret → respond, for one request at a time.
/// Holds configuration and compiled patterns only, so one instance can serve
/// any number of concurrent requests.
pub struct Pipeline {
    config: GateConfig,
    interpreter: Interpreter,
}

impl Pipeline {
    pub fn new(config: GateConfig) -> anyhow::Result<Self> {
        let interpreter = Interpreter::new(config.exit_codes.clone())?;
        Ok(Self {
            config,
            interpreter,
        })
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    pub async fn handle(
        &self,
        mode: RunMode,
        payload: &Value,
        cancel: CancellationToken,
    ) -> ExecutionResponse {
        let id = Uuid::new_v4().to_string();
        let started_at = Instant::now();
        let outcome = self.run(&id, mode, payload, cancel).await;
        let elapsed_ms = duration_ms(started_at.elapsed());
        match &outcome {
            Ok(result) => tracing::info!(
                event = "request.completed",
                id = %id,
                kind = ?mode,
                exit_code = result.exit_code,
                total = result.summary.total,
                failed = result.summary.failed,
                detail = ?result.detail,
                duration_ms = elapsed_ms,
            ),
            Err(err) => tracing::warn!(
                event = "request.failed",
                id = %id,
                kind = ?mode,
                error_kind = ?err.kind(),
                error = %err,
                duration_ms = elapsed_ms,
            ),
        }
        build_response(outcome)
    }

    async fn run(
        &self,
        id: &str,
        mode: RunMode,
        payload: &Value,
        cancel: CancellationToken,
    ) -> Result<RunResult, AdapterError> {
        let request = validate_request(mode, payload, &self.config).map_err(|errors| {
            tracing::info!(
                event = "request.rejected",
                id = %id,
                fields = ?errors.fields(),
            );
            AdapterError::from(errors)
        })?;

        let report_path = self.report_path(id);
        let command = build_command(&request, &self.config, report_path.as_deref())?;
        tracing::info!(
            event = "runner.spawn",
            id = %id,
            command = %command.display(),
            timeout_secs = command.timeout().as_secs(),
        );

        let record = match run_command(&command, &self.config.limits, cancel).await {
            Ok(record) => record,
            Err(RunError::Spawn { program, source }) => {
                return Err(AdapterError::Spawn {
                    program,
                    command: command.argv(),
                    source,
                });
            }
            Err(RunError::Supervise { source, duration }) => {
                if let Some(path) = &report_path {
                    let _ = tokio::fs::remove_file(path).await;
                }
                return Err(AdapterError::AbnormalTermination {
                    message: format!("lost track of test runner process: {source}"),
                    context: DiagnosticContext {
                        command: command.argv(),
                        exit: None,
                        stdout: String::new(),
                        stderr: String::new(),
                        duration_ms: duration_ms(duration),
                    },
                });
            }
        };
        tracing::debug!(
            event = "runner.finished",
            id = %id,
            termination = ?record.termination,
            forced = record.forced,
            duration_ms = duration_ms(record.duration),
        );

        self.interpreter.interpret(mode, record)
    }

    fn report_path(&self, id: &str) -> Option<PathBuf> {
        self.config
            .runner
            .json_report
            .then(|| std::env::temp_dir().join(format!("test-gate-{id}.json")))
    }
}
