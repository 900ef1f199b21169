use protocol::{DiagnosticContext, ErrorKind, ExecutionResponse, ProtocolError, RunResult};

use crate::error::AdapterError;

pub const VALIDATION_ERROR: i32 = -32602;
pub const SPAWN_ERROR: i32 = -32001;
pub const TIMEOUT_ERROR: i32 = -32002;
pub const ABNORMAL_TERMINATION_ERROR: i32 = -32003;
pub const RUNNER_INTERNAL_ERROR: i32 = -32004;
pub const INTERNAL_ADAPTER_ERROR: i32 = -32603;

pub fn error_code(kind: ErrorKind) -> i32 {
    match kind {
        ErrorKind::Validation => VALIDATION_ERROR,
        ErrorKind::Spawn => SPAWN_ERROR,
        ErrorKind::Timeout => TIMEOUT_ERROR,
        ErrorKind::AbnormalTermination => ABNORMAL_TERMINATION_ERROR,
        ErrorKind::RunnerInternal => RUNNER_INTERNAL_ERROR,
        ErrorKind::InternalAdapter => INTERNAL_ADAPTER_ERROR,
    }
}

/// Wraps the pipeline outcome. The classification was made upstream; this
/// only changes representation.
pub fn build_response(outcome: Result<RunResult, AdapterError>) -> ExecutionResponse {
    match outcome {
        Ok(result) => ExecutionResponse::Result(result),
        Err(err) => ExecutionResponse::Error(protocol_error(err)),
    }
}

pub fn protocol_error(err: AdapterError) -> ProtocolError {
    let kind = err.kind();
    let message = err.to_string();
    let (context, violations) = match err {
        AdapterError::Validation(errors) => (None, errors.into_violations()),
        AdapterError::Spawn { command, .. } => (
            Some(DiagnosticContext {
                command,
                exit: None,
                stdout: String::new(),
                stderr: String::new(),
                duration_ms: 0,
            }),
            Vec::new(),
        ),
        AdapterError::Timeout { context, .. }
        | AdapterError::AbnormalTermination { context, .. }
        | AdapterError::RunnerInternal { context, .. } => (Some(context), Vec::new()),
        AdapterError::Internal { context, .. } => (context, Vec::new()),
    };
    ProtocolError {
        kind,
        code: error_code(kind),
        message,
        context,
        violations,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationErrors;
    use protocol::{
        DetailLevel, ExecutionSummary, ExitDescriptor, FieldViolation, RunMode, ViolationRule,
    };

    #[test]
    fn result_passes_through() {
        let result = RunResult {
            mode: RunMode::Execute,
            exit_code: 1,
            summary: ExecutionSummary::default(),
            detail: DetailLevel::Text,
            tests: Vec::new(),
            discovered: Vec::new(),
            collection_errors: Vec::new(),
            stdout: String::new(),
            stderr: String::new(),
            structured_report: None,
        };
        assert_eq!(
            build_response(Ok(result.clone())),
            ExecutionResponse::Result(result)
        );
    }

    #[test]
    fn validation_errors_carry_violations_and_no_context() {
        let errors = ValidationErrors::new(vec![FieldViolation::new(
            "flags[0]",
            ViolationRule::DisallowedFlag,
            "flag is not in the configured allowlist",
        )
        .with_value("--pdb")]);
        let ExecutionResponse::Error(error) = build_response(Err(errors.into())) else {
            panic!("expected an error response");
        };
        assert_eq!(error.kind, ErrorKind::Validation);
        assert_eq!(error.code, -32602);
        assert!(error.context.is_none());
        assert_eq!(error.violations.len(), 1);
        assert!(error.message.contains("flags[0]"));
    }

    #[test]
    fn runner_errors_keep_diagnostics() {
        let context = DiagnosticContext {
            command: vec!["python3".to_string()],
            exit: Some(ExitDescriptor::Signal { signal: 9 }),
            stdout: "partial".to_string(),
            stderr: String::new(),
            duration_ms: 12,
        };
        let error = protocol_error(AdapterError::AbnormalTermination {
            message: "test runner was killed by signal 9".to_string(),
            context: context.clone(),
        });
        assert_eq!(error.code, -32003);
        assert_eq!(error.context, Some(context));
    }

    #[test]
    fn spawn_error_reports_command() {
        let error = protocol_error(AdapterError::Spawn {
            program: "python3".to_string(),
            command: vec!["python3".to_string(), "-m".to_string(), "pytest".to_string()],
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        });
        assert_eq!(error.kind, ErrorKind::Spawn);
        assert_eq!(error.code, -32001);
        assert_eq!(error.context.map(|c| c.command.len()), Some(3));
    }

    #[test]
    fn codes_are_distinct() {
        let kinds = [
            ErrorKind::Validation,
            ErrorKind::Spawn,
            ErrorKind::Timeout,
            ErrorKind::AbnormalTermination,
            ErrorKind::RunnerInternal,
            ErrorKind::InternalAdapter,
        ];
        let mut codes: Vec<i32> = kinds.iter().map(|kind| error_code(*kind)).collect();
        codes.sort();
        codes.dedup();
        assert_eq!(codes.len(), kinds.len());
    }
}
