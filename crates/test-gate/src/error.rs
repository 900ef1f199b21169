use protocol::{DiagnosticContext, ErrorKind, FieldViolation};
use std::fmt;

/// Every rejected field of one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationErrors {
    violations: Vec<FieldViolation>,
}

impl ValidationErrors {
    pub(crate) fn new(violations: Vec<FieldViolation>) -> Self {
        Self { violations }
    }

    pub fn violations(&self) -> &[FieldViolation] {
        &self.violations
    }

    pub fn into_violations(self) -> Vec<FieldViolation> {
        self.violations
    }

    pub fn fields(&self) -> Vec<&str> {
        self.violations
            .iter()
            .map(|violation| violation.field.as_str())
            .collect()
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .violations
            .iter()
            .map(|violation| format!("{}: {}", violation.field, violation.message))
            .collect();
        write!(f, "invalid parameters ({})", parts.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

/// Why a request could not be carried out. Test failures never land here.
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    #[error("{0}")]
    Validation(ValidationErrors),
    #[error("failed to start test runner {program}: {source}")]
    Spawn {
        program: String,
        command: Vec<String>,
        #[source]
        source: std::io::Error,
    },
    #[error("{message}")]
    Timeout {
        message: String,
        context: DiagnosticContext,
    },
    #[error("{message}")]
    AbnormalTermination {
        message: String,
        context: DiagnosticContext,
    },
    #[error("{message}")]
    RunnerInternal {
        message: String,
        context: DiagnosticContext,
    },
    #[error("internal adapter error: {message}")]
    Internal {
        message: String,
        context: Option<DiagnosticContext>,
    },
}

impl AdapterError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::Spawn { .. } => ErrorKind::Spawn,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::AbnormalTermination { .. } => ErrorKind::AbnormalTermination,
            Self::RunnerInternal { .. } => ErrorKind::RunnerInternal,
            Self::Internal { .. } => ErrorKind::InternalAdapter,
        }
    }

    pub(crate) fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
            context: None,
        }
    }
}

impl From<ValidationErrors> for AdapterError {
    fn from(errors: ValidationErrors) -> Self {
        Self::Validation(errors)
    }
}
