use std::time::Duration;

use protocol::{DiagnosticContext, ExitDescriptor};

const TRUNCATION_MARKER: &str = "\n[output truncated]";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    Exited(i32),
    Signaled(i32),
    TimedOut,
    Cancelled,
}

/// One captured output stream, already decoded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamOutput {
    pub text: String,
    pub truncated: bool,
}

impl StreamOutput {
    pub(super) fn from_capture(bytes: &[u8], truncated: bool) -> Self {
        Self {
            text: String::from_utf8_lossy(bytes).into_owned(),
            truncated,
        }
    }

    /// Text with the truncation marker appended when bytes were dropped.
    pub fn rendered(&self) -> String {
        let mut out = self.text.clone();
        if self.truncated {
            out.push_str(TRUNCATION_MARKER);
        }
        out
    }
}

/// Everything observed about one runner process. Built once, after the
/// process is gone, and only read afterwards.
#[derive(Debug, Clone)]
pub struct CompletionRecord {
    pub termination: Termination,
    pub stdout: StreamOutput,
    pub stderr: StreamOutput,
    pub duration: Duration,
    pub timeout: Duration,
    /// Set when the runner had to be killed rather than exiting on SIGINT.
    pub forced: bool,
    pub command: Vec<String>,
    pub structured_report: Option<String>,
}

impl CompletionRecord {
    pub fn exit_code(&self) -> Option<i32> {
        match self.termination {
            Termination::Exited(code) => Some(code),
            _ => None,
        }
    }

    pub fn exit_descriptor(&self) -> ExitDescriptor {
        match self.termination {
            Termination::Exited(code) => ExitDescriptor::Code { code },
            Termination::Signaled(signal) => ExitDescriptor::Signal { signal },
            Termination::TimedOut => ExitDescriptor::Timeout {
                after_ms: duration_ms(self.timeout),
            },
            Termination::Cancelled => ExitDescriptor::Cancelled,
        }
    }

    pub fn diagnostic_context(&self) -> DiagnosticContext {
        DiagnosticContext {
            command: self.command.clone(),
            exit: Some(self.exit_descriptor()),
            stdout: self.stdout.rendered(),
            stderr: self.stderr.rendered(),
            duration_ms: duration_ms(self.duration),
        }
    }
}

pub(crate) fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
