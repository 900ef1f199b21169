use crate::config::ExitCodePolicy;

/// What a runner exit code means under the configured policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ExitClass {
    Passed,
    TestsFailed,
    Interrupted,
    InternalError,
    UsageError,
    NoTestsCollected,
    Unknown(i32),
}

pub(crate) fn classify_exit(code: i32, policy: &ExitCodePolicy) -> ExitClass {
    match code {
        c if c == policy.passed => ExitClass::Passed,
        c if c == policy.tests_failed => ExitClass::TestsFailed,
        c if c == policy.interrupted => ExitClass::Interrupted,
        c if c == policy.internal_error => ExitClass::InternalError,
        c if c == policy.usage_error => ExitClass::UsageError,
        c if c == policy.no_tests_collected => ExitClass::NoTestsCollected,
        other => ExitClass::Unknown(other),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Verdict {
    /// The run happened; failures, if any, are data.
    Report,
    /// The runner itself could not do its job.
    RunnerFailure(String),
}

/// An interrupted session only counts as a run when collection errors
/// explain the interruption; otherwise nothing trustworthy was produced.
pub(crate) fn verdict(class: ExitClass, code: i32, collection_errors: usize) -> Verdict {
    match class {
        ExitClass::Passed | ExitClass::TestsFailed | ExitClass::NoTestsCollected => Verdict::Report,
        ExitClass::Interrupted if collection_errors > 0 => Verdict::Report,
        ExitClass::Interrupted => Verdict::RunnerFailure(format!(
            "test run was interrupted (exit code {code}) without reported collection errors"
        )),
        ExitClass::InternalError => Verdict::RunnerFailure(format!(
            "test runner hit an internal error (exit code {code})"
        )),
        ExitClass::UsageError => Verdict::RunnerFailure(format!(
            "test runner rejected its command line (exit code {code})"
        )),
        ExitClass::Unknown(code) => {
            Verdict::RunnerFailure(format!("test runner exited with unexpected code {code}"))
        }
    }
}
