mod classify;
mod report;
mod text;

use protocol::{
    CollectionError, DetailLevel, DiscoveredTest, ExecutionSummary, RunMode, RunResult,
    TestOutcome, TestStatus,
};
use serde_json::Value;

use crate::config::ExitCodePolicy;
use crate::error::AdapterError;
use crate::layers::execution::{CompletionRecord, Termination};

use self::classify::{classify_exit, verdict, Verdict};
use self::report::parse_report;
use self::text::{parse_discovery, parse_execution, SessionCounts, TextPatterns};

/// Turns completion records into results or runner errors. Holds only
/// compiled patterns and the exit code policy.
pub struct Interpreter {
    patterns: TextPatterns,
    exit_codes: ExitCodePolicy,
}

struct Parsed {
    detail: DetailLevel,
    tests: Vec<TestOutcome>,
    discovered: Vec<DiscoveredTest>,
    collection_errors: Vec<CollectionError>,
    counts: Option<SessionCounts>,
    duration_secs: Option<f64>,
    raw_report: Option<Value>,
}

impl Interpreter {
    pub fn new(exit_codes: ExitCodePolicy) -> anyhow::Result<Self> {
        Ok(Self {
            patterns: TextPatterns::new()?,
            exit_codes,
        })
    }

    /// Timeouts and signal deaths are errors no matter what output exists;
    /// a normal exit is judged by its code and whatever could be parsed.
    pub fn interpret(
        &self,
        mode: RunMode,
        record: CompletionRecord,
    ) -> Result<RunResult, AdapterError> {
        let code = match record.termination {
            Termination::TimedOut => {
                return Err(AdapterError::Timeout {
                    message: format!(
                        "test runner exceeded its {}s timeout and was terminated",
                        record.timeout.as_secs()
                    ),
                    context: record.diagnostic_context(),
                });
            }
            Termination::Cancelled => {
                return Err(AdapterError::Timeout {
                    message: "request was cancelled and the test runner was terminated"
                        .to_string(),
                    context: record.diagnostic_context(),
                });
            }
            Termination::Signaled(signal) => {
                return Err(AdapterError::AbnormalTermination {
                    message: format!("test runner was killed by signal {signal}"),
                    context: record.diagnostic_context(),
                });
            }
            Termination::Exited(code) => code,
        };

        let parsed = self.parse(mode, code, &record);
        let class = classify_exit(code, &self.exit_codes);
        if let Verdict::RunnerFailure(message) =
            verdict(class, code, parsed.collection_errors.len())
        {
            return Err(AdapterError::RunnerInternal {
                message,
                context: record.diagnostic_context(),
            });
        }
        tracing::debug!(exit_code = code, detail = ?parsed.detail, "run interpreted");

        let duration_secs = parsed
            .duration_secs
            .unwrap_or_else(|| record.duration.as_secs_f64());
        let summary = match (parsed.detail, &parsed.counts) {
            (DetailLevel::CountsOnly, Some(counts)) => {
                summary_from_counts(mode, counts, parsed.collection_errors.len())
            }
            _ => match mode {
                RunMode::Execute => ExecutionSummary::from_outcomes(&parsed.tests, duration_secs),
                RunMode::Discover => {
                    ExecutionSummary::from_discovered(&parsed.discovered, duration_secs)
                }
            },
        };

        Ok(RunResult {
            mode,
            exit_code: code,
            summary,
            detail: parsed.detail,
            tests: parsed.tests,
            discovered: parsed.discovered,
            collection_errors: parsed.collection_errors,
            stdout: record.stdout.rendered(),
            stderr: record.stderr.rendered(),
            structured_report: parsed.raw_report,
        })
    }

    fn parse(&self, mode: RunMode, code: i32, record: &CompletionRecord) -> Parsed {
        if let Some(text) = &record.structured_report {
            match parse_report(text) {
                Ok(report) => {
                    return Parsed {
                        detail: DetailLevel::StructuredReport,
                        tests: report.tests,
                        discovered: report.discovered,
                        collection_errors: report.collection_errors,
                        counts: None,
                        duration_secs: report.duration_secs,
                        raw_report: Some(report.raw),
                    };
                }
                Err(err) => {
                    tracing::warn!(error = %err, "structured report unreadable, falling back to text output");
                }
            }
        }

        let mut output = match mode {
            RunMode::Execute => parse_execution(&self.patterns, &record.stdout.text),
            RunMode::Discover => parse_discovery(&self.patterns, &record.stdout.text),
        };
        let found = match mode {
            RunMode::Execute => !output.tests.is_empty(),
            RunMode::Discover => !output.discovered.is_empty(),
        };
        let counted = |counts: &SessionCounts| {
            expected_entries(mode, counts, output.collection_errors.len()) > 0
        };
        let mut detail = match &output.counts {
            _ if found => DetailLevel::Text,
            Some(counts) if counted(counts) => DetailLevel::CountsOnly,
            Some(_) => DetailLevel::Text,
            None if !output.collection_errors.is_empty() => DetailLevel::Text,
            None => DetailLevel::RawOnly,
        };

        // A cut-off capture or a failing exit without any failing entry means
        // the per-test list cannot be trusted.
        let truncated = record.stdout.truncated;
        let contradicted = mode == RunMode::Execute
            && code == self.exit_codes.tests_failed
            && !output
                .tests
                .iter()
                .any(|test| matches!(test.status, TestStatus::Failed | TestStatus::Error));
        if detail == DetailLevel::Text && (truncated || contradicted) {
            tracing::warn!(truncated, contradicted, "discarding per-test detail from incomplete output");
            detail = match &output.counts {
                Some(counts) if counted(counts) => DetailLevel::CountsOnly,
                _ => DetailLevel::RawOnly,
            };
            output.tests.clear();
            output.discovered.clear();
        }
        if detail != DetailLevel::Text {
            tracing::info!(detail = ?detail, "runner output only partially recognized");
        }
        let duration_secs = output.counts.as_ref().map(|counts| counts.duration_secs);
        Parsed {
            detail,
            tests: output.tests,
            discovered: output.discovered,
            collection_errors: output.collection_errors,
            counts: output.counts,
            duration_secs,
            raw_report: None,
        }
    }
}

fn expected_entries(mode: RunMode, counts: &SessionCounts, collection_errors: usize) -> u64 {
    match mode {
        RunMode::Execute => counts.tests(collection_errors),
        RunMode::Discover => counts.collected,
    }
}

fn summary_from_counts(
    mode: RunMode,
    counts: &SessionCounts,
    collection_errors: usize,
) -> ExecutionSummary {
    match mode {
        RunMode::Execute => ExecutionSummary {
            total: counts.tests(collection_errors),
            passed: counts.passed + counts.xpassed,
            failed: counts.failed,
            skipped: counts.skipped + counts.xfailed,
            errors: counts.errors.saturating_sub(collection_errors as u64),
            duration_secs: counts.duration_secs,
        },
        RunMode::Discover => ExecutionSummary {
            total: counts.collected,
            duration_secs: counts.duration_secs,
            ..ExecutionSummary::default()
        },
    }
}
