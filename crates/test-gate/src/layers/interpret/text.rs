//! Best-effort reading of pytest's terminal output.
//!
//! Runs are started with `--color=no -rA --durations=0 --durations-min=0`, so
//! the text carries a short summary line for every test that has a node id,
//! a durations table listing every test that ran, FAILURES / ERRORS sections
//! with full tracebacks and the closing session summary line. Any part may
//! be missing; whatever is found is combined.

use std::collections::HashMap;

use anyhow::Context;
use protocol::{CollectionError, DiscoveredTest, TestOutcome, TestStatus};
use regex::Regex;

/// Counts from the closing `N passed, M failed in X.XXs` line.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct SessionCounts {
    pub(crate) passed: u64,
    pub(crate) failed: u64,
    pub(crate) skipped: u64,
    pub(crate) errors: u64,
    pub(crate) xfailed: u64,
    pub(crate) xpassed: u64,
    pub(crate) collected: u64,
    pub(crate) duration_secs: f64,
}

impl SessionCounts {
    /// Tests that produced an outcome, leaving out errors raised while
    /// collecting.
    pub(crate) fn tests(&self, collection_errors: usize) -> u64 {
        self.passed
            + self.failed
            + self.skipped
            + self.xfailed
            + self.xpassed
            + self.errors.saturating_sub(collection_errors as u64)
    }
}

#[derive(Debug, Default)]
pub(crate) struct TextReport {
    pub(crate) tests: Vec<TestOutcome>,
    pub(crate) discovered: Vec<DiscoveredTest>,
    pub(crate) collection_errors: Vec<CollectionError>,
    pub(crate) counts: Option<SessionCounts>,
}

pub(crate) struct TextPatterns {
    section: Regex,
    block_header: Regex,
    status_line: Regex,
    short_summary: Regex,
    skipped_summary: Regex,
    duration: Regex,
    session: Regex,
    count: Regex,
    listing: Regex,
}

impl TextPatterns {
    pub(crate) fn new() -> anyhow::Result<Self> {
        let compile = |pattern: &str| {
            Regex::new(pattern).with_context(|| format!("invalid output pattern {pattern}"))
        };
        Ok(Self {
            section: compile(r"^={3,} ?(.*?) ?={3,}$")?,
            block_header: compile(r"^_{3,} (.+?) _{3,}$")?,
            status_line: compile(
                r"^(\S+?::\S.*?) (PASSED|FAILED|ERROR|SKIPPED|XFAIL|XPASS)(?: \((.*)\))?(?:\s+\[\s*\d+%\])?$",
            )?,
            short_summary: compile(r"^(PASSED|FAILED|ERROR|XFAIL|XPASS) (\S.*?)(?: - (.*))?$")?,
            skipped_summary: compile(r"^SKIPPED \[(\d+)\] ([^:]+):(\d+): ?(.*)$")?,
            duration: compile(r"^(\d+(?:\.\d+)?)s\s+(setup|call|teardown)\s+(\S.*)$")?,
            session: compile(
                r"^=*\s*(.*?)\s+in\s+(\d+(?:\.\d+)?)s(?:\s+\([^)]*\))?\s*=*$",
            )?,
            count: compile(r"^(\d+) ([a-z]+)$")?,
            listing: compile(r"^(\S+?::\S.*)$")?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Preamble,
    Failures,
    Errors,
    ShortSummary,
    Durations,
    Other,
}

struct Block {
    section: Section,
    headline: String,
    body: Vec<String>,
}

/// Outcomes in first-seen order, merged by node id.
#[derive(Default)]
struct OutcomeTable {
    outcomes: Vec<TestOutcome>,
    index: HashMap<String, usize>,
}

impl OutcomeTable {
    fn entry(&mut self, node_id: &str) -> &mut TestOutcome {
        let position = match self.index.get(node_id) {
            Some(position) => *position,
            None => {
                self.outcomes.push(TestOutcome {
                    node_id: node_id.to_string(),
                    status: TestStatus::Skipped,
                    duration_secs: None,
                    message: None,
                    traceback: None,
                });
                self.index.insert(node_id.to_string(), self.outcomes.len() - 1);
                self.outcomes.len() - 1
            }
        };
        &mut self.outcomes[position]
    }

    fn record(&mut self, node_id: &str, status: TestStatus) {
        let known = self.index.contains_key(node_id);
        let outcome = self.entry(node_id);
        if !known || severity(status) > severity(outcome.status) {
            outcome.status = status;
        }
    }

    fn contains(&self, node_id: &str) -> bool {
        self.index.contains_key(node_id)
    }
}

fn severity(status: TestStatus) -> u8 {
    match status {
        TestStatus::Skipped => 0,
        TestStatus::Passed => 1,
        TestStatus::Failed => 2,
        TestStatus::Error => 3,
    }
}

fn map_status(word: &str) -> TestStatus {
    match word {
        "PASSED" | "XPASS" => TestStatus::Passed,
        "FAILED" => TestStatus::Failed,
        "ERROR" => TestStatus::Error,
        _ => TestStatus::Skipped,
    }
}

pub(crate) fn parse_execution(patterns: &TextPatterns, stdout: &str) -> TextReport {
    let mut table = OutcomeTable::default();
    let mut messages: HashMap<String, String> = HashMap::new();
    let mut durations: HashMap<String, f64> = HashMap::new();
    let mut skip_reasons: Vec<(String, String)> = Vec::new();
    let mut collection_errors: Vec<CollectionError> = Vec::new();
    let mut blocks: Vec<Block> = Vec::new();
    let mut counts = None;
    let mut section = Section::Preamble;
    let mut saw_short_summary = false;

    for line in stdout.lines() {
        let line = line.trim_end();
        if let Some(parsed) = parse_session_line(patterns, line) {
            counts = Some(parsed);
            continue;
        }
        if let Some(caps) = patterns.section.captures(line) {
            section = classify_section(&caps[1]);
            saw_short_summary |= section == Section::ShortSummary;
            continue;
        }
        match section {
            Section::Failures | Section::Errors => {
                if let Some(caps) = patterns.block_header.captures(line) {
                    blocks.push(Block {
                        section,
                        headline: caps[1].to_string(),
                        body: Vec::new(),
                    });
                } else if let Some(block) = blocks.last_mut() {
                    block.body.push(line.to_string());
                }
            }
            Section::ShortSummary => {
                if let Some(caps) = patterns.skipped_summary.captures(line) {
                    skip_reasons.push((caps[2].to_string(), caps[4].trim().to_string()));
                } else if let Some(caps) = patterns.short_summary.captures(line) {
                    let word = &caps[1];
                    let target = caps[2].to_string();
                    let message = caps.get(3).map(|m| m.as_str().trim().to_string());
                    if word == "ERROR" && !target.contains("::") {
                        push_collection_error(
                            &mut collection_errors,
                            target,
                            message.unwrap_or_default(),
                        );
                        continue;
                    }
                    table.record(&target, map_status(word));
                    if let Some(message) = message.filter(|m| !m.is_empty()) {
                        messages.insert(target, message);
                    }
                }
            }
            Section::Durations => {
                if let Some(caps) = patterns.duration.captures(line) {
                    let secs: f64 = caps[1].parse().unwrap_or(0.0);
                    *durations.entry(caps[3].trim().to_string()).or_insert(0.0) += secs;
                }
            }
            Section::Preamble | Section::Other => {
                if let Some(caps) = patterns.status_line.captures(line) {
                    let node_id = caps[1].to_string();
                    let status = map_status(&caps[2]);
                    table.record(&node_id, status);
                    if let Some(reason) = caps.get(3) {
                        if status == TestStatus::Skipped {
                            messages
                                .entry(node_id)
                                .or_insert_with(|| reason.as_str().to_string());
                        }
                    }
                }
            }
        }
    }

    // Every test that ran shows up in the durations table. Once the short
    // summary has listed every non-skipped test, the remaining timed ones
    // were skipped (skips only report a location). Without that summary
    // nothing can be inferred.
    if saw_short_summary {
        let mut timed: Vec<&String> = durations.keys().collect();
        timed.sort();
        for node_id in timed {
            if !table.contains(node_id) && node_id.contains("::") {
                table.record(node_id, TestStatus::Skipped);
            }
        }
    }

    attach_blocks(&mut table, &mut collection_errors, blocks);

    let mut report = TextReport {
        tests: Vec::new(),
        discovered: Vec::new(),
        collection_errors,
        counts,
    };
    for mut outcome in table.outcomes {
        outcome.duration_secs = durations.get(&outcome.node_id).copied();
        match outcome.status {
            TestStatus::Passed => {
                outcome.message = None;
                outcome.traceback = None;
            }
            TestStatus::Skipped => {
                outcome.traceback = None;
                outcome.message = messages
                    .remove(&outcome.node_id)
                    .or_else(|| skip_reason_for(&skip_reasons, &outcome.node_id));
            }
            TestStatus::Failed | TestStatus::Error => {
                if let Some(message) = messages.remove(&outcome.node_id) {
                    outcome.message = Some(message);
                }
            }
        }
        report.tests.push(outcome);
    }
    report
}

pub(crate) fn parse_discovery(patterns: &TextPatterns, stdout: &str) -> TextReport {
    let mut discovered = Vec::new();
    let mut collection_errors = Vec::new();
    let mut blocks = Vec::new();
    let mut counts = None;
    let mut section = Section::Preamble;

    for line in stdout.lines() {
        let line = line.trim_end();
        if let Some(parsed) = parse_session_line(patterns, line) {
            counts = Some(parsed);
            continue;
        }
        if let Some(caps) = patterns.section.captures(line) {
            section = classify_section(&caps[1]);
            continue;
        }
        match section {
            Section::Preamble => {
                if let Some(caps) = patterns.listing.captures(line) {
                    discovered.push(DiscoveredTest::from_node_id(&caps[1], None));
                }
            }
            Section::Errors => {
                if let Some(caps) = patterns.block_header.captures(line) {
                    blocks.push(Block {
                        section,
                        headline: caps[1].to_string(),
                        body: Vec::new(),
                    });
                } else if let Some(block) = blocks.last_mut() {
                    block.body.push(line.to_string());
                }
            }
            Section::ShortSummary => {
                if let Some(caps) = patterns.short_summary.captures(line) {
                    let target = caps[2].to_string();
                    if &caps[1] == "ERROR" && !target.contains("::") {
                        let message = caps.get(3).map(|m| m.as_str().trim().to_string());
                        push_collection_error(
                            &mut collection_errors,
                            target,
                            message.unwrap_or_default(),
                        );
                    }
                }
            }
            _ => {}
        }
    }

    let mut table = OutcomeTable::default();
    attach_blocks(&mut table, &mut collection_errors, blocks);

    TextReport {
        tests: Vec::new(),
        discovered,
        collection_errors,
        counts,
    }
}

fn classify_section(title: &str) -> Section {
    let title = title.trim();
    if title == "FAILURES" {
        Section::Failures
    } else if title == "ERRORS" {
        Section::Errors
    } else if title == "short test summary info" {
        Section::ShortSummary
    } else if title.starts_with("slowest") && title.ends_with("durations") {
        Section::Durations
    } else if title == "test session starts" {
        Section::Preamble
    } else {
        Section::Other
    }
}

fn parse_session_line(patterns: &TextPatterns, line: &str) -> Option<SessionCounts> {
    let caps = patterns.session.captures(line)?;
    let body = caps[1].trim();
    let duration_secs: f64 = caps[2].parse().ok()?;
    let mut counts = SessionCounts {
        duration_secs,
        ..SessionCounts::default()
    };
    if body == "no tests ran" || body == "no tests collected" {
        return Some(counts);
    }
    for part in body.split(", ") {
        let part = part.trim();
        if let Some((collected, _)) = part.split_once('/') {
            // `3/5 tests collected (2 deselected)`
            counts.collected = collected.trim().parse().ok()?;
            continue;
        }
        let caps = patterns.count.captures(part).or_else(|| {
            part.strip_suffix(" collected")
                .and_then(|rest| patterns.count.captures(rest))
        })?;
        let number: u64 = caps[1].parse().ok()?;
        match &caps[2] {
            "passed" => counts.passed = number,
            "failed" => counts.failed = number,
            "skipped" => counts.skipped = number,
            "error" | "errors" => counts.errors = number,
            "xfailed" => counts.xfailed = number,
            "xpassed" => counts.xpassed = number,
            "test" | "tests" => counts.collected = number,
            "deselected" | "warning" | "warnings" | "rerun" | "reruns" => {}
            _ => return None,
        }
    }
    Some(counts)
}

fn push_collection_error(errors: &mut Vec<CollectionError>, location: String, reason: String) {
    if let Some(existing) = errors.iter_mut().find(|error| error.location == location) {
        if existing.reason.is_empty() {
            existing.reason = reason;
        }
        return;
    }
    errors.push(CollectionError { location, reason });
}

/// Pairs FAILURES / ERRORS blocks with the tests they belong to. Collection
/// error blocks become [`CollectionError`]s.
fn attach_blocks(
    table: &mut OutcomeTable,
    collection_errors: &mut Vec<CollectionError>,
    blocks: Vec<Block>,
) {
    for block in blocks {
        let body = trim_block(&block.body);
        if let Some(location) = block.headline.strip_prefix("ERROR collecting ") {
            let reason = error_lines(&body).unwrap_or_else(|| body.clone());
            let location = location.trim().to_string();
            match collection_errors
                .iter_mut()
                .find(|error| error.location == location)
            {
                Some(existing) => existing.reason = reason,
                None => collection_errors.push(CollectionError { location, reason }),
            }
            continue;
        }
        let headline = block
            .headline
            .strip_prefix("ERROR at setup of ")
            .or_else(|| block.headline.strip_prefix("ERROR at teardown of "))
            .unwrap_or(&block.headline);
        let wanted = match block.section {
            Section::Errors => TestStatus::Error,
            _ => TestStatus::Failed,
        };
        let Some(position) = find_by_headline(table, headline, wanted, &body) else {
            continue;
        };
        let outcome = &mut table.outcomes[position];
        if outcome.message.is_none() {
            outcome.message = last_error_line(&body);
        }
        outcome.traceback = Some(match outcome.traceback.take() {
            Some(previous) => format!("{previous}\n\n{body}"),
            None => body,
        });
    }
}

/// pytest titles a failure block with the node id minus its file, with
/// `::` turned into `.`.
fn headline_of(node_id: &str) -> String {
    match node_id.split_once("::") {
        Some((_, rest)) => rest.replace("::", "."),
        None => node_id.to_string(),
    }
}

fn find_by_headline(
    table: &OutcomeTable,
    headline: &str,
    wanted: TestStatus,
    body: &str,
) -> Option<usize> {
    let candidates: Vec<usize> = table
        .outcomes
        .iter()
        .enumerate()
        .filter(|(_, outcome)| {
            matches!(outcome.status, TestStatus::Failed | TestStatus::Error)
                && headline_of(&outcome.node_id) == headline
        })
        .map(|(position, _)| position)
        .collect();
    match candidates.as_slice() {
        [] => None,
        [only] => Some(*only),
        many => many
            .iter()
            .copied()
            .find(|position| {
                let outcome = &table.outcomes[*position];
                let file = outcome.node_id.split("::").next().unwrap_or_default();
                outcome.status == wanted && body.contains(file)
            })
            .or_else(|| many.first().copied()),
    }
}

fn trim_block(lines: &[String]) -> String {
    let start = lines.iter().position(|line| !line.trim().is_empty());
    let end = lines.iter().rposition(|line| !line.trim().is_empty());
    match (start, end) {
        (Some(start), Some(end)) => lines[start..=end].join("\n"),
        _ => String::new(),
    }
}

/// The `E   ` lines of a traceback, without the prefix.
fn error_lines(body: &str) -> Option<String> {
    let lines: Vec<&str> = body
        .lines()
        .filter_map(|line| line.strip_prefix("E "))
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();
    if lines.is_empty() {
        None
    } else {
        Some(lines.join("\n"))
    }
}

fn last_error_line(body: &str) -> Option<String> {
    body.lines()
        .filter_map(|line| line.strip_prefix("E "))
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(str::to_string)
}

/// Skips are summarized by location (`path:line`); a reason is only
/// attached when it cannot belong to another test.
fn skip_reason_for(reasons: &[(String, String)], node_id: &str) -> Option<String> {
    let file = node_id.split("::").next()?;
    let mut matching = reasons.iter().filter(|(path, _)| path == file);
    let (_, reason) = matching.next()?;
    if matching.next().is_some() {
        return None;
    }
    Some(reason.trim_start_matches("Skipped: ").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patterns() -> TextPatterns {
        TextPatterns::new().expect("patterns")
    }

    const MIXED_RUN: &str = "\
============================= test session starts ==============================
platform linux -- Python 3.12.1, pytest-8.0.0, pluggy-1.4.0
rootdir: /project
collected 4 items

tests/test_math.py .F.s                                                  [100%]

=================================== FAILURES ===================================
___________________________________ test_sub ___________________________________

    def test_sub():
>       assert 1 - 1 == 1
E       assert 0 == 1

tests/test_math.py:6: AssertionError
============================== slowest durations ===============================
0.12s call     tests/test_math.py::test_add
0.01s setup    tests/test_math.py::test_add
0.05s call     tests/test_math.py::test_sub
0.00s setup    tests/test_math.py::test_skip
0.02s call     tests/test_math.py::TestCls::test_mul[2-4]
=========================== short test summary info ============================
PASSED tests/test_math.py::test_add
PASSED tests/test_math.py::TestCls::test_mul[2-4]
SKIPPED [1] tests/test_math.py:12: Skipped: needs network
FAILED tests/test_math.py::test_sub - assert 0 == 1
==================== 1 failed, 2 passed, 1 skipped in 0.31s ====================
";

    #[test]
    fn parses_mixed_run() {
        let report = parse_execution(&patterns(), MIXED_RUN);
        let ids: Vec<&str> = report.tests.iter().map(|t| t.node_id.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                "tests/test_math.py::test_add",
                "tests/test_math.py::TestCls::test_mul[2-4]",
                "tests/test_math.py::test_sub",
                "tests/test_math.py::test_skip",
            ]
        );

        let add = &report.tests[0];
        assert_eq!(add.status, TestStatus::Passed);
        assert!((add.duration_secs.unwrap() - 0.13).abs() < 1e-9);
        assert!(add.message.is_none() && add.traceback.is_none());

        let sub = &report.tests[2];
        assert_eq!(sub.status, TestStatus::Failed);
        assert_eq!(sub.message.as_deref(), Some("assert 0 == 1"));
        let traceback = sub.traceback.as_deref().expect("traceback");
        assert!(traceback.trim_start().starts_with("def test_sub():"));
        assert!(traceback.ends_with("tests/test_math.py:6: AssertionError"));

        let skip = &report.tests[3];
        assert_eq!(skip.status, TestStatus::Skipped);
        assert_eq!(skip.message.as_deref(), Some("needs network"));

        let counts = report.counts.expect("counts");
        assert_eq!((counts.passed, counts.failed, counts.skipped), (2, 1, 1));
        assert!((counts.duration_secs - 0.31).abs() < 1e-9);
    }

    #[test]
    fn verbose_status_lines_carry_skip_reasons() {
        let output = "\
tests/test_a.py::test_one PASSED                                         [ 50%]
tests/test_a.py::test_two SKIPPED (not on linux)                         [100%]

============================== 1 passed, 1 skipped in 0.02s ===================
";
        let report = parse_execution(&patterns(), output);
        assert_eq!(report.tests.len(), 2);
        assert_eq!(report.tests[1].status, TestStatus::Skipped);
        assert_eq!(report.tests[1].message.as_deref(), Some("not on linux"));
    }

    #[test]
    fn setup_errors_are_attached() {
        let output = "\
==================================== ERRORS ====================================
_________________________ ERROR at setup of test_db __________________________

    @pytest.fixture
    def db():
>       raise RuntimeError(\"no database\")
E       RuntimeError: no database

tests/test_db.py:5: RuntimeError
=========================== short test summary info ============================
ERROR tests/test_db.py::test_db - RuntimeError: no database
=============================== 1 error in 0.05s ===============================
";
        let report = parse_execution(&patterns(), output);
        assert_eq!(report.tests.len(), 1);
        let outcome = &report.tests[0];
        assert_eq!(outcome.status, TestStatus::Error);
        assert_eq!(outcome.message.as_deref(), Some("RuntimeError: no database"));
        assert!(outcome.traceback.as_deref().unwrap().contains("raise RuntimeError"));
        assert!(report.collection_errors.is_empty());
    }

    #[test]
    fn collection_errors_are_separate_from_outcomes() {
        let output = "\
==================================== ERRORS ====================================
_______________________ ERROR collecting tests/test_b.py _______________________
ImportError while importing test module '/project/tests/test_b.py'.
E   ModuleNotFoundError: No module named 'missing'
=========================== short test summary info ============================
ERROR tests/test_b.py
!!!!!!!!!!!!!!!!!!!! Interrupted: 1 error during collection !!!!!!!!!!!!!!!!!!!!
=============================== 1 error in 0.12s ===============================
";
        let report = parse_execution(&patterns(), output);
        assert!(report.tests.is_empty());
        assert_eq!(
            report.collection_errors,
            vec![CollectionError {
                location: "tests/test_b.py".to_string(),
                reason: "ModuleNotFoundError: No module named 'missing'".to_string(),
            }]
        );
        let counts = report.counts.expect("counts");
        assert_eq!(counts.tests(report.collection_errors.len()), 0);
    }

    #[test]
    fn quiet_summary_without_details_yields_counts_only() {
        let report = parse_execution(&patterns(), "....\n4 passed in 0.05s\n");
        assert!(report.tests.is_empty());
        assert_eq!(report.counts.map(|c| c.passed), Some(4));
    }

    #[test]
    fn unrelated_output_yields_nothing() {
        let report = parse_execution(&patterns(), "Traceback (most recent call last):\nboom\n");
        assert!(report.tests.is_empty());
        assert!(report.counts.is_none());
    }

    #[test]
    fn same_headline_in_two_files_is_resolved_by_location() {
        let output = "\
=================================== FAILURES ===================================
___________________________________ test_x ___________________________________
E       assert False

tests/b/test_x.py:2: AssertionError
=========================== short test summary info ============================
FAILED tests/a/test_x.py::test_x - assert 1
FAILED tests/b/test_x.py::test_x - assert False
============================== 2 failed in 0.02s ===============================
";
        let report = parse_execution(&patterns(), output);
        assert!(report.tests[0].traceback.is_none());
        assert!(report.tests[1].traceback.is_some());
    }

    #[test]
    fn parses_collect_only_listing() {
        let output = "\
tests/test_math.py::test_add
tests/test_math.py::TestCls::test_mul[2-4]
tests/test_text.py::test_upper

3 tests collected in 0.01s
";
        let report = parse_discovery(&patterns(), output);
        assert_eq!(report.discovered.len(), 3);
        assert_eq!(report.discovered[1].class.as_deref(), Some("TestCls"));
        assert_eq!(report.discovered[1].function, "test_mul[2-4]");
        assert_eq!(report.counts.map(|c| c.collected), Some(3));
    }

    #[test]
    fn durations_alone_do_not_imply_skips() {
        let output = "\
=================================== FAILURES ===================================
___________________________________ test_sub ___________________________________
E       assert 0 == 1

tests/test_math.py:6: AssertionError
============================== slowest durations ===============================
0.12s call     tests/test_math.py::test_add
0.05s call     tests/test_math.py::test_sub
";
        let report = parse_execution(&patterns(), output);
        assert!(report.tests.is_empty());
        assert!(report.counts.is_none());
    }

    #[test]
    fn discovery_with_no_tests() {
        let report = parse_discovery(&patterns(), "\nno tests collected in 0.01s\n");
        assert!(report.discovered.is_empty());
        assert!(report.counts.is_some());
    }

    #[test]
    fn discovery_collection_error() {
        let output = "\
tests/test_math.py::test_add
==================================== ERRORS ====================================
_______________________ ERROR collecting tests/test_b.py _______________________
E   SyntaxError: invalid syntax
=========================== short test summary info ============================
ERROR tests/test_b.py
!!!!!!!!!!!!!!!!!!!! Interrupted: 1 error during collection !!!!!!!!!!!!!!!!!!!!
1 test collected, 1 error in 0.03s
";
        let report = parse_discovery(&patterns(), output);
        assert_eq!(report.discovered.len(), 1);
        assert_eq!(report.collection_errors.len(), 1);
        assert_eq!(report.collection_errors[0].reason, "SyntaxError: invalid syntax");
        let counts = report.counts.expect("counts");
        assert_eq!((counts.collected, counts.errors), (1, 1));
    }
}
