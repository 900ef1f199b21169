use protocol::{FieldViolation, RunMode, ViolationRule};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::time::Duration;

use super::expression::FilterExpression;
use super::paths::{resolve_target, PathRejection, TestTarget};
use super::request::{CaptureDisplay, ExecutionRequest, FilePattern, StopPolicy, Verbosity};
use crate::config::{flag_family, GateConfig};
use crate::error::ValidationErrors;

const EXECUTE_FIELDS: &[&str] = &[
    "node_ids",
    "markers",
    "keywords",
    "verbosity",
    "failfast",
    "maxfail",
    "show_capture",
    "timeout",
    "flags",
];
const DISCOVER_FIELDS: &[&str] = &["path", "pattern", "timeout"];

pub fn known_fields(mode: RunMode) -> &'static [&'static str] {
    match mode {
        RunMode::Execute => EXECUTE_FIELDS,
        RunMode::Discover => DISCOVER_FIELDS,
    }
}

/// Shape-checked but not yet policy-checked fields.
#[derive(Default)]
struct RawFields {
    node_ids: Option<Vec<String>>,
    markers: Option<String>,
    keywords: Option<String>,
    verbosity: Option<i64>,
    failfast: Option<bool>,
    maxfail: Option<i64>,
    show_capture: Option<bool>,
    timeout: Option<i64>,
    flags: Option<Vec<String>>,
    path: Option<String>,
    pattern: Option<String>,
}

/// Turns an untyped payload into an [`ExecutionRequest`], or reports every
/// violated field. Type errors stop validation before any path is touched;
/// all later checks accumulate.
pub fn validate_request(
    mode: RunMode,
    payload: &Value,
    config: &GateConfig,
) -> Result<ExecutionRequest, ValidationErrors> {
    let empty = Map::new();
    let object = match payload {
        Value::Null => &empty,
        Value::Object(object) => object,
        other => {
            return Err(ValidationErrors::new(vec![FieldViolation::new(
                "$",
                ViolationRule::InvalidPayload,
                format!("parameters must be a JSON object, got {}", type_name(other)),
            )
            .with_value(other.to_string())]));
        }
    };

    let raw = check_shape(mode, object)?;
    let mut violations = Vec::new();

    let flags = check_flags(raw.flags.unwrap_or_default(), config, &mut violations);
    let targets = check_targets(mode, raw.node_ids, raw.path, config, &mut violations);
    let markers = check_expression("markers", raw.markers, &mut violations);
    let keywords = check_expression("keywords", raw.keywords, &mut violations);
    let pattern = raw
        .pattern
        .and_then(|pattern| check_pattern(pattern, &mut violations));

    let verbosity = match raw.verbosity {
        Some(level) if (Verbosity::MIN..=Verbosity::MAX).contains(&level) => {
            Verbosity::new(level as i8)
        }
        Some(level) => {
            violations.push(out_of_range(
                "verbosity",
                level,
                format!("must be within {}..={}", Verbosity::MIN, Verbosity::MAX),
            ));
            Verbosity::default()
        }
        None => Verbosity::default(),
    };

    let max_maxfail = config.limits.max_maxfail;
    let stop = match (raw.failfast, raw.maxfail) {
        (Some(_), Some(_)) => {
            violations.push(FieldViolation::new(
                "maxfail",
                ViolationRule::Conflict,
                "failfast and maxfail are mutually exclusive",
            ));
            StopPolicy::Never
        }
        (Some(true), None) => StopPolicy::FirstFailure,
        (None, Some(count)) if count >= 1 && (count as u64) <= max_maxfail => {
            StopPolicy::AfterFailures(count as u64)
        }
        (None, Some(count)) => {
            violations.push(out_of_range(
                "maxfail",
                count,
                format!("must be within 1..={max_maxfail}"),
            ));
            StopPolicy::Never
        }
        _ => StopPolicy::Never,
    };

    let capture = match raw.show_capture {
        Some(true) => CaptureDisplay::All,
        Some(false) => CaptureDisplay::Hidden,
        None => CaptureDisplay::RunnerDefault,
    };

    let max_timeout = config.limits.max_timeout_secs;
    let timeout = match raw.timeout {
        Some(secs) if secs >= 1 && (secs as u64) <= max_timeout => {
            Duration::from_secs(secs as u64)
        }
        Some(secs) => {
            violations.push(out_of_range(
                "timeout",
                secs,
                format!("must be within 1..={max_timeout} seconds"),
            ));
            Duration::from_secs(config.limits.default_timeout_secs)
        }
        None => Duration::from_secs(config.limits.default_timeout_secs),
    };

    if !violations.is_empty() {
        return Err(ValidationErrors::new(violations));
    }

    Ok(ExecutionRequest {
        mode,
        targets,
        markers,
        keywords,
        verbosity,
        stop,
        capture,
        flags,
        pattern,
        timeout,
    })
}

fn check_shape(mode: RunMode, object: &Map<String, Value>) -> Result<RawFields, ValidationErrors> {
    let known = known_fields(mode);
    let mut raw = RawFields::default();
    let mut violations = Vec::new();

    for (field, value) in object {
        if !known.contains(&field.as_str()) {
            violations.push(FieldViolation::new(
                field.as_str(),
                ViolationRule::UnknownField,
                format!("unknown field; expected one of: {}", known.join(", ")),
            ));
            continue;
        }
        if value.is_null() {
            continue;
        }
        let checked = match field.as_str() {
            "node_ids" => string_list(value).map(|list| raw.node_ids = Some(list)),
            "flags" => string_list(value).map(|list| raw.flags = Some(list)),
            "markers" => string(value).map(|text| raw.markers = Some(text)),
            "keywords" => string(value).map(|text| raw.keywords = Some(text)),
            "path" => string(value).map(|text| raw.path = Some(text)),
            "pattern" => string(value).map(|text| raw.pattern = Some(text)),
            "verbosity" => integer(value).map(|number| raw.verbosity = Some(number)),
            "maxfail" => integer(value).map(|number| raw.maxfail = Some(number)),
            "timeout" => integer(value).map(|number| raw.timeout = Some(number)),
            "failfast" => boolean(value).map(|flag| raw.failfast = Some(flag)),
            "show_capture" => boolean(value).map(|flag| raw.show_capture = Some(flag)),
            _ => Ok(()),
        };
        if let Err(expected) = checked {
            violations.push(
                FieldViolation::new(
                    field.as_str(),
                    ViolationRule::WrongType,
                    format!("expected {expected}, got {}", type_name(value)),
                )
                .with_value(value.to_string()),
            );
        }
    }

    if violations.is_empty() {
        Ok(raw)
    } else {
        Err(ValidationErrors::new(violations))
    }
}

fn string(value: &Value) -> Result<String, &'static str> {
    value.as_str().map(str::to_string).ok_or("a string")
}

fn string_list(value: &Value) -> Result<Vec<String>, &'static str> {
    const EXPECTED: &str = "an array of strings";
    let items = value.as_array().ok_or(EXPECTED)?;
    items
        .iter()
        .map(|item| item.as_str().map(str::to_string).ok_or(EXPECTED))
        .collect()
}

fn integer(value: &Value) -> Result<i64, &'static str> {
    value.as_i64().ok_or("an integer")
}

fn boolean(value: &Value) -> Result<bool, &'static str> {
    value.as_bool().ok_or("a boolean")
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(number) if number.is_i64() || number.is_u64() => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn out_of_range(field: &str, value: i64, message: String) -> FieldViolation {
    FieldViolation::new(field, ViolationRule::OutOfRange, message).with_value(value.to_string())
}

/// Returns the accepted flags in allowlist order, without duplicates.
fn check_flags(
    requested: Vec<String>,
    config: &GateConfig,
    violations: &mut Vec<FieldViolation>,
) -> Vec<String> {
    let mut accepted: BTreeMap<usize, String> = BTreeMap::new();
    let mut families: BTreeMap<String, String> = BTreeMap::new();

    for (index, flag) in requested.into_iter().enumerate() {
        let field = format!("flags[{index}]");
        let Some(position) = config.flags.position(&flag) else {
            violations.push(
                FieldViolation::new(
                    field,
                    ViolationRule::DisallowedFlag,
                    "flag is not in the configured allowlist",
                )
                .with_value(flag),
            );
            continue;
        };
        let family = flag_family(&flag).to_string();
        match families.get(&family) {
            Some(previous) if previous != &flag => {
                violations.push(
                    FieldViolation::new(
                        field,
                        ViolationRule::Conflict,
                        format!("conflicts with {previous}"),
                    )
                    .with_value(flag),
                );
                continue;
            }
            Some(_) => continue,
            None => {}
        }
        families.insert(family, flag.clone());
        accepted.insert(position, flag);
    }
    accepted.into_values().collect()
}

fn check_targets(
    mode: RunMode,
    node_ids: Option<Vec<String>>,
    path: Option<String>,
    config: &GateConfig,
    violations: &mut Vec<FieldViolation>,
) -> Vec<TestTarget> {
    let root = &config.project_root;
    match mode {
        RunMode::Execute => {
            let node_ids = node_ids.unwrap_or_default();
            let max_targets = config.limits.max_targets;
            if node_ids.len() > max_targets {
                violations.push(
                    FieldViolation::new(
                        "node_ids",
                        ViolationRule::OutOfRange,
                        format!("at most {max_targets} node ids per request"),
                    )
                    .with_value(node_ids.len().to_string()),
                );
                return Vec::new();
            }
            let mut targets = Vec::with_capacity(node_ids.len());
            for (index, raw) in node_ids.into_iter().enumerate() {
                match resolve_target(root, &raw) {
                    Ok(target) => targets.push(target),
                    Err(rejection) => {
                        violations.push(path_violation(format!("node_ids[{index}]"), raw, rejection))
                    }
                }
            }
            targets
        }
        RunMode::Discover => {
            let Some(raw) = path else {
                return Vec::new();
            };
            // A plain directory or file only; node id selectors make no sense here.
            if raw.contains("::") {
                violations.push(
                    FieldViolation::new(
                        "path",
                        ViolationRule::UnsafeValue,
                        "discovery path must not contain a node id selector",
                    )
                    .with_value(raw),
                );
                return Vec::new();
            }
            match resolve_target(root, &raw) {
                Ok(target) => vec![target],
                Err(rejection) => {
                    violations.push(path_violation("path".to_string(), raw, rejection));
                    Vec::new()
                }
            }
        }
    }
}

fn path_violation(field: String, raw: String, rejection: PathRejection) -> FieldViolation {
    let rule = match rejection {
        PathRejection::Absolute | PathRejection::Traversal | PathRejection::Escapes => {
            ViolationRule::PathEscape
        }
        PathRejection::NotFound => ViolationRule::PathNotFound,
        PathRejection::Empty
        | PathRejection::LeadingDash
        | PathRejection::UnsafeChar(_)
        | PathRejection::BadSelector => ViolationRule::UnsafeValue,
    };
    FieldViolation::new(field, rule, rejection.to_string()).with_value(raw)
}

fn check_expression(
    field: &str,
    raw: Option<String>,
    violations: &mut Vec<FieldViolation>,
) -> Option<FilterExpression> {
    let raw = raw?;
    if raw.trim_start().starts_with('-') {
        violations.push(
            FieldViolation::new(field, ViolationRule::UnsafeValue, "value must not start with '-'")
                .with_value(raw),
        );
        return None;
    }
    match FilterExpression::parse(&raw) {
        Ok(expression) => Some(expression),
        Err(err) => {
            violations.push(
                FieldViolation::new(field, ViolationRule::InvalidExpression, err.to_string())
                    .with_value(raw),
            );
            None
        }
    }
}

fn check_pattern(raw: String, violations: &mut Vec<FieldViolation>) -> Option<FilePattern> {
    let message = if raw.is_empty() {
        Some("pattern is empty".to_string())
    } else if raw.len() > FilePattern::MAX_LEN {
        Some(format!("pattern longer than {} characters", FilePattern::MAX_LEN))
    } else if raw.starts_with('-') {
        Some("value must not start with '-'".to_string())
    } else {
        raw.chars()
            .find(|ch| !(ch.is_ascii_alphanumeric() || "_*?.-[]".contains(*ch)))
            .map(|ch| format!("character {ch:?} is not allowed in a file pattern"))
    };
    match message {
        Some(message) => {
            violations.push(
                FieldViolation::new("pattern", ViolationRule::UnsafeValue, message).with_value(raw),
            );
            None
        }
        None => Some(FilePattern::new(raw)),
    }
}
