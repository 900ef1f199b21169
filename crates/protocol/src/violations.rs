use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ViolationRule {
    InvalidPayload,
    UnknownField,
    WrongType,
    DisallowedFlag,
    PathEscape,
    PathNotFound,
    InvalidExpression,
    UnsafeValue,
    OutOfRange,
    Conflict,
}

/// A single rejected field. `value` is a bounded rendering of what was sent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FieldViolation {
    pub field: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    pub rule: ViolationRule,
    pub message: String,
}

const MAX_RENDERED_VALUE: usize = 200;

impl FieldViolation {
    pub fn new(field: impl Into<String>, rule: ViolationRule, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            value: None,
            rule,
            message: message.into(),
        }
    }

    pub fn with_value(mut self, value: impl AsRef<str>) -> Self {
        let value = value.as_ref();
        let rendered = if value.chars().count() > MAX_RENDERED_VALUE {
            let mut cut: String = value.chars().take(MAX_RENDERED_VALUE).collect();
            cut.push('…');
            cut
        } else {
            value.to_string()
        };
        self.value = Some(rendered);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_values_are_cut() {
        let violation = FieldViolation::new("markers", ViolationRule::InvalidExpression, "bad")
            .with_value("x".repeat(500));
        let value = violation.value.expect("value");
        assert_eq!(value.chars().count(), MAX_RENDERED_VALUE + 1);
        assert!(value.ends_with('…'));
    }
}
