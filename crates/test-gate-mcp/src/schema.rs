//! JSON Schemas advertised by `list_tools`. Bounds come from the loaded
//! configuration so clients see the same limits the validator enforces.

use protocol::RunMode;
use serde_json::{json, Map, Value};
use test_gate::layers::policy::{known_fields, FilePattern, Verbosity};
use test_gate::GateConfig;

pub(crate) fn input_schema(mode: RunMode, config: &GateConfig) -> Map<String, Value> {
    let mut properties = Map::new();
    for field in known_fields(mode) {
        if let Some(schema) = property(field, config) {
            properties.insert(field.to_string(), schema);
        }
    }

    let mut schema = Map::new();
    schema.insert("type".to_string(), Value::String("object".to_string()));
    schema.insert("properties".to_string(), Value::Object(properties));
    schema.insert("additionalProperties".to_string(), Value::Bool(false));
    schema
}

fn property(field: &str, config: &GateConfig) -> Option<Value> {
    let limits = &config.limits;
    let schema = match field {
        "node_ids" => json!({
            "type": "array",
            "items": { "type": "string" },
            "maxItems": limits.max_targets,
            "description": "Test files, directories or node ids relative to the project root, \
                            e.g. tests/test_math.py::test_add. Empty runs the whole suite."
        }),
        "markers" => json!({
            "type": "string",
            "description": "Marker expression passed to -m, e.g. \"not slow\"."
        }),
        "keywords" => json!({
            "type": "string",
            "description": "Keyword expression passed to -k, e.g. \"add or sub\"."
        }),
        "verbosity" => json!({
            "type": "integer",
            "minimum": Verbosity::MIN,
            "maximum": Verbosity::MAX,
            "default": 0,
            "description": "Negative values are quieter (-q), positive values more verbose (-v)."
        }),
        "failfast" => json!({
            "type": "boolean",
            "description": "Stop after the first failure. Cannot be combined with maxfail."
        }),
        "maxfail" => json!({
            "type": "integer",
            "minimum": 1,
            "maximum": limits.max_maxfail,
            "description": "Stop after this many failures. Cannot be combined with failfast."
        }),
        "show_capture" => json!({
            "type": "boolean",
            "description": "Show (true) or hide (false) captured output of failing tests."
        }),
        "timeout" => json!({
            "type": "integer",
            "minimum": 1,
            "maximum": limits.max_timeout_secs,
            "default": limits.default_timeout_secs,
            "description": "Wall-clock limit for the whole run, in seconds."
        }),
        "flags" => json!({
            "type": "array",
            "items": { "type": "string", "enum": config.flags.allowed },
            "uniqueItems": true,
            "description": "Extra pytest flags from the configured allowlist."
        }),
        "path" => json!({
            "type": "string",
            "description": "Directory or file to collect from, relative to the project root."
        }),
        "pattern" => json!({
            "type": "string",
            "maxLength": FilePattern::MAX_LEN,
            "pattern": "^[A-Za-z0-9_*?.\\[\\]][A-Za-z0-9_*?.\\-\\[\\]]*$",
            "description": "Test file glob, e.g. test_*.py."
        }),
        _ => return None,
    };
    Some(schema)
}
