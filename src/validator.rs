//! Descriptor-driven parameter validation.
//!
//! Lenient by contract: methods without a registered descriptor pass
//! through untouched, and unknown extra fields are preserved so the
//! upstream call sees them intact. Only declared constraints are enforced.

use crate::methods::{MethodDescriptor, ParamKind};
use serde_json::{Map, Value};

/// Validation failure with one entry per offending field. Paths are dotted
/// (`media.2.type`) and joined with `; ` for the envelope description.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    pub details: Vec<String>,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.details.join("; "))
    }
}

impl std::error::Error for ValidationError {}

/// Validate `params` against a method descriptor, returning the normalised
/// parameter object.
pub fn validate(
    descriptor: Option<&MethodDescriptor>,
    params: &Value,
) -> Result<Value, ValidationError> {
    let map = match params {
        Value::Object(map) => map.clone(),
        Value::Null => Map::new(),
        _ => {
            return Err(ValidationError {
                details: vec!["params: expected a JSON object".to_string()],
            })
        }
    };

    let Some(descriptor) = descriptor else {
        // Forward compatibility: no schema, no opinion.
        return Ok(Value::Object(map));
    };

    let mut details = Vec::new();

    for spec in descriptor.params {
        match map.get(spec.name) {
            None | Some(Value::Null) if spec.required => {
                details.push(format!("{}: required field missing", spec.name));
            }
            None | Some(Value::Null) => {}
            Some(value) => check_kind(spec.name, &spec.kind, value, &mut details),
        }
    }

    check_cross_rules(descriptor, &map, &mut details);

    if details.is_empty() {
        Ok(Value::Object(map))
    } else {
        Err(ValidationError { details })
    }
}

fn check_kind(path: &str, kind: &ParamKind, value: &Value, details: &mut Vec<String>) {
    match kind {
        ParamKind::String => {
            if !value.is_string() {
                details.push(format!("{path}: expected string"));
            }
        }
        ParamKind::StringOrInteger => {
            let numeric = value.as_i64().is_some();
            if !value.is_string() && !numeric {
                details.push(format!("{path}: expected string or integer"));
            }
        }
        ParamKind::Integer { min, max } => match value.as_i64() {
            None => details.push(format!("{path}: expected integer")),
            Some(n) => {
                if let Some(min) = min {
                    if n < *min {
                        details.push(format!("{path}: must be >= {min}"));
                    }
                }
                if let Some(max) = max {
                    if n > *max {
                        details.push(format!("{path}: must be <= {max}"));
                    }
                }
            }
        },
        ParamKind::Number { min, max } => match value.as_f64() {
            None => details.push(format!("{path}: expected number")),
            Some(n) => {
                if let Some(min) = min {
                    if n < *min {
                        details.push(format!("{path}: must be >= {min}"));
                    }
                }
                if let Some(max) = max {
                    if n > *max {
                        details.push(format!("{path}: must be <= {max}"));
                    }
                }
            }
        },
        ParamKind::Boolean => {
            if !value.is_boolean() {
                details.push(format!("{path}: expected boolean"));
            }
        }
        ParamKind::Enumeration(allowed) => match value.as_str() {
            Some(s) if allowed.contains(&s) => {}
            Some(s) => {
                details.push(format!("{path}: \"{s}\" is not one of {}", allowed.join(", ")))
            }
            None => details.push(format!("{path}: expected string")),
        },
        ParamKind::Array { items } => match value.as_array() {
            None => details.push(format!("{path}: expected array")),
            Some(entries) => {
                if let Some(item_kind) = items {
                    for (i, entry) in entries.iter().enumerate() {
                        check_kind(&format!("{path}.{i}"), item_kind, entry, details);
                    }
                }
            }
        },
        ParamKind::Object => {
            // Nested objects pass through; their inner fields belong to
            // the upstream contract.
            if !value.is_object() {
                details.push(format!("{path}: expected object"));
            }
        }
    }
}

fn check_cross_rules(
    descriptor: &MethodDescriptor,
    map: &Map<String, Value>,
    details: &mut Vec<String>,
) {
    if !descriptor.require_one_of.is_empty() {
        let satisfied = descriptor.require_one_of.iter().any(|group| {
            group.iter().all(|field| map.get(*field).is_some_and(|v| !v.is_null()))
        });
        if !satisfied {
            let rendered: Vec<String> = descriptor
                .require_one_of
                .iter()
                .map(|group| group.join(" + "))
                .collect();
            details.push(format!("one of ({}) is required", rendered.join(") or (")));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::methods::registry;
    use serde_json::json;

    fn check(method: &str, params: Value) -> Result<Value, ValidationError> {
        validate(registry().get(method), &params)
    }

    #[test]
    fn unknown_method_passes_through() {
        let params = json!({"whatever": [1, 2, 3]});
        let normalised = validate(None, &params).unwrap();
        assert_eq!(normalised, params);
    }

    #[test]
    fn missing_required_field_is_reported() {
        let err = check("send_text", json!({"chat_id": 1})).unwrap_err();
        assert_eq!(err.details, vec!["text: required field missing"]);
    }

    #[test]
    fn multiple_problems_join_with_semicolons() {
        let err = check("send_text", json!({"text": 5})).unwrap_err();
        let rendered = err.to_string();
        assert!(rendered.contains("chat_id: required field missing"));
        assert!(rendered.contains("; "));
        assert!(rendered.contains("text: expected string"));
    }

    #[test]
    fn chat_id_accepts_string_or_integer() {
        assert!(check("send_text", json!({"chat_id": -100123, "text": "x"})).is_ok());
        assert!(check("send_text", json!({"chat_id": "@channel", "text": "x"})).is_ok());
        let err = check("send_text", json!({"chat_id": true, "text": "x"})).unwrap_err();
        assert_eq!(err.details, vec!["chat_id: expected string or integer"]);
    }

    #[test]
    fn integer_bounds_are_enforced() {
        let err =
            check("get_profile_photos", json!({"user_id": 5, "limit": 500})).unwrap_err();
        assert_eq!(err.details, vec!["limit: must be <= 100"]);
    }

    #[test]
    fn number_bounds_are_enforced() {
        let err = check(
            "send_location",
            json!({"chat_id": 1, "latitude": 123.0, "longitude": 8.5}),
        )
        .unwrap_err();
        assert_eq!(err.details, vec!["latitude: must be <= 90"]);
    }

    #[test]
    fn enum_membership_is_enforced() {
        let err = check(
            "send_text",
            json!({"chat_id": 1, "text": "x", "parse_mode": "BBCode"}),
        )
        .unwrap_err();
        assert!(err.details[0].starts_with("parse_mode: \"BBCode\" is not one of"));
    }

    #[test]
    fn array_items_are_checked_with_indexed_paths() {
        let err = check(
            "send_poll",
            json!({"chat_id": 1, "question": "?", "options": ["a", 2, "c"]}),
        )
        .unwrap_err();
        assert_eq!(err.details, vec!["options.1: expected string"]);
    }

    #[test]
    fn unknown_extra_fields_are_preserved() {
        let normalised = check(
            "send_text",
            json!({"chat_id": 1, "text": "x", "future_flag": {"a": 1}}),
        )
        .unwrap();
        assert_eq!(normalised["future_flag"], json!({"a": 1}));
    }

    #[test]
    fn edit_requires_chat_target_or_inline_target() {
        let err = check("edit_text", json!({"text": "new"})).unwrap_err();
        assert_eq!(
            err.details,
            vec!["one of (chat_id + message_id) or (inline_message_id) is required"]
        );

        assert!(check("edit_text", json!({"chat_id": 1, "message_id": 2, "text": "n"})).is_ok());
        assert!(check("edit_text", json!({"inline_message_id": "abc", "text": "n"})).is_ok());
        // A partial chat target does not satisfy the rule.
        assert!(check("edit_text", json!({"chat_id": 1, "text": "n"})).is_err());
    }

    #[test]
    fn null_params_normalise_to_empty_object() {
        let normalised = check("get_identity", Value::Null).unwrap();
        assert_eq!(normalised, json!({}));
    }

    #[test]
    fn non_object_params_are_rejected() {
        let err = check("get_identity", json!([1, 2])).unwrap_err();
        assert_eq!(err.details, vec!["params: expected a JSON object"]);
    }
}
