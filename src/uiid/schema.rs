//! Declarative field constraint tables for UIID payloads and the validator that checks them.
//! Numeric fields accept numeric strings and are normalized to JSON numbers before deserialization.

use crate::error::{Result, ValidationError};
use serde_json::{Map, Number, Value};

pub const ON_OFF: &[&str] = &["on", "off"];
pub const ON_OFF_STAY: &[&str] = &["on", "off", "stay"];

/// Constraint attached to a single wire field.
#[derive(Debug, Clone, Copy)]
pub enum FieldKind {
    /// Case sensitive closed set of strings
    Enum(&'static [&'static str]),
    Int { min: i64, max: i64 },
    Float { min: f64, max: f64 },
    /// Accepts booleans, `0`/`1` and their string forms
    Bool,
    Str { non_empty: bool },
    /// Nested object validated against its own table
    Object(&'static [FieldSpec]),
    /// Array of nested objects, each validated against the table
    List(&'static [FieldSpec]),
}

#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
}

impl FieldSpec {
    pub const fn one_of(name: &'static str, cases: &'static [&'static str]) -> Self {
        Self {
            name,
            kind: FieldKind::Enum(cases),
        }
    }

    pub const fn int(name: &'static str, min: i64, max: i64) -> Self {
        Self {
            name,
            kind: FieldKind::Int { min, max },
        }
    }

    pub const fn any_int(name: &'static str) -> Self {
        Self::int(name, i64::MIN, i64::MAX)
    }

    pub const fn float(name: &'static str) -> Self {
        Self {
            name,
            kind: FieldKind::Float {
                min: f64::MIN,
                max: f64::MAX,
            },
        }
    }

    pub const fn boolean(name: &'static str) -> Self {
        Self {
            name,
            kind: FieldKind::Bool,
        }
    }

    pub const fn text(name: &'static str) -> Self {
        Self {
            name,
            kind: FieldKind::Str { non_empty: true },
        }
    }

    pub const fn any_text(name: &'static str) -> Self {
        Self {
            name,
            kind: FieldKind::Str { non_empty: false },
        }
    }

    pub const fn object(name: &'static str, fields: &'static [FieldSpec]) -> Self {
        Self {
            name,
            kind: FieldKind::Object(fields),
        }
    }

    pub const fn list(name: &'static str, fields: &'static [FieldSpec]) -> Self {
        Self {
            name,
            kind: FieldKind::List(fields),
        }
    }
}

/// Checks `params` against every table and returns a normalized copy.
///
/// Absent and `null` fields always pass. Fields not named by any table are
/// copied through untouched.
pub fn validate(params: &Value, tables: &[&[FieldSpec]]) -> Result<Value> {
    let mut object = params
        .as_object()
        .cloned()
        .ok_or_else(|| violation("params", "object", "JSON object".to_string()))?;
    for table in tables {
        validate_fields(&mut object, table, "")?;
    }
    Ok(Value::Object(object))
}

fn validate_fields(
    object: &mut Map<String, Value>,
    fields: &[FieldSpec],
    prefix: &str,
) -> std::result::Result<(), ValidationError> {
    for spec in fields {
        let Some(value) = object.get_mut(spec.name) else {
            continue;
        };
        if value.is_null() {
            continue;
        }
        let path = if prefix.is_empty() {
            spec.name.to_string()
        } else {
            format!("{}.{}", prefix, spec.name)
        };
        *value = normalize(value.take(), &spec.kind, &path)?;
    }
    Ok(())
}

fn normalize(
    value: Value,
    kind: &FieldKind,
    path: &str,
) -> std::result::Result<Value, ValidationError> {
    match kind {
        FieldKind::Enum(cases) => match value.as_str() {
            Some(s) if cases.contains(&s) => Ok(value),
            _ => Err(violation(path, "enum", format!("one of [{}]", cases.join(", ")))),
        },
        FieldKind::Int { min, max } => {
            let constraint = || int_constraint(*min, *max);
            let n = as_integer(&value).ok_or_else(|| violation(path, "integer", constraint()))?;
            if n < *min || n > *max {
                return Err(violation(path, "integer", constraint()));
            }
            Ok(Value::from(n))
        }
        FieldKind::Float { min, max } => {
            let constraint = || float_constraint(*min, *max);
            let n = as_float(&value).ok_or_else(|| violation(path, "float", constraint()))?;
            if n < *min || n > *max {
                return Err(violation(path, "float", constraint()));
            }
            Number::from_f64(n)
                .map(Value::Number)
                .ok_or_else(|| violation(path, "float", constraint()))
        }
        FieldKind::Bool => as_bool(&value)
            .map(Value::Bool)
            .ok_or_else(|| violation(path, "bool", "true, false, 0 or 1".to_string())),
        FieldKind::Str { non_empty } => match value {
            Value::String(ref s) if !non_empty || !s.is_empty() => Ok(value),
            _ if *non_empty => Err(violation(path, "string", "not empty".to_string())),
            _ => Err(violation(path, "string", "any".to_string())),
        },
        FieldKind::Object(fields) => match value {
            Value::Object(mut map) => {
                validate_fields(&mut map, fields, path)?;
                Ok(Value::Object(map))
            }
            _ => Err(violation(path, "object", "nested object".to_string())),
        },
        FieldKind::List(fields) => match value {
            Value::Array(items) => items
                .into_iter()
                .enumerate()
                .map(|(i, item)| {
                    normalize(item, &FieldKind::Object(fields), &format!("{}[{}]", path, i))
                })
                .collect::<std::result::Result<Vec<_>, _>>()
                .map(Value::Array),
            _ => Err(violation(path, "array", "array of objects".to_string())),
        },
    }
}

fn violation(path: &str, expected: &'static str, constraint: String) -> ValidationError {
    ValidationError {
        field: path.to_string(),
        expected,
        constraint,
    }
}

fn int_constraint(min: i64, max: i64) -> String {
    match (min == i64::MIN, max == i64::MAX) {
        (true, true) => "any".to_string(),
        (false, true) => format!("min {}", min),
        (true, false) => format!("max {}", max),
        (false, false) => format!("min {}, max {}", min, max),
    }
}

fn float_constraint(min: f64, max: f64) -> String {
    if min == f64::MIN && max == f64::MAX {
        "any".to_string()
    } else {
        format!("min {}, max {}", min, max)
    }
}

fn as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| integral(n.as_f64()?)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| integral(s.parse::<f64>().ok()?))
        }
        _ => None,
    }
}

fn integral(f: f64) -> Option<i64> {
    (f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64).then_some(f as i64)
}

fn as_float(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        _ => None,
    }
}

fn as_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => match n.as_i64() {
            Some(0) => Some(false),
            Some(1) => Some(true),
            _ => None,
        },
        Value::String(s) => match s.as_str() {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SonoffError;
    use serde_json::json;

    const NESTED: &[FieldSpec] = &[FieldSpec::int("br", 1, 100)];
    const TABLE: &[FieldSpec] = &[
        FieldSpec::one_of("switch", ON_OFF),
        FieldSpec::int("bright", 10, 100),
        FieldSpec::float("power"),
        FieldSpec::boolean("water"),
        FieldSpec::text("fwVersion"),
        FieldSpec::object("white", NESTED),
        FieldSpec::list("switches", NESTED),
    ];

    fn field_of(err: SonoffError) -> String {
        match err {
            SonoffError::Validation(v) => v.field,
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn numeric_strings_are_cast() {
        let out = validate(&json!({"bright": "42", "power": "12.5", "water": 1}), &[TABLE]).unwrap();
        assert_eq!(out, json!({"bright": 42, "power": 12.5, "water": true}));
    }

    #[test]
    fn absent_and_null_fields_pass() {
        let out = validate(&json!({"switch": null, "other": "kept"}), &[TABLE]).unwrap();
        assert_eq!(out["other"], "kept");
    }

    #[test]
    fn out_of_range_names_the_field() {
        let err = validate(&json!({"bright": 101}), &[TABLE]).unwrap_err();
        match err {
            SonoffError::Validation(v) => {
                assert_eq!(v.field, "bright");
                assert_eq!(v.expected, "integer");
                assert_eq!(v.constraint, "min 10, max 100");
            }
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn enums_are_case_sensitive() {
        let err = validate(&json!({"switch": "ON"}), &[TABLE]).unwrap_err();
        assert_eq!(field_of(err), "switch");
    }

    #[test]
    fn empty_string_rejected_when_required() {
        let err = validate(&json!({"fwVersion": ""}), &[TABLE]).unwrap_err();
        assert_eq!(field_of(err), "fwVersion");
    }

    #[test]
    fn nested_paths() {
        let err = validate(&json!({"white": {"br": 0}}), &[TABLE]).unwrap_err();
        assert_eq!(field_of(err), "white.br");
        let err = validate(&json!({"switches": [{"br": 5}, {"br": "x"}]}), &[TABLE]).unwrap_err();
        assert_eq!(field_of(err), "switches[1].br");
    }

    #[test]
    fn non_object_payload_rejected() {
        assert!(validate(&json!([1, 2]), &[TABLE]).is_err());
    }
}
