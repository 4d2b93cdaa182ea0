//! Body-to-column extraction: presence checks, sanitization, and format
//! validation driven by the descriptor's field specs.

use crate::descriptor::{FieldKind, FieldSpec, ResourceDescriptor};
use crate::error::ApiError;
use crate::sanitize::{is_valid_date, is_valid_email, sanitize_text};
use crate::service::password;
use crate::sql::ColumnValue;
use serde_json::{Map, Value};

/// Collect and validate all create fields. Missing or empty required
/// fields reject with the resource's wording before anything else runs.
pub fn collect_create(
    desc: &ResourceDescriptor,
    body: &Map<String, Value>,
) -> Result<Vec<ColumnValue>, ApiError> {
    // Presence first, format second: a missing field reports the
    // missing-fields message even when another field is also malformed.
    for spec in desc.fields.iter().filter(|f| f.required) {
        if !is_present(spec, body.get(spec.name)) {
            return Err(ApiError::Validation(desc.messages.missing_fields.to_string()));
        }
    }
    let mut out = Vec::with_capacity(desc.fields.len());
    for spec in desc.fields {
        match extract(spec, body.get(spec.name), desc.messages.bad_date)? {
            Some(cv) => out.push(cv),
            None => {
                if spec.required {
                    return Err(ApiError::Validation(desc.messages.missing_fields.to_string()));
                }
                // Optional JSON lists default to an empty array on create.
                if spec.kind == FieldKind::JsonList {
                    out.push(ColumnValue::new(spec.name, Value::Array(Vec::new()), spec.kind.cast()));
                }
            }
        }
    }
    Ok(out)
}

fn is_present(spec: &FieldSpec, raw: Option<&Value>) -> bool {
    let Some(raw) = raw else { return false };
    match spec.kind {
        FieldKind::Text | FieldKind::Email | FieldKind::Date | FieldKind::Password => match raw {
            Value::String(s) => !s.trim().is_empty(),
            Value::Number(_) => true,
            _ => false,
        },
        FieldKind::Int => match raw {
            Value::Number(n) => n.as_i64().is_some_and(|n| n > 0),
            Value::String(s) => s.trim().parse::<i64>().is_ok_and(|n| n > 0),
            _ => false,
        },
        FieldKind::JsonList => raw.is_array(),
    }
}

/// Collect only the fields present in the body for a partial update.
/// Returns an empty vec when nothing updatable was provided.
pub fn collect_update(
    desc: &ResourceDescriptor,
    body: &Map<String, Value>,
) -> Result<Vec<ColumnValue>, ApiError> {
    let mut out = Vec::new();
    for spec in desc.fields.iter().filter(|f| f.updatable) {
        if !body.contains_key(spec.name) {
            continue;
        }
        if let Some(cv) = extract(spec, body.get(spec.name), desc.messages.bad_date)? {
            out.push(cv);
        } else if spec.kind == FieldKind::JsonList {
            // An explicitly supplied non-array collapses to [].
            out.push(ColumnValue::new(spec.name, Value::Array(Vec::new()), spec.kind.cast()));
        }
        // Explicitly provided empty text is dropped rather than written.
    }
    Ok(out)
}

/// Validate one field value. Ok(None) means absent/empty.
fn extract(
    spec: &FieldSpec,
    raw: Option<&Value>,
    bad_date: &str,
) -> Result<Option<ColumnValue>, ApiError> {
    let Some(raw) = raw else { return Ok(None) };
    match spec.kind {
        FieldKind::Text => {
            let s = value_as_text(raw).map(|s| sanitize_text(&s)).unwrap_or_default();
            if s.is_empty() {
                return Ok(None);
            }
            Ok(Some(ColumnValue::new(spec.name, Value::String(s), None)))
        }
        FieldKind::Email => {
            let s = value_as_text(raw).map(|s| sanitize_text(&s)).unwrap_or_default();
            if s.is_empty() {
                return Ok(None);
            }
            if !is_valid_email(&s) {
                return Err(ApiError::Validation("Invalid email format".to_string()));
            }
            Ok(Some(ColumnValue::new(spec.name, Value::String(s), None)))
        }
        FieldKind::Date => {
            let s = raw.as_str().map(str::trim).unwrap_or_default().to_string();
            if s.is_empty() {
                return Ok(None);
            }
            if !is_valid_date(&s) {
                return Err(ApiError::Validation(bad_date.to_string()));
            }
            Ok(Some(ColumnValue::new(spec.name, Value::String(s), spec.kind.cast())))
        }
        FieldKind::Int => {
            let n = match raw {
                Value::Number(n) => n.as_i64(),
                Value::String(s) => s.trim().parse::<i64>().ok(),
                _ => None,
            };
            match n {
                Some(n) if n > 0 => Ok(Some(ColumnValue::new(spec.name, Value::Number(n.into()), None))),
                _ => Ok(None),
            }
        }
        FieldKind::JsonList => match raw {
            Value::Array(_) => Ok(Some(ColumnValue::new(spec.name, raw.clone(), spec.kind.cast()))),
            _ => Ok(None),
        },
        FieldKind::Password => {
            let s = raw.as_str().unwrap_or_default();
            if s.is_empty() {
                return Ok(None);
            }
            let hashed = password::hash(s)?;
            Ok(Some(ColumnValue::new(spec.name, Value::String(hashed), None)))
        }
    }
}

fn value_as_text(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Find a collected value by column (parent checks, uniqueness probes).
pub fn collected<'a>(values: &'a [ColumnValue], column: &str) -> Option<&'a Value> {
    values.iter().find(|cv| cv.column == column).map(|cv| &cv.value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::Registry;
    use serde_json::json;

    fn body(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn create_rejects_missing_required_field() {
        let reg = Registry::builtin();
        let weeks = reg.weekly.resource(Some("weeks")).unwrap();
        let err = collect_create(weeks, &body(json!({"week_id": "w1", "title": "t"}))).unwrap_err();
        assert!(matches!(err, ApiError::Validation(m)
            if m == "Missing required fields: week_id, title, start_date, description"));
    }

    #[test]
    fn create_defaults_optional_links_to_empty_array() {
        let reg = Registry::builtin();
        let weeks = reg.weekly.resource(Some("weeks")).unwrap();
        let values = collect_create(
            weeks,
            &body(json!({
                "week_id": "week_1", "title": "Intro",
                "start_date": "2024-01-08", "description": "d"
            })),
        )
        .unwrap();
        assert_eq!(collected(&values, "links"), Some(&json!([])));
    }

    #[test]
    fn create_sanitizes_free_text() {
        let reg = Registry::builtin();
        let weeks = reg.weekly.resource(Some("weeks")).unwrap();
        let values = collect_create(
            weeks,
            &body(json!({
                "week_id": "week_1", "title": "<b>Intro</b>",
                "start_date": "2024-01-08", "description": " x & y "
            })),
        )
        .unwrap();
        assert_eq!(collected(&values, "title"), Some(&json!("Intro")));
        assert_eq!(collected(&values, "description"), Some(&json!("x &amp; y")));
    }

    #[test]
    fn invalid_email_rejects() {
        let reg = Registry::builtin();
        let students = reg.students.resource(None).unwrap();
        let err = collect_create(
            students,
            &body(json!({
                "student_id": "S1", "name": "Ann",
                "email": "bad", "password": "longpw123"
            })),
        )
        .unwrap_err();
        assert!(matches!(err, ApiError::Validation(m) if m == "Invalid email format"));
    }

    #[test]
    fn password_is_hashed_on_create() {
        let reg = Registry::builtin();
        let students = reg.students.resource(None).unwrap();
        let values = collect_create(
            students,
            &body(json!({
                "student_id": "S1", "name": "Ann",
                "email": "ann@x.com", "password": "longpw123"
            })),
        )
        .unwrap();
        let stored = collected(&values, "password").unwrap().as_str().unwrap();
        assert_ne!(stored, "longpw123");
        assert!(crate::service::password::verify("longpw123", stored));
    }

    #[test]
    fn update_takes_only_present_updatable_fields() {
        let reg = Registry::builtin();
        let weeks = reg.weekly.resource(Some("weeks")).unwrap();
        let sets = collect_update(weeks, &body(json!({"title": "New", "week_id": "ignored"}))).unwrap();
        assert_eq!(sets.len(), 1);
        assert_eq!(sets[0].column, "title");

        let sets = collect_update(weeks, &body(json!({}))).unwrap();
        assert!(sets.is_empty());
    }

    #[test]
    fn update_collapses_non_array_links() {
        let reg = Registry::builtin();
        let weeks = reg.weekly.resource(Some("weeks")).unwrap();
        let sets = collect_update(weeks, &body(json!({"links": "oops"}))).unwrap();
        assert_eq!(sets.len(), 1);
        assert_eq!(sets[0].value, json!([]));
    }

    #[test]
    fn bad_date_is_rejected_on_update() {
        let reg = Registry::builtin();
        let weeks = reg.weekly.resource(Some("weeks")).unwrap();
        assert!(collect_update(weeks, &body(json!({"start_date": "2023-02-30"}))).is_err());
    }
}
