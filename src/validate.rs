//! Batch metadata validation.
//!
//! Checks a batch of records for Atlas compatibility before upload: id
//! presence/injection, schema consistency across the batch, reserved key
//! prefixes, and timestamp-format consistency. Runs entirely in memory and
//! mutates records in place (id injection, empty-string replacement); it
//! performs no I/O.

use chrono::NaiveDate;
use serde_json::Value;
use uuid::Uuid;

use crate::error::{AtlasError, Result};
use crate::models::{Modality, Record, DEFAULT_ID_FIELD, MAX_ID_LENGTH};

/// Validate and correct a batch of records for the given project settings.
///
/// For every record:
/// 1. Injects a fresh UUIDv4 when the id field is absent, but only when the
///    project uses the default id field name; otherwise fails.
/// 2. Rejects id values longer than 36 characters.
/// 3. Requires every record to match the key set of the first record.
/// 4. Infers timestamp keys from the first record (values parseable as an
///    ISO-8601 calendar date) and requires all later values under those
///    keys to parse as well.
/// 5. Rejects keys starting with the reserved `_` prefix.
/// 6. For text projects, replaces empty string values with the literal
///    string `"null"`, or rejects them when `replace_empty_strings` is off.
/// 7. Rejects values that are not strings, integers, or floats.
pub fn validate_and_correct_metadata(
    records: &mut [Record],
    id_field: &str,
    modality: Modality,
    replace_empty_strings: bool,
) -> Result<()> {
    let mut canonical_keys: Option<Vec<String>> = None;
    let mut date_keys: Vec<String> = Vec::new();

    for record in records.iter_mut() {
        // Ids are never overwritten; a missing one is only filled in for
        // the default id field.
        match record.get(id_field) {
            Some(value) => {
                let id = value_to_display_string(value);
                if id.chars().count() > MAX_ID_LENGTH {
                    return Err(AtlasError::IdTooLong { value: id });
                }
            }
            None => {
                if id_field == DEFAULT_ID_FIELD {
                    record.insert(
                        id_field.to_string(),
                        Value::String(Uuid::new_v4().to_string()),
                    );
                } else {
                    return Err(AtlasError::MissingRequiredField {
                        field: id_field.to_string(),
                    });
                }
            }
        }

        let keys = sorted_keys(record);
        match &canonical_keys {
            None => {
                // The first record fixes the schema and which keys hold
                // timestamps.
                for key in &keys {
                    if let Some(value) = record.get(key) {
                        if parse_iso_date(value).is_some() {
                            date_keys.push(key.clone());
                        }
                    }
                }
                canonical_keys = Some(keys);
            }
            Some(expected) => {
                if &keys != expected {
                    return Err(AtlasError::SchemaMismatch {
                        expected: expected.clone(),
                        found: keys,
                    });
                }
            }
        }

        for (key, value) in record.iter_mut() {
            if key.starts_with('_') {
                return Err(AtlasError::MetadataKeyReserved { key: key.clone() });
            }

            if date_keys.iter().any(|k| k == key) && parse_iso_date(value).is_none() {
                return Err(AtlasError::InvalidTimestamp {
                    key: key.clone(),
                    value: value_to_display_string(value),
                });
            }

            if modality == Modality::Text && matches!(value, Value::String(s) if s.is_empty()) {
                if replace_empty_strings {
                    *value = Value::String("null".to_string());
                } else {
                    return Err(AtlasError::EmptyValueNotAllowed { key: key.clone() });
                }
            }

            match value {
                Value::String(_) | Value::Number(_) => {}
                other => {
                    return Err(AtlasError::UnsupportedValueType {
                        key: key.clone(),
                        found: json_type_name(other).to_string(),
                    });
                }
            }
        }
    }

    Ok(())
}

fn sorted_keys(record: &Record) -> Vec<String> {
    let mut keys: Vec<String> = record.keys().cloned().collect();
    keys.sort();
    keys
}

/// An ISO-8601 calendar date, `YYYY-MM-DD`. Numbers are stringified first
/// so that e.g. an integer year is judged the same way as its text form.
fn parse_iso_date(value: &Value) -> Option<NaiveDate> {
    let text = value_to_display_string(value);
    NaiveDate::parse_from_str(&text, "%Y-%m-%d").ok()
}

fn value_to_display_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: serde_json::Value) -> Record {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn injects_uuid_for_default_id_field() {
        let mut records = vec![record(json!({"text": "hello"}))];
        validate_and_correct_metadata(&mut records, "id", Modality::Text, true).unwrap();

        let id = records[0].get("id").unwrap().as_str().unwrap();
        assert_eq!(id.len(), 36);
        assert!(Uuid::parse_str(id).is_ok());
    }

    #[test]
    fn missing_custom_id_field_fails() {
        let mut records = vec![record(json!({"text": "hello"}))];
        let err =
            validate_and_correct_metadata(&mut records, "doc_id", Modality::Text, true).unwrap_err();
        assert!(matches!(err, AtlasError::MissingRequiredField { field } if field == "doc_id"));
    }

    #[test]
    fn overlong_id_fails() {
        let mut records = vec![record(json!({"id": "x".repeat(37)}))];
        let err =
            validate_and_correct_metadata(&mut records, "id", Modality::Text, true).unwrap_err();
        assert!(matches!(err, AtlasError::IdTooLong { .. }));
    }

    #[test]
    fn schema_mismatch_names_both_key_sets() {
        let mut records = vec![
            record(json!({"id": "1", "title": "a"})),
            record(json!({"id": "2", "headline": "b"})),
        ];
        let err =
            validate_and_correct_metadata(&mut records, "id", Modality::Text, true).unwrap_err();
        match err {
            AtlasError::SchemaMismatch { expected, found } => {
                assert_eq!(expected, vec!["id".to_string(), "title".to_string()]);
                assert_eq!(found, vec!["headline".to_string(), "id".to_string()]);
            }
            other => panic!("expected SchemaMismatch, got {:?}", other),
        }
    }

    #[test]
    fn injected_id_participates_in_key_set() {
        // Record 1 gets an injected id, record 2 already has one; the key
        // sets must still agree.
        let mut records = vec![
            record(json!({"text": "a"})),
            record(json!({"id": "r2", "text": "b"})),
        ];
        validate_and_correct_metadata(&mut records, "id", Modality::Text, true).unwrap();
    }

    #[test]
    fn reserved_prefix_rejected() {
        let mut records = vec![record(json!({"id": "1", "_hidden": "x"}))];
        let err =
            validate_and_correct_metadata(&mut records, "id", Modality::Text, true).unwrap_err();
        assert!(matches!(err, AtlasError::MetadataKeyReserved { key } if key == "_hidden"));
    }

    #[test]
    fn date_keys_must_stay_dates() {
        let mut records = vec![
            record(json!({"id": "1", "published": "2022-01-30"})),
            record(json!({"id": "2", "published": "yesterday"})),
        ];
        let err =
            validate_and_correct_metadata(&mut records, "id", Modality::Text, true).unwrap_err();
        assert!(matches!(err, AtlasError::InvalidTimestamp { key, .. } if key == "published"));
    }

    #[test]
    fn non_date_keys_are_not_date_checked() {
        let mut records = vec![
            record(json!({"id": "1", "note": "free text"})),
            record(json!({"id": "2", "note": "2022-01-30"})),
        ];
        validate_and_correct_metadata(&mut records, "id", Modality::Text, true).unwrap();
    }

    #[test]
    fn empty_strings_replaced_with_null_literal() {
        let mut records = vec![record(json!({"id": "1", "body": ""}))];
        validate_and_correct_metadata(&mut records, "id", Modality::Text, true).unwrap();
        assert_eq!(records[0].get("body").unwrap(), "null");
    }

    #[test]
    fn empty_strings_rejected_when_replacement_disabled() {
        let mut records = vec![record(json!({"id": "1", "body": ""}))];
        let err =
            validate_and_correct_metadata(&mut records, "id", Modality::Text, false).unwrap_err();
        assert!(matches!(err, AtlasError::EmptyValueNotAllowed { key } if key == "body"));
    }

    #[test]
    fn empty_strings_kept_for_embedding_projects() {
        let mut records = vec![record(json!({"id": "1", "body": ""}))];
        validate_and_correct_metadata(&mut records, "id", Modality::Embedding, false).unwrap();
        assert_eq!(records[0].get("body").unwrap(), "");
    }

    #[test]
    fn nested_values_rejected() {
        let mut records = vec![record(json!({"id": "1", "tags": ["a", "b"]}))];
        let err =
            validate_and_correct_metadata(&mut records, "id", Modality::Text, true).unwrap_err();
        assert!(
            matches!(err, AtlasError::UnsupportedValueType { key, found } if key == "tags" && found == "array")
        );
    }

    #[test]
    fn bool_values_rejected() {
        let mut records = vec![record(json!({"id": "1", "flag": true}))];
        let err =
            validate_and_correct_metadata(&mut records, "id", Modality::Text, true).unwrap_err();
        assert!(matches!(err, AtlasError::UnsupportedValueType { .. }));
    }

    #[test]
    fn ints_and_floats_accepted() {
        let mut records = vec![record(json!({"id": "1", "count": 3, "score": 0.5}))];
        validate_and_correct_metadata(&mut records, "id", Modality::Text, true).unwrap();
    }
}
