//! Structural check of sampler output.
//!
//! Only the container and the first element are inspected. Later elements
//! may omit fields the first one has; they are converted as-is.

use crate::error::ShapeError;
use crate::sample::{SamplePoint, SampleSequence, CORE_FIELDS};
use crate::value::ScriptValue;

/// Decide pass/fail for a produced value without converting it.
pub fn check_shape(value: &ScriptValue) -> Result<(), ShapeError> {
    let items = match value {
        ScriptValue::List(items) => items,
        other => {
            return Err(ShapeError::NotASequence {
                found: other.kind(),
            })
        }
    };
    let first = match items.first() {
        Some(ScriptValue::Record(fields)) => fields,
        Some(other) => {
            return Err(ShapeError::FirstPointNotRecord {
                found: other.kind(),
            })
        }
        None => return Err(ShapeError::Empty),
    };
    for field in CORE_FIELDS {
        if first.get(field).and_then(ScriptValue::as_number).is_none() {
            return Err(ShapeError::MissingField { field });
        }
    }
    Ok(())
}

/// Validate a produced value and convert it into a sample sequence.
pub fn validate(value: ScriptValue) -> Result<SampleSequence, ShapeError> {
    check_shape(&value)?;
    let items = match value {
        ScriptValue::List(items) => items,
        other => {
            return Err(ShapeError::NotASequence {
                found: other.kind(),
            })
        }
    };
    let points = items
        .iter()
        .map(|item| match item {
            ScriptValue::Record(fields) => SamplePoint::from_record(fields),
            _ => SamplePoint::blank(),
        })
        .collect();
    Ok(SampleSequence::from_points(points))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn check(value: serde_json::Value) -> Result<(), ShapeError> {
        check_shape(&ScriptValue::from(value))
    }

    #[test]
    fn test_rejects_number() {
        assert_eq!(
            check(json!(42)),
            Err(ShapeError::NotASequence { found: "a number" })
        );
    }

    #[test]
    fn test_rejects_mapping() {
        assert_eq!(
            check(json!({"t": 0, "x": 0, "y": 0})),
            Err(ShapeError::NotASequence { found: "an object" })
        );
    }

    #[test]
    fn test_rejects_null() {
        assert_eq!(
            check(json!(null)),
            Err(ShapeError::NotASequence { found: "nothing" })
        );
    }

    #[test]
    fn test_rejects_empty_sequence() {
        assert_eq!(check(json!([])), Err(ShapeError::Empty));
    }

    #[test]
    fn test_rejects_missing_or_non_numeric_core_field() {
        assert_eq!(
            check(json!([{"x": 0, "y": 0}])),
            Err(ShapeError::MissingField { field: "t" })
        );
        assert_eq!(
            check(json!([{"t": 0, "x": "0", "y": 0}])),
            Err(ShapeError::MissingField { field: "x" })
        );
        assert_eq!(
            check(json!([{"t": 0, "x": 0, "y": null}])),
            Err(ShapeError::MissingField { field: "y" })
        );
    }

    #[test]
    fn test_rejects_non_record_first_element() {
        assert_eq!(
            check(json!([1, 2, 3])),
            Err(ShapeError::FirstPointNotRecord { found: "a number" })
        );
    }

    #[test]
    fn test_accepts_heterogeneous_tail() {
        let seq = validate(ScriptValue::from(json!([
            {"t": 0, "x": 0, "y": 0, "energy": 1.0, "px": 0.5, "custom": 9},
            {"t": 1, "x": 1, "y": 1},
            "not a point"
        ])))
        .unwrap();
        assert_eq!(seq.len(), 3);
        assert_eq!(seq.first().energy, Some(1.0));
        assert_eq!(seq.first().extra.get("custom"), Some(&9.0));
        assert_eq!(seq.points()[1].energy, None);
        assert!(seq.points()[2].t.is_nan());
    }

    #[test]
    fn test_returns_values_unchanged() {
        let seq = validate(ScriptValue::from(json!([
            {"t": 0, "x": 0, "y": 0, "vx": 7.07, "vy": 7.07},
            {"t": 1, "x": 7.07, "y": 2.98, "vx": 7.07, "vy": -2.25}
        ])))
        .unwrap();
        let value = serde_json::to_value(&seq).unwrap();
        assert_eq!(
            value,
            json!([
                {"t": 0.0, "x": 0.0, "y": 0.0, "vx": 7.07, "vy": 7.07},
                {"t": 1.0, "x": 7.07, "y": 2.98, "vx": 7.07, "vy": -2.25}
            ])
        );
    }
}
