use indexmap::IndexMap;

/// A dynamically typed value returned by a sampler routine.
///
/// Engines convert their native values into this shape so the validator
/// does not depend on any particular interpreter.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptValue {
    Unit,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<ScriptValue>),
    Record(IndexMap<String, ScriptValue>),
}

impl ScriptValue {
    /// Type name used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Unit => "nothing",
            Self::Bool(_) => "a boolean",
            Self::Int(_) | Self::Float(_) => "a number",
            Self::Text(_) => "a string",
            Self::List(_) => "an array",
            Self::Record(_) => "an object",
        }
    }

    /// Numeric view; integers widen to floats.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }
}

impl From<serde_json::Value> for ScriptValue {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => Self::Unit,
            Value::Bool(b) => Self::Bool(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Int(i),
                None => Self::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => Self::Text(s),
            Value::Array(items) => Self::List(items.into_iter().map(Self::from).collect()),
            Value::Object(fields) => Self::Record(
                fields
                    .into_iter()
                    .map(|(k, v)| (k, Self::from(v)))
                    .collect(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_json() {
        let value = ScriptValue::from(json!([{"t": 0, "x": 1.5, "label": "a"}, null]));
        let ScriptValue::List(items) = value else {
            panic!("expected list");
        };
        assert_eq!(items.len(), 2);
        assert_eq!(items[1], ScriptValue::Unit);
        let ScriptValue::Record(fields) = &items[0] else {
            panic!("expected record");
        };
        assert_eq!(fields["t"], ScriptValue::Int(0));
        assert_eq!(fields["x"].as_number(), Some(1.5));
        assert_eq!(fields["label"].as_number(), None);
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(ScriptValue::Int(3).kind(), "a number");
        assert_eq!(ScriptValue::Record(IndexMap::new()).kind(), "an object");
    }
}
