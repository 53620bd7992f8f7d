use std::collections::HashSet;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{PhysimError, PhysimResult, RequestError};

// ---------------------------------------------------------------------------
// Solution
// ---------------------------------------------------------------------------

/// The model's answer to one problem description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Solution {
    /// Markdown + LaTeX analysis of the problem.
    pub explanation: String,
    /// Body of the sampler routine.
    #[serde(rename = "numericalCode")]
    pub numerical_code: String,
    /// 2D animator routine, drawn by an external canvas renderer.
    #[serde(rename = "simulationCode")]
    pub simulation_code: String,
    /// 3D animator routine, only for problems with genuine 3D motion.
    #[serde(
        rename = "simulationCode3D",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub simulation_code_3d: Option<String>,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
}

impl Solution {
    /// Check the invariants the rest of the pipeline relies on: parameter
    /// names are identifiers and unique within the solution.
    pub fn check(&self) -> PhysimResult<()> {
        let mut seen = HashSet::new();
        for p in &self.parameters {
            if !is_identifier(&p.name) {
                return Err(PhysimError::InvalidSolution(format!(
                    "parameter name is not an identifier: {:?}",
                    p.name
                )));
            }
            if !seen.insert(p.name.as_str()) {
                return Err(PhysimError::InvalidSolution(format!(
                    "duplicate parameter name: {}",
                    p.name
                )));
            }
        }
        Ok(())
    }

    /// Parse the structured output of a model call.
    ///
    /// Accepts a bare JSON object or one wrapped in a Markdown code fence.
    /// Strict JSON is tried first, then lenient JSON (comments, trailing
    /// commas), since models emit both.
    pub fn from_response(text: &str) -> Result<Self, RequestError> {
        let body = strip_code_fence(text.trim());
        let solution: Solution = match serde_json::from_str(body) {
            Ok(s) => s,
            Err(strict) => {
                tracing::debug!("strict parse failed, retrying leniently: {strict}");
                parse_lenient(body)
                    .map_err(|e| RequestError::Malformed(format!("invalid JSON: {e}")))?
            }
        };
        solution
            .check()
            .map_err(|e| RequestError::Malformed(e.to_string()))?;
        Ok(solution)
    }

    pub fn has_parameters(&self) -> bool {
        !self.parameters.is_empty()
    }

    /// A blank 3D routine counts as absent.
    pub fn has_3d_code(&self) -> bool {
        self.simulation_code_3d
            .as_deref()
            .is_some_and(|code| !code.trim().is_empty())
    }

    pub fn parameter(&self, name: &str) -> Option<&Parameter> {
        self.parameters.iter().find(|p| p.name == name)
    }
}

fn parse_lenient(body: &str) -> Result<Solution, serde_json_lenient::Error> {
    let mut de = serde_json_lenient::Deserializer::from_str(body);
    de.set_ignore_trailing_commas(true);
    de.set_allow_comments(true);
    let solution = Solution::deserialize(&mut de)?;
    de.end()?;
    Ok(solution)
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Drop the info string ("json", "JSON", ...) on the opening line.
    let rest = match rest.find('\n') {
        Some(i) => &rest[i + 1..],
        None => rest,
    };
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    name != "_" && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

// ---------------------------------------------------------------------------
// Parameter
// ---------------------------------------------------------------------------

/// A named, bounded, user-adjustable input of the sampler routine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    /// Binding name inside the sampler routine.
    pub name: String,
    pub label: String,
    /// Initial value taken from the problem text.
    pub value: f64,
    pub min: f64,
    pub max: f64,
    pub step: f64,
}

// ---------------------------------------------------------------------------
// ParameterValues
// ---------------------------------------------------------------------------

/// Current values of a solution's parameters, in declaration order.
///
/// The order is the order the sampler routine binds them in.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterValues {
    values: IndexMap<String, f64>,
}

impl ParameterValues {
    /// Seed from the solution's initial values. `None` when the solution
    /// declares no parameters.
    pub fn seed(parameters: &[Parameter]) -> Option<Self> {
        if parameters.is_empty() {
            return None;
        }
        Some(Self {
            values: parameters
                .iter()
                .map(|p| (p.name.clone(), p.value))
                .collect(),
        })
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }

    /// Replace one entry. No range clamping happens here.
    pub fn set(&mut self, name: &str, value: f64) -> PhysimResult<()> {
        match self.values.get_mut(name) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(PhysimError::UnknownParameter(name.to_string())),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl FromIterator<(String, f64)> for ParameterValues {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn projectile() -> serde_json::Value {
        json!({
            "explanation": "Uniform gravity, no drag.",
            "numericalCode": "return [#{t: 0.0, x: 0.0, y: 0.0}];",
            "simulationCode": "(ctx, data, time, canvas) => {}",
            "parameters": [
                {"name": "v0", "label": "Initial speed", "value": 10, "min": 5, "max": 15, "step": 1},
                {"name": "angle", "label": "Angle", "value": 45, "min": 10, "max": 80, "step": 5}
            ]
        })
    }

    #[test]
    fn test_parse_response() {
        let text = projectile().to_string();
        let solution = Solution::from_response(&text).unwrap();
        assert_eq!(solution.parameters.len(), 2);
        assert_eq!(solution.parameters[0].name, "v0");
        assert!(solution.simulation_code_3d.is_none());
    }

    #[test]
    fn test_empty_3d_routine_counts_as_absent() {
        let mut value = projectile();
        value["simulationCode3D"] = json!("");
        let solution = Solution::from_response(&value.to_string()).unwrap();
        assert!(!solution.has_3d_code());
        value["simulationCode3D"] = json!("(scene, data, time) => {}");
        let solution = Solution::from_response(&value.to_string()).unwrap();
        assert!(solution.has_3d_code());
    }

    #[test]
    fn test_parse_fenced_response() {
        let text = format!("```json\n{}\n```", projectile());
        let solution = Solution::from_response(&text).unwrap();
        assert_eq!(solution.explanation, "Uniform gravity, no drag.");
    }

    #[test]
    fn test_parse_lenient_response() {
        let text = r#"{
            // model commentary
            "explanation": "e",
            "numericalCode": "return [];",
            "simulationCode": "",
            "parameters": [],
        }"#;
        let solution = Solution::from_response(text).unwrap();
        assert!(!solution.has_parameters());
    }

    #[test]
    fn test_parse_missing_field_is_malformed() {
        let err = Solution::from_response(r#"{"explanation": "only"}"#).unwrap_err();
        assert!(matches!(err, RequestError::Malformed(_)));
    }

    #[test]
    fn test_duplicate_parameter_rejected() {
        let mut value = projectile();
        value["parameters"][1]["name"] = json!("v0");
        let err = Solution::from_response(&value.to_string()).unwrap_err();
        assert!(err.to_string().contains("duplicate parameter name"));
    }

    #[test]
    fn test_non_identifier_parameter_rejected() {
        let mut value = projectile();
        value["parameters"][0]["name"] = json!("initial speed");
        assert!(Solution::from_response(&value.to_string()).is_err());
    }

    #[test]
    fn test_serialize_keeps_wire_names() {
        let solution: Solution = serde_json::from_value(projectile()).unwrap();
        let value = serde_json::to_value(&solution).unwrap();
        assert!(value.get("numericalCode").is_some());
        assert!(value.get("simulationCode3D").is_none());
    }

    #[test]
    fn test_seed_values_in_declaration_order() {
        let solution: Solution = serde_json::from_value(projectile()).unwrap();
        let values = ParameterValues::seed(&solution.parameters).unwrap();
        let names: Vec<_> = values.names().collect();
        assert_eq!(names, vec!["v0", "angle"]);
        assert_eq!(values.get("angle"), Some(45.0));
    }

    #[test]
    fn test_seed_without_parameters_is_none() {
        assert!(ParameterValues::seed(&[]).is_none());
    }

    #[test]
    fn test_set_does_not_clamp() {
        let solution: Solution = serde_json::from_value(projectile()).unwrap();
        let mut values = ParameterValues::seed(&solution.parameters).unwrap();
        values.set("v0", 1000.0).unwrap();
        assert_eq!(values.get("v0"), Some(1000.0));
        assert_eq!(solution.parameter("v0").unwrap().max, 15.0);
    }

    #[test]
    fn test_set_unknown_parameter() {
        let solution: Solution = serde_json::from_value(projectile()).unwrap();
        let mut values = ParameterValues::seed(&solution.parameters).unwrap();
        let err = values.set("mass", 1.0).unwrap_err();
        assert!(matches!(err, PhysimError::UnknownParameter(n) if n == "mass"));
        assert_eq!(values.len(), 2);
    }
}
