use std::time::Instant;

use tracing::{debug, warn};

use crate::error::SamplerError;
use crate::sample::SampleSequence;
use crate::solution::ParameterValues;
use crate::validate::validate;
use crate::value::ScriptValue;

/// An interpreter able to run sampler routine text.
///
/// The keys of `params` are bound as names visible to the routine, in
/// order, with the matching values. `None` and an empty mapping both mean
/// nothing is bound.
pub trait Sampler {
    fn run(
        &self,
        code: &str,
        params: Option<&ParameterValues>,
    ) -> Result<ScriptValue, SamplerError>;

    /// Whether `name` can be bound as a parameter, e.g. it is not a
    /// reserved word of the script language. Returns the reason if not.
    fn check_binding(&self, _name: &str) -> Result<(), String> {
        Ok(())
    }
}

impl<F> Sampler for F
where
    F: Fn(&str, Option<&ParameterValues>) -> Result<ScriptValue, SamplerError>,
{
    fn run(
        &self,
        code: &str,
        params: Option<&ParameterValues>,
    ) -> Result<ScriptValue, SamplerError> {
        self(code, params)
    }
}

/// Run a sampler routine and validate its output.
pub fn execute<S: Sampler + ?Sized>(
    sampler: &S,
    code: &str,
    params: Option<&ParameterValues>,
) -> Result<SampleSequence, SamplerError> {
    let started = Instant::now();
    let result = sampler
        .run(code, params)
        .and_then(|value| validate(value).map_err(SamplerError::from));
    match result {
        Ok(samples) => {
            debug!(
                points = samples.len(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "sampler run"
            );
            Ok(samples)
        }
        Err(e) => {
            warn!("sampler run failed: {e}");
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ShapeError;
    use serde_json::json;

    fn echo_params(
        _code: &str,
        params: Option<&ParameterValues>,
    ) -> Result<ScriptValue, SamplerError> {
        let mut point = json!({"t": 0, "x": 0, "y": 0});
        if let Some(params) = params {
            for (name, value) in params.iter() {
                point[name] = json!(value);
            }
        }
        Ok(ScriptValue::from(json!([point])))
    }

    #[test]
    fn test_execute_binds_params() {
        let params: ParameterValues = [("v0".to_string(), 12.0)].into_iter().collect();
        let samples = execute(&echo_params, "", Some(&params)).unwrap();
        assert_eq!(samples.first().extra.get("v0"), Some(&12.0));
    }

    #[test]
    fn test_execute_reports_shape_failure() {
        let empty = |_: &str, _: Option<&ParameterValues>| -> Result<ScriptValue, SamplerError> {
            Ok(ScriptValue::List(Vec::new()))
        };
        let err = execute(&empty, "", None).unwrap_err();
        assert_eq!(err, SamplerError::Shape(ShapeError::Empty));
    }

    #[test]
    fn test_execute_passes_runtime_failure_through() {
        let boom = |_: &str, _: Option<&ParameterValues>| -> Result<ScriptValue, SamplerError> {
            Err(SamplerError::Runtime("boom".into()))
        };
        let err = execute(&boom, "", None).unwrap_err();
        assert!(err.to_string().contains("boom"));
    }
}
