//! Chart selection and column extraction for charting back ends.

use serde::Serialize;

use crate::sample::SampleSequence;

/// One plotted line: the field it reads and its legend label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Series {
    pub key: &'static str,
    pub label: &'static str,
}

/// A chart: the field on the horizontal axis plus the lines drawn against it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Chart {
    pub id: &'static str,
    pub title: &'static str,
    pub x_key: &'static str,
    pub series: Vec<Series>,
}

const fn series(key: &'static str, label: &'static str) -> Series {
    Series { key, label }
}

/// Pick the charts worth drawing. Optional charts and lines are decided by
/// the first point only.
pub fn detect_charts(samples: &SampleSequence) -> Vec<Chart> {
    let has = |key| samples.first_has(key);

    let mut charts = vec![Chart {
        id: "trajectory",
        title: "Trajectory (y vs x)",
        x_key: "x",
        series: vec![series("y", "path")],
    }];

    let mut position = vec![series("x", "position x"), series("y", "position y")];
    if has("z") {
        position.push(series("z", "position z"));
    }
    charts.push(Chart {
        id: "position",
        title: "Position vs time",
        x_key: "t",
        series: position,
    });

    let mut velocity = vec![series("vx", "velocity vx"), series("vy", "velocity vy")];
    if has("vz") {
        velocity.push(series("vz", "velocity vz"));
    }
    charts.push(Chart {
        id: "velocity",
        title: "Velocity vs time",
        x_key: "t",
        series: velocity,
    });

    if has("energy") {
        charts.push(Chart {
            id: "energy",
            title: "Energy vs time",
            x_key: "t",
            series: vec![series("energy", "total energy")],
        });
    }

    if has("px") && has("py") {
        let mut momentum = vec![series("px", "momentum px"), series("py", "momentum py")];
        if has("pz") {
            momentum.push(series("pz", "momentum pz"));
        }
        charts.push(Chart {
            id: "momentum",
            title: "Momentum vs time",
            x_key: "t",
            series: momentum,
        });
    }

    charts
}

/// Whether a 3D trajectory plot makes sense: any point carries `z`.
pub fn has_3d_data(samples: &SampleSequence) -> bool {
    samples.any_has("z")
}

/// Values of one field, `None` where a point lacks it.
pub fn column(samples: &SampleSequence, key: &str) -> Vec<Option<f64>> {
    samples.iter().map(|p| p.get(key)).collect()
}

/// Min and max over the present, finite values of a field.
pub fn column_range(samples: &SampleSequence, key: &str) -> Option<(f64, f64)> {
    samples
        .iter()
        .filter_map(|p| p.get(key))
        .filter(|v| v.is_finite())
        .fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate::validate;
    use crate::value::ScriptValue;
    use serde_json::json;

    fn samples(value: serde_json::Value) -> SampleSequence {
        validate(ScriptValue::from(value)).unwrap()
    }

    fn ids(charts: &[Chart]) -> Vec<&'static str> {
        charts.iter().map(|c| c.id).collect()
    }

    #[test]
    fn test_planar_charts() {
        let s = samples(json!([{"t": 0, "x": 0, "y": 0, "vx": 1, "vy": 1}]));
        let charts = detect_charts(&s);
        assert_eq!(ids(&charts), vec!["trajectory", "position", "velocity"]);
        assert_eq!(charts[1].series.len(), 2);
    }

    #[test]
    fn test_spatial_charts_follow_first_point() {
        let s = samples(json!([
            {"t": 0, "x": 0, "y": 0, "z": 0, "vz": 1, "energy": 2, "px": 0, "py": 0, "pz": 1},
            {"t": 1, "x": 1, "y": 1}
        ]));
        let charts = detect_charts(&s);
        assert_eq!(
            ids(&charts),
            vec!["trajectory", "position", "velocity", "energy", "momentum"]
        );
        assert_eq!(charts[4].series.len(), 3);
        assert_eq!(column(&s, "energy"), vec![Some(2.0), None]);
    }

    #[test]
    fn test_momentum_requires_both_components() {
        let s = samples(json!([{"t": 0, "x": 0, "y": 0, "px": 1}]));
        assert!(!ids(&detect_charts(&s)).contains(&"momentum"));
    }

    #[test]
    fn test_3d_data_uses_any_point() {
        let s = samples(json!([{"t": 0, "x": 0, "y": 0}, {"t": 1, "x": 0, "y": 0, "z": 3}]));
        assert!(has_3d_data(&s));
        assert!(!s.first_has("z"));
    }

    #[test]
    fn test_column_range_skips_missing_and_nan() {
        let s = samples(json!([
            {"t": 0, "x": -2, "y": 0},
            {"t": 1, "y": 5},
            {"t": 2, "x": 4, "y": 1}
        ]));
        assert_eq!(column_range(&s, "x"), Some((-2.0, 4.0)));
        assert_eq!(column_range(&s, "energy"), None);
    }
}
