use indexmap::IndexMap;
use serde::Serialize;

use crate::value::ScriptValue;

/// One time-stamped state of the simulated system.
///
/// `t`, `x`, `y` are guaranteed numeric only on the first point of a
/// sequence. Later points that lacked them carry NaN.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SamplePoint {
    pub t: f64,
    pub x: f64,
    pub y: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub z: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vx: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vy: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vz: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub energy: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub px: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub py: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pz: Option<f64>,
    /// Any other numeric field (circuit voltages, angles, ...).
    #[serde(flatten)]
    pub extra: IndexMap<String, f64>,
}

pub(crate) const CORE_FIELDS: [&str; 3] = ["t", "x", "y"];

impl SamplePoint {
    pub fn new(t: f64, x: f64, y: f64) -> Self {
        Self {
            t,
            x,
            y,
            z: None,
            vx: None,
            vy: None,
            vz: None,
            energy: None,
            px: None,
            py: None,
            pz: None,
            extra: IndexMap::new(),
        }
    }

    /// Placeholder for an element that was not a record at all.
    pub(crate) fn blank() -> Self {
        Self::new(f64::NAN, f64::NAN, f64::NAN)
    }

    pub(crate) fn from_record(fields: &IndexMap<String, ScriptValue>) -> Self {
        let core = |key: &str| {
            fields
                .get(key)
                .and_then(ScriptValue::as_number)
                .unwrap_or(f64::NAN)
        };
        let mut point = Self::new(core("t"), core("x"), core("y"));
        for (key, value) in fields {
            if CORE_FIELDS.contains(&key.as_str()) {
                continue;
            }
            if let Some(n) = value.as_number() {
                point.set(key, n);
            }
        }
        point
    }

    /// Look up a field by its wire name.
    pub fn get(&self, key: &str) -> Option<f64> {
        match key {
            "t" => Some(self.t),
            "x" => Some(self.x),
            "y" => Some(self.y),
            "z" => self.z,
            "vx" => self.vx,
            "vy" => self.vy,
            "vz" => self.vz,
            "energy" => self.energy,
            "px" => self.px,
            "py" => self.py,
            "pz" => self.pz,
            other => self.extra.get(other).copied(),
        }
    }

    /// Set a field by its wire name.
    pub fn set(&mut self, key: &str, value: f64) {
        match key {
            "t" => self.t = value,
            "x" => self.x = value,
            "y" => self.y = value,
            "z" => self.z = Some(value),
            "vx" => self.vx = Some(value),
            "vy" => self.vy = Some(value),
            "vz" => self.vz = Some(value),
            "energy" => self.energy = Some(value),
            "px" => self.px = Some(value),
            "py" => self.py = Some(value),
            "pz" => self.pz = Some(value),
            other => {
                self.extra.insert(other.to_string(), value);
            }
        }
    }

    /// Names of every field present on this point, core fields first.
    pub fn keys(&self) -> Vec<&str> {
        let optional = [
            ("z", self.z),
            ("vx", self.vx),
            ("vy", self.vy),
            ("vz", self.vz),
            ("energy", self.energy),
            ("px", self.px),
            ("py", self.py),
            ("pz", self.pz),
        ];
        let mut keys: Vec<&str> = CORE_FIELDS.to_vec();
        keys.extend(optional.iter().filter(|(_, v)| v.is_some()).map(|(k, _)| *k));
        keys.extend(self.extra.keys().map(String::as_str));
        keys
    }
}

/// A validated, non-empty sequence of sample points.
///
/// Only [`crate::validate`] builds one, so holders can rely on the first
/// point having numeric `t`, `x`, `y`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct SampleSequence {
    points: Vec<SamplePoint>,
}

impl SampleSequence {
    pub(crate) fn from_points(points: Vec<SamplePoint>) -> Self {
        debug_assert!(!points.is_empty());
        Self { points }
    }

    pub fn first(&self) -> &SamplePoint {
        &self.points[0]
    }

    pub fn last(&self) -> &SamplePoint {
        &self.points[self.points.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Always false; kept for the `len`/`is_empty` pair.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[SamplePoint] {
        &self.points
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SamplePoint> {
        self.points.iter()
    }

    /// Whether the first point carries `key`; the representative check used
    /// by chart selection.
    pub fn first_has(&self, key: &str) -> bool {
        self.first().get(key).is_some()
    }

    /// Whether any point carries `key`.
    pub fn any_has(&self, key: &str) -> bool {
        self.points.iter().any(|p| p.get(key).is_some())
    }

    /// Final timestamp, the loop period of animations.
    pub fn t_last(&self) -> f64 {
        self.last().t
    }

    /// Every `every`-th point, always including the last one.
    pub fn decimate(&self, every: usize) -> Vec<&SamplePoint> {
        let every = every.max(1);
        let last = self.points.len() - 1;
        self.points
            .iter()
            .enumerate()
            .filter(|(i, _)| i % every == 0 || *i == last)
            .map(|(_, p)| p)
            .collect()
    }
}

impl<'a> IntoIterator for &'a SampleSequence {
    type Item = &'a SamplePoint;
    type IntoIter = std::slice::Iter<'a, SamplePoint>;

    fn into_iter(self) -> Self::IntoIter {
        self.points.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: serde_json::Value) -> IndexMap<String, ScriptValue> {
        match ScriptValue::from(value) {
            ScriptValue::Record(fields) => fields,
            other => panic!("not a record: {other:?}"),
        }
    }

    #[test]
    fn test_from_record_splits_known_and_extra_fields() {
        let point = SamplePoint::from_record(&record(json!({
            "t": 0, "x": 1.0, "y": 2.0, "vx": 3.0, "energy": 4.5, "vc": 1.2, "tag": "a"
        })));
        assert_eq!(point.t, 0.0);
        assert_eq!(point.vx, Some(3.0));
        assert_eq!(point.vy, None);
        assert_eq!(point.energy, Some(4.5));
        assert_eq!(point.extra.get("vc"), Some(&1.2));
        assert!(!point.extra.contains_key("tag"));
    }

    #[test]
    fn test_missing_core_field_is_nan() {
        let point = SamplePoint::from_record(&record(json!({"t": 1.0, "y": 0.0})));
        assert!(point.x.is_nan());
        assert_eq!(point.get("t"), Some(1.0));
    }

    #[test]
    fn test_keys_order() {
        let point = SamplePoint::from_record(&record(json!({
            "vc": 0.1, "t": 0, "x": 0, "y": 0, "z": 0.5
        })));
        assert_eq!(point.keys(), vec!["t", "x", "y", "z", "vc"]);
    }

    #[test]
    fn test_decimate_keeps_last_point() {
        let points = (0..5).map(|i| SamplePoint::new(i as f64, 0.0, 0.0)).collect();
        let seq = SampleSequence::from_points(points);
        let ts: Vec<f64> = seq.decimate(3).iter().map(|p| p.t).collect();
        assert_eq!(ts, vec![0.0, 3.0, 4.0]);
        assert_eq!(seq.decimate(0).len(), 5);
    }

    #[test]
    fn test_serializes_flat() {
        let mut point = SamplePoint::new(0.0, 1.0, 2.0);
        point.set("vr", 5.0);
        point.set("px", 0.25);
        let value = serde_json::to_value(&point).unwrap();
        assert_eq!(value, json!({"t": 0.0, "x": 1.0, "y": 2.0, "px": 0.25, "vr": 5.0}));
    }
}
