//! Looping playback of a sample sequence for frame-driven animators.
//!
//! Animators call [`Playback::frame`] with the wall time since their loop
//! started. The sequence is replayed modulo its final timestamp and the
//! state between two samples is linearly interpolated.

use serde::Serialize;

use crate::sample::{SamplePoint, SampleSequence};

/// The state handed to an animator routine for one frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Frame {
    /// Simulation time shown by this frame.
    pub time: f64,
    pub state: SamplePoint,
}

pub struct Playback<'a> {
    timed: Vec<&'a SamplePoint>,
    fallback: &'a SamplePoint,
    period: f64,
}

impl<'a> Playback<'a> {
    /// Points are expected in nondecreasing `t`; points whose `t` is not
    /// finite are skipped.
    pub fn new(samples: &'a SampleSequence) -> Self {
        let timed: Vec<_> = samples.iter().filter(|p| p.t.is_finite()).collect();
        let t_last = samples.t_last();
        let period = if t_last.is_finite() && t_last > 0.0 {
            t_last
        } else {
            0.0
        };
        Self {
            timed,
            fallback: samples.first(),
            period,
        }
    }

    /// Loop length in simulation seconds; 0 when the sequence has no
    /// positive final timestamp.
    pub fn period(&self) -> f64 {
        self.period
    }

    pub fn animation_time(&self, elapsed: f64) -> f64 {
        if self.period <= 0.0 || !elapsed.is_finite() {
            return 0.0;
        }
        elapsed.rem_euclid(self.period)
    }

    pub fn frame(&self, elapsed: f64) -> Frame {
        let time = self.animation_time(elapsed);
        Frame {
            time,
            state: self.state_at(time),
        }
    }

    /// Interpolated state at simulation time `time`.
    pub fn state_at(&self, time: f64) -> SamplePoint {
        let (Some(first), Some(last)) = (self.timed.first(), self.timed.last()) else {
            return self.fallback.clone();
        };
        if time <= first.t {
            return (*first).clone();
        }
        if time >= last.t {
            return (*last).clone();
        }
        let idx = self.timed.partition_point(|p| p.t <= time);
        let (a, b) = (self.timed[idx - 1], self.timed[idx]);
        let span = b.t - a.t;
        let alpha = if span > 0.0 { (time - a.t) / span } else { 0.0 };
        let mut state = lerp(a, b, alpha);
        state.t = time;
        state
    }
}

/// Fields present on both points are blended; fields only on `a` are kept.
fn lerp(a: &SamplePoint, b: &SamplePoint, alpha: f64) -> SamplePoint {
    let mut out = a.clone();
    for key in a.keys() {
        if let (Some(av), Some(bv)) = (a.get(key), b.get(key)) {
            out.set(key, av + (bv - av) * alpha);
        }
    }
    out
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

    #[test]
    fn test_animation_time_wraps() {
        let s = samples(json!([{"t": 0, "x": 0, "y": 0}, {"t": 2, "x": 4, "y": 0}]));
        let playback = Playback::new(&s);
        assert_eq!(playback.period(), 2.0);
        assert!((playback.animation_time(5.5) - 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_interpolates_between_points() {
        let s = samples(json!([
            {"t": 0, "x": 0, "y": 10, "vx": 1, "energy": 5},
            {"t": 1, "x": 2, "y": 20, "vx": 3}
        ]));
        let state = Playback::new(&s).state_at(0.25);
        assert_eq!(state.t, 0.25);
        assert!((state.x - 0.5).abs() < 1e-12);
        assert!((state.y - 12.5).abs() < 1e-12);
        assert_eq!(state.vx, Some(1.5));
        // energy missing on the second point: held from the first
        assert_eq!(state.energy, Some(5.0));
    }

    #[test]
    fn test_clamps_outside_range() {
        let s = samples(json!([{"t": 1, "x": 1, "y": 1}, {"t": 2, "x": 2, "y": 2}]));
        let playback = Playback::new(&s);
        assert_eq!(playback.state_at(0.0).x, 1.0);
        assert_eq!(playback.state_at(9.0).x, 2.0);
    }

    #[test]
    fn test_zero_period_freezes_on_first_point() {
        let s = samples(json!([{"t": 0, "x": 3, "y": 4}]));
        let frame = Playback::new(&s).frame(12.0);
        assert_eq!(frame.time, 0.0);
        assert_eq!(frame.state.x, 3.0);
    }

    #[test]
    fn test_skips_untimed_points() {
        let s = samples(json!([
            {"t": 0, "x": 0, "y": 0},
            {"x": 100, "y": 100},
            {"t": 2, "x": 2, "y": 2}
        ]));
        let state = Playback::new(&s).state_at(1.0);
        assert!((state.x - 1.0).abs() < 1e-12);
    }
}
