use crate::error::RequestError;
use crate::solution::Solution;

/// A generative-model backend that turns a problem description into a
/// [`Solution`].
///
/// One request is outstanding at a time; callers gate new solves on the
/// previous one finishing.
pub trait SolutionClient {
    fn solve(&mut self, problem: &str) -> Result<Solution, RequestError>;
}

// ---------------------------------------------------------------------------
// Example problems
// ---------------------------------------------------------------------------

/// A canned problem statement offered next to the free-text input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExampleProblem {
    pub key: &'static str,
    pub name: &'static str,
    pub prompt: &'static str,
}

pub const EXAMPLE_PROBLEMS: [ExampleProblem; 4] = [
    ExampleProblem {
        key: "projectile",
        name: "Projectile",
        prompt: "Analyze the motion of a projectile launched from the origin with an initial \
                 speed of 10 m/s at a launch angle of 45 degrees. Ignore air resistance.",
    },
    ExampleProblem {
        key: "pendulum",
        name: "Simple pendulum",
        prompt: "Analyze the oscillations of a simple pendulum of length 1 m and mass 0.5 kg \
                 released from an initial angle of 15 degrees. Do not use the small-angle \
                 approximation.",
    },
    ExampleProblem {
        key: "orbit",
        name: "Planetary motion",
        prompt: "Simulate the motion of a planet around a fixed star at the origin under \
                 gravity. Initial conditions: the planet is at (1, 0) with initial velocity \
                 (0, 5). The star is much more massive than the planet.",
    },
    ExampleProblem {
        key: "helix",
        name: "Helical motion",
        prompt: "Analyze a charged particle with initial position x=1, y=0, z=0 and initial \
                 velocity vx=0, vy=2, vz=1 in a uniform magnetic field along the z axis. The \
                 motion should be a helix.",
    },
];

pub fn example_problem(key: &str) -> Option<&'static ExampleProblem> {
    EXAMPLE_PROBLEMS
        .iter()
        .find(|e| e.key.eq_ignore_ascii_case(key))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_example_lookup() {
        assert_eq!(example_problem("HELIX").unwrap().name, "Helical motion");
        assert!(example_problem("rocket").is_none());
    }

    #[test]
    fn test_example_keys_unique() {
        for (i, a) in EXAMPLE_PROBLEMS.iter().enumerate() {
            for b in &EXAMPLE_PROBLEMS[i + 1..] {
                assert_ne!(a.key, b.key);
            }
        }
    }
}
