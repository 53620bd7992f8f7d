//! The interactive session: one solution, its parameter values and the
//! samples derived from them.
//!
//! Every mutation that can change the samples (new solution, parameter
//! edit, applied code edit) re-runs the sampler synchronously. A failed
//! re-run keeps the last good samples and records the error instead.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::client::{ExampleProblem, SolutionClient};
use crate::error::{PhysimError, PhysimResult};
use crate::sample::SampleSequence;
use crate::sampler::{execute, Sampler};
use crate::series::has_3d_data;
use crate::solution::{ParameterValues, Solution};

// ---------------------------------------------------------------------------
// View
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum View {
    Explanation,
    Graphs,
    Parameters,
    Plot3d,
    Simulation,
    Simulation3d,
    Code,
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Explanation => write!(f, "explanation"),
            Self::Graphs => write!(f, "graphs"),
            Self::Parameters => write!(f, "parameters"),
            Self::Plot3d => write!(f, "plot3d"),
            Self::Simulation => write!(f, "simulation"),
            Self::Simulation3d => write!(f, "simulation3d"),
            Self::Code => write!(f, "code"),
        }
    }
}

impl std::str::FromStr for View {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "explanation" => Ok(Self::Explanation),
            "graphs" => Ok(Self::Graphs),
            "parameters" => Ok(Self::Parameters),
            "plot3d" | "plot_3d" => Ok(Self::Plot3d),
            "simulation" => Ok(Self::Simulation),
            "simulation3d" | "simulation_3d" => Ok(Self::Simulation3d),
            "code" => Ok(Self::Code),
            _ => Err(format!("invalid view: {s}")),
        }
    }
}

// ---------------------------------------------------------------------------
// Code drafts
// ---------------------------------------------------------------------------

/// Which routine text an edit targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeField {
    Numerical,
    Simulation,
    Simulation3d,
}

impl std::str::FromStr for CodeField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "numerical" | "numerical_code" | "sampler" => Ok(Self::Numerical),
            "simulation" | "simulation_code" | "2d" => Ok(Self::Simulation),
            "simulation3d" | "simulation_code_3d" | "3d" => Ok(Self::Simulation3d),
            _ => Err(format!("invalid code field: {s}")),
        }
    }
}

/// Editable copies of the three routine texts.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CodeDrafts {
    pub numerical_code: String,
    pub simulation_code: String,
    pub simulation_code_3d: Option<String>,
}

impl CodeDrafts {
    fn from_solution(solution: &Solution) -> Self {
        Self {
            numerical_code: solution.numerical_code.clone(),
            simulation_code: solution.simulation_code.clone(),
            simulation_code_3d: solution.simulation_code_3d.clone(),
        }
    }

    fn differs_from(&self, solution: &Solution) -> bool {
        self.numerical_code != solution.numerical_code
            || self.simulation_code != solution.simulation_code
            || self.simulation_code_3d != solution.simulation_code_3d
    }

    fn wants_3d_view(&self) -> bool {
        self.simulation_code_3d
            .as_deref()
            .is_some_and(|code| !code.trim().is_empty())
    }
}

// ---------------------------------------------------------------------------
// Status snapshot
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    pub has_solution: bool,
    pub view: View,
    pub views: Vec<View>,
    pub parameters: Option<ParameterValues>,
    pub sample_count: usize,
    pub t_last: Option<f64>,
    pub pending_edits: bool,
    pub error: Option<String>,
    pub solved_at: Option<DateTime<Utc>>,
    pub sampled_at: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct Session<S> {
    sampler: S,
    problem: String,
    solution: Option<Solution>,
    params: Option<ParameterValues>,
    samples: Option<SampleSequence>,
    error: Option<String>,
    view: View,
    drafts: CodeDrafts,
    solved_at: Option<DateTime<Utc>>,
    sampled_at: Option<DateTime<Utc>>,
}

impl<S: Sampler> Session<S> {
    pub fn new(sampler: S) -> Self {
        Self {
            sampler,
            problem: String::new(),
            solution: None,
            params: None,
            samples: None,
            error: None,
            view: View::Explanation,
            drafts: CodeDrafts::default(),
            solved_at: None,
            sampled_at: None,
        }
    }

    pub fn sampler(&self) -> &S {
        &self.sampler
    }

    // --- Accessors ---

    pub fn problem(&self) -> &str {
        &self.problem
    }

    pub fn solution(&self) -> Option<&Solution> {
        self.solution.as_ref()
    }

    pub fn parameters(&self) -> Option<&ParameterValues> {
        self.params.as_ref()
    }

    pub fn samples(&self) -> Option<&SampleSequence> {
        self.samples.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn view(&self) -> View {
        self.view
    }

    pub fn drafts(&self) -> &CodeDrafts {
        &self.drafts
    }

    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            has_solution: self.solution.is_some(),
            view: self.view,
            views: self.available_views(),
            parameters: self.params.clone(),
            sample_count: self.samples.as_ref().map_or(0, SampleSequence::len),
            t_last: self.samples.as_ref().map(SampleSequence::t_last),
            pending_edits: self.has_pending_edits(),
            error: self.error.clone(),
            solved_at: self.solved_at,
            sampled_at: self.sampled_at,
        }
    }

    // --- Problem input ---

    pub fn set_problem(&mut self, text: impl Into<String>) {
        self.problem = text.into();
    }

    pub fn use_example(&mut self, example: &ExampleProblem) {
        self.problem = example.prompt.to_string();
    }

    // --- Solving ---

    /// Send the current problem text to `client` and load the answer.
    pub fn solve(&mut self, client: &mut dyn SolutionClient) -> PhysimResult<()> {
        let problem = self.problem.trim().to_string();
        if problem.is_empty() {
            return Err(PhysimError::EmptyProblem);
        }
        self.clear_results();
        info!("solving problem ({} chars)", problem.len());

        match client.solve(&problem) {
            Ok(solution) => self.load_solution(solution),
            Err(e) => {
                warn!("solution request failed: {e}");
                Err(self.fail(e.into()))
            }
        }
    }

    /// Replace the current solution, seed its parameters and compute the
    /// initial samples. The solution is kept even if that first run fails.
    pub fn load_solution(&mut self, solution: Solution) -> PhysimResult<()> {
        if let Err(e) = solution.check() {
            return Err(self.fail(e));
        }
        let unbindable = solution.parameters.iter().find_map(|p| {
            self.sampler
                .check_binding(&p.name)
                .err()
                .map(|reason| format!("parameter {:?} cannot be bound: {reason}", p.name))
        });
        if let Some(message) = unbindable {
            return Err(self.fail(PhysimError::InvalidSolution(message)));
        }
        self.clear_results();
        self.params = ParameterValues::seed(&solution.parameters);
        self.drafts = CodeDrafts::from_solution(&solution);
        self.solved_at = Some(Utc::now());
        debug!(
            parameters = solution.parameters.len(),
            has_3d = solution.has_3d_code(),
            "solution loaded"
        );
        self.solution = Some(solution);

        let Some(code) = self.active_code() else {
            return Ok(());
        };
        match execute(&self.sampler, code, self.params.as_ref()) {
            Ok(samples) => {
                self.store_samples(samples);
                Ok(())
            }
            Err(e) => Err(self.fail(PhysimError::Sampler(e))),
        }
    }

    // --- Parameters ---

    /// Change one parameter value and recompute the samples.
    ///
    /// The new value is kept even when the recomputation fails.
    pub fn set_parameter(&mut self, name: &str, value: f64) -> PhysimResult<()> {
        if self.solution.is_none() {
            return Err(PhysimError::NoSolution);
        }
        let params = self.params.as_mut().ok_or(PhysimError::NoParameters)?;
        params.set(name, value)?;
        debug!(name, value, "parameter changed");
        self.resample()
    }

    /// Re-run the committed sampler code with the current values.
    pub fn resample(&mut self) -> PhysimResult<()> {
        if self.solution.is_none() {
            return Err(PhysimError::NoSolution);
        }
        let Some(code) = self.active_code() else {
            return Ok(());
        };
        match execute(&self.sampler, code, self.params.as_ref()) {
            Ok(samples) => {
                self.error = None;
                self.store_samples(samples);
                Ok(())
            }
            Err(e) => Err(self.fail(PhysimError::Resample(e))),
        }
    }

    // --- Code editing ---

    pub fn edit_code(&mut self, field: CodeField, text: impl Into<String>) -> PhysimResult<()> {
        if self.solution.is_none() {
            return Err(PhysimError::NoSolution);
        }
        let text = text.into();
        match field {
            CodeField::Numerical => self.drafts.numerical_code = text,
            CodeField::Simulation => self.drafts.simulation_code = text,
            CodeField::Simulation3d => self.drafts.simulation_code_3d = Some(text),
        }
        Ok(())
    }

    pub fn has_pending_edits(&self) -> bool {
        self.solution
            .as_ref()
            .is_some_and(|s| self.drafts.differs_from(s))
    }

    /// Try the drafted sampler code; commit all three drafts only if it
    /// produces valid samples.
    pub fn apply_code(&mut self) -> PhysimResult<()> {
        if !self.has_pending_edits() {
            return Err(PhysimError::NoPendingEdits);
        }
        let drafts = self.drafts.clone();
        match execute(&self.sampler, &drafts.numerical_code, self.params.as_ref()) {
            Ok(samples) => {
                self.view = if drafts.wants_3d_view() {
                    View::Simulation3d
                } else {
                    View::Simulation
                };
                if let Some(solution) = self.solution.as_mut() {
                    solution.numerical_code = drafts.numerical_code;
                    solution.simulation_code = drafts.simulation_code;
                    solution.simulation_code_3d = drafts.simulation_code_3d;
                }
                self.error = None;
                self.store_samples(samples);
                info!("edited code applied");
                Ok(())
            }
            Err(e) => {
                self.view = View::Code;
                Err(self.fail(PhysimError::Apply(e)))
            }
        }
    }

    /// Discard the drafts. Returns whether anything was discarded.
    pub fn reset_code(&mut self) -> bool {
        let Some(solution) = &self.solution else {
            return false;
        };
        if !self.drafts.differs_from(solution) {
            return false;
        }
        self.drafts = CodeDrafts::from_solution(solution);
        true
    }

    // --- Views ---

    pub fn available_views(&self) -> Vec<View> {
        let Some(solution) = &self.solution else {
            return Vec::new();
        };
        let mut views = vec![View::Explanation, View::Graphs];
        if solution.has_parameters() && self.params.is_some() {
            views.push(View::Parameters);
        }
        if self.samples.as_ref().is_some_and(has_3d_data) {
            views.push(View::Plot3d);
        }
        views.push(View::Simulation);
        if solution.has_3d_code() {
            views.push(View::Simulation3d);
        }
        views.push(View::Code);
        views
    }

    pub fn set_view(&mut self, view: View) -> PhysimResult<()> {
        if !self.available_views().contains(&view) {
            return Err(PhysimError::ViewUnavailable(view.to_string()));
        }
        self.view = view;
        Ok(())
    }

    // --- Internals ---

    /// Committed sampler code, if there is any to run.
    fn active_code(&self) -> Option<&str> {
        self.solution
            .as_ref()
            .map(|s| s.numerical_code.as_str())
            .filter(|code| !code.trim().is_empty())
    }

    fn clear_results(&mut self) {
        self.solution = None;
        self.params = None;
        self.samples = None;
        self.error = None;
        self.drafts = CodeDrafts::default();
        self.view = View::Explanation;
        self.sampled_at = None;
    }

    fn store_samples(&mut self, samples: SampleSequence) {
        self.samples = Some(samples);
        self.sampled_at = Some(Utc::now());
    }

    fn fail(&mut self, err: PhysimError) -> PhysimError {
        self.error = Some(err.to_string());
        err
    }
}
