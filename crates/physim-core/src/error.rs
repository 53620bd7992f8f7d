use thiserror::Error;

/// Why a produced value was refused as a sample sequence.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ShapeError {
    #[error("the numerical code did not return an array of data points (got {found})")]
    NotASequence { found: &'static str },

    #[error("the numerical code returned an empty array of data points")]
    Empty,

    #[error("the first data point is not an object (got {found})")]
    FirstPointNotRecord { found: &'static str },

    #[error("the first data point has no numeric `{field}` field")]
    MissingField { field: &'static str },
}

/// Failure of one sampler invocation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SamplerError {
    #[error("compile error: {message}{}", position_suffix(.line, .column))]
    Compile {
        message: String,
        line: Option<usize>,
        column: Option<usize>,
    },

    #[error("runtime error: {0}")]
    Runtime(String),

    #[error("resource limit exceeded: {0}")]
    Limit(String),

    #[error(transparent)]
    Shape(#[from] ShapeError),
}

fn position_suffix(line: &Option<usize>, column: &Option<usize>) -> String {
    match (*line, *column) {
        (Some(line), Some(column)) => format!(" (line {line}, column {column})"),
        (Some(line), None) => format!(" (line {line})"),
        _ => String::new(),
    }
}

/// Failure reported by a [`crate::SolutionClient`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RequestError {
    #[error("The API key is invalid. Check your environment settings.")]
    InvalidCredential,

    #[error("The response was blocked by safety settings. Try a different problem description.")]
    Blocked,

    #[error("The model returned a response that could not be parsed. Please try again. ({0})")]
    Malformed(String),

    #[error("The model could not produce a valid response. ({0})")]
    Failed(String),
}

impl RequestError {
    /// Map the raw failure text of a model call onto a request error kind.
    pub fn classify(raw: &str) -> Self {
        if raw.contains("API key not valid") {
            Self::InvalidCredential
        } else if raw.contains("SAFETY") {
            Self::Blocked
        } else if raw.contains("JSON") {
            Self::Malformed(raw.trim().to_string())
        } else {
            Self::Failed(raw.trim().to_string())
        }
    }
}

#[derive(Debug, Error)]
pub enum PhysimError {
    #[error(transparent)]
    Request(#[from] RequestError),

    #[error("Failed to run the generated numerical code.\nDetails: {0}")]
    Sampler(#[from] SamplerError),

    #[error("Failed to recompute the simulation: {0}")]
    Resample(SamplerError),

    #[error("Failed to run the edited code: {0}")]
    Apply(SamplerError),

    #[error("invalid solution: {0}")]
    InvalidSolution(String),

    #[error("problem description is empty")]
    EmptyProblem,

    #[error("no solution loaded")]
    NoSolution,

    #[error("the solution declares no interactive parameters")]
    NoParameters,

    #[error("unknown parameter: {0}")]
    UnknownParameter(String),

    #[error("no pending code edits")]
    NoPendingEdits,

    #[error("view not available: {0}")]
    ViewUnavailable(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type PhysimResult<T> = Result<T, PhysimError>;
