pub mod client;
pub mod error;
pub mod playback;
pub mod sample;
pub mod sampler;
pub mod series;
pub mod session;
pub mod solution;
pub mod validate;
pub mod value;

pub use client::{example_problem, ExampleProblem, SolutionClient, EXAMPLE_PROBLEMS};
pub use error::{PhysimError, PhysimResult, RequestError, SamplerError, ShapeError};
pub use playback::{Frame, Playback};
pub use sample::{SamplePoint, SampleSequence};
pub use sampler::{execute, Sampler};
pub use series::{column, column_range, detect_charts, has_3d_data, Chart, Series};
pub use session::{CodeDrafts, CodeField, Session, SessionStatus, View};
pub use solution::{Parameter, ParameterValues, Solution};
pub use validate::{check_shape, validate};
pub use value::ScriptValue;
