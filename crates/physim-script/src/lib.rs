pub mod engine;

pub use engine::{RhaiSampler, SandboxLimits};
