pub mod protocol;
pub mod server;
pub mod tools;

pub use server::{run_server, DEFAULT_INSTRUCTIONS};
pub use tools::McpState;
