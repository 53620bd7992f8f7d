//! A [`SolutionClient`] that shells out to an external model command.
//!
//! The problem text is written to the command's stdin; its stdout must be
//! the structured solution (optionally inside a Markdown code fence).

use std::io::{Read, Write};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use physim_core::{RequestError, Solution, SolutionClient};

use crate::config::ClientConfig;

pub struct CommandClient {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandClient {
    pub fn new(program: impl Into<String>, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args,
            timeout,
        }
    }

    /// `None` when no command is configured.
    pub fn from_config(config: &ClientConfig) -> Option<Self> {
        let program = config.command.as_deref()?.trim();
        if program.is_empty() {
            return None;
        }
        Some(Self::new(
            program,
            config.args.clone(),
            Duration::from_secs(config.timeout_secs),
        ))
    }

    fn run(&self, problem: &str) -> Result<String, RequestError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| RequestError::Failed(format!("failed to spawn '{}': {e}", self.program)))?;

        if let Some(mut stdin) = child.stdin.take() {
            if let Err(e) = stdin.write_all(problem.as_bytes()) {
                warn!("writing problem to '{}' failed: {e}", self.program);
            }
        }

        // Drain both pipes while waiting so a chatty child cannot block.
        let stdout = child.stdout.take().map(drain);
        let stderr = child.stderr.take().map(drain);

        let start = Instant::now();
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => {
                    if start.elapsed() > self.timeout {
                        let _ = child.kill();
                        let _ = child.wait();
                        return Err(RequestError::Failed(format!(
                            "'{}' timed out after {}s",
                            self.program,
                            self.timeout.as_secs()
                        )));
                    }
                    thread::sleep(Duration::from_millis(50));
                }
                Err(e) => {
                    return Err(RequestError::Failed(format!(
                        "error waiting for '{}': {e}",
                        self.program
                    )))
                }
            }
        };

        let stdout = stdout.map(join_output).unwrap_or_default();
        let stderr = stderr.map(join_output).unwrap_or_default();
        debug!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            bytes = stdout.len(),
            "solution command finished"
        );

        if !status.success() {
            let detail = if stderr.trim().is_empty() {
                format!("'{}' exited with {status}", self.program)
            } else {
                stderr.chars().take(500).collect()
            };
            return Err(RequestError::classify(&detail));
        }
        Ok(stdout)
    }
}

impl SolutionClient for CommandClient {
    fn solve(&mut self, problem: &str) -> Result<Solution, RequestError> {
        let stdout = self.run(problem)?;
        Solution::from_response(&stdout)
    }
}

fn drain<R: Read + Send + 'static>(mut pipe: R) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    })
}

fn join_output(handle: thread::JoinHandle<String>) -> String {
    handle.join().unwrap_or_default()
}
