//! Common CLI subprocess executor for extraction adapters.
//!
//! Spawns a command, optionally feeds it a prompt on stdin, and streams its
//! stdout line by line. A non-zero exit status surfaces as a final error
//! carrying the captured stderr.

use crate::extraction::base::ExtractionError;
use std::pin::Pin;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tokio_stream::Stream;

pub type LineStream = Pin<Box<dyn Stream<Item = Result<String, ExtractionError>> + Send>>;

/// CLI executor for extraction adapters.
pub struct CliExecutor;

impl CliExecutor {
    /// Execute a CLI command and stream its stdout lines.
    ///
    /// # Arguments
    ///
    /// * `command` - The program to execute (e.g., "claude")
    /// * `args` - Command line arguments
    /// * `working_dir` - Working directory for the command
    /// * `stdin` - Text written to the child's stdin, which is then closed
    ///
    /// # Returns
    ///
    /// A stream of stdout lines without their terminators. Empty lines are
    /// kept; callers decide whether they matter.
    pub fn execute(
        command: String,
        args: Vec<String>,
        working_dir: String,
        stdin: Option<String>,
    ) -> LineStream {
        let stream = async_stream::stream! {
            let mut cmd = Command::new(&command);
            cmd.args(&args);
            cmd.current_dir(&working_dir);
            cmd.stdin(if stdin.is_some() { Stdio::piped() } else { Stdio::null() });
            cmd.stdout(Stdio::piped());
            cmd.stderr(Stdio::piped());
            cmd.kill_on_drop(true);

            let mut child = match cmd.spawn() {
                Ok(child) => child,
                Err(e) => {
                    yield Err(ExtractionError::ExecutionError(format!(
                        "Failed to spawn command '{}': {}",
                        command, e
                    )));
                    return;
                }
            };

            if let (Some(text), Some(mut pipe)) = (stdin, child.stdin.take()) {
                // Written from a task so a chatty child cannot block on a full stdout pipe.
                tokio::spawn(async move {
                    let _ = pipe.write_all(text.as_bytes()).await;
                    let _ = pipe.shutdown().await;
                });
            }

            let stdout = match child.stdout.take() {
                Some(stdout) => stdout,
                None => {
                    yield Err(ExtractionError::ExecutionError(
                        "Failed to capture stdout".to_string()
                    ));
                    return;
                }
            };
            let mut stderr = child.stderr.take();

            let mut lines = BufReader::new(stdout).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => yield Ok(line),
                    Ok(None) => break,
                    Err(e) => {
                        yield Err(ExtractionError::StreamParseError(e.to_string()));
                        break;
                    }
                }
            }

            let mut stderr_text = String::new();
            if let Some(pipe) = stderr.as_mut() {
                let _ = pipe.read_to_string(&mut stderr_text).await;
            }

            match child.wait().await {
                Ok(status) if status.success() => {}
                Ok(status) => {
                    yield Err(ExtractionError::ExecutionError(format!(
                        "'{}' exited with {}: {}",
                        command,
                        status,
                        stderr_text.trim()
                    )));
                }
                Err(e) => {
                    yield Err(ExtractionError::ExecutionError(format!(
                        "Failed to wait for '{}': {}",
                        command, e
                    )));
                }
            }
        };

        Box::pin(stream)
    }
}
