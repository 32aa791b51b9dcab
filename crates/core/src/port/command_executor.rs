// Command Executor Port
// Abstraction over whatever transport actually runs a command on the target host

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::CommandResult;

/// Output of a command that ran to completion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub success: bool,
    pub duration_ms: i64,
}

impl ExecutionOutput {
    pub fn to_result(&self) -> CommandResult {
        CommandResult {
            exit_code: self.exit_code,
            stdout: self.stdout.clone(),
            stderr: self.stderr.clone(),
        }
    }
}

/// Transport-level execution errors
///
/// A command that ran and exited non-zero is NOT an error; it is an
/// `ExecutionOutput` with `success == false`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecutionError {
    #[error("Spawn failed: {0}")]
    SpawnFailed(String),

    #[error("Command timeout after {0}ms")]
    Timeout(u64),

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("IO error: {0}")]
    IoError(String),

    #[error("Executor panicked: {0}")]
    Panicked(String),
}

/// Command Executor trait
///
/// Implementations:
/// - ShellExecutor: `sh -c` locally or through the `ssh` binary
/// - MockCommandExecutor: scripted behaviours for tests
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    /// Run one command string and wait for it to finish
    ///
    /// The string is opaque to the caller. Timeouts are the implementation's
    /// responsibility and surface as `ExecutionError::Timeout`.
    async fn run(&self, command: &str) -> Result<ExecutionOutput, ExecutionError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    /// Mock executor behavior
    #[derive(Debug, Clone)]
    pub enum MockBehavior {
        /// Exit 0 with the given stdout
        Success(String),
        /// Run but exit with the given non-zero code
        ExitCode(i32),
        /// Transport error
        Fail(String),
        /// Panic with message (for panic isolation testing)
        Panic(String),
        /// Succeed after sleeping, to keep a command Running for a while
        Slow(std::time::Duration),
    }

    /// Mock Command Executor for testing
    ///
    /// Behaviour is looked up by exact command text, falling back to the default.
    pub struct MockCommandExecutor {
        default: MockBehavior,
        scripted: Mutex<HashMap<String, MockBehavior>>,
        calls: Arc<Mutex<Vec<String>>>,
    }

    impl MockCommandExecutor {
        pub fn new(default: MockBehavior) -> Self {
            Self {
                default,
                scripted: Mutex::new(HashMap::new()),
                calls: Arc::new(Mutex::new(Vec::new())),
            }
        }

        pub fn new_success() -> Self {
            Self::new(MockBehavior::Success("mock output".to_string()))
        }

        pub fn new_fail(message: impl Into<String>) -> Self {
            Self::new(MockBehavior::Fail(message.into()))
        }

        /// Script the behaviour of one specific command
        pub fn with(self, command: impl Into<String>, behavior: MockBehavior) -> Self {
            self.scripted
                .lock()
                .unwrap()
                .insert(command.into(), behavior);
            self
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl CommandExecutor for MockCommandExecutor {
        async fn run(&self, command: &str) -> Result<ExecutionOutput, ExecutionError> {
            self.calls.lock().unwrap().push(command.to_string());

            let behavior = self
                .scripted
                .lock()
                .unwrap()
                .get(command)
                .cloned()
                .unwrap_or_else(|| self.default.clone());

            match behavior {
                MockBehavior::Success(stdout) => Ok(ExecutionOutput {
                    exit_code: 0,
                    stdout,
                    stderr: String::new(),
                    success: true,
                    duration_ms: 10,
                }),
                MockBehavior::ExitCode(code) => Ok(ExecutionOutput {
                    exit_code: code,
                    stdout: String::new(),
                    stderr: format!("exited with {}", code),
                    success: false,
                    duration_ms: 10,
                }),
                MockBehavior::Fail(msg) => Err(ExecutionError::Connection(msg)),
                MockBehavior::Slow(delay) => {
                    tokio::time::sleep(delay).await;
                    Ok(ExecutionOutput {
                        exit_code: 0,
                        stdout: String::new(),
                        stderr: String::new(),
                        success: true,
                        duration_ms: delay.as_millis() as i64,
                    })
                }
                MockBehavior::Panic(msg) => {
                    panic!("{}", msg); // Actually panic for panic isolation testing
                }
            }
        }
    }
}
