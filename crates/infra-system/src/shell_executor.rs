// Shell executor implementation
// reason: async-trait, tokio for async process management
use async_trait::async_trait;
use serde::Deserialize;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, info};

use cmdqueue_core::port::{CommandExecutor, ExecutionError, ExecutionOutput, TimeProvider};

/// Host reached through the `ssh` binary
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RemoteTarget {
    pub host: String,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub identity_file: Option<PathBuf>,
}

impl RemoteTarget {
    fn destination(&self) -> String {
        match &self.user {
            Some(user) => format!("{}@{}", user, self.host),
            None => self.host.clone(),
        }
    }
}

/// Runs command strings through `sh -c`, locally or on a `RemoteTarget`
///
/// The child sees only allowlisted environment variables. With a timeout set,
/// an overrunning child is killed and `ExecutionError::Timeout` returned.
pub struct ShellExecutor {
    time_provider: Arc<dyn TimeProvider>,
    env_allowlist: Vec<String>,
    timeout: Option<Duration>,
    remote: Option<RemoteTarget>,
}

impl ShellExecutor {
    /// Create a local shell executor
    ///
    /// # Example
    /// ```ignore
    /// let executor = ShellExecutor::new(
    ///     Arc::new(SystemTimeProvider),
    ///     vec!["PATH".to_string(), "HOME".to_string()],
    /// )
    /// .with_timeout(Some(Duration::from_secs(300)));
    /// ```
    pub fn new(time_provider: Arc<dyn TimeProvider>, env_allowlist: Vec<String>) -> Self {
        Self {
            time_provider,
            env_allowlist,
            timeout: None,
            remote: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_remote(mut self, remote: Option<RemoteTarget>) -> Self {
        self.remote = remote;
        self
    }

    /// Keep only allowlisted variables
    fn filter_env<I>(&self, env: I) -> Vec<(String, String)>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        env.into_iter()
            .filter(|(k, _)| self.env_allowlist.contains(k))
            .collect()
    }

    /// Program and arguments for one command string
    fn invocation(&self, command: &str) -> (String, Vec<String>) {
        match &self.remote {
            None => (
                "sh".to_string(),
                vec!["-c".to_string(), command.to_string()],
            ),
            Some(remote) => {
                let mut args = vec!["-o".to_string(), "BatchMode=yes".to_string()];
                if let Some(port) = remote.port {
                    args.push("-p".to_string());
                    args.push(port.to_string());
                }
                if let Some(identity) = &remote.identity_file {
                    args.push("-i".to_string());
                    args.push(identity.display().to_string());
                }
                args.push(remote.destination());
                args.push("--".to_string());
                args.push(command.to_string());
                ("ssh".to_string(), args)
            }
        }
    }

    /// Spawn child process and wait for output
    async fn spawn_and_wait(
        &self,
        program: &str,
        args: &[String],
    ) -> Result<std::process::Output, ExecutionError> {
        let env = self.filter_env(std::env::vars());

        let child = Command::new(program)
            .args(args)
            .env_clear()
            .envs(env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ExecutionError::SpawnFailed(format!("{}: {}", program, e)))?;

        match self.timeout {
            Some(limit) => match timeout(limit, child.wait_with_output()).await {
                Ok(Ok(output)) => Ok(output),
                Ok(Err(e)) => Err(ExecutionError::IoError(e.to_string())),
                // the dropped future drops the child, which kills it
                Err(_) => Err(ExecutionError::Timeout(limit.as_millis() as u64)),
            },
            None => child
                .wait_with_output()
                .await
                .map_err(|e| ExecutionError::IoError(e.to_string())),
        }
    }

    /// Build execution output from process output
    fn build_output(&self, output: std::process::Output, duration_ms: i64) -> ExecutionOutput {
        // Killed by a signal: no exit code, report like a shell would
        let exit_code = output.status.code().unwrap_or(-1);

        ExecutionOutput {
            exit_code,
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            success: output.status.success(),
            duration_ms,
        }
    }
}

#[async_trait]
impl CommandExecutor for ShellExecutor {
    async fn run(&self, command: &str) -> Result<ExecutionOutput, ExecutionError> {
        let start_time = self.time_provider.now();

        info!(
            command = %command,
            remote = ?self.remote.as_ref().map(|r| r.host.as_str()),
            timeout_ms = ?self.timeout.map(|t| t.as_millis()),
            "Starting shell command"
        );

        let (program, args) = self.invocation(command);
        let output = self.spawn_and_wait(&program, &args).await?;
        let duration_ms = (self.time_provider.now() - start_time).num_milliseconds();
        let result = self.build_output(output, duration_ms);

        debug!(
            command = %command,
            duration_ms = duration_ms,
            exit_code = result.exit_code,
            "Shell command finished"
        );

        Ok(result)
    }
}
