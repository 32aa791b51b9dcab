// Panic isolation for executor calls
use std::any::Any;
use std::sync::Arc;

use tracing::error;

use crate::port::{CommandExecutor, ExecutionError, ExecutionOutput};

/// Run one command on a spawned task so an executor panic cannot unwind
/// through the engine
///
/// A panic or a cancelled task is reported as `ExecutionError::Panicked` and
/// is handled exactly like any other transport failure.
pub async fn run_isolated(
    executor: &Arc<dyn CommandExecutor>,
    command: &str,
) -> Result<ExecutionOutput, ExecutionError> {
    let executor = Arc::clone(executor);
    let command = command.to_string();

    let handle = tokio::task::spawn(async move { executor.run(&command).await });

    match handle.await {
        Ok(result) => result,
        Err(join_err) if join_err.is_panic() => {
            let panic_msg = panic_message(join_err.into_panic());
            error!(panic_msg = %panic_msg, "Command executor panicked");
            Err(ExecutionError::Panicked(panic_msg))
        }
        Err(join_err) => {
            error!(error = %join_err, "Command executor task cancelled");
            Err(ExecutionError::Panicked(join_err.to_string()))
        }
    }
}

fn panic_message(panic_info: Box<dyn Any + Send>) -> String {
    if let Some(s) = panic_info.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic_info.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::command_executor::mocks::{MockBehavior, MockCommandExecutor};

    #[tokio::test]
    async fn test_panic_becomes_execution_error() {
        let executor: Arc<dyn CommandExecutor> = Arc::new(MockCommandExecutor::new(
            MockBehavior::Panic("executor exploded".to_string()),
        ));

        let result = run_isolated(&executor, "echo hi").await;

        assert_eq!(
            result,
            Err(ExecutionError::Panicked("executor exploded".to_string()))
        );
    }

    #[tokio::test]
    async fn test_output_passes_through() {
        let executor: Arc<dyn CommandExecutor> = Arc::new(MockCommandExecutor::new_success());
        let output = run_isolated(&executor, "echo hi").await.unwrap();
        assert!(output.success);
        assert_eq!(output.stdout, "mock output");
    }
}
