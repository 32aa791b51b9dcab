//! Unit tests for the execution engine

use super::*;
use crate::domain::CommandStatus;
use crate::port::command_executor::mocks::{MockBehavior, MockCommandExecutor};
use crate::port::queue_store::mocks::InMemoryQueueStore;
use crate::port::time_provider::mocks::FixedTimeProvider;
use crate::port::{ExecutionError, ExecutionOutput};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use std::sync::Mutex;

fn clock() -> Arc<FixedTimeProvider> {
    Arc::new(FixedTimeProvider::new(
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap(),
    ))
}

async fn seed(store: &InMemoryQueueStore, id: &str, commands: &[&str]) -> QueueId {
    let mut queue = CommandQueue::new(id, "Test Queue", clock().now());
    for (i, cmd) in commands.iter().enumerate() {
        queue.add_command(*cmd, format!("Step {}", i + 1));
    }
    store.create(&id.to_string(), queue).await.unwrap();
    id.to_string()
}

fn engine(store: Arc<InMemoryQueueStore>, executor: Arc<MockCommandExecutor>) -> QueueExecutionEngine {
    QueueExecutionEngine::new(store, executor, clock())
}

async fn snapshot(store: &InMemoryQueueStore, id: &QueueId) -> CommandQueue {
    store.get(id).await.unwrap().unwrap()
}

#[tokio::test]
async fn test_two_successful_commands_advance_cursor_to_end() {
    let store = Arc::new(InMemoryQueueStore::new());
    let executor = Arc::new(MockCommandExecutor::new_success());
    let id = seed(&store, "q1", &["echo a", "echo b"]).await;
    let engine = engine(store.clone(), executor.clone());

    let first = engine.execute_next(&id).await.unwrap();
    match first {
        StepOutcome::Completed {
            position,
            total,
            next,
            ..
        } => {
            assert_eq!(position, 1);
            assert_eq!(total, 2);
            assert_eq!(next.unwrap().command, "echo b");
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
    engine.execute_next(&id).await.unwrap();

    let queue = snapshot(&store, &id).await;
    assert_eq!(queue.current_index, 2);
    assert!(queue
        .commands
        .iter()
        .all(|c| c.status == CommandStatus::Completed));
    assert_eq!(executor.calls(), vec!["echo a", "echo b"]);
}

#[tokio::test]
async fn test_empty_and_exhausted_queues_are_idle() {
    let store = Arc::new(InMemoryQueueStore::new());
    let executor = Arc::new(MockCommandExecutor::new_success());
    let empty = seed(&store, "q1", &[]).await;
    let single = seed(&store, "q2", &["echo a"]).await;
    let engine = engine(store.clone(), executor.clone());

    assert_eq!(engine.execute_next(&empty).await.unwrap(), StepOutcome::Idle);

    engine.execute_next(&single).await.unwrap();
    let writes = store.write_count();
    assert_eq!(engine.execute_next(&single).await.unwrap(), StepOutcome::Idle);
    assert_eq!(engine.execute_next(&single).await.unwrap(), StepOutcome::Idle);

    // Idle steps neither execute nor write
    assert_eq!(executor.call_count(), 1);
    assert_eq!(store.write_count(), writes);
    assert_eq!(snapshot(&store, &single).await.current_index, 1);
}

#[tokio::test]
async fn test_unknown_queue_is_not_found() {
    let store = Arc::new(InMemoryQueueStore::new());
    let engine = engine(store, Arc::new(MockCommandExecutor::new_success()));

    let err = engine.execute_next(&"missing".to_string()).await.unwrap_err();
    assert_eq!(err.code(), "QUEUE_NOT_FOUND");
}

#[tokio::test]
async fn test_non_zero_exit_fails_without_advancing_then_skip() {
    let store = Arc::new(InMemoryQueueStore::new());
    let executor =
        Arc::new(MockCommandExecutor::new_success().with("exit 1", MockBehavior::ExitCode(1)));
    let id = seed(&store, "q1", &["exit 1"]).await;
    let engine = engine(store.clone(), executor);

    let outcome = engine.execute_next(&id).await.unwrap();
    assert!(matches!(outcome, StepOutcome::Failed { position: 1, .. }));

    let queue = snapshot(&store, &id).await;
    let cmd = &queue.commands[0];
    assert_eq!(cmd.status, CommandStatus::Failed);
    assert_eq!(cmd.result.as_ref().unwrap().exit_code, 1);
    assert_eq!(cmd.error.as_deref(), Some("command exited with status 1"));
    assert!(cmd.start_time.is_some() && cmd.end_time.is_some());
    assert_eq!(queue.current_index, 0);

    let skipped = engine.skip(&id).await.unwrap();
    assert_eq!(skipped.status, CommandStatus::Skipped);

    let queue = snapshot(&store, &id).await;
    assert_eq!(queue.commands[0].status, CommandStatus::Skipped);
    assert_eq!(queue.current_index, 1);
}

#[tokio::test]
async fn test_transport_error_is_recorded_without_result() {
    let store = Arc::new(InMemoryQueueStore::new());
    let executor = Arc::new(MockCommandExecutor::new_fail("host unreachable"));
    let id = seed(&store, "q1", &["uptime"]).await;
    let engine = engine(store.clone(), executor);

    let outcome = engine.execute_next(&id).await.unwrap();
    assert!(matches!(outcome, StepOutcome::Failed { .. }));

    let cmd = &snapshot(&store, &id).await.commands[0];
    assert_eq!(cmd.status, CommandStatus::Failed);
    assert!(cmd.result.is_none());
    assert!(cmd.error.as_deref().unwrap().contains("host unreachable"));
}

#[tokio::test]
async fn test_executor_panic_is_recorded_as_failure() {
    let store = Arc::new(InMemoryQueueStore::new());
    let executor = Arc::new(MockCommandExecutor::new(MockBehavior::Panic(
        "executor exploded".to_string(),
    )));
    let id = seed(&store, "q1", &["echo a"]).await;
    let engine = engine(store.clone(), executor);

    let outcome = engine.execute_next(&id).await.unwrap();
    assert!(matches!(outcome, StepOutcome::Failed { .. }));

    let cmd = &snapshot(&store, &id).await.commands[0];
    assert_eq!(cmd.status, CommandStatus::Failed);
    assert!(cmd.error.as_deref().unwrap().contains("executor exploded"));
}

#[tokio::test]
async fn test_failed_command_blocks_execute_next() {
    let store = Arc::new(InMemoryQueueStore::new());
    let executor =
        Arc::new(MockCommandExecutor::new_success().with("false", MockBehavior::ExitCode(1)));
    let id = seed(&store, "q1", &["false", "echo b"]).await;
    let engine = engine(store.clone(), executor.clone());

    engine.execute_next(&id).await.unwrap();
    let outcome = engine.execute_next(&id).await.unwrap();

    match outcome {
        StepOutcome::Blocked { position, command } => {
            assert_eq!(position, 1);
            assert_eq!(command.status, CommandStatus::Failed);
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
    assert_eq!(executor.call_count(), 1);
    assert_eq!(
        snapshot(&store, &id).await.commands[1].status,
        CommandStatus::Pending
    );
}

#[tokio::test]
async fn test_execute_all_requires_confirmation_without_auto_execute() {
    let store = Arc::new(InMemoryQueueStore::new());
    let executor = Arc::new(MockCommandExecutor::new_success());
    let id = seed(&store, "q1", &["echo a"]).await;
    let engine = engine(store.clone(), executor.clone());

    let outcome = engine.execute_all(&id, false).await.unwrap();

    assert_eq!(
        outcome,
        ExecuteAllOutcome::RequiresConfirmation {
            queue_id: id.clone()
        }
    );
    assert_eq!(executor.call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_execute_all_halts_on_failure_until_skip() {
    let store = Arc::new(InMemoryQueueStore::new());
    let executor =
        Arc::new(MockCommandExecutor::new_success().with("false", MockBehavior::ExitCode(1)));
    let id = seed(&store, "q1", &["echo a", "false", "echo c"]).await;
    let engine = engine(store.clone(), executor.clone());

    let ExecuteAllOutcome::Ran(report) = engine.execute_all(&id, true).await.unwrap() else {
        panic!("forced run must execute");
    };
    assert!(report.halted);
    assert_eq!(report.executed(), 2);
    assert_eq!(executor.call_count(), 2);

    // A second run executes nothing while the failure stands
    let ExecuteAllOutcome::Ran(report) = engine.execute_all(&id, true).await.unwrap() else {
        panic!("forced run must execute");
    };
    assert!(report.halted);
    assert_eq!(report.executed(), 0);
    assert!(matches!(report.steps[0], StepOutcome::Blocked { .. }));
    assert_eq!(executor.call_count(), 2);

    engine.skip(&id).await.unwrap();
    let ExecuteAllOutcome::Ran(report) = engine.execute_all(&id, true).await.unwrap() else {
        panic!("forced run must execute");
    };
    assert!(!report.halted);
    assert_eq!(report.executed(), 1);

    let queue = snapshot(&store, &id).await;
    assert_eq!(queue.current_index, 3);
    assert_eq!(queue.commands[2].status, CommandStatus::Completed);
}

#[tokio::test(start_paused = true)]
async fn test_execute_all_pauses_only_between_commands() {
    let store = Arc::new(InMemoryQueueStore::new());
    let executor = Arc::new(MockCommandExecutor::new_success());
    let mut queue = CommandQueue::new("q1", "Paced", clock().now())
        .with_auto_execute(true)
        .with_pause_between(5);
    for cmd in ["echo a", "echo b", "echo c"] {
        queue.add_command(cmd, cmd);
    }
    let id = "q1".to_string();
    store.create(&id, queue).await.unwrap();
    let engine = engine(store.clone(), executor);

    let started = tokio::time::Instant::now();
    let outcome = engine.execute_all(&id, false).await.unwrap();

    // two gaps between three commands, none after the last
    assert_eq!(started.elapsed(), Duration::from_secs(10));
    let ExecuteAllOutcome::Ran(report) = outcome else {
        panic!("auto-execute queue must run");
    };
    assert_eq!(report.executed(), 3);
    assert_eq!(snapshot(&store, &id).await.current_index, 3);
}

#[tokio::test(start_paused = true)]
async fn test_execute_all_on_single_command_does_not_pause() {
    let store = Arc::new(InMemoryQueueStore::new());
    let id = seed(&store, "q1", &["echo a"]).await;
    let engine = engine(store, Arc::new(MockCommandExecutor::new_success()));

    let started = tokio::time::Instant::now();
    engine.execute_all(&id, true).await.unwrap();
    assert_eq!(started.elapsed(), Duration::ZERO);
}

#[tokio::test]
async fn test_skip_needs_a_failed_command() {
    let store = Arc::new(InMemoryQueueStore::new());
    let empty = seed(&store, "q1", &[]).await;
    let pending = seed(&store, "q2", &["echo a"]).await;
    let engine = engine(store.clone(), Arc::new(MockCommandExecutor::new_success()));

    let err = engine.skip(&empty).await.unwrap_err();
    assert_eq!(err.code(), "NOTHING_TO_SKIP");

    let err = engine.skip(&pending).await.unwrap_err();
    assert_eq!(err.code(), "INVALID_STATE");
    let queue = snapshot(&store, &pending).await;
    assert_eq!(queue.commands[0].status, CommandStatus::Pending);
    assert_eq!(queue.current_index, 0);
}

#[tokio::test]
async fn test_cancel_marks_pending_and_queue_goes_idle() {
    let store = Arc::new(InMemoryQueueStore::new());
    let executor = Arc::new(MockCommandExecutor::new_success());
    let id = seed(&store, "q1", &["echo a", "echo b", "echo c"]).await;
    let engine = engine(store.clone(), executor.clone());

    engine.execute_next(&id).await.unwrap();
    assert_eq!(engine.cancel(&id).await.unwrap(), 2);
    assert_eq!(engine.cancel(&id).await.unwrap(), 0);
    assert_eq!(engine.execute_next(&id).await.unwrap(), StepOutcome::Idle);

    let queue = snapshot(&store, &id).await;
    assert_eq!(queue.commands[0].status, CommandStatus::Completed);
    assert_eq!(queue.commands[1].status, CommandStatus::Cancelled);
    assert_eq!(queue.commands[2].status, CommandStatus::Cancelled);
    assert_eq!(executor.call_count(), 1);
}

/// Executor that inspects the store while "running" and can break it
struct StatusRecorder {
    store: Arc<InMemoryQueueStore>,
    queue_id: QueueId,
    fail_writes_after_run: bool,
    seen: Mutex<Vec<CommandStatus>>,
}

#[async_trait]
impl CommandExecutor for StatusRecorder {
    async fn run(&self, _command: &str) -> std::result::Result<ExecutionOutput, ExecutionError> {
        let queue = self.store.get(&self.queue_id).await.unwrap().unwrap();
        self.seen.lock().unwrap().push(queue.commands[0].status);
        if self.fail_writes_after_run {
            self.store.set_fail_writes(true);
        }
        Ok(ExecutionOutput {
            exit_code: 0,
            stdout: String::new(),
            stderr: String::new(),
            success: true,
            duration_ms: 1,
        })
    }
}

#[tokio::test]
async fn test_running_is_persisted_before_execution() {
    let store = Arc::new(InMemoryQueueStore::new());
    let id = seed(&store, "q1", &["echo a"]).await;
    let recorder = Arc::new(StatusRecorder {
        store: store.clone(),
        queue_id: id.clone(),
        fail_writes_after_run: false,
        seen: Mutex::new(Vec::new()),
    });
    let engine = QueueExecutionEngine::new(store.clone(), recorder.clone(), clock());

    engine.execute_next(&id).await.unwrap();

    assert_eq!(*recorder.seen.lock().unwrap(), vec![CommandStatus::Running]);
}

#[tokio::test]
async fn test_storage_failure_after_run_is_returned() {
    let store = Arc::new(InMemoryQueueStore::new());
    let id = seed(&store, "q1", &["echo a"]).await;
    let recorder = Arc::new(StatusRecorder {
        store: store.clone(),
        queue_id: id.clone(),
        fail_writes_after_run: true,
        seen: Mutex::new(Vec::new()),
    });
    let engine = QueueExecutionEngine::new(store.clone(), recorder, clock());

    let err = engine.execute_next(&id).await.unwrap_err();
    assert!(err.is_storage());

    // The outcome write was rolled back; the durable state is still Running
    let queue = snapshot(&store, &id).await;
    assert_eq!(queue.commands[0].status, CommandStatus::Running);
    assert_eq!(queue.current_index, 0);
}

#[tokio::test]
async fn test_storage_failure_before_run_executes_nothing() {
    let store = Arc::new(InMemoryQueueStore::new());
    let executor = Arc::new(MockCommandExecutor::new_success());
    let id = seed(&store, "q1", &["echo a"]).await;
    let engine = engine(store.clone(), executor.clone());

    store.set_fail_writes(true);
    assert!(engine.execute_next(&id).await.unwrap_err().is_storage());
    assert!(engine.cancel(&id).await.unwrap_err().is_storage());

    assert_eq!(executor.call_count(), 0);
    let queue = snapshot(&store, &id).await;
    assert_eq!(queue.commands[0].status, CommandStatus::Pending);
}

#[tokio::test]
async fn test_concurrent_steps_on_one_queue_run_each_command_once() {
    let store = Arc::new(InMemoryQueueStore::new());
    let executor = Arc::new(MockCommandExecutor::new_success());
    let id = seed(&store, "q1", &["echo a", "echo b"]).await;
    let engine = Arc::new(engine(store.clone(), executor.clone()));

    let handles: Vec<_> = (0..2)
        .map(|_| {
            let engine = Arc::clone(&engine);
            let id = id.clone();
            tokio::spawn(async move { engine.execute_next(&id).await })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(executor.calls(), vec!["echo a", "echo b"]);
    assert_eq!(snapshot(&store, &id).await.current_index, 2);
}

#[tokio::test]
async fn test_status_projections() {
    let store = Arc::new(InMemoryQueueStore::new());
    let id = seed(&store, "q1", &["echo a", "echo b"]).await;
    seed(&store, "q2", &["echo c"]).await;
    let engine = engine(store, Arc::new(MockCommandExecutor::new_success()));

    engine.execute_next(&id).await.unwrap();

    let StatusReport::Queue(view) = engine.status(Some(&id)).await.unwrap() else {
        panic!("expected queue view");
    };
    assert_eq!(view.completed, 1);
    assert_eq!(view.total, 2);
    assert_eq!(view.commands[0].status, CommandStatus::Completed);

    let StatusReport::Overall(overall) = engine.status(None).await.unwrap() else {
        panic!("expected overall view");
    };
    assert_eq!(overall.completed, 1);
    assert_eq!(overall.total, 3);
    assert_eq!(overall.queues.len(), 2);
}

/// Records whether recovery could have claimed the store while a command ran
struct IdleObserver {
    run_lock: Arc<ProcessRunLock>,
    idle_while_running: Mutex<Vec<bool>>,
}

#[async_trait]
impl CommandExecutor for IdleObserver {
    async fn run(&self, _command: &str) -> std::result::Result<ExecutionOutput, ExecutionError> {
        let idle = self.run_lock.try_idle().await.unwrap().is_some();
        self.idle_while_running.lock().unwrap().push(idle);
        Ok(ExecutionOutput {
            exit_code: 0,
            stdout: String::new(),
            stderr: String::new(),
            success: true,
            duration_ms: 1,
        })
    }
}

#[tokio::test]
async fn test_run_lock_is_held_while_command_runs() {
    let store = Arc::new(InMemoryQueueStore::new());
    let id = seed(&store, "q1", &["echo a"]).await;
    let run_lock = Arc::new(ProcessRunLock::new());
    let observer = Arc::new(IdleObserver {
        run_lock: run_lock.clone(),
        idle_while_running: Mutex::new(Vec::new()),
    });
    let engine = QueueExecutionEngine::new(store, observer.clone(), clock())
        .with_run_lock(run_lock.clone());

    engine.execute_next(&id).await.unwrap();

    assert_eq!(*observer.idle_while_running.lock().unwrap(), vec![false]);
    assert!(run_lock.try_idle().await.unwrap().is_some());
}
