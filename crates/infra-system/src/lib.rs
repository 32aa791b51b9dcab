// cmdqueue Infrastructure - System Adapters
// Implements: CommandExecutor over `sh -c` locally or through `ssh`

pub mod shell_executor;

pub use shell_executor::{RemoteTarget, ShellExecutor};
