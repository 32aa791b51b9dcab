// Application constants (no magic values)

/// Longest accepted queue name (characters)
pub const MAX_QUEUE_NAME_LEN: usize = 128;

/// Longest accepted command text (bytes)
pub const MAX_COMMAND_LEN: usize = 64 * 1024;

/// Upper bound for `pause_between` (1 hour)
pub const MAX_PAUSE_BETWEEN_SECS: u64 = 3600;

/// How many generated ids to try before giving up on a collision streak
pub const MAX_ID_ATTEMPTS: usize = 16;

/// Error recorded on commands found Running at startup
pub const INTERRUPTED_ERROR: &str =
    "interrupted: process exited while the command was running; outcome unknown";
