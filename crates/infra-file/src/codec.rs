// JSON document codec for the queue map
//
// Layout: `{ "<queue_id>": { id, name, commands, current_index, created_at,
// auto_execute, pause_between }, ... }`. Decoding is lenient per queue:
// a bad queue is dropped with a warning, its siblings still load.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDateTime, Utc};
use cmdqueue_core::domain::{
    CommandQueue, CommandResult, CommandStatus, QueueId, QueuedCommand,
    DEFAULT_PAUSE_BETWEEN_SECS,
};
use cmdqueue_core::error::Result;
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

#[derive(Debug, Deserialize)]
struct QueueRecord {
    id: String,
    name: String,
    #[serde(default)]
    commands: Vec<CommandRecord>,
    #[serde(default)]
    current_index: usize,
    #[serde(default)]
    created_at: Option<Value>,
    #[serde(default)]
    auto_execute: bool,
    #[serde(default = "default_pause_between")]
    pause_between: u64,
}

#[derive(Debug, Deserialize)]
struct CommandRecord {
    id: String,
    command: String,
    description: String,
    status: CommandStatus,
    #[serde(default)]
    result: Option<CommandResult>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    start_time: Option<Value>,
    #[serde(default)]
    end_time: Option<Value>,
}

fn default_pause_between() -> u64 {
    DEFAULT_PAUSE_BETWEEN_SECS
}

/// Serialize the whole map (pretty-printed, RFC 3339 timestamps)
pub fn encode_queues(queues: &BTreeMap<QueueId, CommandQueue>) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec_pretty(queues)?)
}

/// Decode a store document, never failing
///
/// Invalid JSON or a non-object top level yields an empty map. `now` stands in
/// for an unreadable `created_at`.
pub fn decode_queues(raw: &[u8], now: DateTime<Utc>) -> BTreeMap<QueueId, CommandQueue> {
    let document: Value = match serde_json::from_slice(raw) {
        Ok(value) => value,
        Err(e) => {
            warn!(error = %e, "Queue store is not valid JSON; starting empty");
            return BTreeMap::new();
        }
    };

    let Value::Object(entries) = document else {
        warn!("Queue store top level is not an object; starting empty");
        return BTreeMap::new();
    };

    let mut queues = BTreeMap::new();
    for (key, value) in entries {
        match decode_queue(&key, value, now) {
            Ok(queue) => {
                queues.insert(key, queue);
            }
            Err(reason) => {
                warn!(queue_id = %key, reason = %reason, "Dropping unreadable queue");
            }
        }
    }
    queues
}

fn decode_queue(
    key: &str,
    value: Value,
    now: DateTime<Utc>,
) -> std::result::Result<CommandQueue, String> {
    let record: QueueRecord = serde_json::from_value(value).map_err(|e| e.to_string())?;

    if record.id != key {
        return Err(format!("record id '{}' does not match its key", record.id));
    }
    if record.current_index > record.commands.len() {
        return Err(format!(
            "current_index {} beyond {} commands",
            record.current_index,
            record.commands.len()
        ));
    }

    let created_at = record
        .created_at
        .as_ref()
        .and_then(parse_timestamp)
        .unwrap_or(now);

    Ok(CommandQueue {
        id: record.id,
        name: record.name,
        commands: record.commands.into_iter().map(decode_command).collect(),
        current_index: record.current_index,
        created_at,
        auto_execute: record.auto_execute,
        pause_between: record.pause_between,
    })
}

fn decode_command(record: CommandRecord) -> QueuedCommand {
    QueuedCommand {
        id: record.id,
        command: record.command,
        description: record.description,
        status: record.status,
        result: record.result,
        error: record.error,
        start_time: record.start_time.as_ref().and_then(parse_timestamp),
        end_time: record.end_time.as_ref().and_then(parse_timestamp),
    }
}

/// RFC 3339, or naive ISO-8601 read as UTC
fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    let text = value.as_str()?;
    if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
        return Some(ts.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .map(|naive| naive.and_utc())
}
