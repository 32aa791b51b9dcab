// cmdqueue Infrastructure - JSON File Adapter
// Implements: QueueStore over a single JSON document with atomic replace,
// RunLock over a sibling lock file

mod codec;
mod lock;
mod run_lock;
mod store;

pub use codec::{decode_queues, encode_queues};
pub use run_lock::FileRunLock;
pub use store::JsonFileQueueStore;
