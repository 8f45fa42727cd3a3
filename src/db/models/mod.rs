mod checkpoint;
mod event;
mod operator;

pub use checkpoint::SyncCheckpoint;
pub use event::{Event, EventKey, EventType, UpsertOutcome};
pub use operator::{Operator, RosterEntry};
