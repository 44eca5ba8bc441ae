//! Offline mutation queue.
//!
//! Writes that cannot reach the backend are recorded here and replayed in
//! insertion order once connectivity returns.

pub mod mutation;
pub mod queue;

pub use mutation::{
    Action, DueDateStatusPayload, IdPayload, InspectionStatusPayload, Module,
    PackageStatusPayload, PendingMutation, Route,
};
pub use queue::{DeadLetter, OfflineQueue, DEAD_LETTER_KEY, QUEUE_KEY};
