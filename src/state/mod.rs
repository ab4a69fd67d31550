//! Durable job checkpoint store.
//!
//! One JSON state file per job id, written atomically, plus an advisory
//! lock guaranteeing a single active runner per job.

pub mod lock;
pub mod store;

pub use lock::JobLock;
pub use store::{
    CheckpointStore, JobState, JobSummary, JsonCheckpointStore, Selection, StateError,
};
