//! Run persistence.
//!
//! A run can be checkpointed after every iteration and resumed later. Each
//! run stores a JSON snapshot of its full state plus an append-only JSONL
//! history of iteration summaries.

mod checkpoint;

pub use checkpoint::CheckpointStore;
