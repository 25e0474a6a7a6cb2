//! Infrastructure layer - record store implementations

pub mod storage;

pub use storage::{InMemoryRecordStore, JsonFileRecordStore};
