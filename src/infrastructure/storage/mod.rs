pub mod json_file;
pub mod memory;

pub use json_file::JsonFileRecordStore;
pub use memory::InMemoryRecordStore;
