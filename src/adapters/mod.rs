pub mod cache;
pub mod memory_store;
