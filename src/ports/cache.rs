use std::time::Duration;

use crate::error::Result;

pub trait ResultCache: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str, ttl: Duration);
    /// Drop every entry whose key starts with `prefix`; returns how many.
    fn invalidate_prefix(&self, prefix: &str) -> Result<usize>;
}

pub const SEARCH_PREFIX: &str = "search:";
pub const AVAILABILITY_PREFIX: &str = "availability:";

pub fn property_prefix(property_id: &str) -> String {
    format!("property:{property_id}:")
}
