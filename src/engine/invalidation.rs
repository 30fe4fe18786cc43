use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::ports::cache::{AVAILABILITY_PREFIX, ResultCache, SEARCH_PREFIX, property_prefix};

/// Drops cached read results after a pricing mutation. Failures are logged
/// and swallowed: a stale cache never fails a write that already succeeded.
#[derive(Clone)]
pub struct CacheInvalidator {
    cache: Arc<dyn ResultCache>,
}

impl CacheInvalidator {
    pub fn new(cache: Arc<dyn ResultCache>) -> Self {
        Self { cache }
    }

    pub fn invalidate_properties(&self, property_ids: &BTreeSet<String>) {
        let prefixes = property_ids
            .iter()
            .map(|id| property_prefix(id))
            .chain([AVAILABILITY_PREFIX.to_string(), SEARCH_PREFIX.to_string()]);
        for prefix in prefixes {
            match self.cache.invalidate_prefix(&prefix) {
                Ok(dropped) => debug!(prefix = %prefix, dropped, "cache invalidated"),
                Err(e) => warn!(prefix = %prefix, error = %e, "cache invalidation failed"),
            }
        }
    }
}

impl std::fmt::Debug for CacheInvalidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheInvalidator").finish()
    }
}
