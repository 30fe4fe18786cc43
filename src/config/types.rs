use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineConfig {
    /// Days of availability created for a room when it is first seeded.
    #[serde(default = "default_seed_days")]
    pub seed_days: u32,
    /// Upper bound on any evaluated or recomputed date window.
    #[serde(default = "default_max_range_days")]
    pub max_range_days: u32,
    #[serde(default = "default_min_percentage")]
    pub min_percentage: f64,
    #[serde(default = "default_max_percentage")]
    pub max_percentage: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            seed_days: default_seed_days(),
            max_range_days: default_max_range_days(),
            min_percentage: default_min_percentage(),
            max_percentage: default_max_percentage(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
    #[serde(default = "default_search_ttl")]
    pub search_ttl_secs: u64,
    #[serde(default = "default_calendar_ttl")]
    pub calendar_ttl_secs: u64,
    #[serde(default = "default_quote_ttl")]
    pub quote_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: default_max_entries(),
            search_ttl_secs: default_search_ttl(),
            calendar_ttl_secs: default_calendar_ttl(),
            quote_ttl_secs: default_quote_ttl(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct StoreConfig {
    /// YAML fixtures loaded into the in-memory store at startup.
    #[serde(default)]
    pub fixtures_path: Option<PathBuf>,
}

fn default_seed_days() -> u32 {
    365
}

fn default_max_range_days() -> u32 {
    366
}

fn default_min_percentage() -> f64 {
    -100.0
}

fn default_max_percentage() -> f64 {
    1000.0
}

fn default_max_entries() -> usize {
    500
}

fn default_search_ttl() -> u64 {
    300
}

fn default_calendar_ttl() -> u64 {
    600
}

fn default_quote_ttl() -> u64 {
    300
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_config_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.seed_days, 365);
        assert_eq!(config.max_range_days, 366);
        assert!((config.min_percentage + 100.0).abs() < f64::EPSILON);
        assert!((config.max_percentage - 1000.0).abs() < f64::EPSILON);
    }

    #[test]
    fn cache_config_defaults() {
        let config = CacheConfig::default();
        assert_eq!(config.max_entries, 500);
        assert_eq!(config.search_ttl_secs, 300);
        assert_eq!(config.calendar_ttl_secs, 600);
        assert_eq!(config.quote_ttl_secs, 300);
    }

    #[test]
    fn store_config_defaults_to_no_fixtures() {
        assert!(Config::default().store.fixtures_path.is_none());
    }

    #[test]
    fn config_deserialize_with_overrides() {
        let yaml = "engine:\n  seed_days: 90\nstore:\n  fixtures_path: data/fixtures.yaml";
        let config: Config = serde_yml::from_str(yaml).unwrap();
        assert_eq!(config.engine.seed_days, 90);
        // Other fields get defaults
        assert_eq!(config.engine.max_range_days, 366);
        assert_eq!(config.cache.search_ttl_secs, 300);
        assert_eq!(
            config.store.fixtures_path,
            Some(PathBuf::from("data/fixtures.yaml"))
        );
    }
}
