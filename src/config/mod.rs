pub mod types;

use std::path::Path;

use crate::error::{PricingError, Result};
use types::Config;

pub fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        tracing::info!(
            "Config file not found at {}, using defaults",
            path.display()
        );
        return Ok(Config::default());
    }

    let content = std::fs::read_to_string(path).map_err(|e| {
        PricingError::Config(format!(
            "failed to read config file {}: {e}",
            path.display()
        ))
    })?;
    let config: Config = serde_yml::from_str(&content)?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.engine.min_percentage > config.engine.max_percentage {
        return Err(PricingError::Config(format!(
            "engine.min_percentage ({}) exceeds engine.max_percentage ({})",
            config.engine.min_percentage, config.engine.max_percentage
        )));
    }
    if config.engine.max_range_days == 0 {
        return Err(PricingError::Config(
            "engine.max_range_days must be at least 1".into(),
        ));
    }
    Ok(())
}
