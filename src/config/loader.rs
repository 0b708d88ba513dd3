use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use crate::config::schema::{Config, Environment};

/// Load config from a JSON file with environment-variable overrides for the
/// secrets and deployment knobs. A missing file yields defaults; a present
/// but malformed file is an error (silently ignoring it would hide a
/// deployment mistake).
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let mut config = match path {
        Some(path) if path.exists() => {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?;
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse config JSON from {}", path.display()))?
        }
        _ => Config::default(),
    };

    apply_env_overrides(&mut config);
    Ok(config)
}

fn apply_env_overrides(config: &mut Config) {
    if let Ok(key) = std::env::var("COURIER_SERVICE_API_KEY") {
        config.service_api_key = Some(key);
    }
    if let Ok(secret) = std::env::var("COURIER_WEBHOOK_SECRET") {
        config.webhook_secret = Some(secret);
    }
    if let Ok(url) = std::env::var("COURIER_BUS_URL") {
        config.bus.url = url;
    }
    if let Ok(env) = std::env::var("COURIER_ENVIRONMENT") {
        config.environment = match env.as_str() {
            "production" => Environment::Production,
            _ => Environment::Development,
        };
    }
}
