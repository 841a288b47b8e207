// Configuration sources
use figment::providers::{Env, Format, Serialized, Toml, Yaml};
use figment::Figment;
use std::path::Path;

use crate::error::{ConfigError, Result};
use crate::settings::EngineConfig;

/// Prefix of every environment variable read by the engine
pub const ENV_PREFIX: &str = "SPLITLEDGER_";

/// Build the layered figment: defaults, then the file, then the environment
pub fn figment(path: Option<&str>) -> Result<Figment> {
    let mut figment = Figment::from(Serialized::defaults(EngineConfig::default()));

    if let Some(path) = path {
        let file = Path::new(path);
        if !file.exists() {
            return Err(ConfigError::SourceNotFound(path.to_string()));
        }
        figment = match file.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => figment.merge(Toml::file(file)),
            Some("yaml" | "yml") => figment.merge(Yaml::file(file)),
            other => {
                return Err(ConfigError::ParseError(format!(
                    "unsupported configuration format: {}",
                    other.unwrap_or("<none>")
                )))
            }
        };
    }

    Ok(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
}
