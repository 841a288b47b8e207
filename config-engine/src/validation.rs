use rust_decimal::Decimal;

use crate::error::{ConfigError, Result};
use crate::settings::EngineConfig;

/// Largest supported minor unit scale (micro-units)
pub const MAX_MINOR_UNIT_SCALE: u32 = 6;

/// Reject configurations the engine cannot run with
pub fn validate(config: &EngineConfig) -> Result<()> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError("server.port must be non-zero".to_string()));
    }
    if config.ledger.minor_unit_scale > MAX_MINOR_UNIT_SCALE {
        return Err(ConfigError::ValidationError(format!(
            "ledger.minor_unit_scale must be at most {MAX_MINOR_UNIT_SCALE}"
        )));
    }
    if config.ledger.split_tolerance < Decimal::ZERO {
        return Err(ConfigError::ValidationError(
            "ledger.split_tolerance must not be negative".to_string(),
        ));
    }
    if config.ledger.commit_max_attempts == 0 {
        return Err(ConfigError::ValidationError(
            "ledger.commit_max_attempts must be at least 1".to_string(),
        ));
    }
    if config.database.min_connections > config.database.max_connections {
        return Err(ConfigError::ValidationError(
            "database.min_connections exceeds database.max_connections".to_string(),
        ));
    }
    Ok(())
}
