//! Layered configuration for the SplitLedger engine
//!
//! Configuration is assembled from three sources, later sources winning:
//!
//! 1. Built-in defaults ([`EngineConfig::default`])
//! 2. An optional YAML or TOML file (picked by extension)
//! 3. Environment variables prefixed with `SPLITLEDGER_`, nested with `__`
//!    (for example `SPLITLEDGER_DATABASE__URL` or `SPLITLEDGER_LEDGER__MINOR_UNIT_SCALE`)
//!
//! # Example
//!
//! ```rust,no_run
//! use config_engine::EngineConfig;
//!
//! let config = EngineConfig::load(Some("splitledger.yaml")).expect("valid configuration");
//! println!("listening on {}:{}", config.server.host, config.server.port);
//! ```

pub mod error;
pub mod providers;
pub mod settings;
pub mod validation;

pub use error::*;
pub use settings::*;
