//! Configuration loading
//!
//! Layered settings: an optional TOML file overridden by `ESCROW_`-prefixed
//! environment variables (`ESCROW_GATEWAY__BASE_URL`, ...). Every field has a
//! default so a bare environment works out of the box.

use serde::{Deserialize, Serialize};

use crate::{
    EscrowResult, error::EscrowError, escrow_client::EscrowClientConfig,
    fee_calculator::DEFAULT_ARBITRATION_FEE, gateway::GatewayConfig,
};

/// Top-level settings for the escrow client stack
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub gateway: GatewayConfig,
    pub client: EscrowClientConfig,
    /// Fixed-point scale used when rendering amounts
    pub currency_decimals: u32,
    /// Fallback arbitration fee when the oracle is unreachable
    pub default_arbitration_fee: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            gateway: GatewayConfig::default(),
            client: EscrowClientConfig::default(),
            currency_decimals: 8,
            default_arbitration_fee: DEFAULT_ARBITRATION_FEE,
        }
    }
}

impl Settings {
    /// Load from `agora-escrow.toml` (if present) plus the environment
    pub fn load() -> EscrowResult<Self> {
        Self::from_file("agora-escrow")
    }

    /// Load from a named config file (if present) plus the environment
    pub fn from_file(name: &str) -> EscrowResult<Self> {
        let source = config::Config::builder()
            .add_source(config::File::with_name(name).required(false))
            .add_source(config::Environment::with_prefix("ESCROW").separator("__"))
            .build()
            .map_err(|e| EscrowError::config(e.to_string()))?;

        source
            .try_deserialize()
            .map_err(|e| EscrowError::config(e.to_string()))
    }
}
