use crate::types::Instant;
use serde::{Deserialize, Serialize};

pub const SEED_ENV_VAR: &str = "TIMESCOPE_SEED";

fn default_timestamp_attribute() -> String {
    "created_at".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarnessConfig {
    /// Master seed for fixture randomisation. `None` draws a fresh seed per
    /// harness, which is the normal mode: defaults must vary between runs.
    #[serde(default)]
    pub seed: Option<u64>,
    /// Freeze instant for scenarios that do not pick one. `None` freezes at
    /// the clock's current reading.
    #[serde(default)]
    pub frozen_at: Option<Instant>,
    /// Attribute name scopes filter on unless told otherwise.
    #[serde(default = "default_timestamp_attribute")]
    pub timestamp_attribute: String,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            seed: None,
            frozen_at: None,
            timestamp_attribute: default_timestamp_attribute(),
        }
    }
}

impl HarnessConfig {
    /// Load from a JSON file.
    /// In tests, use HarnessConfig::default_test().
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Cannot parse {path}: {e}"))?;
        Ok(config)
    }

    /// Config with a fixed seed so unit tests replay identically.
    pub fn default_test() -> Self {
        Self {
            seed: Some(0x5EED_0000_0000_0001),
            ..Self::default()
        }
    }

    /// Apply `TIMESCOPE_SEED` (decimal or 0x-prefixed hex) if set.
    pub fn with_env_overrides(self) -> anyhow::Result<Self> {
        match std::env::var(SEED_ENV_VAR) {
            Ok(raw) => Ok(Self { seed: Some(parse_seed(&raw)?), ..self }),
            Err(std::env::VarError::NotPresent) => Ok(self),
            Err(e) => Err(anyhow::anyhow!("Cannot read {SEED_ENV_VAR}: {e}")),
        }
    }

    /// The configured seed, or a fresh one from entropy. This is the only
    /// place the crate touches a platform RNG.
    pub fn resolved_seed(&self) -> u64 {
        self.seed.unwrap_or_else(rand::random)
    }
}

pub fn parse_seed(raw: &str) -> anyhow::Result<u64> {
    let raw = raw.trim();
    let parsed = match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(&hex.replace('_', ""), 16),
        None => raw.replace('_', "").parse::<u64>(),
    };
    parsed.map_err(|e| anyhow::anyhow!("Invalid seed '{raw}': {e}"))
}
