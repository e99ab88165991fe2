use crate::http_api;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// The default directory, relative to the working directory, holding the slashing protection
/// database and the API token.
pub const DEFAULT_VALIDATOR_DIR: &str = "validators";

/// The default timeout for a single request to a remote signer.
pub const DEFAULT_REMOTE_SIGNER_TIMEOUT: Duration = Duration::from_secs(12);

/// Stores the core configuration for this validator instance.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// The data directory, which stores all validator databases
    pub validator_dir: PathBuf,
    /// If true, create the slashing protection database if it does not exist.
    ///
    /// Otherwise an existing database is required, so that a misconfigured data directory can
    /// never silently start signing with an empty history.
    pub init_slashing_protection: bool,
    /// Enable doppelganger protection for newly imported keys.
    pub enable_doppelganger_protection: bool,
    /// Timeout applied to each request sent to a remote signer.
    pub remote_signer_timeout: Duration,
    /// Configuration for the key-manager HTTP API.
    pub http_api: http_api::Config,
}

impl Default for Config {
    /// Build a new configuration from defaults.
    fn default() -> Self {
        Self {
            validator_dir: PathBuf::from(DEFAULT_VALIDATOR_DIR),
            init_slashing_protection: false,
            enable_doppelganger_protection: false,
            remote_signer_timeout: DEFAULT_REMOTE_SIGNER_TIMEOUT,
            http_api: <_>::default(),
        }
    }
}

impl Config {
    /// Parse a configuration from JSON, using defaults for any missing fields.
    pub fn from_json_str(json: &str) -> Result<Self, String> {
        serde_json::from_str(json).map_err(|e| format!("Unable to parse config: {:?}", e))
    }

    pub fn slashing_protection_path(&self) -> PathBuf {
        self.validator_dir
            .join(slashing_protection::SLASHING_PROTECTION_FILENAME)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_use_defaults() {
        let config = Config::from_json_str(r#"{"init_slashing_protection": true}"#).unwrap();
        assert!(config.init_slashing_protection);
        assert_eq!(config.remote_signer_timeout, Duration::from_secs(12));
        assert_eq!(config.http_api, http_api::Config::default());
        assert_eq!(
            config.slashing_protection_path(),
            PathBuf::from("validators/slashing_protection.sqlite")
        );
    }

    #[test]
    fn unparseable_config() {
        assert!(Config::from_json_str("{\"validator_dir\": 3}").is_err());
    }
}
