// crates/receipt-relay-config/tests/common/mod.rs
// =============================================================================
// Module: Config Test Helpers
// Description: Shared helpers for config validation tests.
// Purpose: Reduce duplication across integration tests for receipt-relay-config.
// =============================================================================

#![allow(dead_code, reason = "Test helpers are selectively used across suites.")]

use std::collections::HashMap;

use receipt_relay_config::ConfigError;
use receipt_relay_config::RelayConfig;

/// Valid Fernet key for tests.
pub const TEST_SECRET: &str = "seB388LNHgxcuvAcg1pOV20_VR7uJWNGAznE0fOqKxg=";

/// Parses a TOML string into a `RelayConfig` for tests.
pub fn config_from_toml(toml_str: &str) -> Result<RelayConfig, ConfigError> {
    RelayConfig::from_toml_str(toml_str)
}

/// Returns a config with defaults and a valid secret.
pub fn minimal_config() -> Result<RelayConfig, ConfigError> {
    config_from_toml(&format!("[decrypt]\nsecret = \"{TEST_SECRET}\"\n"))
}

/// Returns an environment lookup backed by the given pairs.
pub fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> + use<> {
    let map: HashMap<String, String> =
        pairs.iter().map(|(key, value)| ((*key).to_string(), (*value).to_string())).collect();
    move |key| map.get(key).cloned()
}

/// Asserts that the result is invalid with a message containing `needle`.
pub fn assert_invalid<T>(result: Result<T, ConfigError>, needle: &str) -> Result<(), String> {
    match result {
        Err(error) => {
            let message = error.to_string();
            if message.contains(needle) {
                Ok(())
            } else {
                Err(format!("error {message} did not contain {needle}"))
            }
        }
        Ok(_) => Err("expected invalid config".to_string()),
    }
}
