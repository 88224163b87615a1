//! configuration types for latchkey.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// main configuration for latchkey.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// externally visible server url.
    pub server_url: String,

    /// address to bind the http server to.
    pub listen_addr: String,

    /// path to the platform ed25519 private key (pkcs#8 pem).
    pub platform_key_path: PathBuf,

    /// path to the platform public key (spki pem), written alongside the
    /// private key so it can be distributed out of band.
    pub platform_public_key_path: PathBuf,

    /// key id stamped into license envelopes signed by the platform key.
    pub platform_kid: String,

    /// database configuration.
    pub database: DatabaseConfig,

    /// activation protocol tuning.
    pub activation: ActivationConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:8080".to_string(),
            listen_addr: "0.0.0.0:8080".to_string(),
            platform_key_path: PathBuf::from("/var/lib/latchkey/platform_signing_ed25519.key"),
            platform_public_key_path: PathBuf::from(
                "/var/lib/latchkey/platform_signing_ed25519.pub",
            ),
            platform_kid: "platform-v1".to_string(),
            database: DatabaseConfig::default(),
            activation: ActivationConfig::default(),
        }
    }
}

/// database configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// database type: "sqlite" or "postgres".
    pub db_type: String,

    /// database connection string or file path.
    pub connection_string: String,

    /// enable write-ahead logging for sqlite.
    pub write_ahead_log: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            db_type: "sqlite".to_string(),
            connection_string: "/var/lib/latchkey/db.sqlite".to_string(),
            write_ahead_log: true,
        }
    }
}

/// activation protocol tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ActivationConfig {
    /// accepted absolute difference between request `iat` and server time.
    pub clock_skew_secs: i64,

    /// how long replay-suppression rows stay effective.
    pub nonce_ttl_secs: i64,

    /// totp step length in seconds.
    pub totp_step_secs: u64,

    /// accepted totp drift in steps on either side of now.
    pub totp_drift_steps: i64,

    /// license validity when the capsule carries no `valid_to`.
    pub default_license_days: i64,

    /// fallback validity when the computed expiry is already past.
    pub expiry_fallback_secs: i64,
}

impl Default for ActivationConfig {
    fn default() -> Self {
        Self {
            clock_skew_secs: 120,
            nonce_ttl_secs: 600,
            totp_step_secs: 30,
            totp_drift_steps: 1,
            default_license_days: 365,
            expiry_fallback_secs: 3600,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.database.db_type, "sqlite");
        assert_eq!(config.platform_kid, "platform-v1");
        assert_eq!(config.activation.clock_skew_secs, 120);
        assert_eq!(config.activation.totp_step_secs, 30);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let toml = r#"
            listen_addr = "127.0.0.1:9090"

            [activation]
            clock_skew_secs = 60
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.listen_addr, "127.0.0.1:9090");
        assert_eq!(config.activation.clock_skew_secs, 60);
        // untouched sections keep their defaults
        assert_eq!(config.activation.nonce_ttl_secs, 600);
        assert_eq!(config.database.db_type, "sqlite");
    }
}
