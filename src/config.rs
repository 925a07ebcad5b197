// Service configuration loaded from the environment

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_NODE_URL: &str = "http://localhost:8545";
const DEFAULT_MANIFEST_PATH: &str = "blockchain/deployments/local/GameWager.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set in environment")]
    Missing(&'static str),
    #[error("invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub node_url: String,
    pub contract_address: Option<String>,
    pub manifest_path: PathBuf,
    pub jwt_secret: String,
    pub rpc_timeout: Duration,
    pub confirm_timeout: Duration,
    /// Exit at startup when the contract cannot be initialized
    pub require_contract: bool,
    pub indexer_enabled: bool,
    pub indexer_poll_interval: Duration,
    pub log_format: LogFormat,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any key lookup; unset and blank values fall back to defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let jwt_secret = get("JWT_SECRET").ok_or(ConfigError::Missing("JWT_SECRET"))?;

        Ok(Self {
            port: parse_or(get("PORT"), "PORT", 5000)?,
            node_url: get("ETHEREUM_NODE_URL").unwrap_or_else(|| DEFAULT_NODE_URL.to_string()),
            contract_address: get("GAME_WAGER_CONTRACT_ADDRESS"),
            manifest_path: get("DEPLOYMENT_MANIFEST")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_MANIFEST_PATH)),
            jwt_secret,
            rpc_timeout: parse_secs(get("RPC_TIMEOUT_SECS"), "RPC_TIMEOUT_SECS", 10)?,
            confirm_timeout: parse_secs(get("TX_CONFIRM_TIMEOUT_SECS"), "TX_CONFIRM_TIMEOUT_SECS", 60)?,
            require_contract: parse_bool(get("REQUIRE_CONTRACT_AT_STARTUP"), "REQUIRE_CONTRACT_AT_STARTUP")?,
            indexer_enabled: parse_bool(get("WAGER_INDEXER"), "WAGER_INDEXER")?,
            indexer_poll_interval: parse_secs(get("INDEXER_POLL_SECS"), "INDEXER_POLL_SECS", 5)?,
            log_format: match get("LOG_FORMAT").as_deref() {
                None | Some("pretty") => LogFormat::Pretty,
                Some("json") => LogFormat::Json,
                Some(other) => {
                    return Err(ConfigError::Invalid {
                        name: "LOG_FORMAT",
                        value: other.to_string(),
                    })
                }
            },
        })
    }
}

fn parse_or<T: std::str::FromStr>(
    raw: Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match raw {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
    }
}

/// Whole seconds; zero is rejected since every duration here bounds a wait
fn parse_secs(
    raw: Option<String>,
    name: &'static str,
    default: u64,
) -> Result<Duration, ConfigError> {
    match parse_or(raw, name, default)? {
        0 => Err(ConfigError::Invalid {
            name,
            value: "0".to_string(),
        }),
        secs => Ok(Duration::from_secs(secs)),
    }
}

fn parse_bool(raw: Option<String>, name: &'static str) -> Result<bool, ConfigError> {
    match raw.as_deref().map(str::trim) {
        None => Ok(false),
        Some("1") | Some("true") | Some("yes") => Ok(true),
        Some("0") | Some("false") | Some("no") => Ok(false),
        Some(other) => Err(ConfigError::Invalid {
            name,
            value: other.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let cfg = config(&[("JWT_SECRET", "s3cret")]).unwrap();
        assert_eq!(cfg.port, 5000);
        assert_eq!(cfg.node_url, DEFAULT_NODE_URL);
        assert_eq!(cfg.contract_address, None);
        assert_eq!(cfg.manifest_path, PathBuf::from(DEFAULT_MANIFEST_PATH));
        assert_eq!(cfg.rpc_timeout, Duration::from_secs(10));
        assert!(!cfg.require_contract);
        assert!(!cfg.indexer_enabled);
        assert_eq!(cfg.log_format, LogFormat::Pretty);
    }

    #[test]
    fn test_overrides() {
        let cfg = config(&[
            ("JWT_SECRET", "s3cret"),
            ("PORT", "8080"),
            ("GAME_WAGER_CONTRACT_ADDRESS", "0x5FbDB2315678afecb367f032d93F642f64180aa3"),
            ("WAGER_INDEXER", "true"),
            ("INDEXER_POLL_SECS", "2"),
            ("LOG_FORMAT", "json"),
        ])
        .unwrap();
        assert_eq!(cfg.port, 8080);
        assert!(cfg.contract_address.is_some());
        assert!(cfg.indexer_enabled);
        assert_eq!(cfg.indexer_poll_interval, Duration::from_secs(2));
        assert_eq!(cfg.log_format, LogFormat::Json);
    }

    #[test]
    fn test_blank_contract_address_is_unset() {
        let cfg = config(&[("JWT_SECRET", "s3cret"), ("GAME_WAGER_CONTRACT_ADDRESS", " ")]).unwrap();
        assert_eq!(cfg.contract_address, None);
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(config(&[]), Err(ConfigError::Missing("JWT_SECRET"))));
        assert!(matches!(
            config(&[("JWT_SECRET", "x"), ("PORT", "http")]),
            Err(ConfigError::Invalid { name: "PORT", .. })
        ));
        for name in ["RPC_TIMEOUT_SECS", "TX_CONFIRM_TIMEOUT_SECS", "INDEXER_POLL_SECS"] {
            match config(&[("JWT_SECRET", "x"), (name, "0")]) {
                Err(ConfigError::Invalid { name: rejected, .. }) => assert_eq!(rejected, name),
                other => panic!("{}=0 accepted: {:?}", name, other),
            }
        }
        assert!(matches!(
            config(&[("JWT_SECRET", "x"), ("WAGER_INDEXER", "maybe")]),
            Err(ConfigError::Invalid { name: "WAGER_INDEXER", .. })
        ));
    }
}
