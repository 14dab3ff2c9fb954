// Server configuration
//
// Read from the environment; every setting has a default

use anyhow::{Context, Result};
use std::time::Duration;

pub const CONNECTOR_NAMES_VAR: &str = "CONNECTOR_NAMES";
pub const CONNECT_TIMEOUT_VAR: &str = "CONNECTOR_CONNECT_TIMEOUT_MS";

const DEFAULT_CONNECTOR: &str = "ProcessRemote";
const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 5000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Connectors to populate, in display order
    pub connector_names: Vec<String>,
    pub connect_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            connector_names: vec![DEFAULT_CONNECTOR.to_string()],
            connect_timeout: Duration::from_millis(DEFAULT_CONNECT_TIMEOUT_MS),
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(names) = lookup(CONNECTOR_NAMES_VAR) {
            let names: Vec<String> = names
                .split(',')
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(str::to_string)
                .collect();
            if !names.is_empty() {
                config.connector_names = names;
            }
        }

        if let Some(ms) = lookup(CONNECT_TIMEOUT_VAR) {
            let ms: u64 = ms
                .trim()
                .parse()
                .with_context(|| format!("{} must be milliseconds, got '{}'", CONNECT_TIMEOUT_VAR, ms))?;
            config.connect_timeout = Duration::from_millis(ms);
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ServerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, ServerConfig::default());
        assert_eq!(config.connector_names, vec!["ProcessRemote"]);
    }

    #[test]
    fn test_overrides() {
        let config = ServerConfig::from_lookup(lookup(&[
            (CONNECTOR_NAMES_VAR, "Remote, Gdb ,,"),
            (CONNECT_TIMEOUT_VAR, "250"),
        ]))
        .unwrap();

        assert_eq!(config.connector_names, vec!["Remote", "Gdb"]);
        assert_eq!(config.connect_timeout, Duration::from_millis(250));
    }

    #[test]
    fn test_bad_timeout() {
        let err = ServerConfig::from_lookup(lookup(&[(CONNECT_TIMEOUT_VAR, "soon")])).unwrap_err();
        assert!(err.to_string().contains(CONNECT_TIMEOUT_VAR));
    }
}
