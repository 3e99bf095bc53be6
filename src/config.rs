use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: '{value}' ({reason})")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
    #[error("Malformed override '{0}', expected KEY=VALUE")]
    MalformedOverride(String),
}

/// How much the server says about each RPC call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoggingMode {
    Full,
    Minimal,
}

impl std::str::FromStr for LoggingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "FULL" => Ok(LoggingMode::Full),
            "MINIMAL" => Ok(LoggingMode::Minimal),
            _ => Err("expected FULL or MINIMAL".to_string()),
        }
    }
}

impl std::fmt::Display for LoggingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoggingMode::Full => write!(f, "FULL"),
            LoggingMode::Minimal => write!(f, "MINIMAL"),
        }
    }
}

/// Application settings, read from the environment (and `.env`) then patched by CLI overrides
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server_port: u16,
    pub client_dir: Option<PathBuf>,
    pub logging_mode: LoggingMode,
    pub api_base_url: String,
    pub request_timeout: Duration,
    pub graph_output: PathBuf,
    /// Built-in RPCs answered with 403
    pub disabled_rpcs: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server_port: 8080,
            client_dir: None,
            logging_mode: LoggingMode::Full,
            api_base_url: "http://127.0.0.1:8080/api".to_string(),
            request_timeout: Duration::from_secs(30),
            graph_output: PathBuf::from("randomgraph.svg"),
            disabled_rpcs: Vec::new(),
        }
    }
}

impl AppConfig {
    /// Every key accepted by the environment and by `--set`
    pub const KEYS: [&'static str; 7] = [
        "API_BASE_URL",
        "CLIENT_DIR",
        "DISABLED_RPCS",
        "GRAPH_OUTPUT",
        "LOGGING_MODE",
        "REQUEST_TIMEOUT_SECS",
        "SERVER_PORT",
    ];

    /// Build the configuration from process environment variables, falling back to defaults
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        for key in Self::KEYS {
            if let Ok(value) = std::env::var(key) {
                config.set(key, &value)?;
            }
        }
        Ok(config)
    }

    /// Apply `KEY=VALUE` overrides. Unknown keys are ignored with a warning.
    pub fn apply_overrides(&mut self, overrides: &[String]) -> Result<(), ConfigError> {
        for raw in overrides {
            let (key, value) = raw
                .split_once('=')
                .ok_or_else(|| ConfigError::MalformedOverride(raw.clone()))?;
            let key = key.trim().to_uppercase();

            let Some(&known) = Self::KEYS.iter().find(|k| **k == key) else {
                warn!(
                    "Override '{}' will be ignored since it is not a valid config option. Valid options: {}",
                    key,
                    Self::KEYS.join(", ")
                );
                continue;
            };

            let previous = self.get(known);
            self.set(known, value.trim())?;
            info!("Resetting configuration option {} from '{}' to '{}'", known, previous, self.get(known));
        }
        Ok(())
    }

    fn set(&mut self, key: &'static str, value: &str) -> Result<(), ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidValue {
            key,
            value: value.to_string(),
            reason,
        };

        match key {
            "SERVER_PORT" => {
                self.server_port = value.parse::<u16>().map_err(|e: std::num::ParseIntError| invalid(e.to_string()))?;
            }
            "CLIENT_DIR" => {
                self.client_dir = if value.is_empty() { None } else { Some(PathBuf::from(value)) };
            }
            "LOGGING_MODE" => {
                self.logging_mode = value.parse::<LoggingMode>().map_err(invalid)?;
            }
            "API_BASE_URL" => {
                if value.is_empty() {
                    return Err(invalid("must not be empty".to_string()));
                }
                self.api_base_url = value.trim_end_matches('/').to_string();
            }
            "REQUEST_TIMEOUT_SECS" => {
                let secs: u64 = value.parse().map_err(|e: std::num::ParseIntError| invalid(e.to_string()))?;
                if secs == 0 {
                    return Err(invalid("must be at least 1".to_string()));
                }
                self.request_timeout = Duration::from_secs(secs);
            }
            "GRAPH_OUTPUT" => {
                self.graph_output = PathBuf::from(value);
            }
            "DISABLED_RPCS" => {
                self.disabled_rpcs = value
                    .split(',')
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .map(String::from)
                    .collect();
            }
            _ => unreachable!("unknown config key {}", key),
        }
        Ok(())
    }

    fn get(&self, key: &str) -> String {
        match key {
            "SERVER_PORT" => self.server_port.to_string(),
            "CLIENT_DIR" => self
                .client_dir
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
            "LOGGING_MODE" => self.logging_mode.to_string(),
            "API_BASE_URL" => self.api_base_url.clone(),
            "REQUEST_TIMEOUT_SECS" => self.request_timeout.as_secs().to_string(),
            "GRAPH_OUTPUT" => self.graph_output.display().to_string(),
            "DISABLED_RPCS" => self.disabled_rpcs.join(","),
            _ => String::new(),
        }
    }
}
