use std::{
    fs,
    io,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    path::{Path, PathBuf},
};

use jsonschema::JSONSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::solver_gateway::types::SolverConfig;

pub const ENV_SOLVER_BASE_URL: &str = "SOLVER_BASE_URL";
pub const ENV_SOLVER_API_TOKEN: &str = "SOLVER_API_TOKEN";
pub const ENV_SOLVER_MOCK_MODE: &str = "SOLVER_MOCK_MODE";
pub const ENV_SOLVER_TIMEOUT_MS: &str = "SOLVER_TIMEOUT_MS";
pub const ENV_SOLVER_MOCK_FIXTURE: &str = "SOLVER_MOCK_FIXTURE";
pub const ENV_SOLVER_MOCK_REBALANCE_FIXTURE: &str = "SOLVER_MOCK_REBALANCE_FIXTURE";
pub const ENV_LISTEN_ADDR: &str = "GATEWAY_LISTEN_ADDR";
pub const ENV_LOG_FILTER: &str = "GATEWAY_LOG_FILTER";
pub const ENV_LOG_FORMAT: &str = "GATEWAY_LOG_FORMAT";
pub const ENV_LOG_DIR: &str = "GATEWAY_LOG_DIR";

const CONFIG_SCHEMA: &str = include_str!("../gateway.schema.json");

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },
    #[error("config validation failed: {0}")]
    Schema(String),
    #[error("failed to deserialize config: {0}")]
    Deserialize(#[from] serde_json::Error),
    #[error("invalid value for {var}: {message}")]
    InvalidEnv { var: &'static str, message: String },
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub solver: SolverConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 8080)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServerConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
        }
    }
}

fn default_logging_filter() -> String {
    "info".to_string()
}

fn default_logging_retention_days() -> usize {
    14
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum LoggingRotation {
    #[default]
    Daily,
    Hourly,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_filter")]
    pub filter: String,
    #[serde(default)]
    pub format: LogFormat,
    /// Rolling JSON file output is enabled only when a directory is set.
    #[serde(default)]
    pub dir: Option<PathBuf>,
    #[serde(default)]
    pub rotation: LoggingRotation,
    #[serde(default = "default_logging_retention_days")]
    pub retention_days: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_logging_filter(),
            format: LogFormat::default(),
            dir: None,
            rotation: LoggingRotation::default(),
            retention_days: default_logging_retention_days(),
        }
    }
}

impl Config {
    /// File (when given) first, then environment overrides from the process.
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match config_path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|var| std::env::var(var).ok())?;
        Ok(config)
    }

    pub fn from_file(config_path: &Path) -> Result<Self, ConfigError> {
        let config_content = fs::read_to_string(config_path).map_err(|source| ConfigError::Read {
            path: config_path.to_path_buf(),
            source,
        })?;
        let config_value: Value =
            json5::from_str(&config_content).map_err(|err| ConfigError::Parse {
                path: config_path.to_path_buf(),
                message: err.to_string(),
            })?;
        validate_against_schema(&config_value)?;

        let mut config: Config = serde_json::from_value(config_value)?;

        let config_base = config_path.parent().unwrap_or_else(|| Path::new("."));
        let mock = &mut config.solver.mock;
        for fixture in [&mut mock.optimize_fixture, &mut mock.rebalance_fixture] {
            if !fixture.is_absolute() {
                *fixture = config_base.join(&*fixture);
            }
        }
        if let Some(dir) = config.logging.dir.as_mut()
            && !dir.is_absolute()
        {
            *dir = config_base.join(&*dir);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |var: &str| {
            lookup(var)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        if let Some(base_url) = read(ENV_SOLVER_BASE_URL) {
            self.solver.base_url = Some(base_url);
        }
        if let Some(token) = read(ENV_SOLVER_API_TOKEN) {
            self.solver.api_token = Some(token);
        }
        if let Some(raw) = read(ENV_SOLVER_MOCK_MODE) {
            self.solver.mock.enabled = parse_flag(ENV_SOLVER_MOCK_MODE, &raw)?;
        }
        if let Some(raw) = read(ENV_SOLVER_TIMEOUT_MS) {
            self.solver.request_timeout_ms =
                raw.parse::<u64>()
                    .map_err(|err| ConfigError::InvalidEnv {
                        var: ENV_SOLVER_TIMEOUT_MS,
                        message: err.to_string(),
                    })?;
        }
        if let Some(path) = read(ENV_SOLVER_MOCK_FIXTURE) {
            self.solver.mock.optimize_fixture = PathBuf::from(path);
        }
        if let Some(path) = read(ENV_SOLVER_MOCK_REBALANCE_FIXTURE) {
            self.solver.mock.rebalance_fixture = PathBuf::from(path);
        }
        if let Some(raw) = read(ENV_LISTEN_ADDR) {
            self.server.listen_addr =
                raw.parse::<SocketAddr>()
                    .map_err(|err| ConfigError::InvalidEnv {
                        var: ENV_LISTEN_ADDR,
                        message: err.to_string(),
                    })?;
        }
        if let Some(filter) = read(ENV_LOG_FILTER) {
            self.logging.filter = filter;
        }
        if let Some(raw) = read(ENV_LOG_FORMAT) {
            self.logging.format = match raw.to_ascii_lowercase().as_str() {
                "text" => LogFormat::Text,
                "json" => LogFormat::Json,
                other => {
                    return Err(ConfigError::InvalidEnv {
                        var: ENV_LOG_FORMAT,
                        message: format!("expected text or json, got '{}'", other),
                    });
                }
            };
        }
        if let Some(dir) = read(ENV_LOG_DIR) {
            self.logging.dir = Some(PathBuf::from(dir));
        }

        self.validate()
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.solver.request_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "solver.request_timeout_ms must be greater than 0".to_string(),
            ));
        }
        if self.logging.filter.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "logging.filter cannot be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Misconfigurations that do not stop the process but will fail requests.
    pub fn startup_warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        let solver = &self.solver;

        if solver.mock.enabled {
            for fixture in [&solver.mock.optimize_fixture, &solver.mock.rebalance_fixture] {
                if !fixture.is_file() {
                    warnings.push(format!(
                        "mock mode is on but fixture {} does not exist",
                        fixture.display()
                    ));
                }
            }
        } else if solver
            .base_url
            .as_deref()
            .is_none_or(|url| url.trim().is_empty())
        {
            warnings.push(format!(
                "{} is not set and mock mode is off; solver calls will fail as upstream_unavailable",
                ENV_SOLVER_BASE_URL
            ));
        }

        warnings
    }
}

fn parse_flag(var: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::InvalidEnv {
            var,
            message: format!("expected a boolean flag, got '{}'", other),
        }),
    }
}

fn validate_against_schema(config_value: &Value) -> Result<(), ConfigError> {
    let schema: Value = serde_json::from_str(CONFIG_SCHEMA)?;
    let compiled = JSONSchema::compile(&schema)
        .map_err(|err| ConfigError::Schema(format!("failed to compile schema: {}", err)))?;

    match compiled.validate(config_value) {
        Ok(()) => Ok(()),
        Err(errors) => {
            let messages = errors.map(|error| error.to_string()).collect::<Vec<_>>();
            Err(ConfigError::Schema(messages.join("; ")))
        }
    }
}
