use serde::Deserialize;
use std::fs::File;
use thiserror::Error;
use upstream::config::UpstreamsConfig;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("could not load config from file: {0}")]
    LoadError(#[from] std::io::Error),
    #[error("could not parse config: {0}")]
    ParseError(#[from] serde_yaml::Error),
    #[error("invalid config: {0}")]
    Invalid(#[from] ValidationError),
}

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("port cannot be 0")]
    InvalidPort,
    #[error("max_in_flight cannot be 0")]
    InvalidMaxInFlight,
    #[error(transparent)]
    Upstreams(#[from] upstream::config::ValidationError),
}

/// Network listener configuration
#[derive(Debug, Deserialize, PartialEq)]
pub struct Listener {
    pub host: String,
    pub port: u16,
}

impl Default for Listener {
    fn default() -> Self {
        Listener {
            host: "127.0.0.1".into(),
            port: 8003,
        }
    }
}

#[derive(Debug, Deserialize, PartialEq)]
pub struct AggregationConfig {
    /// Upper bound on concurrent upstream calls per aggregation run
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,
}

fn default_max_in_flight() -> usize {
    8
}

impl Default for AggregationConfig {
    fn default() -> Self {
        AggregationConfig {
            max_in_flight: default_max_in_flight(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct MetricsConfig {
    pub statsd_host: String,
    pub statsd_port: u16,
}

#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    pub sentry_dsn: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub listener: Listener,
    pub upstreams: UpstreamsConfig,
    #[serde(default)]
    pub aggregation: AggregationConfig,
    pub metrics: Option<MetricsConfig>,
    pub logging: Option<LoggingConfig>,
}

impl Config {
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let file = File::open(path)?;
        let config: Config = serde_yaml::from_reader(file)?;
        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.listener.port == 0 {
            return Err(ValidationError::InvalidPort);
        }
        if self.aggregation.max_in_flight == 0 {
            return Err(ValidationError::InvalidMaxInFlight);
        }
        self.upstreams.validate()?;

        Ok(())
    }
}
