//! Configuration management for the clinic queue server.
//!
//! Loads configuration from environment variables with sensible defaults.
//! Parsing runs over a key lookup so it can be exercised without touching
//! the process environment.

use clinic_queue::{Doctor, TransitionPolicy, default_roster};
use clinic_queue_runtime::DEFAULT_CONNECTION_BUFFER;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

/// Errors while loading configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A variable is set to something unusable
    #[error("Invalid value '{value}' for {key}: {reason}")]
    Invalid {
        /// Variable name
        key: &'static str,
        /// Raw value
        value: String,
        /// Why it was rejected
        reason: String,
    },

    /// The roster file could not be read
    #[error("Failed to read roster file {path}: {source}")]
    RosterIo {
        /// Roster path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// The roster file is not a JSON list of doctors
    #[error("Invalid roster file {path}: {source}")]
    RosterFormat {
        /// Roster path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: serde_json::Error,
    },

    /// The roster file lists no doctors
    #[error("Roster file {0} lists no doctors")]
    EmptyRoster(PathBuf),
}

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Host to bind to (`HOST`, default `0.0.0.0`)
    pub host: String,
    /// Port to bind to (`PORT`, default `3000`)
    pub port: u16,
    /// Live connection path (`WS_PATH`, default `/ws/queue`)
    pub ws_path: String,
    /// Outbound frames buffered per viewer (`CONNECTION_BUFFER`, default 64)
    pub connection_buffer: usize,
    /// Ticket transition policy (`QUEUE_TRANSITIONS`, default `lenient`)
    pub transitions: TransitionPolicy,
    /// Optional JSON roster file (`CLINIC_ROSTER`)
    pub roster_path: Option<PathBuf>,
    /// Serve Prometheus metrics on `/metrics` (`METRICS_ENABLED`, default false)
    pub metrics_enabled: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            ws_path: "/ws/queue".to_string(),
            connection_buffer: DEFAULT_CONNECTION_BUFFER,
            transitions: TransitionPolicy::default(),
            roster_path: None,
            metrics_enabled: false,
        }
    }
}

impl Config {
    /// Load configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when a variable cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    ///
    /// Unset or blank keys fall back to their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when a variable cannot be parsed.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        let ws_path = get("WS_PATH").unwrap_or(defaults.ws_path);
        if !ws_path.starts_with('/') {
            return Err(ConfigError::Invalid {
                key: "WS_PATH",
                value: ws_path,
                reason: "must start with '/'".to_string(),
            });
        }

        let connection_buffer = parse(get("CONNECTION_BUFFER"), "CONNECTION_BUFFER", defaults.connection_buffer)?;
        if connection_buffer == 0 {
            return Err(ConfigError::Invalid {
                key: "CONNECTION_BUFFER",
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        Ok(Self {
            host: get("HOST").unwrap_or(defaults.host),
            port: parse(get("PORT"), "PORT", defaults.port)?,
            ws_path,
            connection_buffer,
            transitions: parse(get("QUEUE_TRANSITIONS"), "QUEUE_TRANSITIONS", defaults.transitions)?,
            roster_path: get("CLINIC_ROSTER").map(PathBuf::from),
            metrics_enabled: match get("METRICS_ENABLED") {
                None => defaults.metrics_enabled,
                Some(value) => parse_bool("METRICS_ENABLED", value)?,
            },
        })
    }

    /// `host:port` to bind the listener to
    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// The doctors to seed the queue with.
    ///
    /// Reads the roster file when configured, otherwise the default roster.
    ///
    /// # Errors
    ///
    /// Returns a roster error if the file is unreadable, not a JSON list of
    /// doctors, or empty.
    pub fn load_roster(&self) -> Result<Vec<Doctor>, ConfigError> {
        match &self.roster_path {
            None => Ok(default_roster()),
            Some(path) => load_roster_file(path),
        }
    }
}

fn load_roster_file(path: &Path) -> Result<Vec<Doctor>, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::RosterIo {
        path: path.to_path_buf(),
        source,
    })?;
    let doctors: Vec<Doctor> = serde_json::from_str(&content).map_err(|source| ConfigError::RosterFormat {
        path: path.to_path_buf(),
        source,
    })?;
    if doctors.is_empty() {
        return Err(ConfigError::EmptyRoster(path.to_path_buf()));
    }
    Ok(doctors)
}

fn parse<T>(value: Option<String>, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.map_or(Ok(default), |value| {
        value.parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            reason: e.to_string(),
            value,
        })
    })
}

fn parse_bool(key: &'static str, value: String) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            key,
            value,
            reason: "expected true or false".to_string(),
        }),
    }
}
