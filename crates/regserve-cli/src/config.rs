use anyhow::{Context, Result};
use clap::ArgMatches;
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::{SocketAddr, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::time::Duration;

use regserve_models::store::DEFAULT_EXTENSION;

/// Settings for `regserve serve`.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub model_dir: PathBuf,
    pub model_extension: String,
    /// Pause after every fit, in seconds.
    pub fit_delay_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: String::from("127.0.0.1"),
            port: 8000,
            model_dir: PathBuf::from("."),
            model_extension: String::from(DEFAULT_EXTENSION),
            fit_delay_secs: 60,
        }
    }
}

impl ServerConfig {
    /// Read a JSON config file. Missing fields take their defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;
        let config: ServerConfig = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        Ok(config)
    }

    /// Start from the config file (or defaults) and apply command-line overrides.
    pub fn from_arguments(config_path: Option<&PathBuf>, matches: &ArgMatches) -> Result<Self> {
        let mut config = match config_path {
            Some(path) => ServerConfig::load(path)?,
            None => ServerConfig::default(),
        };

        // Apply CLI overrides
        if let Some(host) = matches.get_one::<String>("host") {
            config.host = host.clone();
        }

        if let Some(port) = matches.get_one::<u16>("port") {
            config.port = *port;
        }

        if let Some(model_dir) = matches.get_one::<PathBuf>("model_dir") {
            config.model_dir = model_dir.clone();
        }

        if let Some(delay) = matches.get_one::<u64>("fit_delay_secs") {
            config.fit_delay_secs = *delay;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let ext = self.model_extension.trim_start_matches('.');
        if ext.is_empty() {
            anyhow::bail!("model_extension must not be empty");
        }
        if ext.contains('.') || ext.contains('/') || ext.contains('\\') {
            anyhow::bail!(
                "model_extension must be a single extension without separators: {}",
                self.model_extension
            );
        }
        if self.host.trim().is_empty() {
            anyhow::bail!("host must not be empty");
        }
        Ok(())
    }

    pub fn fit_delay(&self) -> Duration {
        Duration::from_secs(self.fit_delay_secs)
    }

    /// Resolve `host:port`; host names such as `localhost` are accepted.
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        (self.host.as_str(), self.port)
            .to_socket_addrs()
            .with_context(|| format!("Invalid host: {}", self.host))?
            .next()
            .with_context(|| format!("Host resolved to no addresses: {}", self.host))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.port, 8000);
        assert_eq!(config.model_extension, "model");
        assert_eq!(config.fit_delay(), Duration::from_secs(60));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn bad_extensions_are_rejected() {
        for ext in ["", ".", "tar.gz", "a/b"] {
            let config = ServerConfig {
                model_extension: ext.to_string(),
                ..ServerConfig::default()
            };
            assert!(config.validate().is_err(), "{:?} should be rejected", ext);
        }
    }

    #[test]
    fn localhost_resolves() {
        let config = ServerConfig {
            host: "localhost".into(),
            port: 0,
            ..ServerConfig::default()
        };
        assert!(config.socket_addr().unwrap().ip().is_loopback());
    }
}
