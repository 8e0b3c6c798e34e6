//! Configuration file management for certinspect.
//!
//! Settings come from three places, each overriding the one before:
//!
//! 1. Default values
//! 2. Configuration file (`certinspect.toml` or the path given with `--config`)
//! 3. Command-line arguments
//!
//! # Example Configuration File
//!
//! ```toml
//! hosts = ["example.com", "expired.badssl.com"]
//! output = "summary"
//! exit_code = 1
//! port = 443
//! timeout_secs = 10
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use strum_macros::{AsRefStr, Display, EnumString};

use crate::inspector::{Inspector, DEFAULT_PORT, DEFAULT_TIMEOUT, MAX_TIMEOUT};

/// File looked up in the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "certinspect.toml";

/// How inspection results are printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum OutputFormat {
    /// Pretty-printed JSON array of result envelopes
    Json,
    /// One block of text per host
    Text,
    /// One table row per host
    Summary,
}

/// Main configuration structure.
///
/// All fields are optional so partial configurations can be merged.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Config {
    /// Hosts to inspect
    pub hosts: Option<Vec<String>>,
    /// Output format: json, text, summary
    pub output: Option<String>,
    /// Exit code used when a certificate is expired or an inspection failed
    pub exit_code: Option<i32>,
    /// TLS port to connect to
    pub port: Option<u16>,
    /// Seconds allowed for connect and handshake
    pub timeout_secs: Option<u64>,
}

impl Default for Config {
    /// Defaults: output `summary`, exit code 0, port 443, 10 second timeout.
    fn default() -> Self {
        Config {
            hosts: None,
            output: Some(OutputFormat::Summary.to_string()),
            exit_code: Some(0),
            port: Some(DEFAULT_PORT),
            timeout_secs: Some(DEFAULT_TIMEOUT.as_secs()),
        }
    }
}

impl Config {
    /// Loads configuration from a TOML file.
    ///
    /// ```no_run
    /// # use certinspect::config::Config;
    /// let config = Config::from_file("certinspect.toml")?;
    /// # Ok::<(), certinspect::config::ConfigError>(())
    /// ```
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content =
            fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io(e.to_string()))?;

        toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Merges `other` into this configuration. Values set in `other` win.
    pub fn merge_with(mut self, other: Config) -> Self {
        if other.hosts.is_some() {
            self.hosts = other.hosts;
        }
        if other.output.is_some() {
            self.output = other.output;
        }
        if other.exit_code.is_some() {
            self.exit_code = other.exit_code;
        }
        if other.port.is_some() {
            self.port = other.port;
        }
        if other.timeout_secs.is_some() {
            self.timeout_secs = other.timeout_secs;
        }
        self
    }

    /// Checks values that would make inspection impossible.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == Some(0) {
            return Err(ConfigError::Validation("port must not be 0".to_string()));
        }
        if self.timeout_secs == Some(0) {
            return Err(ConfigError::Validation(
                "timeout_secs must be at least 1".to_string(),
            ));
        }
        if let Some(secs) = self.timeout_secs.filter(|&s| s > MAX_TIMEOUT.as_secs()) {
            return Err(ConfigError::Validation(format!(
                "timeout_secs must be at most {}, got {}",
                MAX_TIMEOUT.as_secs(),
                secs
            )));
        }
        self.output_format().map(|_| ())
    }

    /// Parsed output format, `summary` when unset.
    pub fn output_format(&self) -> Result<OutputFormat, ConfigError> {
        match &self.output {
            Some(output) => OutputFormat::from_str(output).map_err(|_| {
                ConfigError::Validation(format!(
                    "unknown output format '{}', expected json, text or summary",
                    output
                ))
            }),
            None => Ok(OutputFormat::Summary),
        }
    }

    /// Builds the inspector described by this configuration.
    pub fn inspector(&self) -> Inspector {
        Inspector::new()
            .with_port(self.port.unwrap_or(DEFAULT_PORT))
            .with_timeout(
                self.timeout_secs
                    .map(Duration::from_secs)
                    .unwrap_or(DEFAULT_TIMEOUT),
            )
    }

    /// Sample configuration file with every option set.
    pub fn example_toml() -> String {
        let example = Config {
            hosts: Some(vec![
                "example.com".to_string(),
                "self-signed.badssl.com".to_string(),
                "expired.badssl.com".to_string(),
            ]),
            output: Some(OutputFormat::Summary.to_string()),
            exit_code: Some(1),
            port: Some(DEFAULT_PORT),
            timeout_secs: Some(DEFAULT_TIMEOUT.as_secs()),
        };

        toml::to_string_pretty(&example)
            .unwrap_or_else(|_| "# Error generating example".to_string())
    }
}

/// Errors that can occur during configuration loading and parsing.
#[derive(Debug)]
pub enum ConfigError {
    /// I/O error (file not found, permission denied, etc.)
    Io(String),
    /// TOML parsing error (invalid syntax, type mismatch, etc.)
    Parse(String),
    /// A value is present but unusable
    Validation(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(msg) => write!(f, "IO Error: {}", msg),
            ConfigError::Parse(msg) => write!(f, "Parse Error: {}", msg),
            ConfigError::Validation(msg) => write!(f, "Validation Error: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_config_from_toml() {
        let toml_content = r#"
            hosts = ["jpbd.dev", "google.cl"]
            output = "json"
            exit_code = 1
            port = 8443
            timeout_secs = 3
        "#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();

        let config = Config::from_file(temp_file.path()).unwrap();

        assert_eq!(
            config.hosts,
            Some(vec!["jpbd.dev".to_string(), "google.cl".to_string()])
        );
        assert_eq!(config.output_format().unwrap(), OutputFormat::Json);
        assert_eq!(config.exit_code, Some(1));
        assert_eq!(config.port, Some(8443));
        assert_eq!(config.timeout_secs, Some(3));
    }

    #[test]
    fn test_config_merge() {
        let base_config = Config {
            hosts: Some(vec!["base.com".to_string()]),
            output: Some("text".to_string()),
            exit_code: Some(0),
            port: Some(443),
            timeout_secs: Some(10),
        };

        let override_config = Config {
            hosts: Some(vec!["override.com".to_string()]),
            output: None,
            exit_code: Some(1),
            port: None,
            timeout_secs: Some(2),
        };

        let merged = base_config.merge_with(override_config);

        assert_eq!(merged.hosts, Some(vec!["override.com".to_string()]));
        assert_eq!(merged.output, Some("text".to_string()));
        assert_eq!(merged.exit_code, Some(1));
        assert_eq!(merged.port, Some(443));
        assert_eq!(merged.timeout_secs, Some(2));
    }

    #[test]
    fn test_config_default() {
        let config = Config::default();

        assert_eq!(config.hosts, None);
        assert_eq!(config.output, Some("summary".to_string()));
        assert_eq!(config.exit_code, Some(0));
        assert_eq!(config.inspector(), Inspector::new());
    }

    #[test]
    fn test_inspector_from_config() {
        let config = Config {
            port: Some(8443),
            timeout_secs: Some(3),
            ..Config::default()
        };
        let inspector = config.inspector();
        assert_eq!(inspector.port(), 8443);
        assert_eq!(inspector.timeout(), Duration::from_secs(3));
    }

    #[test]
    fn test_validate_rejects_unusable_values() {
        let zero_timeout = Config {
            timeout_secs: Some(0),
            ..Config::default()
        };
        assert!(matches!(
            zero_timeout.validate(),
            Err(ConfigError::Validation(_))
        ));

        let zero_port = Config {
            port: Some(0),
            ..Config::default()
        };
        assert!(zero_port.validate().is_err());

        let huge_timeout = Config {
            timeout_secs: Some(u64::MAX),
            ..Config::default()
        };
        let err = huge_timeout.validate().unwrap_err();
        assert!(err.to_string().contains("at most 3600"));

        let bad_output = Config {
            output: Some("yaml".to_string()),
            ..Config::default()
        };
        let err = bad_output.validate().unwrap_err();
        assert!(err.to_string().contains("yaml"));

        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_invalid_toml() {
        let invalid_toml = "hosts = [invalid toml";

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(invalid_toml.as_bytes()).unwrap();

        let result = Config::from_file(temp_file.path());
        match result.unwrap_err() {
            ConfigError::Parse(_) => {}
            other => panic!("Expected ParseError, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_file() {
        let result = Config::from_file("/nonexistent/certinspect.toml");
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_example_toml_generation() {
        let example = Config::example_toml();

        let parsed: Config = toml::from_str(&example).unwrap();
        assert!(parsed.hosts.is_some());
        assert_eq!(parsed.timeout_secs, Some(10));
        assert!(parsed.validate().is_ok());
    }
}
