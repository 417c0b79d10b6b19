//! Configuration for the vectorbench CLI.
//!
//! Configuration can be loaded from multiple sources with the following precedence (highest to
//! lowest):
//!
//! 1. Environment variables (prefixed with `VB__`)
//! 2. YAML configuration file (specified via `-c` or `--config` flag)
//! 3. Defaults
//!
//! See [`Config`] for a description of all configuration fields and their defaults.
//!
//! # Environment Variables
//!
//! Environment variables use `VB__` as a prefix and double underscores (`__`) to denote nested
//! configuration structures. For example:
//!
//! - `VB__ENDPOINT=http://opensearch:9200` sets the search engine address
//! - `VB__WORKLOAD__NUM_TENANTS=8` sets the `num_tenants` workload option
//!
//! # YAML Configuration File
//!
//! The above configuration in YAML format would look like this:
//!
//! ```yaml
//! endpoint: http://opensearch:9200
//!
//! workload:
//!   num_tenants: 8
//!   bulk-size: 500
//! ```
//!
//! Hyphenated workload keys such as `bulk-size` and `detailed-results` cannot be spelled as
//! environment variable names, so they can only be set in the YAML file.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use figment::providers::{Env, Format, Serialized, Yaml};
use serde::{Deserialize, Serialize};
use tracing::level_filters::LevelFilter;
use vectorbench_workload::Options;

/// Environment variable prefix for all configuration options.
const ENV_PREFIX: &str = "VB__";

/// Log output format.
///
/// Controls how log messages are formatted. The format can be explicitly specified or
/// auto-detected based on whether output is to a TTY.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Auto detect the best format.
    ///
    /// This chooses [`LogFormat::Pretty`] for TTY, otherwise [`LogFormat::Simplified`].
    Auto,

    /// Pretty printing with colors.
    Pretty,

    /// Simplified plain text output.
    ///
    /// ```text
    /// 2020-12-04T12:10:32Z  INFO vectorbench_workload::provision: provisioning tenant indices
    /// ```
    Simplified,

    /// Dump out JSON lines.
    Json,
}

/// The logging format parse error.
#[derive(Clone, Debug)]
pub struct FormatParseError(String);

impl fmt::Display for FormatParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            r#"error parsing "{}" as format: expected one of "auto", "pretty", "simplified", "json""#,
            self.0
        )
    }
}

impl std::str::FromStr for LogFormat {
    type Err = FormatParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let result = match s {
            "" => LogFormat::Auto,
            s if s.eq_ignore_ascii_case("auto") => LogFormat::Auto,
            s if s.eq_ignore_ascii_case("pretty") => LogFormat::Pretty,
            s if s.eq_ignore_ascii_case("simplified") => LogFormat::Simplified,
            s if s.eq_ignore_ascii_case("json") => LogFormat::Json,
            s => return Err(FormatParseError(s.into())),
        };

        Ok(result)
    }
}

impl std::error::Error for FormatParseError {}

mod display_fromstr {
    pub fn serialize<T, S>(value: &T, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
        T: std::fmt::Display,
    {
        serializer.collect_str(&value)
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<T, D::Error>
    where
        D: serde::Deserializer<'de>,
        T: std::str::FromStr,
        <T as std::str::FromStr>::Err: std::fmt::Display,
    {
        use serde::Deserialize;
        let s = <std::borrow::Cow<'de, str>>::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Logging configuration.
///
/// Controls the verbosity and format of log output. Logs are always written to stderr, so that
/// generated parameters on stdout stay machine readable.
///
/// Used in: [`Config::logging`]
#[derive(Debug, Deserialize, Serialize)]
pub struct Logging {
    /// Minimum log level to output.
    ///
    /// The `RUST_LOG` environment variable provides more granular control per module if needed.
    ///
    /// # Default
    ///
    /// `INFO`
    ///
    /// # Environment Variable
    ///
    /// `VB__LOGGING__LEVEL`
    #[serde(with = "display_fromstr")]
    pub level: LevelFilter,

    /// Log output format.
    ///
    /// # Default
    ///
    /// `Auto` (pretty for TTY, simplified otherwise)
    ///
    /// # Environment Variable
    ///
    /// `VB__LOGGING__FORMAT`
    pub format: LogFormat,
}

impl Default for Logging {
    fn default() -> Self {
        Self {
            level: LevelFilter::INFO,
            format: LogFormat::Auto,
        }
    }
}

/// Main configuration struct for the vectorbench CLI.
///
/// Use [`Config::load`] to merge defaults, an optional YAML file, and environment variables.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Base URL of the search engine.
    ///
    /// # Default
    ///
    /// `http://localhost:9200`
    ///
    /// # Environment Variable
    ///
    /// `VB__ENDPOINT`
    pub endpoint: String,

    /// Timeout for a single index administration request.
    ///
    /// # Default
    ///
    /// `30s`
    ///
    /// # Environment Variable
    ///
    /// `VB__REQUEST_TIMEOUT`
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,

    /// Number of workers the parameter sources are partitioned across.
    ///
    /// # Default
    ///
    /// `32`, one worker per default tenant.
    ///
    /// # Environment Variable
    ///
    /// `VB__WORKERS`
    pub workers: usize,

    /// Logging configuration.
    pub logging: Logging,

    /// Options handed to parameter sources and runners.
    ///
    /// This is a flat mapping, for instance `num_tenants`, `bulk-size` or `dims`. Keys that a
    /// source does not understand are ignored by it.
    ///
    /// # Environment Variables
    ///
    /// Each option is set individually:
    /// - `VB__WORKLOAD__NUM_TENANTS=8`
    /// - `VB__WORKLOAD__DIMS=128`
    pub workload: Options,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:9200".to_owned(),
            request_timeout: Duration::from_secs(30),
            workers: 32,
            logging: Logging::default(),
            workload: Options::new(),
        }
    }
}

impl Config {
    /// Loads configuration from the provided arguments.
    ///
    /// Configuration is merged in the following order (later sources override earlier ones):
    /// 1. Default values
    /// 2. YAML configuration file (if a path is given)
    /// 3. Environment variables (prefixed with `VB__`)
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The YAML configuration file cannot be read or parsed
    /// - Environment variables contain invalid values
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = figment::Figment::from(Serialized::defaults(Config::default()));
        if let Some(path) = path {
            figment = figment.merge(Yaml::file(path));
        }
        let config = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use serde_json::json;

    use super::*;

    #[test]
    fn defaults() {
        figment::Jail::expect_with(|_jail| {
            let config = Config::load(None).unwrap();

            assert_eq!(config.endpoint, "http://localhost:9200");
            assert_eq!(config.request_timeout, Duration::from_secs(30));
            assert_eq!(config.workers, 32);
            assert_eq!(config.logging.level, LevelFilter::INFO);
            assert_eq!(config.logging.format, LogFormat::Auto);
            assert!(config.workload.is_empty());

            Ok(())
        });
    }

    #[test]
    fn configurable_via_env() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("VB__ENDPOINT", "http://opensearch:9200");
            jail.set_env("VB__REQUEST_TIMEOUT", "5s");
            jail.set_env("VB__WORKERS", "8");
            jail.set_env("VB__LOGGING__LEVEL", "debug");
            jail.set_env("VB__LOGGING__FORMAT", "json");
            jail.set_env("VB__WORKLOAD__NUM_TENANTS", "4");

            let config = Config::load(None).unwrap();

            assert_eq!(config.endpoint, "http://opensearch:9200");
            assert_eq!(config.request_timeout, Duration::from_secs(5));
            assert_eq!(config.workers, 8);
            assert_eq!(config.logging.level, LevelFilter::DEBUG);
            assert_eq!(config.logging.format, LogFormat::Json);
            assert_eq!(config.workload.get("num_tenants"), Some(&json!(4)));

            Ok(())
        });
    }

    #[test]
    fn configurable_via_yaml() {
        let mut tempfile = tempfile::NamedTempFile::new().unwrap();
        tempfile
            .write_all(
                br#"
            endpoint: http://localhost:9201
            workers: 4
            workload:
                num_tenants: 2
                bulk-size: 500
                index_prefix: tenants
                body:
                    explain: true
            "#,
            )
            .unwrap();

        figment::Jail::expect_with(|_jail| {
            let config = Config::load(Some(tempfile.path())).unwrap();

            assert_eq!(config.endpoint, "http://localhost:9201");
            assert_eq!(config.workers, 4);
            assert_eq!(config.workload.get("num_tenants"), Some(&json!(2)));
            assert_eq!(config.workload.get("bulk-size"), Some(&json!(500)));
            assert_eq!(config.workload.get("index_prefix"), Some(&json!("tenants")));
            assert_eq!(config.workload.get("body"), Some(&json!({"explain": true})));

            Ok(())
        });
    }

    #[test]
    fn env_overrides_yaml() {
        let mut tempfile = tempfile::NamedTempFile::new().unwrap();
        tempfile
            .write_all(
                br#"
            endpoint: http://localhost:9201
            workload:
                dims: 128
            "#,
            )
            .unwrap();

        figment::Jail::expect_with(|jail| {
            jail.set_env("VB__ENDPOINT", "http://other:9200");

            let config = Config::load(Some(tempfile.path())).unwrap();

            assert_eq!(config.endpoint, "http://other:9200");
            assert_eq!(config.workload.get("dims"), Some(&json!(128)));

            Ok(())
        });
    }

    #[test]
    fn hyphenated_keys_come_from_yaml() {
        use vectorbench_workload::options::{FromOptions, TenantBulkOptions};

        let mut tempfile = tempfile::NamedTempFile::new().unwrap();
        tempfile
            .write_all(
                br#"
            workload:
                bulk-size: 250
            "#,
            )
            .unwrap();

        figment::Jail::expect_with(|jail| {
            // Env values are parsed, so these arrive as numbers.
            jail.set_env("VB__WORKLOAD__INDEX_PREFIX", "2024");
            jail.set_env("VB__WORKLOAD__REFRESH_INTERVAL", "-1");

            let config = Config::load(Some(tempfile.path())).unwrap();
            assert_eq!(config.workload.get("bulk-size"), Some(&json!(250)));
            assert_eq!(config.workload.get("refresh_interval"), Some(&json!(-1)));

            let bulk = TenantBulkOptions::from_options(&config.workload).unwrap();
            assert_eq!(bulk.bulk_size, 250);
            assert_eq!(bulk.index_prefix, "2024");

            Ok(())
        });
    }

    #[test]
    fn parses_log_formats() {
        assert_eq!("".parse::<LogFormat>().unwrap(), LogFormat::Auto);
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert!("xml".parse::<LogFormat>().is_err());
    }
}
