// SPDX-License-Identifier: GPL-3.0-or-later

//! Configuration loading for refrain.
//!
//! The configuration document is JSON. Its shape is owned by whoever consumes it
//! (the engine reads the sections it understands), so it is kept here as an opaque
//! mapping. Environment variables prefixed with `REFRAIN_` override document keys,
//! with `__` separating nested keys (`REFRAIN_DATABASE__URL`).

use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Json},
    Figment,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, info};

/// Conventional configuration filename, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "refrain.cnf";

/// Fallback used when [`DEFAULT_CONFIG_FILE`] does not exist.
pub const SAMPLE_CONFIG_FILE: &str = "refrain.cnf.SAMPLE";

const ENV_PREFIX: &str = "REFRAIN_";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot open configuration {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse configuration {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: Box<figment::Error>,
    },

    #[error("invalid `{section}` section: {source}")]
    Section {
        section: String,
        #[source]
        source: serde_json::Error,
    },
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// A loaded configuration document.
///
/// Read-only once loaded; the engine receives it by reference.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Configuration(Map<String, Value>);

impl Configuration {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Typed view over a top-level section. A missing section yields `T::default()`.
    pub fn section<T>(&self, key: &str) -> Result<T>
    where
        T: DeserializeOwned + Default,
    {
        match self.0.get(key) {
            None | Some(Value::Null) => Ok(T::default()),
            Some(value) => {
                serde_json::from_value(value.clone()).map_err(|source| ConfigError::Section {
                    section: key.to_string(),
                    source,
                })
            }
        }
    }
}

impl From<Map<String, Value>> for Configuration {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub log_level: String,
    /// Emit logs as JSON lines instead of human-readable text.
    pub json: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json: false,
        }
    }
}

/// Pick the configuration path: an explicit path always wins, otherwise the
/// conventional file if present, otherwise its sample variant.
pub fn resolve_config_path(explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }

    let primary = Path::new(DEFAULT_CONFIG_FILE);
    if primary.exists() {
        primary.to_path_buf()
    } else {
        debug!(target: "config", fallback = SAMPLE_CONFIG_FILE, "default configuration not found");
        PathBuf::from(SAMPLE_CONFIG_FILE)
    }
}

/// Load configuration from a JSON document plus environment overrides (prefix: REFRAIN_).
pub fn load(path: &Path) -> Result<Configuration> {
    // Read eagerly: figment treats a missing file as an empty provider.
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let figment = Figment::from(Json::string(&contents))
        .merge(Env::prefixed(ENV_PREFIX).split("__"));

    let map: Map<String, Value> = figment.extract().map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source: Box::new(source),
    })?;

    info!(target: "config", path = %path.display(), keys = map.len(), "configuration loaded");
    Ok(Configuration(map))
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;
    use std::io::Write;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_json_document() {
        let file = write_config(r#"{"database": {"url": "sqlite://test.db"}, "topn": 3}"#);
        let config = load(file.path()).unwrap();

        assert_eq!(config.get("topn"), Some(&Value::from(3)));
        assert_eq!(
            config.get("database").and_then(|db| db.get("url")),
            Some(&Value::from("sqlite://test.db"))
        );
    }

    #[test]
    fn test_load_missing_file_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.cnf");

        let err = load(&missing).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
        assert!(err.to_string().contains("cannot open configuration"));
        assert!(err.to_string().contains("nope.cnf"));
    }

    #[test]
    fn test_load_malformed_document_is_parse_error() {
        let file = write_config("{ not json");
        let err = load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_load_non_mapping_root_is_parse_error() {
        let file = write_config("[1, 2, 3]");
        assert!(matches!(load(file.path()), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_env_overrides_nested_key() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "refrain.cnf",
                r#"{"capture": {"device": "file-device", "channels": 2}}"#,
            )?;
            jail.set_env("REFRAIN_CAPTURE__DEVICE", "env-device");

            let config = load(Path::new("refrain.cnf")).map_err(|e| e.to_string())?;
            let capture = config.get("capture").cloned().unwrap_or_default();
            assert_eq!(capture.get("device"), Some(&Value::from("env-device")));
            assert_eq!(capture.get("channels"), Some(&Value::from(2)));
            Ok(())
        });
    }

    #[test]
    fn test_resolve_prefers_explicit_path() {
        let path = resolve_config_path(Some(Path::new("/etc/refrain/custom.cnf")));
        assert_eq!(path, PathBuf::from("/etc/refrain/custom.cnf"));
    }

    #[test]
    fn test_resolve_falls_back_to_sample() {
        Jail::expect_with(|_jail| {
            assert_eq!(resolve_config_path(None), PathBuf::from(SAMPLE_CONFIG_FILE));
            Ok(())
        });
    }

    #[test]
    fn test_resolve_uses_conventional_file_when_present() {
        Jail::expect_with(|jail| {
            jail.create_file(DEFAULT_CONFIG_FILE, "{}")?;
            assert_eq!(resolve_config_path(None), PathBuf::from(DEFAULT_CONFIG_FILE));
            Ok(())
        });
    }

    #[test]
    fn test_section_defaults_when_missing() {
        let config = Configuration::default();
        let telemetry: TelemetryConfig = config.section("telemetry").unwrap();
        assert_eq!(telemetry.log_level, "info");
    }

    #[test]
    fn test_section_reads_typed_values() {
        let file = write_config(r#"{"telemetry": {"log_level": "debug"}}"#);
        let config = load(file.path()).unwrap();
        let telemetry: TelemetryConfig = config.section("telemetry").unwrap();
        assert_eq!(telemetry.log_level, "debug");
        assert!(!telemetry.json);
    }

    #[test]
    fn test_section_type_mismatch_is_reported() {
        let file = write_config(r#"{"telemetry": {"log_level": 7}}"#);
        let config = load(file.path()).unwrap();
        let err = config.section::<TelemetryConfig>("telemetry").unwrap_err();
        assert!(err.to_string().contains("telemetry"));
    }
}
