use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable overriding [`AuditConfig::store_root`].
pub const STORE_ENV: &str = "SPOT_AUDIT_STORE";
/// Environment variable overriding [`AuditConfig::expected_tag`]; `*`
/// accepts any root tag.
pub const TRACE_TAG_ENV: &str = "SPOT_AUDIT_TRACE_TAG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file '{path}': {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config file '{path}': {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Settings shared by the engine, the explain services and the store.
///
/// Every field has a default, so a config file only lists what it changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Root block tag a trace must carry; `None` accepts any tag.
    pub expected_tag: Option<String>,
    /// CRL origin marking a ladder triangulated from two legs.
    pub synthetic_origin: String,
    /// TOM market mode assumed when the trace omits `mktMode`.
    pub default_market_mode: String,
    /// Directory the filesystem store writes under.
    pub store_root: PathBuf,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            expected_tag: Some("SCP".to_string()),
            synthetic_origin: "SYNTHETIC".to_string(),
            default_market_mode: "N".to_string(),
            store_root: PathBuf::from("resources").join("scp"),
        }
    }
}

impl AuditConfig {
    /// Load a JSON config file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply `SPOT_AUDIT_STORE` and `SPOT_AUDIT_TRACE_TAG`.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(
            std::env::var(STORE_ENV).ok(),
            std::env::var(TRACE_TAG_ENV).ok(),
        )
    }

    fn with_overrides(mut self, store: Option<String>, tag: Option<String>) -> Self {
        if let Some(store) = store.filter(|s| !s.is_empty()) {
            self.store_root = PathBuf::from(store);
        }
        match tag.as_deref() {
            Some("*") => self.expected_tag = None,
            Some(t) if !t.is_empty() => self.expected_tag = Some(t.to_string()),
            _ => {}
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = AuditConfig::default();
        assert_eq!(config.expected_tag.as_deref(), Some("SCP"));
        assert_eq!(config.synthetic_origin, "SYNTHETIC");
        assert_eq!(config.default_market_mode, "N");
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"expected_tag": null, "store_root": "/tmp/scp"}}"#).unwrap();

        let config = AuditConfig::from_file(file.path()).unwrap();
        assert_eq!(config.expected_tag, None);
        assert_eq!(config.store_root, PathBuf::from("/tmp/scp"));
        assert_eq!(config.synthetic_origin, "SYNTHETIC");
    }

    #[test]
    fn test_bad_file_is_reported() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(matches!(
            AuditConfig::from_file(file.path()),
            Err(ConfigError::Parse { .. })
        ));
        assert!(matches!(
            AuditConfig::from_file("/definitely/missing.json"),
            Err(ConfigError::Read { .. })
        ));
    }

    #[test]
    fn test_overrides() {
        let config = AuditConfig::default()
            .with_overrides(Some("/data/scp".into()), Some("*".into()));
        assert_eq!(config.store_root, PathBuf::from("/data/scp"));
        assert_eq!(config.expected_tag, None);

        let config = AuditConfig::default().with_overrides(None, Some("SpotTrace".into()));
        assert_eq!(config.expected_tag.as_deref(), Some("SpotTrace"));
    }
}
