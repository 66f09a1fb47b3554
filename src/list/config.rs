//! List configuration
//!
//! Configured by the embedding application (struct literal, JSON string or
//! JSON file), immutable once the list is built. Every field has a default,
//! so `{}` is a valid configuration.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::observability::{Event, Logger};
use crate::persist::{PersistError, PersistResult};

use super::render::SEPARATOR;

/// Behavior of `modify_at`, `insert_after` and `delete_at` when the index
/// runs past the end of the list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PastEndPolicy {
    /// `modify_at` and `insert_after` append the value; `delete_at` is a
    /// no-op. A warning is logged either way.
    #[default]
    Append,
    /// Fail with `IndexOutOfRange` and consume no version.
    Reject,
}

impl PastEndPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            PastEndPolicy::Append => "append",
            PastEndPolicy::Reject => "reject",
        }
    }
}

/// Configuration of a `PersistentList`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ListConfig {
    /// Past-the-end index handling (default: append)
    #[serde(default)]
    pub past_end: PastEndPolicy,

    /// Rendering of a never-written value (default: "null")
    #[serde(default = "default_absent_marker")]
    pub absent_marker: String,
}

fn default_absent_marker() -> String {
    "null".to_string()
}

impl Default for ListConfig {
    fn default() -> Self {
        Self {
            past_end: PastEndPolicy::default(),
            absent_marker: default_absent_marker(),
        }
    }
}

impl ListConfig {
    /// Configuration that rejects past-the-end indices.
    pub fn strict() -> Self {
        Self {
            past_end: PastEndPolicy::Reject,
            ..Self::default()
        }
    }

    /// Parse and validate a JSON configuration.
    pub fn from_json_str(json: &str) -> PersistResult<Self> {
        let config: ListConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a JSON file.
    pub fn load(path: &Path) -> PersistResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            PersistError::config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let config = Self::from_json_str(&content)?;

        Logger::info(
            Event::ConfigLoaded,
            &[
                ("absent_marker", config.absent_marker.as_str()),
                ("past_end", config.past_end.as_str()),
                ("path", path.display().to_string().as_str()),
            ],
        );
        Ok(config)
    }

    /// Reject markers that would make renderings ambiguous.
    pub fn validate(&self) -> PersistResult<()> {
        if self.absent_marker.is_empty() {
            return Err(PersistError::config("absent_marker must not be empty"));
        }
        if self.absent_marker.contains(SEPARATOR) {
            return Err(PersistError::config(format!(
                "absent_marker must not contain {:?}",
                SEPARATOR
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = ListConfig::default();
        assert_eq!(config.past_end, PastEndPolicy::Append);
        assert_eq!(config.absent_marker, "null");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_json_is_default() {
        assert_eq!(ListConfig::from_json_str("{}").unwrap(), ListConfig::default());
    }

    #[test]
    fn test_parse_policy() {
        let config = ListConfig::from_json_str(r#"{"past_end":"reject"}"#).unwrap();
        assert_eq!(config, ListConfig::strict());
    }

    #[test]
    fn test_unknown_key_rejected() {
        let err = ListConfig::from_json_str(r#"{"past_end":"append","colour":1}"#).unwrap_err();
        assert_eq!(err.code(), "TIMELINK_INVALID_CONFIG");
    }

    #[test]
    fn test_unknown_policy_rejected() {
        assert!(ListConfig::from_json_str(r#"{"past_end":"wrap"}"#).is_err());
    }

    #[test]
    fn test_marker_validation() {
        assert!(ListConfig::from_json_str(r#"{"absent_marker":""}"#).is_err());
        assert!(ListConfig::from_json_str(r#"{"absent_marker":"a->b"}"#).is_err());
        let config = ListConfig::from_json_str(r#"{"absent_marker":"_"}"#).unwrap();
        assert_eq!(config.absent_marker, "_");
    }

    #[test]
    fn test_load_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("list.json");
        fs::write(&path, r#"{"past_end":"reject","absent_marker":"-"}"#).unwrap();

        let config = ListConfig::load(&path).unwrap();
        assert_eq!(config.past_end, PastEndPolicy::Reject);
        assert_eq!(config.absent_marker, "-");
    }

    #[test]
    fn test_load_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("missing.json");

        let err = ListConfig::load(&path).unwrap_err();
        assert_eq!(err.code(), "TIMELINK_INVALID_CONFIG");
        assert!(err.to_string().contains("missing.json"));
    }

    #[test]
    fn test_load_invalid_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("list.json");
        fs::write(&path, r#"{"absent_marker":"x->y"}"#).unwrap();

        let err = ListConfig::load(&path).unwrap_err();
        assert_eq!(err.code(), "TIMELINK_INVALID_CONFIG");
    }

    #[test]
    fn test_serialize_round_trip_names() {
        let json = serde_json::to_string(&ListConfig::strict()).unwrap();
        assert!(json.contains("\"reject\""));
    }
}
