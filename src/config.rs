//! Store configuration.
//!
//! Defines where dataset files live, how they are named and when they rotate.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, IoResultExt, Result};

/// Field delimiter of the on-disk format.
pub const DELIMITER: char = '|';
/// Escape character of the on-disk format.
pub const ESCAPE: char = '\\';
/// Quote character; never used to quote, but escaped like the delimiter.
pub const QUOTE: char = '"';
/// Line terminator of the on-disk format.
pub const LINE_TERMINATOR: char = '\n';

pub const DEFAULT_ROTATE_MAX: u32 = 10;
pub const DEFAULT_ROTATE_SIZE: u64 = 1024 * 1024;
pub const DEFAULT_MACHINE_TIME_KEY: &str = "unixtime";
pub const DEFAULT_DISPLAY_TIME_KEY: &str = "timestamp";

/// Configuration for a [`Store`](crate::Store).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory holding the dataset files.
    pub root: PathBuf,

    /// Suffix appended to every dataset file name.
    /// Default: empty
    pub extension: String,

    /// Rotate the live file once it reaches `rotate_size`.
    /// Default: true
    pub rotate: bool,

    /// Number of numbered backups kept per dataset.
    /// Default: 10
    pub rotate_max: u32,

    /// Live file size in bytes that triggers a rotation.
    /// Default: 1 MiB
    pub rotate_size: u64,

    /// Name of column 0, the microsecond machine time.
    pub machine_time_key: String,

    /// Name of column 1, the rendered display time.
    pub display_time_key: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            extension: String::new(),
            rotate: true,
            rotate_max: DEFAULT_ROTATE_MAX,
            rotate_size: DEFAULT_ROTATE_SIZE,
            machine_time_key: DEFAULT_MACHINE_TIME_KEY.to_string(),
            display_time_key: DEFAULT_DISPLAY_TIME_KEY.to_string(),
        }
    }
}

impl StoreConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    /// Load a configuration from a JSON document on disk.
    ///
    /// Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// - `Error::Disk`: the file could not be read
    /// - `Error::BadJson`: the document is not a valid configuration
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).at(path)?;
        let config: StoreConfig = serde_json::from_str(&text)
            .map_err(|err| Error::bad_json(format!("{}: {err}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.rotate_max == 0 {
            return Err(Error::bad_json("rotate_max must be at least 1"));
        }
        if self.machine_time_key.trim().is_empty() || self.display_time_key.trim().is_empty() {
            return Err(Error::bad_json("time column names must not be blank"));
        }
        if self.machine_time_key == self.display_time_key {
            return Err(Error::bad_json("time column names must differ"));
        }
        for key in [&self.machine_time_key, &self.display_time_key] {
            if key.contains(DELIMITER) || key.contains(LINE_TERMINATOR) {
                return Err(Error::bad_json(format!("time column name '{key}' not storable")));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_store_config_default() {
        let config = StoreConfig::default();
        assert!(config.rotate);
        assert_eq!(config.rotate_max, 10);
        assert_eq!(config.rotate_size, 1_048_576);
        assert_eq!(config.machine_time_key, "unixtime");
        assert_eq!(config.display_time_key, "timestamp");
        assert!(config.extension.is_empty());
        config.validate().expect("defaults valid");
    }

    #[test]
    fn test_load_fills_missing_fields() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("cronbook.json");
        std::fs::write(&path, r#"{ "root": "/srv/log", "rotate_max": 3 }"#).expect("write");

        let config = StoreConfig::load(&path).expect("load");
        assert_eq!(config.root, PathBuf::from("/srv/log"));
        assert_eq!(config.rotate_max, 3);
        assert_eq!(config.rotate_size, DEFAULT_ROTATE_SIZE);
    }

    #[test]
    fn test_load_rejects_zero_backups() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("cronbook.json");
        std::fs::write(&path, r#"{ "rotate_max": 0 }"#).expect("write");

        let err = StoreConfig::load(&path).unwrap_err();
        assert!(matches!(err, Error::BadJson { .. }));
    }

    #[test]
    fn test_load_missing_file_is_disk_error() {
        let dir = tempdir().expect("tempdir");
        let err = StoreConfig::load(dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, Error::Disk { .. }));
    }

    #[test]
    fn test_config_serialization() {
        let config = StoreConfig::new("/srv/log");
        let json = serde_json::to_string(&config).expect("serialize");
        let back: StoreConfig = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(config, back);
    }
}
