//! Engine configuration.
//!
//! All fields have defaults. A TOML file named by `SMARTMON_CONFIG` is read
//! first, then environment variables override individual fields.
//!
//! | Variable                  | Field            | Default  |
//! |---------------------------|------------------|----------|
//! | `SMARTMON_CONFIG`         | (file path)      | unset    |
//! | `SMARTMON_TOLERANCE`      | `tolerance`      | `normal` |
//! | `SMARTMON_USE_DEFAULT_DB` | `use_default_db` | `true`   |
//! | `SMARTMON_SCAN_TYPES`     | `scan_types`     | empty    |
//! | `SMARTMON_DEBUG`          | `debug`          | `0`      |

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::SmartError;
use crate::options::Baseline;
use crate::tolerance::ToleranceMode;

pub const CONFIG_ENV: &str = "SMARTMON_CONFIG";

/// Per-protocol debug verbosity. Any non-zero level keeps scan diagnostics
/// visible.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DebugLevels {
    pub ata: u8,
    pub scsi: u8,
    pub nvme: u8,
}

impl DebugLevels {
    pub fn any(&self) -> bool {
        self.ata > 0 || self.scsi > 0 || self.nvme > 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub tolerance: ToleranceMode,
    /// Load the default drive database when it is first needed.
    pub use_default_db: bool,
    /// Device types to restrict scans to. Empty scans every type.
    pub scan_types: Vec<String>,
    pub debug: DebugLevels,
    pub baseline: Baseline,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tolerance: ToleranceMode::Normal,
            use_default_db: true,
            scan_types: Vec::new(),
            debug: DebugLevels::default(),
            baseline: Baseline::default(),
        }
    }
}

impl EngineConfig {
    /// File named by `SMARTMON_CONFIG` (if any) plus environment overrides.
    #[must_use]
    pub fn load() -> Self {
        let config = match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::from_file(Path::new(&path)),
            None => Self::default(),
        };
        config.with_env_overrides()
    }

    /// Falls back to defaults if the file is missing or malformed.
    #[must_use]
    pub fn from_file(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => match Self::from_toml(&contents) {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "failed to parse engine config, using defaults"
                    );
                    Self::default()
                }
            },
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to read engine config, using defaults"
                );
                Self::default()
            }
        }
    }

    pub fn from_toml(contents: &str) -> Result<Self, SmartError> {
        toml::from_str(contents).map_err(|e| SmartError::InvalidConfig(e.to_string()))
    }

    /// Invalid values are ignored and the current value is kept.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(val) = std::env::var("SMARTMON_TOLERANCE") {
            match ToleranceMode::parse(&val) {
                Some(mode) => self.tolerance = mode,
                None => tracing::warn!(value = %val, "ignoring unknown SMARTMON_TOLERANCE"),
            }
        }
        if let Ok(val) = std::env::var("SMARTMON_USE_DEFAULT_DB") {
            self.use_default_db = val == "true" || val == "1";
        }
        if let Ok(val) = std::env::var("SMARTMON_SCAN_TYPES") {
            self.scan_types = val
                .split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Ok(val) = std::env::var("SMARTMON_DEBUG") {
            if let Ok(level) = val.parse::<u8>() {
                self.debug = DebugLevels {
                    ata: level,
                    scsi: level,
                    nvme: level,
                };
            }
        }
        self
    }

    pub fn validate(&self) -> Result<(), SmartError> {
        for t in &self.scan_types {
            if t.is_empty() || t.chars().any(char::is_whitespace) {
                return Err(SmartError::InvalidConfig(format!(
                    "scan type '{t}' must be a non-empty word"
                )));
            }
        }
        let ata = &self.baseline.ata;
        if !(-1..=1).contains(&ata.identify_word_level) || !(-1..=2).contains(&ata.identify_bit_level)
        {
            return Err(SmartError::InvalidConfig(
                "identify levels out of range".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = EngineConfig::from_toml(
            r#"
            tolerance = "conservative"
            scan_types = ["nvme"]

            [baseline.ata]
            smart_vendor_attrib = true

            [baseline.ata.output_format]
            hex_id = true
            "#,
        )
        .unwrap();
        assert_eq!(config.tolerance, ToleranceMode::Conservative);
        assert!(config.use_default_db);
        assert_eq!(config.scan_types, vec!["nvme"]);
        assert!(config.baseline.ata.smart_vendor_attrib);
        assert!(config.baseline.ata.output_format.hex_id);
        assert_eq!(config.baseline.ata.identify_word_level, -1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn malformed_file_falls_back_to_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "tolerance = [").unwrap();
        assert_eq!(EngineConfig::from_file(file.path()), EngineConfig::default());
    }

    #[test]
    fn config_file_sets_database_and_debug() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "use_default_db = false\n[debug]\nnvme = 2").unwrap();
        let config = EngineConfig::from_file(file.path());
        assert!(!config.use_default_db);
        assert!(config.debug.any());
    }

    #[test]
    fn validation_rejects_blank_scan_types() {
        let mut config = EngineConfig::default();
        config.scan_types = vec!["sat auto".to_string()];
        assert!(config.validate().is_err());
        config.scan_types = vec![String::new()];
        assert!(config.validate().is_err());
    }
}
