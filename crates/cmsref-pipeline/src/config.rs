//! # Pipeline Configuration
//!
//! One explicit value, built once (from YAML or defaults), validated, and
//! passed by reference. Nothing reads configuration from globals.
//!
//! ```yaml
//! contracts_dir: contracts
//! layouts_dir: layouts
//! mappings_dir: mappings
//! quarantine_rate_threshold: 0.05
//! verify_determinism: true
//! skip_line_prefixes: ["#", "HDR", "TRL"]
//! delimiter: "|"
//! ```

use std::path::{Path, PathBuf};

use cmsref_ingest::LineFilter;
use cmsref_schema::ContractStore;
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

/// Run configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Directory of `{dataset}_v{version}.json` contracts.
    pub contracts_dir: PathBuf,
    /// Directory of `{dataset}_{vintage}.json` layouts.
    pub layouts_dir: PathBuf,
    /// Directory of `{dataset}.json` API mappings.
    pub mappings_dir: PathBuf,
    /// Largest quarantined fraction at which accepted rows still publish.
    pub quarantine_rate_threshold: f64,
    /// Recompute every accepted row hash before publishing.
    pub verify_determinism: bool,
    /// Physical lines starting with one of these are not data.
    pub skip_line_prefixes: Vec<String>,
    /// Field delimiter for delimited sources, one ASCII character.
    pub delimiter: char,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            contracts_dir: PathBuf::from("contracts"),
            layouts_dir: PathBuf::from("layouts"),
            mappings_dir: PathBuf::from("mappings"),
            quarantine_rate_threshold: 0.05,
            verify_determinism: false,
            skip_line_prefixes: vec!["#".into(), "HDR".into(), "TRL".into()],
            delimiter: ',',
        }
    }
}

impl PipelineConfig {
    /// Parse and validate a YAML config. Missing keys take their defaults.
    ///
    /// # Errors
    ///
    /// [`PipelineError::ConfigParse`] for bad YAML or unknown keys, and
    /// [`PipelineError::InvalidConfig`] for out-of-range values.
    pub fn from_yaml_str(text: &str, path: impl Into<PathBuf>) -> Result<Self> {
        let config: Self = serde_yaml::from_str(text).map_err(|source| PipelineError::ConfigParse {
            path: path.into(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse, and validate a YAML config file.
    ///
    /// Relative directories in the file are resolved against the file's
    /// own directory.
    ///
    /// # Errors
    ///
    /// As [`Self::from_yaml_str`], plus [`PipelineError::Io`].
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| PipelineError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_yaml_str(&text, path)?;
        if let Some(base) = path.parent() {
            config.rebase(base);
        }
        Ok(config)
    }

    /// Resolve relative definition directories against `base`.
    pub fn rebase(&mut self, base: &Path) {
        for dir in [&mut self.contracts_dir, &mut self.layouts_dir, &mut self.mappings_dir] {
            if dir.is_relative() {
                *dir = base.join(&*dir);
            }
        }
    }

    /// Check value ranges.
    ///
    /// # Errors
    ///
    /// [`PipelineError::InvalidConfig`] describing the first bad value.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.quarantine_rate_threshold) {
            return Err(PipelineError::InvalidConfig(format!(
                "quarantine_rate_threshold must be within [0, 1], got {}",
                self.quarantine_rate_threshold
            )));
        }
        if !self.delimiter.is_ascii() || self.delimiter == '\n' || self.delimiter == '"' {
            return Err(PipelineError::InvalidConfig(format!(
                "delimiter must be a single ASCII character other than newline or quote, got {:?}",
                self.delimiter
            )));
        }
        Ok(())
    }

    /// Delimiter as the byte the CSV reader wants.
    pub fn delimiter_byte(&self) -> u8 {
        // validate() guarantees ASCII
        u8::try_from(u32::from(self.delimiter)).unwrap_or(b',')
    }

    /// Line filter built from `skip_line_prefixes`.
    pub fn line_filter(&self) -> LineFilter {
        LineFilter::prefixes(self.skip_line_prefixes.iter().cloned())
    }

    /// Contract store over the configured directories.
    pub fn store(&self) -> ContractStore {
        ContractStore::new(&self.contracts_dir, &self.layouts_dir, &self.mappings_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.quarantine_rate_threshold, 0.05);
        assert!(!config.verify_determinism);
        assert_eq!(config.skip_line_prefixes, ["#", "HDR", "TRL"]);
        assert_eq!(config.delimiter_byte(), b',');
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let config =
            PipelineConfig::from_yaml_str("verify_determinism: true\ndelimiter: \"|\"\n", "c.yaml").unwrap();
        assert!(config.verify_determinism);
        assert_eq!(config.delimiter_byte(), b'|');
        assert_eq!(config.quarantine_rate_threshold, 0.05);
        assert_eq!(config.contracts_dir, PathBuf::from("contracts"));
    }

    #[test]
    fn tab_delimiter_from_yaml_escape() {
        let config = PipelineConfig::from_yaml_str("delimiter: \"\\t\"\n", "c.yaml").unwrap();
        assert_eq!(config.delimiter_byte(), b'\t');
    }

    #[test]
    fn threshold_out_of_range_is_rejected() {
        let err = PipelineConfig::from_yaml_str("quarantine_rate_threshold: 1.5\n", "c.yaml").unwrap_err();
        assert!(matches!(err, PipelineError::InvalidConfig(_)));
    }

    #[test]
    fn unknown_key_is_a_parse_error() {
        let err = PipelineConfig::from_yaml_str("quarantine_rate: 0.1\n", "c.yaml").unwrap_err();
        assert!(matches!(err, PipelineError::ConfigParse { .. }));
    }

    #[test]
    fn file_dirs_resolve_against_config_location() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cmsref.yaml");
        std::fs::write(&path, "contracts_dir: defs/contracts\nlayouts_dir: /abs/layouts\n").unwrap();
        let config = PipelineConfig::from_yaml_file(&path).unwrap();
        assert_eq!(config.contracts_dir, dir.path().join("defs/contracts"));
        assert_eq!(config.layouts_dir, PathBuf::from("/abs/layouts"));
        assert_eq!(config.mappings_dir, dir.path().join("mappings"));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = PipelineConfig::from_yaml_file("/nonexistent/cmsref.yaml").unwrap_err();
        assert!(matches!(err, PipelineError::Io { .. }));
    }
}
