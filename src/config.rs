//! Analysis options.
//!
//! Options are plain serde structs with defaults for every field so a YAML
//! file only needs to name what it overrides. Command-line flags are applied
//! on top of whatever the file provides.

use std::{
    fs::File,
    io::{Read, Write},
    path::Path,
};

use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PREVIEW_ROWS: usize = 10;
pub const DEFAULT_PROMPT_SAMPLE_ROWS: usize = 15;
pub const DEFAULT_MAX_FILE_BYTES: u64 = 100 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisOptions {
    pub inference: InferenceOptions,
    pub preview_rows: usize,
    pub prompt_sample_rows: usize,
    pub max_file_bytes: u64,
    pub anomaly_z_threshold: f64,
    pub anomaly_sample_limit: usize,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            inference: InferenceOptions::default(),
            preview_rows: DEFAULT_PREVIEW_ROWS,
            prompt_sample_rows: DEFAULT_PROMPT_SAMPLE_ROWS,
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
            anomaly_z_threshold: 2.0,
            anomaly_sample_limit: 5,
        }
    }
}

/// Type inference looks at the first `sample_size` non-missing values of a
/// column. With one sample the first value decides; with more, a strict
/// majority of numeric samples is required.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceOptions {
    pub sample_size: usize,
}

impl Default for InferenceOptions {
    fn default() -> Self {
        Self { sample_size: 1 }
    }
}

impl AnalysisOptions {
    pub fn load(path: &Path) -> Result<Self> {
        let mut file =
            File::open(path).with_context(|| format!("Opening options file {path:?}"))?;
        let mut raw = String::new();
        file.read_to_string(&mut raw)
            .with_context(|| format!("Reading options file {path:?}"))?;
        let options: AnalysisOptions = serde_yaml::from_str(&raw)
            .with_context(|| format!("Parsing options YAML from {path:?}"))?;
        options.validate()?;
        Ok(options)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let serialized = self.to_yaml_string()?;
        let mut file =
            File::create(path).with_context(|| format!("Creating options file {path:?}"))?;
        file.write_all(serialized.as_bytes())?;
        file.flush()?;
        Ok(())
    }

    pub fn to_yaml_string(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.inference.sample_size > 0,
            "inference.sample_size must be at least 1"
        );
        ensure!(self.max_file_bytes > 0, "max_file_bytes must be positive");
        ensure!(
            self.anomaly_z_threshold.is_finite() && self.anomaly_z_threshold > 0.0,
            "anomaly_z_threshold must be a positive number"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_yaml_keeps_defaults() {
        let options: AnalysisOptions =
            serde_yaml::from_str("preview_rows: 3\ninference:\n  sample_size: 50\n").unwrap();
        assert_eq!(options.preview_rows, 3);
        assert_eq!(options.inference.sample_size, 50);
        assert_eq!(options.prompt_sample_rows, DEFAULT_PROMPT_SAMPLE_ROWS);
        assert_eq!(options.max_file_bytes, DEFAULT_MAX_FILE_BYTES);
    }

    #[test]
    fn save_then_load_preserves_options() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("options.yml");
        let options = AnalysisOptions {
            preview_rows: 4,
            ..AnalysisOptions::default()
        };
        options.save(&path).unwrap();
        assert_eq!(AnalysisOptions::load(&path).unwrap(), options);
    }

    #[test]
    fn zero_sample_size_is_rejected() {
        let options = AnalysisOptions {
            inference: InferenceOptions { sample_size: 0 },
            ..AnalysisOptions::default()
        };
        assert!(options.validate().is_err());
    }
}
