//! Configuration types for cutout operations

use crate::error::{CutoutError, Result};
use crate::parameters::{ITERATIONS_MAX, ITERATIONS_MIN, RANGE_MAX, RANGE_MIN};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Tuning for the native segmentation runtime
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentationConfig {
    /// Gaussian components per colour model
    pub components: usize,
    /// Weight of the pairwise smoothness term
    pub smoothness: f64,
    /// Relaxation sweeps performed per refinement pass
    pub sweeps_per_pass: usize,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            components: 5,
            smoothness: 50.0,
            sweeps_per_pass: 2,
        }
    }
}

/// Configuration for a cutout module and its collaborators
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CutoutConfig {
    /// Initial value of the range parameter (1-100)
    pub default_range: u32,
    /// Initial value of the iterations parameter (2-15)
    pub default_iterations: u32,
    /// Native runtime tuning
    pub segmentation: SegmentationConfig,
    /// Endpoint of the remote graph execution service
    pub graph_endpoint: Option<String>,
    /// Timeout for remote requests in seconds
    pub request_timeout_secs: u64,
}

impl Default for CutoutConfig {
    fn default() -> Self {
        Self {
            default_range: 50,
            default_iterations: 5,
            segmentation: SegmentationConfig::default(),
            graph_endpoint: None,
            request_timeout_secs: 300,
        }
    }
}

impl CutoutConfig {
    #[must_use]
    pub fn builder() -> CutoutConfigBuilder {
        CutoutConfigBuilder::default()
    }

    /// Load a configuration from a JSON file; missing fields take defaults
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&data).map_err(|e| {
            CutoutError::invalid_config(format!(
                "Failed to parse '{}': {}",
                path.as_ref().display(),
                e
            ))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Validate value domains
    pub fn validate(&self) -> Result<()> {
        if !(RANGE_MIN..=RANGE_MAX).contains(&self.default_range) {
            return Err(CutoutError::config_value_error(
                "default range",
                self.default_range,
                "1-100",
            ));
        }
        if !(ITERATIONS_MIN..=ITERATIONS_MAX).contains(&self.default_iterations) {
            return Err(CutoutError::config_value_error(
                "default iterations",
                self.default_iterations,
                "2-15",
            ));
        }
        if !(1..=10).contains(&self.segmentation.components) {
            return Err(CutoutError::config_value_error(
                "component count",
                self.segmentation.components,
                "1-10",
            ));
        }
        if !(self.segmentation.smoothness.is_finite() && self.segmentation.smoothness > 0.0) {
            return Err(CutoutError::config_value_error(
                "smoothness",
                self.segmentation.smoothness,
                "> 0",
            ));
        }
        if self.segmentation.sweeps_per_pass == 0 {
            return Err(CutoutError::invalid_config(
                "sweeps per pass must be at least 1",
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(CutoutError::invalid_config("request timeout must be positive"));
        }
        Ok(())
    }
}

/// Builder for `CutoutConfig`
#[derive(Debug, Default)]
pub struct CutoutConfigBuilder {
    config: CutoutConfig,
}

impl CutoutConfigBuilder {
    #[must_use]
    pub fn default_range(mut self, range: u32) -> Self {
        self.config.default_range = range;
        self
    }

    #[must_use]
    pub fn default_iterations(mut self, iterations: u32) -> Self {
        self.config.default_iterations = iterations;
        self
    }

    #[must_use]
    pub fn segmentation(mut self, segmentation: SegmentationConfig) -> Self {
        self.config.segmentation = segmentation;
        self
    }

    #[must_use]
    pub fn graph_endpoint<S: Into<String>>(mut self, endpoint: S) -> Self {
        self.config.graph_endpoint = Some(endpoint.into());
        self
    }

    #[must_use]
    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs;
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> Result<CutoutConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = CutoutConfig::default();
        assert_eq!(config.default_range, 50);
        assert_eq!(config.default_iterations, 5);
        assert_eq!(config.segmentation.components, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_validation() {
        assert!(CutoutConfig::builder().default_range(0).build().is_err());
        assert!(CutoutConfig::builder().default_iterations(16).build().is_err());
        let err = CutoutConfig::builder()
            .segmentation(SegmentationConfig {
                components: 0,
                ..SegmentationConfig::default()
            })
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("component count"));

        let config = CutoutConfig::builder()
            .default_range(10)
            .graph_endpoint("http://localhost:9090/graph")
            .build()
            .unwrap();
        assert_eq!(config.default_range, 10);
        assert_eq!(
            config.graph_endpoint.as_deref(),
            Some("http://localhost:9090/graph")
        );
    }

    #[test]
    fn test_from_json_file_with_partial_fields() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"default_iterations": 8, "segmentation": {{"smoothness": 25.0}}}}"#)
            .unwrap();

        let config = CutoutConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.default_iterations, 8);
        assert_eq!(config.default_range, 50);
        assert!((config.segmentation.smoothness - 25.0).abs() < f64::EPSILON);
        assert_eq!(config.segmentation.components, 5);
    }

    #[test]
    fn test_from_json_file_rejects_out_of_domain() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"default_range": 500}}"#).unwrap();
        assert!(matches!(
            CutoutConfig::from_json_file(file.path()),
            Err(CutoutError::InvalidConfig(_))
        ));
    }
}
