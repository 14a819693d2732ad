//! Configuration conversion utilities for CLI arguments

use crate::cli::main_impl::{Cli, CliOperation};
use crate::config::CutoutConfig;
use crate::types::OperationKind;
use anyhow::{Context, Result};

/// Convert CLI arguments to a [`CutoutConfig`]
pub(crate) struct CliConfigBuilder;

impl CliConfigBuilder {
    /// Configuration file first, then command line overrides
    pub(crate) fn from_cli(cli: &Cli) -> Result<CutoutConfig> {
        let mut config = match &cli.config {
            Some(path) => CutoutConfig::from_json_file(path)
                .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
            None => CutoutConfig::default(),
        };

        if let Some(endpoint) = &cli.graph_endpoint {
            config.graph_endpoint = Some(endpoint.clone());
        }
        if let Some(timeout) = cli.timeout {
            config.request_timeout_secs = timeout;
        }

        config.validate().context("Invalid configuration")?;
        Ok(config)
    }

    /// Reject argument combinations that cannot succeed
    pub(crate) fn validate_cli(cli: &Cli, config: &CutoutConfig) -> Result<()> {
        let kind = Self::operation_kind(cli.operation);
        if !kind.is_fit() && config.graph_endpoint.is_none() {
            anyhow::bail!(
                "Operation '{}' runs on the graph service; pass --graph-endpoint or set graph_endpoint in the configuration",
                kind
            );
        }
        if !cli.composite.exists() {
            anyhow::bail!("Composite image not found: {}", cli.composite.display());
        }
        if !cli.mask.exists() {
            anyhow::bail!("Mask image not found: {}", cli.mask.display());
        }
        Ok(())
    }

    pub(crate) fn operation_kind(operation: CliOperation) -> OperationKind {
        match operation {
            CliOperation::Erase => OperationKind::Erase,
            CliOperation::Extract => OperationKind::Extract,
            CliOperation::EraseFit => OperationKind::ErasedFit,
            CliOperation::ExtractFit => OperationKind::ExtractedFit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::io::Write;

    #[test]
    fn test_overrides_apply_over_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"default_range": 30, "request_timeout_secs": 10}}"#).unwrap();

        let cli = Cli::parse_from([
            "canvas-cutout",
            "--composite",
            "c.png",
            "--mask",
            "m.png",
            "--config",
            file.path().to_str().unwrap(),
            "--graph-endpoint",
            "http://localhost:9090/graph",
        ]);
        let config = CliConfigBuilder::from_cli(&cli).unwrap();
        assert_eq!(config.default_range, 30);
        assert_eq!(config.request_timeout_secs, 10);
        assert_eq!(
            config.graph_endpoint.as_deref(),
            Some("http://localhost:9090/graph")
        );
    }

    #[test]
    fn test_remote_operation_needs_endpoint() {
        let dir = tempfile::tempdir().unwrap();
        let composite = dir.path().join("c.png");
        let mask = dir.path().join("m.png");
        std::fs::write(&composite, b"").unwrap();
        std::fs::write(&mask, b"").unwrap();

        let cli = Cli::parse_from([
            "canvas-cutout",
            "--composite",
            composite.to_str().unwrap(),
            "--mask",
            mask.to_str().unwrap(),
            "--operation",
            "erase",
        ]);
        let config = CliConfigBuilder::from_cli(&cli).unwrap();
        assert!(CliConfigBuilder::validate_cli(&cli, &config).is_err());

        let cli = Cli::parse_from([
            "canvas-cutout",
            "--composite",
            composite.to_str().unwrap(),
            "--mask",
            mask.to_str().unwrap(),
        ]);
        assert!(CliConfigBuilder::validate_cli(&cli, &config).is_ok());
    }
}
