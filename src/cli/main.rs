//! Canvas cutout CLI tool
//!
//! Runs one boolean cutout operation against a composite image and an
//! inpaint mask image, writing the result into an output directory.

use super::config::CliConfigBuilder;
use super::workspace::{self, DirectoryStore, FileCompositor};
use crate::processor::BooleanCutout;
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use instant::Instant;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

/// Boolean cutout of a composite image by an inpaint mask
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "canvas-cutout")]
pub struct Cli {
    /// Flattened image of the visible raster layers
    #[arg(long, value_name = "IMAGE")]
    pub composite: PathBuf,

    /// Inpaint mask image
    #[arg(long, value_name = "IMAGE")]
    pub mask: PathBuf,

    /// Operation to perform
    #[arg(short = 'p', long, value_enum, default_value_t = CliOperation::ExtractFit)]
    pub operation: CliOperation,

    /// Range for fit operations (clamped to 1-100)
    #[arg(short, long, allow_negative_numbers = true)]
    pub range: Option<i64>,

    /// Segmentation iterations for fit operations (clamped to 2-15)
    #[arg(short, long, allow_negative_numbers = true)]
    pub iterations: Option<i64>,

    /// Graph execution endpoint for erase/extract
    #[arg(long, value_name = "URL")]
    pub graph_endpoint: Option<String>,

    /// Timeout for remote requests in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// JSON configuration file
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Output directory for persisted images
    #[arg(short, long, default_value = "cutout-output")]
    pub output: PathBuf,

    /// Also save the result as an inpaint mask layer
    #[arg(long)]
    pub save_mask: bool,

    /// Enable verbose logging (-v: DEBUG, -vv: TRACE)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum CliOperation {
    Erase,
    Extract,
    EraseFit,
    ExtractFit,
}

pub async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _tracing = crate::tracing_config::init_cli_tracing(cli.verbose)
        .context("Failed to initialize tracing")?;

    let config = CliConfigBuilder::from_cli(&cli).context("Failed to build configuration")?;
    CliConfigBuilder::validate_cli(&cli, &config).context("Invalid CLI arguments")?;
    let kind = CliConfigBuilder::operation_kind(cli.operation);

    let mask_layer = workspace::mask_layer(&cli.mask)
        .with_context(|| format!("Failed to read mask {}", cli.mask.display()))?;
    let store = Arc::new(DirectoryStore::new(cli.output.clone()));
    let cutout = BooleanCutout::builder()
        .config(config)
        .mask_layer(Arc::new(mask_layer))
        .layer_store(store.clone())
        .compositor(Arc::new(FileCompositor::new(cli.composite.clone())))
        .build()
        .context("Failed to create cutout module")?;

    if let Some(range) = cli.range {
        let stored = cutout.set_range(range);
        debug!(requested = range, stored, "Range set");
    }
    if let Some(iterations) = cli.iterations {
        let stored = cutout.set_iterations(iterations);
        debug!(requested = iterations, stored, "Iterations set");
    }

    info!(
        operation = %kind,
        composite = %cli.composite.display(),
        mask = %cli.mask.display(),
        range = cutout.range(),
        iterations = cutout.iterations(),
        "Starting cutout"
    );

    let start_time = Instant::now();
    cutout.start();
    let result = cutout
        .perform_operation(kind)
        .await
        .with_context(|| format!("Operation '{}' failed", kind))?;

    if cli.save_mask {
        cutout
            .save_as_inpaint_mask()
            .context("Failed to save result as inpaint mask")?;
    }
    cutout.destroy();

    info!(
        result = %result.image.image_url,
        raster_layers = store.raster_count(),
        mask_layers = store.mask_count(),
        "Finished in {:.2}s",
        start_time.elapsed().as_secs_f64()
    );
    println!("{}", result.image.image_url);
    Ok(())
}
