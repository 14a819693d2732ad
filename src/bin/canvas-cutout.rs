//! Canvas cutout CLI tool
//!
//! Command-line interface for the boolean cutout pipeline of the
//! canvas-cutout library.

#[cfg(feature = "cli")]
use canvas_cutout::cli;

#[cfg(feature = "cli")]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    cli::main().await
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("CLI feature not enabled. Please rebuild with --features cli");
    std::process::exit(1);
}
