#![allow(clippy::too_many_lines)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::unused_async)]

//! # Canvas Cutout
//!
//! Boolean cutout pipeline for the inpaint mask layers of a canvas editor.
//!
//! A [`BooleanCutout`] module is attached to one inpaint mask layer. It
//! combines the flattened composite of the visible raster layers with the
//! mask image in one of four ways:
//!
//! - `erase` / `extract`: delegated to a remote graph execution service as a
//!   single `boolean_op` node
//! - `erase (fit)` / `extract (fit)`: computed locally. The mask is turned
//!   into a trimap by erosion and dilation, the trimap is refined against
//!   the composite's colours by iterative segmentation, and the result
//!   becomes the composite's alpha channel
//!
//! The result is persisted, registered as a new selected raster layer at
//! the mask layer's origin, and cached so it can be promoted to a new
//! inpaint mask layer afterwards.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use canvas_cutout::{BooleanCutout, CutoutConfig, OperationKind};
//! # use canvas_cutout::canvas::{Compositor, LayerStore, MaskLayer};
//! # use std::sync::Arc;
//!
//! # async fn example(
//! #     mask_layer: Arc<dyn MaskLayer>,
//! #     store: Arc<dyn LayerStore>,
//! #     compositor: Arc<dyn Compositor>,
//! # ) -> anyhow::Result<()> {
//! let cutout = BooleanCutout::builder()
//!     .config(CutoutConfig::builder().graph_endpoint("http://localhost:9090/graph").build()?)
//!     .mask_layer(mask_layer)
//!     .layer_store(store)
//!     .compositor(compositor)
//!     .build()?;
//!
//! cutout.set_range(30);
//! let result = cutout.perform_operation(OperationKind::ExtractedFit).await?;
//! println!("new layer image: {}", result.image.image_name);
//! cutout.save_as_inpaint_mask()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Local segmentation only
//!
//! ```rust,no_run
//! use canvas_cutout::engine::{cutout_image, FitMode};
//! use canvas_cutout::{CutoutParameters, NativeRuntime};
//!
//! # fn example() -> anyhow::Result<()> {
//! let composite = image::open("composite.png")?;
//! let mask = image::open("mask.png")?;
//! let mut runtime = NativeRuntime::default();
//! let cut = cutout_image(
//!     &mut runtime,
//!     &composite,
//!     &mask,
//!     CutoutParameters::default(),
//!     FitMode::Extract,
//! )?;
//! cut.save("cutout.png")?;
//! # Ok(())
//! # }
//! ```
//!
//! ### Feature Flags
//!
//! - `cli` (default): the `canvas-cutout` binary and tracing subscriber setup
//! - `tracing-json`: JSON log output for the CLI
//! - `tracing-files`: log file output for the CLI

pub mod acquisition;
pub mod canvas;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod graph;
pub mod parameters;
pub mod processor;
pub mod services;
#[cfg(feature = "cli")]
pub mod tracing_config;
pub mod types;
pub mod vision;

// Public API exports
pub use acquisition::{ImageAcquisition, SourceImages};
pub use canvas::{Compositor, LayerStore, MaskLayer, MaskLayerState};
pub use config::{CutoutConfig, CutoutConfigBuilder, SegmentationConfig};
pub use engine::FitMode;
pub use error::{CutoutError, Result};
pub use graph::{BooleanOpClient, Graph, GraphExecutor, HttpGraphExecutor};
pub use parameters::CutoutParameters;
pub use processor::{BooleanCutout, BooleanCutoutBuilder, Observer, SubscriptionId, MODULE_TYPE};
pub use services::{
    BitmapLoader, FallbackLocalizer, Localizer, NoOpNotifier, Notices, Notifier,
    RecordingNotifier, TracingNotifier, UrlBitmapLoader,
};
pub use types::{
    CanvasObject, CutoutSnapshot, ImageObject, ImageResource, LayerPlacement, Notification,
    NotificationStatus, OperationKind, Position, RasterLayerInfo, Rect,
};
pub use vision::{MatId, MatScope, NativeRuntime, VisionRuntime};

#[cfg(feature = "cli")]
pub use tracing_config::{init_cli_tracing, TracingConfig, TracingFormat, TracingOutput};
