//! Error types for cutout operations

use thiserror::Error;

/// Result type alias for cutout operations
pub type Result<T> = std::result::Result<T, CutoutError>;

/// Error taxonomy for the cutout pipeline
#[derive(Error, Debug)]
pub enum CutoutError {
    /// The mask layer holds no image object as its first object
    #[error("InpaintMask layer has no image object")]
    NoMaskImage,

    /// No raster layer is both visible and not hidden
    #[error("No visible raster layers to composite")]
    NoVisibleLayers,

    /// The compositor failed to flatten the visible raster layers
    #[error("Composite export failed: {0}")]
    ExportFailed(String),

    /// The vision runtime is missing or not ready
    #[error("Vision runtime is not loaded or is invalid")]
    EngineUnavailable,

    /// The composite source decoded into an empty matrix
    #[error("Failed to load source image")]
    SourceLoadFailed,

    /// The mask decoded into an empty matrix
    #[error("Failed to load mask image")]
    MaskLoadFailed,

    /// A matrix carries a channel count the pipeline cannot normalize
    #[error("{role} image has unsupported channel count {channels}")]
    UnsupportedChannels { role: &'static str, channels: usize },

    /// A buffer handed to persistence is not a non-empty RGBA buffer
    #[error("Invalid buffer: expected non-empty RGBA, got {channels} channels (empty: {empty})")]
    InvalidBuffer { channels: usize, empty: bool },

    /// Persisting a drawing surface as an image resource failed
    #[error("Failed to persist image: {0}")]
    PersistFailed(String),

    /// The remote graph execution service rejected or failed the operation
    #[error("Remote boolean operation failed: {0}")]
    RemoteOpFailed(String),

    /// Another operation is already in flight on this module
    #[error("Operation already in progress")]
    ConcurrentOperationRejected,

    /// There is no cached result to promote to a mask layer
    #[error("No result to save")]
    NoResultToSave,

    /// Registering a layer with the layer store failed
    #[error("Layer registration failed: {0}")]
    LayerRegistration(String),

    /// A vision runtime operation was misused or failed internally
    #[error("Vision runtime error: {0}")]
    Runtime(String),

    /// The in-flight operation was cancelled
    #[error("Operation cancelled")]
    Cancelled,

    /// Input/output errors (file not found, permission denied, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Image decode/encode errors
    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    /// Network errors while talking to remote services
    #[error("Network error: {0}")]
    Network(String),

    /// Invalid configuration or parameters
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl CutoutError {
    /// Create a new composite export error
    pub fn export_failed<S: Into<String>>(msg: S) -> Self {
        Self::ExportFailed(msg.into())
    }

    /// Create a new persistence error
    pub fn persist_failed<S: Into<String>>(msg: S) -> Self {
        Self::PersistFailed(msg.into())
    }

    /// Create a new remote operation error
    pub fn remote_op<S: Into<String>>(msg: S) -> Self {
        Self::RemoteOpFailed(msg.into())
    }

    /// Create a new layer registration error
    pub fn layer_registration<S: Into<String>>(msg: S) -> Self {
        Self::LayerRegistration(msg.into())
    }

    /// Create a new vision runtime error
    pub fn runtime<S: Into<String>>(msg: S) -> Self {
        Self::Runtime(msg.into())
    }

    /// Create a new invalid configuration error
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a network error with operation context
    pub fn network_error<E: std::fmt::Display>(operation: &str, error: E) -> Self {
        Self::Network(format!("{}: {}", operation, error))
    }

    /// Create configuration error with valid ranges
    pub fn config_value_error<T: std::fmt::Display>(
        parameter: &str,
        value: T,
        valid_range: &str,
    ) -> Self {
        Self::InvalidConfig(format!(
            "Invalid {}: {} (valid range: {})",
            parameter, value, valid_range
        ))
    }

    /// Whether this condition is recoverable and surfaced as a warning
    #[must_use]
    pub fn is_warning(&self) -> bool {
        matches!(
            self,
            Self::NoMaskImage
                | Self::NoVisibleLayers
                | Self::ConcurrentOperationRejected
                | Self::NoResultToSave
        )
    }
}
