//! Vision runtime abstraction
//!
//! The fit pipeline talks to pixel matrices through the [`VisionRuntime`]
//! capability instead of a process-global library handle:
//! - `native`: pure-Rust runtime backed by `ndarray` and `imageproc`
//! - `scope`: arena guard that releases every matrix a pipeline run allocated
//!
//! Matrices are referred to by opaque [`MatId`] handles owned by the runtime.

pub mod gmm;
pub mod grabcut;
pub mod native;
pub mod scope;

// Test utilities for runtime testing
#[cfg(test)]
pub mod test_utils;

pub use self::native::NativeRuntime;
pub use self::scope::MatScope;

use crate::error::Result;
use image::{DynamicImage, RgbaImage};

/// Handle to a matrix or model buffer held by a runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MatId(pub(crate) u64);

impl std::fmt::Display for MatId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "mat#{}", self.0)
    }
}

/// Colour conversions supported by the runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorConversion {
    RgbToRgba,
    GrayToRgba,
    RgbaToGray,
    RgbToGray,
}

impl ColorConversion {
    /// Expected (input, output) channel counts
    #[must_use]
    pub fn channels(self) -> (usize, usize) {
        match self {
            Self::RgbToRgba => (3, 4),
            Self::GrayToRgba => (1, 4),
            Self::RgbaToGray => (4, 1),
            Self::RgbToGray => (3, 1),
        }
    }
}

/// Per-pixel trimap designations, stored as `u8` in label matrices
pub mod labels {
    pub const BACKGROUND: u8 = 0;
    pub const FOREGROUND: u8 = 1;
    pub const PROBABLE_BACKGROUND: u8 = 2;
    pub const PROBABLE_FOREGROUND: u8 = 3;

    #[must_use]
    pub fn is_foreground(label: u8) -> bool {
        label == FOREGROUND || label == PROBABLE_FOREGROUND
    }

    #[must_use]
    pub fn is_fixed(label: u8) -> bool {
        label == FOREGROUND || label == BACKGROUND
    }
}

/// Matrix operations needed by the trimap and segmentation engine
///
/// Every method returning a [`MatId`] allocates a buffer that stays alive
/// until [`VisionRuntime::release`] is called for it. Callers should
/// allocate through a [`MatScope`] so release happens on every exit path.
pub trait VisionRuntime: Send + Sync {
    /// Whether the runtime is loaded and usable
    fn is_available(&self) -> bool;

    /// Decode a bitmap into a 4-channel RGBA matrix
    fn decode(&mut self, bitmap: &DynamicImage) -> Result<MatId>;

    /// (rows, cols)
    fn dims(&self, mat: MatId) -> Result<(usize, usize)>;

    fn channels(&self, mat: MatId) -> Result<usize>;

    fn is_empty(&self, mat: MatId) -> Result<bool> {
        let (rows, cols) = self.dims(mat)?;
        Ok(rows == 0 || cols == 0)
    }

    fn convert_color(&mut self, src: MatId, conversion: ColorConversion) -> Result<MatId>;

    /// Nearest-neighbour resize
    fn resize(&mut self, src: MatId, rows: usize, cols: usize) -> Result<MatId>;

    /// Binary threshold: values strictly above `thresh` become `max_value`, others 0
    fn threshold(&mut self, src: MatId, thresh: u8, max_value: u8) -> Result<MatId>;

    /// Square structuring element of odd side `size`
    fn structuring_element(&mut self, size: usize) -> Result<MatId>;

    fn erode(&mut self, src: MatId, kernel: MatId) -> Result<MatId>;

    fn dilate(&mut self, src: MatId, kernel: MatId) -> Result<MatId>;

    /// New matrix with every byte set to `fill`
    fn new_mat(&mut self, rows: usize, cols: usize, channels: usize, fill: u8) -> Result<MatId>;

    /// New empty colour-model buffer for segmentation
    fn new_model(&mut self) -> Result<MatId>;

    /// Refine a label matrix in place over the whole image extent
    fn grab_cut(
        &mut self,
        image: MatId,
        labels: MatId,
        bgd_model: MatId,
        fgd_model: MatId,
        iterations: u32,
    ) -> Result<()>;

    /// Split into single-channel matrices, one per channel
    fn split(&mut self, src: MatId) -> Result<Vec<MatId>>;

    /// Merge single-channel matrices of equal size
    fn merge(&mut self, channels: &[MatId]) -> Result<MatId>;

    /// Raw interleaved bytes
    fn data(&self, mat: MatId) -> Result<&[u8]>;

    fn data_mut(&mut self, mat: MatId) -> Result<&mut [u8]>;

    /// Copy a 4-channel matrix out into an owned RGBA image
    fn to_rgba_image(&self, mat: MatId) -> Result<RgbaImage>;

    /// Free a buffer; releasing an unknown or already released handle is an error
    fn release(&mut self, mat: MatId) -> Result<()>;

    /// Number of buffers allocated and not yet released
    fn live_count(&self) -> usize;
}
