//! Trimap construction and segmentation-refined alpha
//!
//! The fit operations turn a rough binary mask into a trimap, refine it
//! against the composite's colours, and write the refined classification
//! into the composite's alpha channel:
//!
//! 1. normalize the composite to RGBA and the mask to a binary single channel
//! 2. erode and dilate the mask with a square element sized from `range`
//! 3. label every pixel certain/probable foreground/background
//! 4. run `iterations` segmentation passes over the whole image
//! 5. replace the composite's alpha with the refined foreground (extract)
//!    or background (erase)
//!
//! All matrices are allocated through a [`MatScope`] and released when the
//! caller drops it.

use crate::error::{CutoutError, Result};
use crate::parameters::CutoutParameters;
use crate::types::OperationKind;
use crate::vision::{labels, ColorConversion, MatId, MatScope, VisionRuntime};
use image::{DynamicImage, RgbaImage};
use tracing::debug;

/// Which side of the refined boundary stays opaque
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FitMode {
    /// Keep foreground and probable foreground
    Extract,
    /// Keep background and probable background
    Erase,
}

impl TryFrom<OperationKind> for FitMode {
    type Error = CutoutError;

    fn try_from(kind: OperationKind) -> Result<Self> {
        match kind {
            OperationKind::ExtractedFit => Ok(Self::Extract),
            OperationKind::ErasedFit => Ok(Self::Erase),
            OperationKind::Erase | OperationKind::Extract => Err(CutoutError::invalid_config(
                format!("\"{}\" is not a fit operation", kind),
            )),
        }
    }
}

/// Side of the square structuring element for a given range and image size
///
/// `round(range / 100 * min(min_dim * 0.1, 20)) + 1`, bumped to the next odd value.
#[must_use]
pub fn kernel_size(range: u32, rows: usize, cols: usize) -> usize {
    let min_dim = rows.min(cols) as f64;
    let scaled = (f64::from(range) / 100.0) * (min_dim * 0.1).min(20.0);
    let size = scaled.round() as usize + 1;
    if size % 2 == 0 {
        size + 1
    } else {
        size.max(1)
    }
}

/// Per-pixel trimap labels from eroded, dilated and raw binary masks
///
/// Outside the dilation is background; inside the erosion is foreground;
/// the rest of the raw mask is probable foreground; everything else is
/// probable background.
#[must_use]
pub fn classify_trimap(eroded: &[u8], dilated: &[u8], binary: &[u8]) -> Vec<u8> {
    dilated
        .iter()
        .zip(eroded)
        .zip(binary)
        .map(|((&dilated, &eroded), &raw)| {
            if dilated == 0 {
                labels::BACKGROUND
            } else if eroded > 0 {
                labels::FOREGROUND
            } else if raw > 0 {
                labels::PROBABLE_FOREGROUND
            } else {
                labels::PROBABLE_BACKGROUND
            }
        })
        .collect()
}

/// Alpha values for refined labels
#[must_use]
pub fn alpha_from_labels(trimap: &[u8], mode: FitMode) -> Vec<u8> {
    trimap
        .iter()
        .map(|&label| {
            let keep = match mode {
                FitMode::Extract => labels::is_foreground(label),
                FitMode::Erase => !labels::is_foreground(label),
            };
            if keep {
                255
            } else {
                0
            }
        })
        .collect()
}

/// Run the fit pipeline; returns the RGBA result matrix owned by `scope`
///
/// # Errors
/// - [`CutoutError::EngineUnavailable`] before anything is allocated
/// - [`CutoutError::SourceLoadFailed`] / [`CutoutError::MaskLoadFailed`] for empty decodes
/// - [`CutoutError::UnsupportedChannels`] for inputs that cannot be normalized
pub fn run(
    scope: &mut MatScope<'_>,
    composite: &DynamicImage,
    mask: &DynamicImage,
    params: CutoutParameters,
    mode: FitMode,
) -> Result<MatId> {
    if !scope.is_available() {
        return Err(CutoutError::EngineUnavailable);
    }

    let source = scope.decode(composite)?;
    if scope.is_empty(source)? {
        return Err(CutoutError::SourceLoadFailed);
    }
    let source = normalize_source(scope, source)?;

    let input_mask = scope.decode(mask)?;
    if scope.is_empty(input_mask)? {
        return Err(CutoutError::MaskLoadFailed);
    }
    let gray = normalize_mask(scope, input_mask)?;

    let (rows, cols) = scope.dims(source)?;
    let gray = if scope.dims(gray)? == (rows, cols) {
        gray
    } else {
        debug!(
            mask = ?scope.dims(gray)?,
            source = ?(rows, cols),
            "Resizing mask to source dimensions"
        );
        scope.resize(gray, rows, cols)?
    };
    let binary = scope.threshold(gray, 1, 255)?;

    let size = kernel_size(params.range(), rows, cols);
    debug!(
        kernel_size = size,
        range = params.range(),
        "Calculated kernel size for erosion/dilation"
    );
    let kernel = scope.structuring_element(size)?;
    let eroded = scope.erode(binary, kernel)?;
    let dilated = scope.dilate(binary, kernel)?;

    let trimap = classify_trimap(scope.data(eroded)?, scope.data(dilated)?, scope.data(binary)?);
    let label_mat = scope.new_mat(rows, cols, 1, labels::PROBABLE_BACKGROUND)?;
    scope.data_mut(label_mat)?.copy_from_slice(&trimap);

    let bgd_model = scope.new_model()?;
    let fgd_model = scope.new_model()?;
    scope.grab_cut(source, label_mat, bgd_model, fgd_model, params.iterations())?;

    let alpha_values = alpha_from_labels(scope.data(label_mat)?, mode);
    let mut planes = scope.split(source)?;
    let alpha = scope.new_mat(rows, cols, 1, 0)?;
    scope.data_mut(alpha)?.copy_from_slice(&alpha_values);
    match planes.get_mut(3) {
        Some(plane) => *plane = alpha,
        None => {
            return Err(CutoutError::UnsupportedChannels {
                role: "Source",
                channels: planes.len(),
            })
        },
    }

    let result = scope.merge(&planes)?;
    let channels = scope.channels(result)?;
    if channels != 4 {
        return Err(CutoutError::UnsupportedChannels {
            role: "Result",
            channels,
        });
    }
    Ok(result)
}

/// Run the fit pipeline in a scope of its own and copy the result out
///
/// Every intermediate buffer is released before returning.
pub fn cutout_image(
    runtime: &mut dyn VisionRuntime,
    composite: &DynamicImage,
    mask: &DynamicImage,
    params: CutoutParameters,
    mode: FitMode,
) -> Result<RgbaImage> {
    let mut scope = MatScope::new(runtime);
    let result = run(&mut scope, composite, mask, params, mode)?;
    scope.to_rgba_image(result)
}

fn normalize_source(scope: &mut MatScope<'_>, source: MatId) -> Result<MatId> {
    match scope.channels(source)? {
        4 => Ok(source),
        3 => scope.convert_color(source, ColorConversion::RgbToRgba),
        1 => scope.convert_color(source, ColorConversion::GrayToRgba),
        channels => Err(CutoutError::UnsupportedChannels {
            role: "Source",
            channels,
        }),
    }
}

fn normalize_mask(scope: &mut MatScope<'_>, mask: MatId) -> Result<MatId> {
    match scope.channels(mask)? {
        1 => Ok(mask),
        3 => scope.convert_color(mask, ColorConversion::RgbToGray),
        4 => scope.convert_color(mask, ColorConversion::RgbaToGray),
        channels => Err(CutoutError::UnsupportedChannels {
            role: "Mask",
            channels,
        }),
    }
}
