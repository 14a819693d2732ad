//! Localization lookup for user-visible strings

/// Resolve a stable key to display text
pub trait Localizer: Send + Sync {
    /// Text for `key`, or `fallback` if the key has no translation
    fn translate(&self, key: &str, fallback: &str) -> String;
}

/// Localizer that always answers with the fallback text
#[derive(Debug, Clone, Copy, Default)]
pub struct FallbackLocalizer;

impl Localizer for FallbackLocalizer {
    fn translate(&self, _key: &str, fallback: &str) -> String {
        fallback.to_string()
    }
}

/// Stable keys for every string the cutout module shows
pub mod keys {
    pub const NO_VISIBLE_LAYERS: &str = "controlLayers.booleanCutout.noVisibleLayers";
    pub const COMPOSITE_FAILED: &str = "controlLayers.booleanCutout.compositeFailed";
    pub const NO_MASK_IMAGE: &str = "controlLayers.booleanCutout.noInpaintMaskImage";
    pub const CONVERSION_ERROR_TITLE: &str = "controlLayers.booleanCutout.imageConversionErrorTitle";
    pub const CONVERSION_ERROR_DETAIL: &str = "controlLayers.booleanCutout.matConversionErrorDetail";
    pub const FAILED_TO_SAVE_PROCESSED: &str = "controlLayers.booleanCutout.failedToSaveProcessed";
    pub const OP_IN_PROGRESS: &str = "controlLayers.booleanCutout.opInProgress";
    pub const ENGINE_ERROR_TITLE: &str = "controlLayers.booleanCutout.opencvErrorTitle";
    pub const ENGINE_LOAD_ERROR: &str = "controlLayers.booleanCutout.opencvLoadError";
    pub const REMOTE_OP_FAILED: &str = "controlLayers.booleanCutout.kompositorOpFailed";
    pub const OP_COMPLETE: &str = "controlLayers.booleanCutout.opComplete";
    pub const UNEXPECTED_ERROR: &str = "controlLayers.booleanCutout.unexpectedError";
    pub const OP_CANCELLED: &str = "controlLayers.booleanCutout.opCancelled";
    pub const NO_RESULT_TO_SAVE: &str = "controlLayers.booleanCutout.noResultToSave";
    pub const SAVE_AS_MASK_SUCCESS: &str = "controlLayers.booleanCutout.saveAsInpaintMaskSuccess";
    pub const SAVE_AS_MASK_FAILED: &str = "controlLayers.booleanCutout.saveAsInpaintMaskFailed";
}
