//! Resolve the two source images of a cutout operation
//!
//! The mask image is the first object of the inpaint mask layer; the
//! composite is the compositor's flattening of every visible raster layer.
//! Each failure is logged and reported to the user here, once.

use crate::canvas::{Compositor, LayerStore, MaskLayer};
use crate::error::{CutoutError, Result};
use crate::services::i18n::keys;
use crate::services::notify::Notices;
use crate::types::ImageObject;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Mask and composite images for one operation
#[derive(Debug, Clone, PartialEq)]
pub struct SourceImages {
    pub mask: ImageObject,
    pub composite: ImageObject,
}

/// Image acquisition adapter over the canvas collaborators
#[derive(Clone)]
pub struct ImageAcquisition {
    mask_layer: Arc<dyn MaskLayer>,
    store: Arc<dyn LayerStore>,
    compositor: Arc<dyn Compositor>,
    notices: Notices,
}

impl ImageAcquisition {
    pub fn new(
        mask_layer: Arc<dyn MaskLayer>,
        store: Arc<dyn LayerStore>,
        compositor: Arc<dyn Compositor>,
        notices: Notices,
    ) -> Self {
        Self {
            mask_layer,
            store,
            compositor,
            notices,
        }
    }

    /// The mask layer's image object
    ///
    /// # Errors
    /// [`CutoutError::NoMaskImage`] if the layer is empty or its first object
    /// is not an image.
    pub fn mask_image(&self) -> Result<ImageObject> {
        debug!("Getting InpaintMask layer image");
        let objects = self.mask_layer.objects();
        match objects.first().and_then(|object| object.as_image()) {
            Some(image) => Ok(image.clone()),
            None => {
                warn!("InpaintMask layer has no image object or is not an image object.");
                self.notices
                    .warning(keys::NO_MASK_IMAGE, "InpaintMask layer has no image.");
                Err(CutoutError::NoMaskImage)
            },
        }
    }

    /// Flattened composite of the visible, non-hidden raster layers
    ///
    /// # Errors
    /// - [`CutoutError::NoVisibleLayers`] if nothing would be composited
    /// - [`CutoutError::ExportFailed`] if the compositor fails
    pub async fn composite_image(&self) -> Result<ImageObject> {
        debug!("Getting composite raster image");
        let visible = self
            .store
            .raster_layers()
            .into_iter()
            .filter(|layer| layer.is_visible && !self.store.is_hidden(&layer.id))
            .count();

        if visible == 0 {
            warn!("No visible raster layers to composite");
            self.notices
                .warning(keys::NO_VISIBLE_LAYERS, "No visible raster layers for operation.");
            return Err(CutoutError::NoVisibleLayers);
        }

        match self.compositor.export().await {
            Ok(resource) => {
                debug!(visible, image_name = %resource.image_name, "Composite exported");
                Ok(ImageObject::from(resource))
            },
            Err(e) => {
                error!(error = %e, "Failed to get canvas image for composite");
                self.notices
                    .error(keys::COMPOSITE_FAILED, "Failed to create composite image.");
                Err(CutoutError::export_failed(e.to_string()))
            },
        }
    }

    /// Mask first, then composite
    pub async fn acquire(&self) -> Result<SourceImages> {
        let mask = self.mask_image().map_err(|e| {
            error!("Failed to get InpaintMask image object.");
            e
        })?;
        let composite = self.composite_image().await.map_err(|e| {
            error!("Failed to get composite raster image object.");
            e
        })?;
        Ok(SourceImages { mask, composite })
    }
}

impl std::fmt::Debug for ImageAcquisition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageAcquisition")
            .field("mask_layer", &self.mask_layer.id())
            .finish_non_exhaustive()
    }
}
