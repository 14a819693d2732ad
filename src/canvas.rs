//! Canvas collaborators the cutout module talks to
//!
//! The layer store, the compositor and the mask layer live outside this
//! crate; only the operations the cutout pipeline needs are modelled here.

use crate::error::Result;
use crate::types::{CanvasObject, ImageResource, LayerPlacement, RasterLayerInfo, Rect};
use async_trait::async_trait;
use image::RgbaImage;

/// Layer state store of the canvas
#[async_trait]
pub trait LayerStore: Send + Sync {
    /// Add a raster layer holding an image
    fn add_raster_layer(&self, placement: LayerPlacement) -> Result<()>;

    /// Add an inpaint mask layer holding an image
    fn add_inpaint_mask(&self, placement: LayerPlacement) -> Result<()>;

    /// All raster layers, in stacking order
    fn raster_layers(&self) -> Vec<RasterLayerInfo>;

    /// Whether a layer is hidden independently of its own visibility flag
    fn is_hidden(&self, id: &str) -> bool;

    /// Persist a drawing surface as a new image resource
    async fn create_image_from_surface(
        &self,
        surface: &RgbaImage,
        name_hint: &str,
        board_id: Option<&str>,
    ) -> Result<ImageResource>;
}

/// Flattens the visible raster layers into one image
#[async_trait]
pub trait Compositor: Send + Sync {
    async fn export(&self) -> Result<ImageResource>;
}

/// The inpaint mask layer a cutout module is attached to
pub trait MaskLayer: Send + Sync {
    fn id(&self) -> &str;

    /// Objects currently on the layer, bottom first
    fn objects(&self) -> Vec<CanvasObject>;

    fn board_id(&self) -> Option<String>;

    /// Current transform rectangle in canvas coordinates
    fn bounding_rect(&self) -> Rect;
}

/// Plain in-memory mask layer
#[derive(Debug, Clone, PartialEq)]
pub struct MaskLayerState {
    pub id: String,
    pub objects: Vec<CanvasObject>,
    pub board_id: Option<String>,
    pub rect: Rect,
}

impl MaskLayerState {
    pub fn new<S: Into<String>>(id: S, rect: Rect) -> Self {
        Self {
            id: id.into(),
            objects: Vec::new(),
            board_id: None,
            rect,
        }
    }

    #[must_use]
    pub fn with_object(mut self, object: CanvasObject) -> Self {
        self.objects.push(object);
        self
    }

    #[must_use]
    pub fn with_board_id<S: Into<String>>(mut self, board_id: S) -> Self {
        self.board_id = Some(board_id.into());
        self
    }
}

impl MaskLayer for MaskLayerState {
    fn id(&self) -> &str {
        &self.id
    }

    fn objects(&self) -> Vec<CanvasObject> {
        self.objects.clone()
    }

    fn board_id(&self) -> Option<String> {
        self.board_id.clone()
    }

    fn bounding_rect(&self) -> Rect {
        self.rect
    }
}
