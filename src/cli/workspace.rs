//! File-backed canvas collaborators for the command line tool
//!
//! The composite is a single image file standing in for the visible raster
//! layers; persisted surfaces and registered layers land in an output
//! directory as PNG files.

use crate::canvas::{Compositor, LayerStore, MaskLayerState};
use crate::error::{CutoutError, Result};
use crate::types::{CanvasObject, ImageObject, ImageResource, LayerPlacement, RasterLayerInfo, Rect};
use async_trait::async_trait;
use image::{ImageFormat, RgbaImage};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::info;

/// Describe an image file as an image resource
pub(crate) fn file_resource(path: &Path) -> Result<ImageResource> {
    let (width, height) = image::image_dimensions(path)?;
    let image_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| CutoutError::invalid_config(format!("not a file: {}", path.display())))?;
    Ok(ImageResource {
        image_name,
        image_url: path.display().to_string(),
        width,
        height,
        board_id: None,
    })
}

/// Inpaint mask layer holding the mask file, placed at the origin
pub(crate) fn mask_layer(path: &Path) -> Result<MaskLayerState> {
    let resource = file_resource(path)?;
    let rect = Rect::new(0.0, 0.0, f64::from(resource.width), f64::from(resource.height));
    Ok(MaskLayerState::new("inpaint_mask:cli", rect)
        .with_object(CanvasObject::ImageObject(ImageObject::from(resource))))
}

/// Compositor returning a pre-flattened composite file
pub(crate) struct FileCompositor {
    path: PathBuf,
}

impl FileCompositor {
    pub(crate) fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

#[async_trait]
impl Compositor for FileCompositor {
    async fn export(&self) -> Result<ImageResource> {
        file_resource(&self.path)
    }
}

/// Layer store writing surfaces into a directory
pub(crate) struct DirectoryStore {
    dir: PathBuf,
    rasters: Mutex<Vec<LayerPlacement>>,
    masks: Mutex<Vec<LayerPlacement>>,
}

impl DirectoryStore {
    pub(crate) fn new(dir: PathBuf) -> Self {
        Self {
            dir,
            rasters: Mutex::new(Vec::new()),
            masks: Mutex::new(Vec::new()),
        }
    }

    fn file_name(name_hint: &str) -> String {
        let stem: String = name_hint
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        format!("{}.png", stem)
    }

    pub(crate) fn raster_count(&self) -> usize {
        self.rasters.lock().map(|layers| layers.len()).unwrap_or(0)
    }

    pub(crate) fn mask_count(&self) -> usize {
        self.masks.lock().map(|layers| layers.len()).unwrap_or(0)
    }
}

#[async_trait]
impl LayerStore for DirectoryStore {
    fn add_raster_layer(&self, placement: LayerPlacement) -> Result<()> {
        info!(image = %placement.image_object.image.image_url, "Added raster layer");
        self.rasters
            .lock()
            .map_err(|_| CutoutError::layer_registration("raster layer list is poisoned"))?
            .push(placement);
        Ok(())
    }

    fn add_inpaint_mask(&self, placement: LayerPlacement) -> Result<()> {
        info!(image = %placement.image_object.image.image_url, "Added inpaint mask layer");
        self.masks
            .lock()
            .map_err(|_| CutoutError::layer_registration("mask layer list is poisoned"))?
            .push(placement);
        Ok(())
    }

    fn raster_layers(&self) -> Vec<RasterLayerInfo> {
        vec![RasterLayerInfo {
            id: "raster:composite".to_string(),
            is_visible: true,
        }]
    }

    fn is_hidden(&self, _id: &str) -> bool {
        false
    }

    async fn create_image_from_surface(
        &self,
        surface: &RgbaImage,
        name_hint: &str,
        board_id: Option<&str>,
    ) -> Result<ImageResource> {
        let mut encoded = Cursor::new(Vec::new());
        surface
            .write_to(&mut encoded, ImageFormat::Png)
            .map_err(|e| CutoutError::persist_failed(e.to_string()))?;

        tokio::fs::create_dir_all(&self.dir).await?;
        let image_name = Self::file_name(name_hint);
        let path = self.dir.join(&image_name);
        tokio::fs::write(&path, encoded.into_inner()).await?;

        Ok(ImageResource {
            image_name,
            image_url: path.display().to_string(),
            width: surface.width(),
            height: surface.height(),
            board_id: board_id.map(str::to_string),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[tokio::test]
    async fn test_surface_is_written_as_png() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirectoryStore::new(dir.path().join("out"));
        let surface = RgbaImage::from_pixel(4, 3, Rgba([9, 8, 7, 255]));

        let resource = store
            .create_image_from_surface(&surface, "inpaint_mask:1_comp_grabcut:abc", Some("b"))
            .await
            .unwrap();
        assert_eq!(resource.image_name, "inpaint_mask_1_comp_grabcut_abc.png");
        assert_eq!(resource.board_id.as_deref(), Some("b"));

        let written = image::open(&resource.image_url).unwrap().to_rgba8();
        assert_eq!(written.dimensions(), (4, 3));
        assert_eq!(written.get_pixel(0, 0), &Rgba([9, 8, 7, 255]));
    }

    #[test]
    fn test_mask_layer_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mask.png");
        RgbaImage::new(6, 5).save(&path).unwrap();

        let layer = mask_layer(&path).unwrap();
        assert_eq!(layer.rect, Rect::new(0.0, 0.0, 6.0, 5.0));
        let image = layer.objects[0].as_image().unwrap();
        assert_eq!(image.image.image_name, "mask.png");
    }
}
