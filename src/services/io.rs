//! Pixel buffer bridge
//!
//! Loads image resources into decodable bitmaps and turns runtime pixel
//! buffers back into persisted image resources.

use super::i18n::keys;
use super::notify::Notices;
use crate::canvas::LayerStore;
use crate::error::{CutoutError, Result};
use crate::types::ImageResource;
use crate::vision::{MatId, MatScope};
use async_trait::async_trait;
use image::{DynamicImage, RgbaImage};
use reqwest::Client;
use std::path::PathBuf;

/// Loads an image resource URL into a bitmap
#[async_trait]
pub trait BitmapLoader: Send + Sync {
    async fn load(&self, url: &str) -> Result<DynamicImage>;
}

/// Loader for `http(s)://` URLs, `file://` URLs and bare filesystem paths
///
/// Remote fetches carry no credentials or cookies.
#[derive(Debug, Clone)]
pub struct UrlBitmapLoader {
    client: Client,
}

impl UrlBitmapLoader {
    /// Create a loader whose HTTP requests time out after `timeout_secs`
    ///
    /// # Errors
    /// - Failed to create HTTP client
    pub fn new(timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| CutoutError::network_error("Failed to create HTTP client", e))?;
        Ok(Self { client })
    }

    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| CutoutError::network_error(&format!("Failed to fetch {}", url), e))?;

        if !response.status().is_success() {
            return Err(CutoutError::network_error(
                &format!("Failed to fetch {}", url),
                format!("HTTP status {}", response.status()),
            ));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| CutoutError::network_error(&format!("Failed to read {}", url), e))?;
        Ok(bytes.to_vec())
    }
}

fn local_path(url: &str) -> Option<PathBuf> {
    if let Some(path) = url.strip_prefix("file://") {
        return Some(PathBuf::from(path));
    }
    if url.starts_with("http://") || url.starts_with("https://") {
        None
    } else {
        Some(PathBuf::from(url))
    }
}

#[async_trait]
impl BitmapLoader for UrlBitmapLoader {
    async fn load(&self, url: &str) -> Result<DynamicImage> {
        let data = match local_path(url) {
            Some(path) => tokio::fs::read(&path).await?,
            None => self.fetch(url).await?,
        };
        tracing::debug!(url, bytes = data.len(), "Decoding bitmap");
        Ok(image::load_from_memory(&data)?)
    }
}

/// Copy a runtime buffer out into a drawing surface
///
/// The buffer must be non-empty RGBA; anything else is reported to the user
/// and fails with [`CutoutError::InvalidBuffer`].
pub fn surface_from_buffer(scope: &MatScope<'_>, mat: MatId, notices: &Notices) -> Result<RgbaImage> {
    let channels = scope.channels(mat)?;
    let empty = scope.is_empty(mat)?;
    if empty || channels != 4 {
        tracing::error!(
            channels,
            is_empty = empty,
            "Invalid buffer for image conversion: must be RGBA and not empty"
        );
        notices.error_detail(
            keys::CONVERSION_ERROR_TITLE,
            "Image Conversion Error",
            keys::CONVERSION_ERROR_DETAIL,
            "Cannot process empty or non-RGBA image.",
        );
        return Err(CutoutError::InvalidBuffer { channels, empty });
    }
    scope.to_rgba_image(mat)
}

/// Persist a drawing surface through the layer store
///
/// Store failures are reported to the user and mapped to
/// [`CutoutError::PersistFailed`].
pub async fn persist_surface(
    store: &dyn LayerStore,
    surface: &RgbaImage,
    name_hint: &str,
    board_id: Option<&str>,
    notices: &Notices,
) -> Result<ImageResource> {
    match store
        .create_image_from_surface(surface, name_hint, board_id)
        .await
    {
        Ok(resource) => Ok(resource),
        Err(e) => {
            tracing::error!(error = %e, name_hint, "Failed to create image from surface");
            notices.error_detail(
                keys::CONVERSION_ERROR_TITLE,
                "Image Conversion Error",
                keys::FAILED_TO_SAVE_PROCESSED,
                "Failed to save processed image.",
            );
            Err(CutoutError::persist_failed(e.to_string()))
        },
    }
}

/// Convert a runtime buffer into a persisted image resource
pub async fn buffer_to_image_resource(
    scope: &MatScope<'_>,
    mat: MatId,
    name_hint: &str,
    board_id: Option<&str>,
    store: &dyn LayerStore,
    notices: &Notices,
) -> Result<ImageResource> {
    let surface = surface_from_buffer(scope, mat, notices)?;
    persist_surface(store, &surface, name_hint, board_id, notices).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::i18n::FallbackLocalizer;
    use crate::services::notify::RecordingNotifier;
    use crate::types::{LayerPlacement, NotificationStatus, RasterLayerInfo};
    use crate::vision::NativeRuntime;
    use image::Rgba;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct SurfaceStore {
        fail: bool,
        saved: Mutex<Vec<(String, Option<String>, (u32, u32))>>,
    }

    #[async_trait]
    impl LayerStore for SurfaceStore {
        fn add_raster_layer(&self, _placement: LayerPlacement) -> Result<()> {
            Ok(())
        }

        fn add_inpaint_mask(&self, _placement: LayerPlacement) -> Result<()> {
            Ok(())
        }

        fn raster_layers(&self) -> Vec<RasterLayerInfo> {
            Vec::new()
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
            if self.fail {
                return Err(CutoutError::Io(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    "disk full",
                )));
            }
            self.saved.lock().unwrap().push((
                name_hint.to_string(),
                board_id.map(str::to_string),
                surface.dimensions(),
            ));
            Ok(ImageResource {
                image_name: format!("{}.png", name_hint),
                image_url: format!("memory://{}.png", name_hint),
                width: surface.width(),
                height: surface.height(),
                board_id: board_id.map(str::to_string),
            })
        }
    }

    fn notices() -> (Notices, RecordingNotifier) {
        let recorder = RecordingNotifier::new();
        (
            Notices::new(Arc::new(recorder.clone()), Arc::new(FallbackLocalizer)),
            recorder,
        )
    }

    #[tokio::test]
    async fn test_buffer_to_image_resource() {
        let mut runtime = NativeRuntime::default();
        let mut scope = MatScope::new(&mut runtime);
        let mat = scope.new_mat(3, 5, 4, 200).unwrap();
        let store = SurfaceStore::default();
        let (notices, recorder) = notices();

        let resource = buffer_to_image_resource(&scope, mat, "hint", Some("board-1"), &store, &notices)
            .await
            .unwrap();
        assert_eq!((resource.width, resource.height), (5, 3));
        assert_eq!(
            store.saved.lock().unwrap()[0],
            ("hint".to_string(), Some("board-1".to_string()), (5, 3))
        );
        assert!(recorder.notifications().is_empty());
    }

    #[tokio::test]
    async fn test_non_rgba_buffer_is_rejected() {
        let mut runtime = NativeRuntime::default();
        let mut scope = MatScope::new(&mut runtime);
        let gray = scope.new_mat(4, 4, 1, 0).unwrap();
        let empty = scope.new_mat(0, 0, 4, 0).unwrap();
        let store = SurfaceStore::default();
        let (notices, recorder) = notices();

        let result = buffer_to_image_resource(&scope, gray, "hint", None, &store, &notices).await;
        assert!(matches!(
            result,
            Err(CutoutError::InvalidBuffer {
                channels: 1,
                empty: false
            })
        ));
        let result = buffer_to_image_resource(&scope, empty, "hint", None, &store, &notices).await;
        assert!(matches!(
            result,
            Err(CutoutError::InvalidBuffer { empty: true, .. })
        ));
        assert!(store.saved.lock().unwrap().is_empty());
        assert_eq!(recorder.count(NotificationStatus::Error), 2);
        assert_eq!(recorder.titles()[0], "Image Conversion Error");
    }

    #[tokio::test]
    async fn test_store_failure_maps_to_persist_failed() {
        let surface = RgbaImage::from_pixel(2, 2, Rgba([1, 2, 3, 4]));
        let store = SurfaceStore {
            fail: true,
            ..SurfaceStore::default()
        };
        let (notices, recorder) = notices();
        let result = persist_surface(&store, &surface, "hint", None, &notices).await;
        assert!(matches!(result, Err(CutoutError::PersistFailed(_))));
        assert_eq!(
            recorder.notifications()[0].description.as_deref(),
            Some("Failed to save processed image.")
        );
    }

    #[tokio::test]
    async fn test_loader_reads_local_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mask.png");
        RgbaImage::from_pixel(3, 2, Rgba([0, 0, 0, 255]))
            .save(&path)
            .unwrap();

        let loader = UrlBitmapLoader::new(5).unwrap();
        let bare = loader.load(path.to_str().unwrap()).await.unwrap();
        assert_eq!((bare.width(), bare.height()), (3, 2));

        let url = format!("file://{}", path.display());
        assert!(loader.load(&url).await.is_ok());

        let missing = loader.load("/definitely/not/here.png").await;
        assert!(matches!(missing, Err(CutoutError::Io(_))));
    }

    #[test]
    fn test_local_path_detection() {
        assert_eq!(local_path("file:///tmp/a.png"), Some(PathBuf::from("/tmp/a.png")));
        assert_eq!(local_path("images/a.png"), Some(PathBuf::from("images/a.png")));
        assert_eq!(local_path("https://example.com/a.png"), None);
    }
}
