//! Core data types shared across the cutout pipeline

use serde::{Deserialize, Serialize};

/// A persisted image as known to the layer store and remote services
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageResource {
    pub image_name: String,
    pub image_url: String,
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub board_id: Option<String>,
}

impl ImageResource {
    /// Image name up to the first `.`, or `image` when that is empty
    #[must_use]
    pub fn name_base(&self) -> &str {
        match self.image_name.split('.').next() {
            Some(base) if !base.is_empty() => base,
            _ => "image",
        }
    }
}

/// Axis-aligned rectangle in canvas coordinates
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    #[must_use]
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    #[must_use]
    pub fn origin(&self) -> Position {
        Position {
            x: self.x,
            y: self.y,
        }
    }
}

/// Canvas position
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// An image placed on a layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageObject {
    pub id: String,
    pub image: ImageResource,
    pub bounding_box: Rect,
}

impl From<ImageResource> for ImageObject {
    fn from(image: ImageResource) -> Self {
        let bounding_box = Rect::new(0.0, 0.0, f64::from(image.width), f64::from(image.height));
        Self {
            id: format!("image:{}", image.image_name),
            image,
            bounding_box,
        }
    }
}

/// Objects a layer may hold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CanvasObject {
    ImageObject(ImageObject),
    BrushLine { id: String },
    EraserLine { id: String },
    Rect { id: String, rect: Rect },
}

impl CanvasObject {
    #[must_use]
    pub fn as_image(&self) -> Option<&ImageObject> {
        match self {
            Self::ImageObject(image) => Some(image),
            _ => None,
        }
    }
}

/// The four cutout operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationKind {
    #[serde(rename = "erase")]
    Erase,
    #[serde(rename = "extract")]
    Extract,
    #[serde(rename = "erase (fit)")]
    ErasedFit,
    #[serde(rename = "extract (fit)")]
    ExtractedFit,
}

impl OperationKind {
    pub const ALL: [Self; 4] = [
        Self::Erase,
        Self::Extract,
        Self::ErasedFit,
        Self::ExtractedFit,
    ];

    /// Fit operations are refined by local segmentation
    #[must_use]
    pub fn is_fit(self) -> bool {
        matches!(self, Self::ErasedFit | Self::ExtractedFit)
    }

    /// Operation name as used in graph payloads and notifications
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Erase => "erase",
            Self::Extract => "extract",
            Self::ErasedFit => "erase (fit)",
            Self::ExtractedFit => "extract (fit)",
        }
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of a user-visible notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationStatus {
    Success,
    Warning,
    Error,
}

/// A user-visible toast
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub status: NotificationStatus,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Notification {
    pub fn success<S: Into<String>>(title: S) -> Self {
        Self {
            status: NotificationStatus::Success,
            title: title.into(),
            description: None,
        }
    }

    pub fn warning<S: Into<String>>(title: S) -> Self {
        Self {
            status: NotificationStatus::Warning,
            title: title.into(),
            description: None,
        }
    }

    pub fn error<S: Into<String>>(title: S) -> Self {
        Self {
            status: NotificationStatus::Error,
            title: title.into(),
            description: None,
        }
    }

    #[must_use]
    pub fn with_description<S: Into<String>>(mut self, description: S) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Request to add a new layer carrying an image
#[derive(Debug, Clone, PartialEq)]
pub struct LayerPlacement {
    pub image_object: ImageObject,
    pub position: Position,
    pub is_selected: bool,
}

/// Summary of a raster layer used for compositing decisions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterLayerInfo {
    pub id: String,
    pub is_visible: bool,
}

/// Observable state of a cutout module
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CutoutSnapshot {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub parent: String,
    pub range: u32,
    pub iterations: u32,
    pub is_processing: bool,
    pub has_last_result: bool,
    pub last_result_image_name: Option<String>,
}
