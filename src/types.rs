//! Shared types passed between the planner, the placeholder cache and the
//! descriptor facade.
//!
//! Inputs ([`ImageSource`], [`VariantRequest`]) are what the schema layer hands
//! us; the output ([`ImageDescriptor`]) is serialized back to it. All of them
//! derive serde so the schema layer can move them across its own boundary.

use serde::{Deserialize, Serialize};

/// Content types the image API can transform.
pub const TRANSFORMABLE_CONTENT_TYPES: [&str; 5] = [
    "image/jpeg",
    "image/jpg",
    "image/png",
    "image/webp",
    "image/gif",
];

/// Intrinsic pixel dimensions of a stored asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// One source image as known to the asset store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageSource {
    /// Protocol-relative URL of the untransformed asset, e.g.
    /// `//images.ctfassets.net/<space>/<asset>/<hash>/photo.jpg`.
    pub base_url: String,
    pub content_type: String,
    /// Original file name, forwarded to collaborators that materialize the asset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    /// Intrinsic dimensions from the asset metadata. `None` when the asset
    /// store did not record them.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<Dimensions>,
}

impl ImageSource {
    pub fn new(base_url: impl Into<String>, content_type: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            content_type: content_type.into(),
            file_name: None,
            dimensions: None,
        }
    }

    pub fn with_dimensions(mut self, width: u32, height: u32) -> Self {
        self.dimensions = Some(Dimensions { width, height });
        self
    }

    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }

    /// Whether the content type is one the image API can transform.
    pub fn is_transformable(&self) -> bool {
        TRANSFORMABLE_CONTENT_TYPES.contains(&self.content_type.as_str())
    }

    /// Intrinsic dimensions, if the source is eligible for planning.
    ///
    /// Returns `None` for non-raster content types and for sources with
    /// missing or zero dimensions.
    pub fn geometry(&self) -> Option<Dimensions> {
        if !self.is_transformable() {
            return None;
        }
        self.dimensions.filter(|d| d.width > 0 && d.height > 0)
    }
}

/// Output format (`fm`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Jpg,
    Png,
    Webp,
}

impl ImageFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            ImageFormat::Jpg => "jpg",
            ImageFormat::Png => "png",
            ImageFormat::Webp => "webp",
        }
    }

    /// Only baseline JPEG has a progressive variant on the API.
    pub fn supports_progressive(self) -> bool {
        matches!(self, ImageFormat::Jpg)
    }
}

/// How the API fits the image into the requested box (`fit`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResizingBehavior {
    Pad,
    Fill,
    Scale,
    Crop,
    Thumb,
}

impl ResizingBehavior {
    pub fn as_str(self) -> &'static str {
        match self {
            ResizingBehavior::Pad => "pad",
            ResizingBehavior::Fill => "fill",
            ResizingBehavior::Scale => "scale",
            ResizingBehavior::Crop => "crop",
            ResizingBehavior::Thumb => "thumb",
        }
    }

    /// The CSS `object-fit` value that renders the same way in the browser.
    pub fn object_fit(self) -> &'static str {
        match self {
            ResizingBehavior::Pad => "contain",
            ResizingBehavior::Fill | ResizingBehavior::Crop | ResizingBehavior::Thumb => "cover",
            ResizingBehavior::Scale => "fill",
        }
    }
}

/// Focus area used when cropping (`f`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CropFocus {
    Top,
    TopLeft,
    TopRight,
    Bottom,
    BottomLeft,
    BottomRight,
    Left,
    Right,
    Center,
    Face,
    Faces,
}

impl CropFocus {
    pub fn as_str(self) -> &'static str {
        match self {
            CropFocus::Top => "top",
            CropFocus::TopLeft => "top_left",
            CropFocus::TopRight => "top_right",
            CropFocus::Bottom => "bottom",
            CropFocus::BottomLeft => "bottom_left",
            CropFocus::BottomRight => "bottom_right",
            CropFocus::Left => "left",
            CropFocus::Right => "right",
            CropFocus::Center => "center",
            CropFocus::Face => "face",
            CropFocus::Faces => "faces",
        }
    }
}

/// User-supplied constraints for one descriptor.
///
/// Every field is optional. Which of `width`/`height` versus
/// `max_width`/`max_height`/`sizes` are present decides the descriptor mode
/// (see [`DescriptorMode::infer`](crate::descriptor::DescriptorMode::infer)).
/// Zero values behave exactly like absent ones.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct VariantRequest {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub max_width: Option<u32>,
    pub max_height: Option<u32>,
    pub sizes: Option<String>,
    pub format: Option<ImageFormat>,
    pub quality: Option<u32>,
    pub resizing_behavior: Option<ResizingBehavior>,
    pub crop_focus: Option<CropFocus>,
    pub background: Option<String>,
    pub progressive: bool,
}

impl VariantRequest {
    /// Non-zero requested width.
    pub fn requested_width(&self) -> Option<u32> {
        self.width.filter(|&w| w > 0)
    }

    /// Non-zero requested height.
    pub fn requested_height(&self) -> Option<u32> {
        self.height.filter(|&h| h > 0)
    }

    pub fn requested_max_width(&self) -> Option<u32> {
        self.max_width.filter(|&w| w > 0)
    }

    pub fn requested_max_height(&self) -> Option<u32> {
        self.max_height.filter(|&h| h > 0)
    }

    /// Explicit `sizes` hint, ignoring empty strings.
    pub fn requested_sizes(&self) -> Option<&str> {
        self.sizes.as_deref().filter(|s| !s.is_empty())
    }
}

/// One `srcset` candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SrcSetEntry {
    pub url: String,
    /// Density (`1x`, `1.5x`, …) or width (`800w`) descriptor.
    pub descriptor: String,
}

/// Render a candidate list the way browsers read a `srcset` attribute.
pub fn render_src_set(entries: &[SrcSetEntry]) -> String {
    entries
        .iter()
        .map(|e| format!("{} {}", e.url, e.descriptor))
        .collect::<Vec<_>>()
        .join(",\n")
}

/// Stand-in shown while the full image loads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum Placeholder {
    /// `data:image/jpeg;base64,…` of a tiny rendition.
    Blurred(String),
    /// SVG markup traced from the original.
    TracedSvg(String),
    /// Solid CSS color.
    Color(String),
}

/// The computed result handed back to the schema layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageDescriptor {
    pub aspect_ratio: f64,
    pub base_url: String,
    pub src: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub src_set: Vec<SrcSetEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sizes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    /// CSS `object-fit` matching the resizing behavior, when one applies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src_webp: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub src_set_webp: Vec<SrcSetEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<Placeholder>,
}

impl ImageDescriptor {
    /// The `srcset` attribute value.
    pub fn src_set_string(&self) -> String {
        render_src_set(&self.src_set)
    }

    /// The `srcset` attribute value of the WebP `<source>`.
    pub fn src_set_webp_string(&self) -> String {
        render_src_set(&self.src_set_webp)
    }
}
