//! Parameter types for variant planning.
//!
//! These structs describe *what* to request, not *how* to encode it. They sit
//! between the user's [`VariantRequest`] and the URL builder
//! ([`build_transform_url`](super::url::build_transform_url)).
//!
//! ## Types
//!
//! - [`Quality`]: Lossy encoding quality (1–100). Zero means "API default".
//! - [`TransformOptions`]: Everything one transformation URL carries.
//! - [`FixedPlan`], [`FluidPlan`], [`ResizePlan`]: A request after every
//!   implicit default has been applied. Sizing math only ever sees these,
//!   so candidate generation has no conditional defaulting of its own.

use super::calculations::{aspect_ratio, derive_width};
use crate::types::{CropFocus, Dimensions, ImageFormat, ResizingBehavior, VariantRequest};

/// Width used when a fixed or resize request names no dimension.
pub const DEFAULT_FIXED_WIDTH: u32 = 400;

/// Container width used when a fluid request names no dimension.
pub const DEFAULT_FLUID_MAX_WIDTH: u32 = 800;

/// Quality setting for lossy encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(u32);

impl Quality {
    /// `None` for 0 (leave it to the API), otherwise clamped to 100.
    pub fn new(value: u32) -> Option<Self> {
        (value > 0).then(|| Self(value.min(100)))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

/// Options encoded into a single transformation URL.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransformOptions {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub format: Option<ImageFormat>,
    pub progressive: bool,
    pub quality: Option<Quality>,
    pub resizing_behavior: Option<ResizingBehavior>,
    pub crop_focus: Option<CropFocus>,
    pub background: Option<String>,
}

impl TransformOptions {
    /// Copy the non-dimension options of a request.
    pub fn from_request(request: &VariantRequest) -> Self {
        Self {
            width: None,
            height: None,
            format: request.format,
            progressive: request.progressive,
            quality: request.quality.and_then(Quality::new),
            resizing_behavior: request.resizing_behavior,
            crop_focus: request.crop_focus,
            background: request.background.clone().filter(|bg| !bg.is_empty()),
        }
    }

    /// The same options at a specific size.
    pub fn sized(&self, width: Option<u32>, height: Option<u32>) -> Self {
        Self {
            width,
            height,
            ..self.clone()
        }
    }
}

/// Cropping to an explicit box defaults to `fill` (cover-style crop).
fn default_crop_behavior(options: &mut TransformOptions) {
    if options.resizing_behavior.is_none() {
        options.resizing_behavior = Some(ResizingBehavior::Fill);
    }
}

/// A fixed-mode request with all defaults applied.
#[derive(Debug, Clone, PartialEq)]
pub struct FixedPlan {
    /// Display width at 1x.
    pub width: u32,
    /// Height, only when the request named one.
    pub height: Option<u32>,
    /// Desired aspect ratio: the explicit crop box when one is given,
    /// otherwise the original's.
    pub aspect_ratio: f64,
    pub options: TransformOptions,
}

impl FixedPlan {
    pub fn normalize(intrinsic: Dimensions, request: &VariantRequest) -> Self {
        let width = request.requested_width();
        let height = request.requested_height();

        let mut ratio = match (width, height) {
            (Some(w), Some(h)) => aspect_ratio(w, h),
            _ => aspect_ratio(intrinsic.width, intrinsic.height),
        };
        let width = match (width, height) {
            (Some(w), _) => w,
            (None, Some(h)) => derive_width(h, ratio),
            (None, None) => DEFAULT_FIXED_WIDTH,
        };

        let mut options = TransformOptions::from_request(request);
        if let Some(h) = height {
            ratio = aspect_ratio(width, h);
            default_crop_behavior(&mut options);
        }

        Self {
            width,
            height,
            aspect_ratio: ratio,
            options,
        }
    }

    /// Final `(width, height)` reported on the descriptor.
    pub fn display_size(&self) -> (f64, f64) {
        match self.height {
            Some(h) => (h as f64 * self.aspect_ratio, h as f64),
            None => (self.width as f64, self.width as f64 / self.aspect_ratio),
        }
    }
}

/// A fluid-mode request with all defaults applied.
#[derive(Debug, Clone, PartialEq)]
pub struct FluidPlan {
    pub max_width: u32,
    /// Max height, only when the request named one.
    pub max_height: Option<u32>,
    pub aspect_ratio: f64,
    /// Responsive `sizes` hint.
    pub sizes: String,
    pub options: TransformOptions,
}

impl FluidPlan {
    pub fn normalize(intrinsic: Dimensions, request: &VariantRequest) -> Self {
        let max_width = request.requested_max_width();
        let max_height = request.requested_max_height();

        let mut ratio = aspect_ratio(intrinsic.width, intrinsic.height);
        let max_width = match (max_width, max_height) {
            (Some(w), _) => w,
            (None, Some(h)) => derive_width(h, ratio),
            (None, None) => DEFAULT_FLUID_MAX_WIDTH,
        };
        if let Some(h) = max_height {
            ratio = aspect_ratio(max_width, h);
        }

        let sizes = match request.requested_sizes() {
            Some(sizes) => sizes.to_string(),
            None => default_sizes(max_width),
        };

        Self {
            max_width,
            max_height,
            aspect_ratio: ratio,
            sizes,
            options: TransformOptions::from_request(request),
        }
    }
}

/// `sizes` hint for a container that is full-width up to `max_width`.
pub fn default_sizes(max_width: u32) -> String {
    format!("(max-width: {max_width}px) 100vw, {max_width}px")
}

/// A single-variant resize request with all defaults applied.
#[derive(Debug, Clone, PartialEq)]
pub struct ResizePlan {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub aspect_ratio: f64,
    pub options: TransformOptions,
}

impl ResizePlan {
    pub fn normalize(intrinsic: Dimensions, request: &VariantRequest) -> Self {
        let mut width = request.requested_width();
        let height = request.requested_height();

        let ratio = match (width, height) {
            (Some(w), Some(h)) => aspect_ratio(w, h),
            _ => aspect_ratio(intrinsic.width, intrinsic.height),
        };
        if width.is_none() && height.is_none() {
            width = Some(DEFAULT_FIXED_WIDTH);
        }

        let mut options = TransformOptions::from_request(request);
        if width.is_some() && height.is_some() {
            default_crop_behavior(&mut options);
        }

        Self {
            width,
            height,
            aspect_ratio: ratio,
            options,
        }
    }

    /// Output `(width, height)`, deriving whichever side was not requested.
    pub fn display_size(&self) -> (f64, f64) {
        match (self.width, self.height) {
            (Some(w), Some(h)) => (w as f64, h as f64),
            (None, Some(h)) => (h as f64 * self.aspect_ratio, h as f64),
            (width, None) => {
                let w = width.unwrap_or(DEFAULT_FIXED_WIDTH) as f64;
                (w, w / self.aspect_ratio)
            }
        }
    }
}
