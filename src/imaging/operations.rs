//! High-level planning operations.
//!
//! These functions combine normalization, calculations and URL building.
//! They take a source and a request and return a finished
//! [`ImageDescriptor`], or `None` when the source cannot be transformed.

use super::calculations::{calculate_fixed_sizes, calculate_fluid_sizes, round_px};
use super::params::{FixedPlan, FluidPlan, ResizePlan, TransformOptions};
use super::url::build_transform_url;
use crate::types::{ImageDescriptor, ImageFormat, ImageSource, SrcSetEntry, VariantRequest};

/// CSS `object-fit` for the options' resizing behavior.
fn fit(options: &TransformOptions) -> Option<String> {
    options
        .resizing_behavior
        .map(|behavior| behavior.object_fit().to_string())
}

/// Fixed-size image with pixel-density candidates (`1x`, `1.5x`, …).
///
/// Candidates wider than the original or beyond the API limit are dropped,
/// so a small original may yield a single-entry (or empty) `srcset`.
pub fn resolve_fixed(source: &ImageSource, request: &VariantRequest) -> Option<ImageDescriptor> {
    let intrinsic = source.geometry()?;
    let plan = FixedPlan::normalize(intrinsic, request);

    let src_set = calculate_fixed_sizes(plan.width, plan.aspect_ratio, intrinsic.width)
        .into_iter()
        .map(|candidate| SrcSetEntry {
            url: build_transform_url(
                &source.base_url,
                &plan
                    .options
                    .sized(Some(candidate.size.width), Some(candidate.size.height)),
            ),
            descriptor: candidate.density.to_string(),
        })
        .collect();

    let src = build_transform_url(
        &source.base_url,
        &plan.options.sized(Some(plan.width), plan.height),
    );
    let (width, height) = plan.display_size();

    Some(ImageDescriptor {
        aspect_ratio: plan.aspect_ratio,
        base_url: source.base_url.clone(),
        src,
        src_set,
        sizes: None,
        width: Some(round_px(width)),
        height: Some(round_px(height)),
        fit: fit(&plan.options),
        src_webp: None,
        src_set_webp: Vec::new(),
        placeholder: None,
    })
}

/// Fluid image with width candidates (`800w`) and a `sizes` hint.
///
/// The original's own width is always offered when it fits the API limit.
pub fn resolve_fluid(source: &ImageSource, request: &VariantRequest) -> Option<ImageDescriptor> {
    let intrinsic = source.geometry()?;
    let plan = FluidPlan::normalize(intrinsic, request);

    let src_set = calculate_fluid_sizes(plan.max_width, plan.aspect_ratio, intrinsic.width)
        .into_iter()
        .map(|size| SrcSetEntry {
            url: build_transform_url(
                &source.base_url,
                &plan.options.sized(Some(size.width), Some(size.height)),
            ),
            descriptor: format!("{}w", size.width),
        })
        .collect();

    let src = build_transform_url(
        &source.base_url,
        &plan.options.sized(Some(plan.max_width), plan.max_height),
    );

    Some(ImageDescriptor {
        aspect_ratio: plan.aspect_ratio,
        base_url: source.base_url.clone(),
        src,
        src_set,
        sizes: Some(plan.sizes.clone()),
        width: None,
        height: None,
        fit: fit(&plan.options),
        src_webp: None,
        src_set_webp: Vec::new(),
        placeholder: None,
    })
}

/// One rendition at the requested size; no `srcset`.
pub fn resolve_resize(source: &ImageSource, request: &VariantRequest) -> Option<ImageDescriptor> {
    let intrinsic = source.geometry()?;
    let plan = ResizePlan::normalize(intrinsic, request);

    let src = build_transform_url(
        &source.base_url,
        &plan.options.sized(plan.width, plan.height),
    );
    let (width, height) = plan.display_size();

    Some(ImageDescriptor {
        aspect_ratio: plan.aspect_ratio,
        base_url: source.base_url.clone(),
        src,
        src_set: Vec::new(),
        sizes: None,
        width: Some(round_px(width)),
        height: Some(round_px(height)),
        fit: fit(&plan.options),
        src_webp: None,
        src_set_webp: Vec::new(),
        placeholder: None,
    })
}

/// The same request re-targeted at WebP, when a WebP companion makes sense.
///
/// `None` when the source is already WebP or the request already asks for it.
pub fn webp_companion_request(
    source: &ImageSource,
    request: &VariantRequest,
) -> Option<VariantRequest> {
    if source.content_type == "image/webp" || request.format == Some(ImageFormat::Webp) {
        return None;
    }
    Some(VariantRequest {
        format: Some(ImageFormat::Webp),
        ..request.clone()
    })
}
